//! Sendria REST API: request paths, wire formats and the client.
//!
//! Actually moving bytes over HTTP (and any authentication) is left to a
//! caller-supplied [`client::Transport`].

pub mod client;
pub mod request;
pub mod wire;

pub use client::{ApiReply, Client, Transport};
pub use request::{ApiRequest, MessageFormat, Method};
