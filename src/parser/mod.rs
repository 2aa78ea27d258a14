//! Email parsing: header decoding, transfer decoding, MIME decomposition and `.eml` files.

pub mod encoding;
pub mod eml;
pub mod header;
pub mod mime;
