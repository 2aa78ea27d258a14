//! Client-side decomposition with LRU caching.

use std::num::NonZeroUsize;

use lru::LruCache;
use tracing::debug;

use crate::api::{Client, Transport};
use crate::error::{Result, SendriaError};
use crate::model::message::Message;
use crate::model::part::Decomposition;
use crate::parser::mime::{self, DecodeOptions};

/// Default number of decomposed messages to keep.
pub const DEFAULT_CACHE_SIZE: usize = 50;

/// Fetches messages through a [`Client`] and decomposes them locally.
///
/// Decompositions are kept in an LRU cache keyed by message id, so that
/// looking up several attachments of the same message downloads and
/// decodes its source once.
pub struct MessageStore<T> {
    client: Client<T>,
    options: DecodeOptions,
    cache: LruCache<String, Decomposition>,
}

impl<T: Transport> MessageStore<T> {
    /// A zero `cache_size` is treated as one.
    pub fn new(client: Client<T>, options: DecodeOptions, cache_size: usize) -> Self {
        let capacity = NonZeroUsize::new(cache_size).unwrap_or(NonZeroUsize::MIN);
        Self {
            client,
            options,
            cache: LruCache::new(capacity),
        }
    }

    pub fn client(&self) -> &Client<T> {
        &self.client
    }

    pub fn options(&self) -> &DecodeOptions {
        &self.options
    }

    /// Number of cached decompositions.
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    /// Decompose a message, downloading its source on a cache miss.
    pub fn get_decomposed(&mut self, id: &str) -> Result<&Decomposition> {
        let client = &self.client;
        let options = &self.options;
        self.cache.try_get_or_insert(id.to_string(), || {
            let message = fetch_with_source(client, id)?;
            mime::decompose_with(&message.source, options)
        })
    }

    /// Decoded bytes of an attachment, served from the cached decomposition.
    pub fn get_attachment(&mut self, id: &str, cid: &str) -> Result<&[u8]> {
        let decomposition = self.get_decomposed(id)?;
        decomposition
            .attachment_by_cid(cid)
            .map(|a| a.content.as_slice())
            .ok_or_else(|| SendriaError::AttachmentNotFound {
                message_id: id.to_string(),
                cid: cid.to_string(),
            })
    }

    /// Fetch a message with `parts` and `attachments` filled in.
    pub fn get_message(&mut self, id: &str) -> Result<Message> {
        let mut message = fetch_with_source(&self.client, id)?;

        let decomposition = match self.cache.get(id) {
            Some(cached) => cached.clone(),
            None => {
                let fresh = mime::decompose_with(&message.source, &self.options)?;
                self.cache.put(id.to_string(), fresh.clone());
                fresh
            }
        };
        message.parts = decomposition.parts;
        message.attachments = decomposition.attachments;
        Ok(message)
    }

    /// Delete a message on the server and forget its decomposition.
    pub fn delete_message(&mut self, id: &str) -> Result<()> {
        self.invalidate(id);
        self.client.delete_message(id)
    }

    /// Drop the cached decomposition of one message.
    pub fn invalidate(&mut self, id: &str) {
        if self.cache.pop(id).is_some() {
            debug!(id, "Evicted cached decomposition");
        }
    }

    pub fn clear(&mut self) {
        self.cache.clear();
    }
}

/// `GET {id}.json`, falling back to `{id}.source` when the metadata carries
/// no source.
fn fetch_with_source<T: Transport>(client: &Client<T>, id: &str) -> Result<Message> {
    let mut message = client.get_message(id)?;
    if message.source.is_empty() {
        debug!(id, "Message metadata has no source, fetching it separately");
        message.source = client.get_message_source(id)?;
    }
    Ok(message)
}
