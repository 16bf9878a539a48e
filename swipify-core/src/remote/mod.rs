//! Remote library access.
//!
//! `LibraryRemote` is the raw, single-attempt transport: one method per
//! remote endpoint, each returning a classified `RemoteError`. It knows
//! nothing about retries, caching or pagination loops. `RemoteCollectionClient`
//! wraps any `LibraryRemote` with the backoff executor and exposes the
//! capability operations the swipe engine needs.

pub mod client;
pub mod memory;
pub mod spotify;
mod track;

use std::time::Duration;

use async_trait::async_trait;

pub use client::{Membership, RemoteCollectionClient};
pub use track::Track;

/// Whether retrying a failed call may succeed.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Transience {
    /// Retry will never help without changing inputs.
    Permanent,
    /// Retry may help (rate limit, server hiccup, network).
    Retryable,
    /// Unknown if retry will help.
    Unknown,
}

/// Errors from a single remote call, classified by the transport.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RemoteError {
    #[error("rate limited (retry after {retry_after:?})")]
    RateLimited { retry_after: Option<Duration> },
    #[error("server error: HTTP {status}")]
    Server { status: u16 },
    #[error("network error: {0}")]
    Network(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("unexpected response: {0}")]
    Decode(String),
    #[error("{0}")]
    Other(String),
}

impl RemoteError {
    pub fn transience(&self) -> Transience {
        match self {
            RemoteError::RateLimited { .. }
            | RemoteError::Server { .. }
            | RemoteError::Network(_) => Transience::Retryable,
            RemoteError::NotFound(_)
            | RemoteError::BadRequest(_)
            | RemoteError::Unauthorized(_) => Transience::Permanent,
            RemoteError::Decode(_) | RemoteError::Other(_) => Transience::Unknown,
        }
    }

    /// The item or collection addressed by the call does not exist
    /// (or the ID is malformed).
    pub fn is_missing(&self) -> bool {
        matches!(self, RemoteError::NotFound(_) | RemoteError::BadRequest(_))
    }
}

/// Which ordered collection to page through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListSource {
    /// The user's liked/saved collection.
    Root,
    /// A named collection, by remote ID.
    Collection(String),
}

/// One page of an offset-paginated listing.
///
/// `items` holds one slot per entry the server returned; a `None` slot is an
/// entry the server could not resolve (deleted, region-restricted). Slots
/// still count toward the offset.
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<Option<T>>,
    pub total: usize,
}

impl<T> Page<T> {
    pub fn empty(total: usize) -> Self {
        Self {
            items: Vec::new(),
            total,
        }
    }
}

/// A named collection as listed by the remote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionSummary {
    pub id: String,
    pub name: String,
    pub owner_id: String,
}

/// Raw remote library. One call, one attempt.
#[async_trait]
pub trait LibraryRemote: Send + Sync {
    /// One page of `source`, starting at `offset`.
    async fn list_page(
        &self,
        source: &ListSource,
        offset: usize,
        limit: usize,
    ) -> Result<Page<Track>, RemoteError>;

    /// Full metadata for one item.
    async fn track(&self, id: &str) -> Result<Track, RemoteError>;

    /// Metadata for several items, positionally aligned with `ids`.
    /// Unknown items come back as `None`.
    async fn tracks(&self, ids: &[String]) -> Result<Vec<Option<Track>>, RemoteError>;

    /// ID of the authenticated user.
    async fn current_user_id(&self) -> Result<String, RemoteError>;

    /// One page of the collections visible to the current user.
    async fn collections_page(
        &self,
        offset: usize,
        limit: usize,
    ) -> Result<Page<CollectionSummary>, RemoteError>;

    /// Create a private collection owned by `owner_id`, returning its ID.
    async fn create_collection(&self, owner_id: &str, name: &str) -> Result<String, RemoteError>;

    /// Append an item to a collection.
    async fn add_to_collection(&self, collection_id: &str, item_id: &str)
        -> Result<(), RemoteError>;

    /// Remove every occurrence of an item from a collection.
    /// Not an error if the item is absent.
    async fn remove_from_collection(
        &self,
        collection_id: &str,
        item_id: &str,
    ) -> Result<(), RemoteError>;

    /// Like an item (add it to the root collection).
    async fn save_to_root(&self, item_id: &str) -> Result<(), RemoteError>;

    /// Un-like an item. Not an error if the item is not liked.
    async fn remove_from_root(&self, item_id: &str) -> Result<(), RemoteError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_transience() {
        assert_eq!(
            RemoteError::RateLimited { retry_after: None }.transience(),
            Transience::Retryable
        );
        assert_eq!(
            RemoteError::Server { status: 503 }.transience(),
            Transience::Retryable
        );
        assert_eq!(
            RemoteError::Network("reset".into()).transience(),
            Transience::Retryable
        );
        assert_eq!(
            RemoteError::Unauthorized("expired".into()).transience(),
            Transience::Permanent
        );
        assert_eq!(
            RemoteError::NotFound("t1".into()).transience(),
            Transience::Permanent
        );
        assert_eq!(
            RemoteError::Decode("eof".into()).transience(),
            Transience::Unknown
        );
    }

    #[test]
    fn missing_covers_not_found_and_bad_id() {
        assert!(RemoteError::NotFound("t1".into()).is_missing());
        assert!(RemoteError::BadRequest("invalid id".into()).is_missing());
        assert!(!RemoteError::Server { status: 500 }.is_missing());
    }
}
