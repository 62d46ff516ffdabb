//! crates/threadboard_core/src/ports.rs
//!
//! Defines the service contracts (traits) the core depends on.
//! These traits form the boundary of the hexagonal architecture: the counter
//! engine and the policy's ancestor loader only ever see a `DocumentStore`, and
//! the host resolves callers through an `IdentityService`.

use async_trait::async_trait;

use crate::domain::{Caller, DocPath, Fields};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from the underlying store.
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Invalid document path: {0}")]
    InvalidPath(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
    #[error("Unauthorized")]
    Unauthorized,
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

/// A hierarchical document store.
///
/// `increment` must be atomic with respect to every other write on the same
/// document: two concurrent increments of `+1` always yield `+2`.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get(&self, path: &DocPath) -> PortResult<Option<Fields>>;

    async fn exists(&self, path: &DocPath) -> PortResult<bool> {
        Ok(self.get(path).await?.is_some())
    }

    /// Inserts a document only if none exists at `path`. Returns whether it was inserted.
    async fn create(&self, path: &DocPath, fields: Fields) -> PortResult<bool>;

    /// Inserts or replaces the whole document.
    async fn set(&self, path: &DocPath, fields: Fields) -> PortResult<()>;

    /// Overwrites the given keys of an existing document. Returns `false` if it is missing.
    async fn merge(&self, path: &DocPath, fields: Fields) -> PortResult<bool>;

    /// Writes only the given keys that are absent from an existing document.
    /// Returns `false` if the document is missing.
    async fn merge_absent(&self, path: &DocPath, fields: Fields) -> PortResult<bool>;

    /// Removes a document and returns its last contents.
    async fn delete(&self, path: &DocPath) -> PortResult<Option<Fields>>;

    /// Atomically adds `delta` to an integer field (a missing field counts as 0).
    /// Returns the new value, or `None` if the document does not exist.
    async fn increment(&self, path: &DocPath, field: &str, delta: i64) -> PortResult<Option<i64>>;

    /// Lists the documents directly inside a collection.
    async fn list(&self, collection: &DocPath) -> PortResult<Vec<(DocPath, Fields)>>;
}

/// Resolves a bearer token issued by the authentication layer into a caller.
#[async_trait]
pub trait IdentityService: Send + Sync {
    async fn verify_token(&self, token: &str) -> PortResult<Caller>;
}
