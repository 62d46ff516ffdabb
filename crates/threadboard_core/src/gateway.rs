//! crates/threadboard_core/src/gateway.rs
//!
//! Client-facing document writes: evaluate the access policy against a fresh
//! snapshot, commit the write, and hand back the trigger event the host must
//! deliver to the counter engine.

use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use crate::counters::TriggerEvent;
use crate::domain::{fields, Caller, DocPath, Fields, Resource};
use crate::policy::predicates::changed_keys;
use crate::policy::{authorize, Ancestors, Decision, DenyReason, Operation, Request};
use crate::ports::{DocumentStore, PortError};

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("Permission denied: {0}")]
    Denied(DenyReason),
    #[error("Document already exists: {0}")]
    AlreadyExists(String),
    #[error("Document not found: {0}")]
    NotFound(String),
    #[error(transparent)]
    Port(#[from] PortError),
}

pub type GatewayResult<T> = Result<T, GatewayError>;

#[derive(Clone)]
pub struct DocumentGateway {
    store: Arc<dyn DocumentStore>,
}

impl DocumentGateway {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    async fn check(&self, request: &Request) -> GatewayResult<()> {
        let ancestors = Ancestors::load(self.store.as_ref(), request).await?;
        match authorize(request, &ancestors) {
            Decision::Allow => Ok(()),
            Decision::Deny(reason) => {
                debug!(path = %request.path, op = ?request.op, %reason, "write denied");
                Err(GatewayError::Denied(reason))
            }
        }
    }

    pub async fn read(&self, path: &DocPath, caller: Option<Caller>) -> GatewayResult<Option<Fields>> {
        self.check(&Request::new(Operation::Read, path.clone(), caller))
            .await?;
        Ok(self.store.get(path).await?)
    }

    /// Creates `doc` at `path`. Comments additionally get the caller stamped as
    /// `authorId` once the client-supplied body has passed the policy.
    pub async fn create(&self, path: &DocPath, caller: Option<Caller>, doc: Fields) -> GatewayResult<TriggerEvent> {
        let request = Request::new(Operation::Create, path.clone(), caller)
            .with_proposed(Some(doc));
        self.check(&request).await?;

        let Request { caller, proposed, .. } = request;
        let mut doc = proposed.unwrap_or_default();
        if let (Resource::Comment { .. }, Some(caller)) = (path.classify(), caller) {
            doc.insert(fields::AUTHOR_ID.to_string(), Value::from(caller.uid));
        }

        if !self.store.create(path, doc.clone()).await? {
            return Err(GatewayError::AlreadyExists(path.to_string()));
        }
        Ok(TriggerEvent::created(path.clone(), doc))
    }

    /// Applies `changes` on top of the stored document. Only the keys that
    /// actually differ are written, so concurrent counter increments survive.
    pub async fn update(&self, path: &DocPath, caller: Option<Caller>, changes: Fields) -> GatewayResult<TriggerEvent> {
        let existing = self
            .store
            .get(path)
            .await?
            .ok_or_else(|| GatewayError::NotFound(path.to_string()))?;
        let mut proposed = existing.clone();
        proposed.extend(changes);

        let request = Request::new(Operation::Update, path.clone(), caller)
            .with_existing(Some(existing.clone()))
            .with_proposed(Some(proposed.clone()));
        self.check(&request).await?;

        let patch: Fields = changed_keys(&existing, &proposed)
            .into_iter()
            .filter_map(|key| proposed.get(&key).cloned().map(|value| (key, value)))
            .collect();
        if !patch.is_empty() && !self.store.merge(path, patch).await? {
            return Err(GatewayError::NotFound(path.to_string()));
        }
        Ok(TriggerEvent::updated(path.clone(), existing, proposed))
    }

    pub async fn delete(&self, path: &DocPath, caller: Option<Caller>) -> GatewayResult<TriggerEvent> {
        let existing = self
            .store
            .get(path)
            .await?
            .ok_or_else(|| GatewayError::NotFound(path.to_string()))?;
        let request = Request::new(Operation::Delete, path.clone(), caller)
            .with_existing(Some(existing));
        self.check(&request).await?;

        let removed = self
            .store
            .delete(path)
            .await?
            .ok_or_else(|| GatewayError::NotFound(path.to_string()))?;
        Ok(TriggerEvent::deleted(path.clone(), removed))
    }
}
