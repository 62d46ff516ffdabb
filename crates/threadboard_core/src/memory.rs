//! crates/threadboard_core/src/memory.rs
//!
//! An in-process implementation of the `DocumentStore` port.
//! Every write takes the single write lock, so `increment` is atomic.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::domain::{DocPath, Fields};
use crate::ports::{DocumentStore, PortError, PortResult};

#[derive(Debug, Default)]
pub struct InMemoryDocumentStore {
    docs: RwLock<BTreeMap<DocPath, Fields>>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.docs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.docs.read().await.is_empty()
    }
}

fn require_document(path: &DocPath) -> PortResult<()> {
    if path.is_document() {
        Ok(())
    } else {
        Err(PortError::InvalidPath(path.to_string()))
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn get(&self, path: &DocPath) -> PortResult<Option<Fields>> {
        Ok(self.docs.read().await.get(path).cloned())
    }

    async fn create(&self, path: &DocPath, fields: Fields) -> PortResult<bool> {
        require_document(path)?;
        let mut docs = self.docs.write().await;
        if docs.contains_key(path) {
            return Ok(false);
        }
        docs.insert(path.clone(), fields);
        Ok(true)
    }

    async fn set(&self, path: &DocPath, fields: Fields) -> PortResult<()> {
        require_document(path)?;
        self.docs.write().await.insert(path.clone(), fields);
        Ok(())
    }

    async fn merge(&self, path: &DocPath, fields: Fields) -> PortResult<bool> {
        let mut docs = self.docs.write().await;
        let Some(doc) = docs.get_mut(path) else {
            return Ok(false);
        };
        doc.extend(fields);
        Ok(true)
    }

    async fn merge_absent(&self, path: &DocPath, fields: Fields) -> PortResult<bool> {
        let mut docs = self.docs.write().await;
        let Some(doc) = docs.get_mut(path) else {
            return Ok(false);
        };
        for (key, value) in fields {
            doc.entry(key).or_insert(value);
        }
        Ok(true)
    }

    async fn delete(&self, path: &DocPath) -> PortResult<Option<Fields>> {
        Ok(self.docs.write().await.remove(path))
    }

    async fn increment(&self, path: &DocPath, field: &str, delta: i64) -> PortResult<Option<i64>> {
        let mut docs = self.docs.write().await;
        let Some(doc) = docs.get_mut(path) else {
            return Ok(None);
        };
        let current = match doc.get(field) {
            None | Some(Value::Null) => 0,
            Some(value) => value.as_i64().ok_or_else(|| {
                PortError::Unexpected(format!("{} of {} is not an integer", field, path))
            })?,
        };
        let next = current + delta;
        doc.insert(field.to_string(), Value::from(next));
        Ok(Some(next))
    }

    async fn list(&self, collection: &DocPath) -> PortResult<Vec<(DocPath, Fields)>> {
        let docs = self.docs.read().await;
        Ok(docs
            .iter()
            .filter(|(path, _)| path.parent_collection().as_ref() == Some(collection))
            .map(|(path, fields)| (path.clone(), fields.clone()))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use super::*;

    fn path(raw: &str) -> DocPath {
        DocPath::parse(raw).unwrap()
    }

    fn body(value: Value) -> Fields {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn create_does_not_overwrite() {
        let store = InMemoryDocumentStore::new();
        let p = path("categories/abc");
        assert!(store.create(&p, body(json!({"ownerId": "u1"}))).await.unwrap());
        assert!(!store.create(&p, body(json!({"ownerId": "u2"}))).await.unwrap());
        assert_eq!(store.get(&p).await.unwrap().unwrap()["ownerId"], "u1");
    }

    #[tokio::test]
    async fn collection_paths_cannot_hold_documents() {
        let store = InMemoryDocumentStore::new();
        assert!(store.set(&path("posts"), Fields::new()).await.is_err());
    }

    #[tokio::test]
    async fn merge_absent_keeps_present_values() {
        let store = InMemoryDocumentStore::new();
        let p = path("categories/abc");
        store
            .set(&p, body(json!({"ownerId": "u1", "numOfSubscribers": 4})))
            .await
            .unwrap();
        store
            .merge_absent(&p, body(json!({"numOfSubscribers": 0, "numOfModerators": 0})))
            .await
            .unwrap();
        let doc = store.get(&p).await.unwrap().unwrap();
        assert_eq!(doc["numOfSubscribers"], 4);
        assert_eq!(doc["numOfModerators"], 0);
    }

    #[tokio::test]
    async fn increment_on_missing_document_is_none() {
        let store = InMemoryDocumentStore::new();
        let result = store.increment(&path("posts/p1"), "rating", 1).await.unwrap();
        assert_eq!(result, None);
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn increment_rejects_non_integer_fields() {
        let store = InMemoryDocumentStore::new();
        let p = path("posts/p1");
        store.set(&p, body(json!({"rating": "high"}))).await.unwrap();
        assert!(store.increment(&p, "rating", 1).await.is_err());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_increments_are_not_lost() {
        let store = Arc::new(InMemoryDocumentStore::new());
        let p = path("posts/p1");
        store.set(&p, body(json!({"rating": 0}))).await.unwrap();

        let tasks: Vec<_> = (0..500)
            .map(|i| {
                let store = store.clone();
                let p = p.clone();
                tokio::spawn(async move {
                    let delta = if i % 5 == 0 { -1 } else { 1 };
                    store.increment(&p, "rating", delta).await.unwrap();
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap();
        }

        let doc = store.get(&p).await.unwrap().unwrap();
        assert_eq!(doc["rating"], 400 - 100);
    }

    #[tokio::test]
    async fn list_returns_direct_children_only() {
        let store = InMemoryDocumentStore::new();
        store.set(&path("posts/p1"), Fields::new()).await.unwrap();
        store.set(&path("posts/p1/comments/c1"), Fields::new()).await.unwrap();
        store
            .set(&path("posts/p1/comments/c1/comments/c2"), Fields::new())
            .await
            .unwrap();
        store
            .set(&path("posts/p1/upVoteIds/u1"), Fields::new())
            .await
            .unwrap();

        let children = store.list(&path("posts/p1/comments")).await.unwrap();
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].0, path("posts/p1/comments/c1"));
    }
}
