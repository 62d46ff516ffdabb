//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `DocumentStore` port from the core crate. Every document lives in a
//! single `documents` table keyed by its full path, with the fields kept as JSONB.

use async_trait::async_trait;
use serde_json::Value;
use sqlx::{types::Json, FromRow, PgPool};
use threadboard_core::domain::{DocPath, Fields};
use threadboard_core::ports::{DocumentStore, PortError, PortResult};

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `DocumentStore` port.
#[derive(Clone)]
pub struct PgDocumentStore {
    pool: PgPool,
}

impl PgDocumentStore {
    /// Creates a new `PgDocumentStore`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct DocumentRecord {
    path: String,
    data: Json<Value>,
}
impl DocumentRecord {
    fn to_domain(self) -> PortResult<(DocPath, Fields)> {
        let path = DocPath::parse(&self.path)?;
        let fields = into_fields(self.data.0, &self.path)?;
        Ok((path, fields))
    }
}

#[derive(FromRow)]
struct DataRecord {
    data: Json<Value>,
}

fn into_fields(value: Value, path: &str) -> PortResult<Fields> {
    match value {
        Value::Object(fields) => Ok(fields),
        other => Err(PortError::Unexpected(format!(
            "document {} holds a non-object value: {}",
            path, other
        ))),
    }
}

fn unexpected(e: sqlx::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

fn require_document(path: &DocPath) -> PortResult<String> {
    if path.is_document() {
        Ok(path.to_string())
    } else {
        Err(PortError::InvalidPath(path.to_string()))
    }
}

/// The collection a document row is filed under, used by `list`.
fn collection_key(path: &DocPath) -> PortResult<String> {
    path.parent_collection()
        .map(|collection| collection.to_string())
        .ok_or_else(|| PortError::InvalidPath(path.to_string()))
}

//=========================================================================================
// `DocumentStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl DocumentStore for PgDocumentStore {
    async fn get(&self, path: &DocPath) -> PortResult<Option<Fields>> {
        let key = path.to_string();
        let record = sqlx::query_as::<_, DataRecord>("SELECT data FROM documents WHERE path = $1")
            .bind(&key)
            .fetch_optional(&self.pool)
            .await
            .map_err(unexpected)?;
        record.map(|r| into_fields(r.data.0, &key)).transpose()
    }

    async fn create(&self, path: &DocPath, fields: Fields) -> PortResult<bool> {
        let key = require_document(path)?;
        let result = sqlx::query(
            "INSERT INTO documents (path, collection, data) VALUES ($1, $2, $3) ON CONFLICT (path) DO NOTHING",
        )
        .bind(&key)
        .bind(collection_key(path)?)
        .bind(Json(Value::Object(fields)))
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(result.rows_affected() == 1)
    }

    async fn set(&self, path: &DocPath, fields: Fields) -> PortResult<()> {
        let key = require_document(path)?;
        sqlx::query(
            "INSERT INTO documents (path, collection, data) VALUES ($1, $2, $3) \
             ON CONFLICT (path) DO UPDATE SET data = EXCLUDED.data, updated_at = now()",
        )
        .bind(&key)
        .bind(collection_key(path)?)
        .bind(Json(Value::Object(fields)))
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(())
    }

    async fn merge(&self, path: &DocPath, fields: Fields) -> PortResult<bool> {
        let result = sqlx::query(
            "UPDATE documents SET data = data || $2, updated_at = now() WHERE path = $1",
        )
        .bind(path.to_string())
        .bind(Json(Value::Object(fields)))
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(result.rows_affected() == 1)
    }

    async fn merge_absent(&self, path: &DocPath, fields: Fields) -> PortResult<bool> {
        // right-hand side wins in `||`, so stored keys are kept
        let result = sqlx::query(
            "UPDATE documents SET data = $2 || data, updated_at = now() WHERE path = $1",
        )
        .bind(path.to_string())
        .bind(Json(Value::Object(fields)))
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(result.rows_affected() == 1)
    }

    async fn delete(&self, path: &DocPath) -> PortResult<Option<Fields>> {
        let key = path.to_string();
        let record = sqlx::query_as::<_, DataRecord>("DELETE FROM documents WHERE path = $1 RETURNING data")
            .bind(&key)
            .fetch_optional(&self.pool)
            .await
            .map_err(unexpected)?;
        record.map(|r| into_fields(r.data.0, &key)).transpose()
    }

    async fn increment(&self, path: &DocPath, field: &str, delta: i64) -> PortResult<Option<i64>> {
        // A single UPDATE takes the row lock, so concurrent increments serialize.
        let value = sqlx::query_scalar::<_, i64>(
            "UPDATE documents \
             SET data = jsonb_set(data, ARRAY[$2::text], to_jsonb(COALESCE((data->>$2::text)::bigint, 0) + $3)), \
                 updated_at = now() \
             WHERE path = $1 \
             RETURNING (data->>$2::text)::bigint",
        )
        .bind(path.to_string())
        .bind(field)
        .bind(delta)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(value)
    }

    async fn list(&self, collection: &DocPath) -> PortResult<Vec<(DocPath, Fields)>> {
        let records = sqlx::query_as::<_, DocumentRecord>(
            "SELECT path, data FROM documents WHERE collection = $1 ORDER BY path ASC",
        )
        .bind(collection.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        records.into_iter().map(|r| r.to_domain()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn documents_are_filed_under_their_collection() {
        let path = DocPath::parse("posts/p1/comments/C1").unwrap();
        assert_eq!(collection_key(&path).unwrap(), "posts/p1/comments");
        assert_eq!(require_document(&path).unwrap(), "posts/p1/comments/C1");
    }

    #[test]
    fn collection_paths_cannot_be_written() {
        let path = DocPath::parse("posts/p1/comments").unwrap();
        assert!(matches!(require_document(&path), Err(PortError::InvalidPath(_))));
    }

    #[test]
    fn non_object_rows_are_rejected() {
        assert!(into_fields(json!([1, 2]), "posts/p1").is_err());
        let fields = into_fields(json!({"rating": 3}), "posts/p1").unwrap();
        assert_eq!(fields["rating"], 3);
    }
}
