use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

use super::document::{document_id, Document, ID_FIELD, SCHEMA_FIELD};
use crate::filter::{Collation, Filter};

/// Errors from document stores
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Missing configuration: {0}")]
    ConfigMissing(&'static str),

    #[error("Invalid database URL")]
    InvalidDatabaseUrl,

    #[error("Invalid document: {0}")]
    InvalidDocument(String),

    #[error("Query error: {0}")]
    QueryError(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

/// Backing collection of documents, partitioned by entity type.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Documents of `schema` that match `filter` exactly under `collation`,
    /// in a stable storage order.
    async fn scan(
        &self,
        schema: &str,
        filter: &Filter,
        collation: &Collation,
    ) -> Result<Vec<Document>, StoreError>;

    /// Inserts or replaces a document by `_id`, returning the stored form.
    async fn insert(&self, schema: &str, doc: Document) -> Result<Document, StoreError>;

    async fn health_check(&self) -> Result<(), StoreError>;
}

/// Stamps the schema discriminator, assigns an `_id` when missing and
/// normalizes an existing one to a plain string.
pub fn prepare_insert(schema: &str, mut doc: Document) -> Result<(String, Document), StoreError> {
    if schema.trim().is_empty() {
        return Err(StoreError::InvalidDocument("schema name is empty".to_string()));
    }
    let id = match doc.get(ID_FIELD) {
        None | Some(Value::Null) => {
            let id = Uuid::new_v4().to_string();
            doc.insert(ID_FIELD.to_string(), Value::String(id.clone()));
            id
        }
        Some(_) => {
            let id = document_id(&doc)
                .ok_or_else(|| StoreError::InvalidDocument(format!("unusable {} value", ID_FIELD)))?;
            // `{"$oid": ..}` and numeric ids are stored in their string form
            doc.insert(ID_FIELD.to_string(), Value::String(id.clone()));
            id
        }
    };
    doc.insert(SCHEMA_FIELD.to_string(), Value::String(schema.to_string()));
    Ok((id, doc))
}
