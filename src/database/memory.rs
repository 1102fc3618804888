use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use tokio::sync::RwLock;
use tracing::{debug, info};

use super::document::{document_id, Document, SCHEMA_FIELD};
use super::store::{prepare_insert, DocumentStore, StoreError};
use crate::filter::{Collation, Filter};

/// In-process store keeping each schema's documents in insertion order.
#[derive(Default)]
pub struct MemoryDocumentStore {
    schemas: RwLock<HashMap<String, Vec<Document>>>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts documents that carry their own `_schemaName`.
    pub async fn seed(&self, docs: Vec<Document>) -> Result<usize, StoreError> {
        let mut count = 0;
        for doc in docs {
            let schema = doc
                .get(SCHEMA_FIELD)
                .and_then(Value::as_str)
                .map(str::to_string)
                .ok_or_else(|| StoreError::InvalidDocument(format!("missing {}", SCHEMA_FIELD)))?;
            self.insert(&schema, doc).await?;
            count += 1;
        }
        Ok(count)
    }

    /// Loads a JSON array of documents from disk.
    pub async fn load_json(&self, path: &Path) -> Result<usize, StoreError> {
        let raw = tokio::fs::read_to_string(path).await?;
        let value: Value = serde_json::from_str(&raw)?;
        let docs = match value {
            Value::Array(items) => items
                .into_iter()
                .map(|item| match item {
                    Value::Object(doc) => Ok(doc),
                    other => Err(StoreError::InvalidDocument(format!("expected object, got {}", other))),
                })
                .collect::<Result<Vec<_>, _>>()?,
            _ => return Err(StoreError::InvalidDocument("seed file must hold an array".to_string())),
        };
        let count = self.seed(docs).await?;
        info!("Seeded {} documents from {}", count, path.display());
        Ok(count)
    }

    pub async fn len(&self, schema: &str) -> usize {
        self.schemas.read().await.get(schema).map(Vec::len).unwrap_or(0)
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn scan(
        &self,
        schema: &str,
        filter: &Filter,
        collation: &Collation,
    ) -> Result<Vec<Document>, StoreError> {
        let schemas = self.schemas.read().await;
        let docs: Vec<Document> = schemas
            .get(schema)
            .map(|docs| {
                docs.iter()
                    .filter(|doc| filter.matches(doc, collation))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        debug!("Memory scan of {}: {} documents matched", schema, docs.len());
        Ok(docs)
    }

    async fn insert(&self, schema: &str, doc: Document) -> Result<Document, StoreError> {
        let (id, doc) = prepare_insert(schema, doc)?;
        let mut schemas = self.schemas.write().await;
        let docs = schemas.entry(schema.to_string()).or_default();
        match docs.iter_mut().find(|existing| document_id(existing).as_deref() == Some(id.as_str())) {
            Some(existing) => *existing = doc.clone(),
            None => docs.push(doc.clone()),
        }
        Ok(doc)
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn scan_is_partitioned_by_schema() {
        let store = MemoryDocumentStore::new();
        store
            .seed(vec![
                doc(json!({"_id": "a1", "_schemaName": "Application", "name": "One"})),
                doc(json!({"_id": "p1", "_schemaName": "Project", "name": "One"})),
            ])
            .await
            .unwrap();

        let found = store
            .scan("Application", &Filter::eq("name", "one"), &Collation::default())
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0]["_id"], json!("a1"));
    }

    #[tokio::test]
    async fn insert_replaces_by_id() {
        let store = MemoryDocumentStore::new();
        store.insert("Project", doc(json!({"_id": "p1", "name": "Old"}))).await.unwrap();
        store.insert("Project", doc(json!({"_id": "p1", "name": "New"}))).await.unwrap();
        let all = store.scan("Project", &Filter::all(), &Collation::default()).await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0]["name"], json!("New"));
    }

    #[tokio::test]
    async fn seed_requires_schema_name() {
        let store = MemoryDocumentStore::new();
        assert!(store.seed(vec![doc(json!({"_id": "x"}))]).await.is_err());
        assert_eq!(store.len("Project").await, 0);
    }
}
