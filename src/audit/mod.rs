//! Fire-and-forget action log written after successful operations.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{trace, warn};

use crate::access::Caller;
use crate::database::document::{Document, READ_FIELD};
use crate::database::{DocumentStore, StoreError};

pub const AUDIT_SCHEMA: &str = "Audit";

#[derive(Debug, Error)]
pub enum AuditError {
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditEntry {
    pub action: String,
    pub collection: String,
    pub acting_identity: Option<String>,
    pub object_id: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl AuditEntry {
    pub fn new(action: impl Into<String>, collection: impl Into<String>, caller: &Caller) -> Self {
        Self {
            action: action.into(),
            collection: collection.into(),
            acting_identity: caller.identity().map(str::to_string),
            object_id: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_object(mut self, object_id: impl Into<String>) -> Self {
        self.object_id = Some(object_id.into());
        self
    }

    /// Stored form; readable by sysadmins only.
    pub fn to_document(&self) -> Document {
        let value = json!({
            "_objectSchema": self.collection,
            "action": self.action,
            "objId": self.object_id,
            "performedBy": self.acting_identity.as_deref().unwrap_or("public"),
            "timestamp": self.timestamp.to_rfc3339(),
        });
        let mut doc = match value {
            Value::Object(doc) => doc,
            _ => Document::new(),
        };
        doc.insert(READ_FIELD.to_string(), json!(["sysadmin"]));
        doc
    }
}

#[async_trait]
pub trait AuditLog: Send + Sync {
    async fn record(&self, entry: AuditEntry) -> Result<(), AuditError>;
}

/// Writes entries as `Audit` documents through the document store.
pub struct StoreAuditLog {
    store: Arc<dyn DocumentStore>,
}

impl StoreAuditLog {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl AuditLog for StoreAuditLog {
    async fn record(&self, entry: AuditEntry) -> Result<(), AuditError> {
        self.store.insert(AUDIT_SCHEMA, entry.to_document()).await?;
        Ok(())
    }
}

/// Used when audit logging is switched off.
pub struct DisabledAuditLog;

#[async_trait]
impl AuditLog for DisabledAuditLog {
    async fn record(&self, entry: AuditEntry) -> Result<(), AuditError> {
        trace!("Audit disabled, dropping {} on {}", entry.action, entry.collection);
        Ok(())
    }
}

/// Writes the entry in the background; a failed write is logged, never returned.
pub fn record_action(log: Arc<dyn AuditLog>, entry: AuditEntry) -> JoinHandle<()> {
    tokio::spawn(async move {
        let (action, collection) = (entry.action.clone(), entry.collection.clone());
        if let Err(e) = log.record(entry).await {
            warn!("Failed to record {} on {}: {}", action, collection, e);
        }
    })
}
