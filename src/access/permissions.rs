use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, warn};

use super::caller::{Caller, ProjectSet};
use crate::database::document::id_string;
use crate::database::{DocumentStore, StoreError};
use crate::filter::{Collation, Filter};

pub const USER_SCHEMA: &str = "User";
pub const SUBJECT_FIELD: &str = "sub";
pub const PROJECT_PERMISSIONS_FIELD: &str = "projectPermissions";

/// Source of per-identity project grants.
#[async_trait]
pub trait ProjectPermissionResolver: Send + Sync {
    /// Project ids granted to `identity`; `Ok(None)` when no user record exists.
    async fn granted_projects(&self, identity: &str) -> Result<Option<ProjectSet>, StoreError>;
}

/// Reads grants from the `projectPermissions` list on User documents.
pub struct StorePermissionResolver {
    store: Arc<dyn DocumentStore>,
}

impl StorePermissionResolver {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl ProjectPermissionResolver for StorePermissionResolver {
    async fn granted_projects(&self, identity: &str) -> Result<Option<ProjectSet>, StoreError> {
        let users = self
            .store
            .scan(USER_SCHEMA, &Filter::eq(SUBJECT_FIELD, identity), &Collation::simple())
            .await?;

        let Some(user) = users.first() else {
            return Ok(None);
        };
        let grants = match user.get(PROJECT_PERMISSIONS_FIELD) {
            Some(Value::Array(items)) => items.iter().filter_map(id_string).collect(),
            _ => ProjectSet::new(),
        };
        Ok(Some(grants))
    }
}

/// Resolves a caller's grants, degrading to no grants when the identity is
/// missing, unknown, or the lookup fails.
pub async fn resolve_permissions(resolver: &dyn ProjectPermissionResolver, caller: &Caller) -> ProjectSet {
    let Some(identity) = caller.identity() else {
        return ProjectSet::new();
    };
    match resolver.granted_projects(identity).await {
        Ok(Some(grants)) => grants,
        Ok(None) => {
            debug!("No user record for {}; treating as no project grants", identity);
            ProjectSet::new()
        }
        Err(e) => {
            warn!("Project grant lookup failed for {}: {}", identity, e);
            ProjectSet::new()
        }
    }
}

/// Grants for one query, fetched at most once.
pub struct PermissionCache<'a> {
    resolver: &'a dyn ProjectPermissionResolver,
    caller: &'a Caller,
    grants: OnceCell<ProjectSet>,
}

impl<'a> PermissionCache<'a> {
    pub fn new(resolver: &'a dyn ProjectPermissionResolver, caller: &'a Caller) -> Self {
        Self { resolver, caller, grants: OnceCell::new() }
    }

    pub async fn get(&self) -> &ProjectSet {
        self.grants
            .get_or_init(|| resolve_permissions(self.resolver, self.caller))
            .await
    }
}
