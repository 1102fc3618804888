use std::collections::BTreeSet;
use std::sync::Arc;

use super::error::QueryError;
use super::executor::PipelineExecutor;
use super::pipeline::{Pipeline, QueryOutput, Stage};
use super::request::QueryRequest;
use crate::access::{
    Caller, PermissionCache, ProjectPermissionResolver, ProjectSet, Redaction, VisibilityRule,
    ROLE_CREATE_PROJECTS, ROLE_PUBLIC,
};
use crate::config::QueryConfig;
use crate::database::DocumentStore;
use crate::resources::{ResourceConfig, ResourceRegistry};

/// Builds and runs access-controlled queries.
///
/// Each query is a pure function of its request plus one permission lookup
/// and the store reads its pipeline needs. Nothing is shared between queries.
pub struct QueryEngine {
    store: Arc<dyn DocumentStore>,
    permissions: Arc<dyn ProjectPermissionResolver>,
    registry: Arc<ResourceRegistry>,
    config: QueryConfig,
}

impl QueryEngine {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        permissions: Arc<dyn ProjectPermissionResolver>,
        registry: Arc<ResourceRegistry>,
        config: QueryConfig,
    ) -> Self {
        Self { store, permissions, registry, config }
    }

    pub fn registry(&self) -> &ResourceRegistry {
        &self.registry
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    pub fn resolve(&self, name: &str) -> Result<&ResourceConfig, QueryError> {
        self.registry
            .resolve(name)
            .ok_or_else(|| QueryError::UnknownCollection(name.to_string()))
    }

    pub async fn run_query(&self, request: QueryRequest) -> Result<QueryOutput, QueryError> {
        let resource = self.resolve(&request.resource)?;

        let cache = PermissionCache::new(self.permissions.as_ref(), &request.caller);
        let grants = if needs_project_grants(resource, &request.caller) {
            cache.get().await.clone()
        } else {
            ProjectSet::new()
        };

        let pipeline = self.build_pipeline(&request, grants)?;
        let output = PipelineExecutor::new(self.store.as_ref()).execute(pipeline).await?;
        Ok(output)
    }

    /// Assembles the stage list for a request:
    /// match, pre-stages, projection, joins, post-stages, redaction,
    /// optional sort warm-up, sort, re-projection, then paging.
    pub fn build_pipeline(&self, request: &QueryRequest, grants: ProjectSet) -> Result<Pipeline, QueryError> {
        let resource = self.resolve(&request.resource)?;
        let caller = &request.caller;

        let mut stages = vec![Stage::Match(request.filter.clone())];
        stages.extend(request.pre_stages.iter().cloned());

        let lookups = request.joins.lookups();
        let mut projection = resource.mandatory_projection();
        projection.extend(request.fields.iter().cloned());
        projection.extend(lookups.iter().map(|l| l.local_field.clone()));
        stages.push(Stage::Project(projection.clone()));

        for mut lookup in lookups {
            let target = self.resolve(&lookup.from)?;
            lookup.fields = Some(visible_fields(target, caller));
            stages.push(Stage::Lookup(lookup));
        }
        stages.extend(request.post_stages.iter().cloned());

        stages.push(Stage::Redact(Redaction::new(
            resource.visibility,
            caller.roles().clone(),
            grants,
            resource.project_key.clone(),
        )));

        let mut reprojection = projection;
        reprojection.extend(stages.iter().filter_map(|stage| match stage {
            Stage::Lookup(lookup) => Some(lookup.as_field.clone()),
            _ => None,
        }));
        if let Some(warmup) = &request.sort_warmup {
            reprojection.remove(&warmup.field);
            stages.push(Stage::SortWarmup(warmup.clone()));
        }
        if !request.sort.is_empty() {
            stages.push(Stage::Sort(request.sort.clone()));
        }
        stages.push(Stage::Project(reprojection));

        let skip = request.skip.unwrap_or(0);
        let limit = self.effective_limit(request.limit);
        if request.count {
            stages.push(Stage::CountPage { skip, limit });
        } else {
            if skip > 0 {
                stages.push(Stage::Skip(skip));
            }
            stages.push(Stage::Limit(limit));
        }

        Ok(Pipeline {
            schema: resource.name.clone(),
            collation: self.config.collation(),
            stages,
        })
    }

    /// Requested page size capped by configuration; zero or absent means the cap.
    pub fn effective_limit(&self, requested: Option<u64>) -> u64 {
        match requested {
            Some(limit) if limit > 0 => limit.min(self.config.max_limit),
            _ => self.config.max_limit,
        }
    }
}

/// Whether redaction for this caller depends on their project grants.
pub fn needs_project_grants(resource: &ResourceConfig, caller: &Caller) -> bool {
    resource.visibility == VisibilityRule::Read
        && !resource.is_user_collection()
        && caller.is_authenticated()
        && !caller.has_role(ROLE_PUBLIC)
        && !caller.has_role(ROLE_CREATE_PROJECTS)
}

fn visible_fields(resource: &ResourceConfig, caller: &Caller) -> BTreeSet<String> {
    let mut fields = resource.mandatory_projection();
    fields.extend(resource.sanitize_fields(&[], caller));
    fields
}
