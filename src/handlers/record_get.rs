use axum::{
    extract::{Path, State},
    Extension,
};
use serde_json::{Map, Value};

use crate::access::Caller;
use crate::api::AppState;
use crate::audit::{record_action, AuditEntry};
use crate::database::document::ID_FIELD;
use crate::error::ApiError;
use crate::filter::Filter;
use crate::middleware::{ApiResponse, ApiResult};
use crate::query::QueryRequest;
use crate::resources::scoped_filter;

/// GET /api/records/:resource/:id - One record, redacted for the caller
pub async fn record_get(
    State(state): State<AppState>,
    Path((resource, id)): Path<(String, String)>,
    Extension(caller): Extension<Caller>,
) -> ApiResult<Map<String, Value>> {
    let config = state.engine.resolve(&resource)?;
    let name = config.name.clone();

    let filter = scoped_filter(
        config,
        &caller,
        Filter::eq(ID_FIELD, id.as_str()),
        false,
        &state.security.privileged_roles,
    );
    let request = QueryRequest::new(name.clone(), caller.clone())
        .with_filter(filter)
        .with_fields(config.sanitize_fields(&[], &caller))
        .with_limit(1);

    let record = state
        .engine
        .run_query(request)
        .await?
        .into_records()
        .into_iter()
        .next()
        .ok_or_else(|| ApiError::not_found(format!("{} '{}' not found", name, id)))?;

    record_action(state.audit.clone(), AuditEntry::new("Get", name, &caller).with_object(id));
    Ok(ApiResponse::success(record))
}
