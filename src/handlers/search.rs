use axum::{
    extract::{Path, State},
    Extension, Json,
};
use serde::Deserialize;
use serde_json::Value;

use crate::access::Caller;
use crate::api::AppState;
use crate::audit::{record_action, AuditEntry};
use crate::filter::{Filter, FilterOrder, SortKey};
use crate::middleware::{ApiResponse, ApiResult};
use crate::query::{Joins, QueryOutput, QueryRequest, SortWarmup};
use crate::resources::scoped_filter;

const SORT_WARMUP_FIELD: &str = "_sortKey";

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SearchBody {
    #[serde(rename = "where")]
    pub filter: Value,
    pub fields: Vec<String>,
    pub sort: Value,
    /// Field whose sort should ignore letter case
    pub sort_caseless: Option<String>,
    pub skip: Option<u64>,
    pub limit: Option<u64>,
    pub count: bool,
    pub include_deleted: bool,
    pub populate: Joins,
}

/// POST /api/search/:resource - Filtered, redacted search over one resource
pub async fn search_post(
    State(state): State<AppState>,
    Path(resource): Path<String>,
    Extension(caller): Extension<Caller>,
    Json(body): Json<SearchBody>,
) -> ApiResult<QueryOutput> {
    let config = state.engine.resolve(&resource)?;
    let name = config.name.clone();

    let caller_filter = Filter::parse(&body.filter)?;
    let mut sort = FilterOrder::validate_and_parse(&body.sort)?;
    config.check_query_paths(&caller_filter, &sort, &caller)?;
    if let Some(source) = &body.sort_caseless {
        config.check_query_paths(&Filter::all(), &[SortKey::asc(source.as_str())], &caller)?;
    }

    let filter = scoped_filter(
        config,
        &caller,
        caller_filter,
        body.include_deleted,
        &state.security.privileged_roles,
    );
    let fields = config.sanitize_fields(&body.fields, &caller);

    let mut request = QueryRequest::new(name.clone(), caller.clone())
        .with_filter(filter)
        .with_fields(fields)
        .with_joins(body.populate)
        .counted(body.count);
    if let Some(source) = body.sort_caseless {
        for key in sort.iter_mut().filter(|k| k.field == source) {
            key.field = SORT_WARMUP_FIELD.to_string();
        }
        request = request.with_sort_warmup(SortWarmup::new(SORT_WARMUP_FIELD, source));
    }
    request = request.with_sort(sort);
    if let Some(skip) = body.skip {
        request = request.with_skip(skip);
    }
    if let Some(limit) = body.limit {
        request = request.with_limit(limit);
    }

    let output = state.engine.run_query(request).await?;
    record_action(state.audit.clone(), AuditEntry::new("Search", name, &caller));

    Ok(ApiResponse::success(output))
}
