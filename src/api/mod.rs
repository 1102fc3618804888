use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::warn;

use crate::access::StorePermissionResolver;
use crate::audit::{AuditLog, DisabledAuditLog, StoreAuditLog};
use crate::config::{ApiConfig, AppConfig, SecurityConfig};
use crate::database::DocumentStore;
use crate::handlers;
use crate::middleware::caller_middleware;
use crate::query::QueryEngine;
use crate::resources::ResourceRegistry;

/// Shared, read-only handles every handler needs.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<QueryEngine>,
    pub audit: Arc<dyn AuditLog>,
    pub security: Arc<SecurityConfig>,
    pub api: Arc<ApiConfig>,
}

impl AppState {
    /// Wires the engine, permission resolver and audit log around one store.
    pub fn new(store: Arc<dyn DocumentStore>, config: &AppConfig) -> Self {
        let permissions = Arc::new(StorePermissionResolver::new(store.clone()));
        let audit: Arc<dyn AuditLog> = if config.security.enable_audit_logging {
            Arc::new(StoreAuditLog::new(store.clone()))
        } else {
            Arc::new(DisabledAuditLog)
        };
        let engine = QueryEngine::new(
            store,
            permissions,
            Arc::new(ResourceRegistry::builtin()),
            config.query.clone(),
        );

        Self {
            engine: Arc::new(engine),
            audit,
            security: Arc::new(config.security.clone()),
            api: Arc::new(config.api.clone()),
        }
    }
}

pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route("/api/search/:resource", post(handlers::search_post))
        .route("/api/records/:resource/:id", get(handlers::record_get))
        .route_layer(from_fn_with_state(state.clone(), caller_middleware));

    let mut app = Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health))
        .merge(api)
        .layer(DefaultBodyLimit::max(state.api.max_request_size_bytes));

    if let Some(cors) = cors_layer(&state.security) {
        app = app.layer(cors);
    }
    if state.api.enable_request_logging {
        app = app.layer(TraceLayer::new_for_http());
    }
    app.with_state(state)
}

fn cors_layer(security: &SecurityConfig) -> Option<CorsLayer> {
    if !security.enable_cors {
        return None;
    }
    if security.cors_origins.is_empty() {
        return Some(CorsLayer::permissive());
    }

    let origins: Vec<HeaderValue> = security
        .cors_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();

    Some(
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([Method::GET, Method::POST])
            .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]),
    )
}
