#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use disclosure_api::access::{Caller, StorePermissionResolver};
use disclosure_api::api::{router, AppState};
use disclosure_api::auth::{generate_jwt, Claims};
use disclosure_api::config::AppConfig;
use disclosure_api::database::document::Document;
use disclosure_api::database::{DocumentStore, MemoryDocumentStore};
use disclosure_api::query::QueryEngine;
use disclosure_api::resources::ResourceRegistry;

pub const TEST_SECRET: &str = "integration-test-secret";
pub const MAX_LIMIT: u64 = 100;

pub fn doc(value: Value) -> Document {
    value.as_object().cloned().expect("fixture must be an object")
}

pub fn test_config() -> AppConfig {
    let mut config = AppConfig::development();
    config.query.max_limit = MAX_LIMIT;
    config.security.jwt_secret = TEST_SECRET.to_string();
    config.api.enable_request_logging = false;
    config
}

pub fn staff(identity: &str) -> Caller {
    Caller::new(["staff"], Some(identity.to_string()))
}

/// Projects, surveys, users, comments and a spread of applications.
///
/// `u1` has no project grants, `u2` is granted `p1`. There are 23 public
/// applications named `App 00`..`App 22`, two sysadmin-only applications and
/// one soft-deleted public application.
pub fn fixtures() -> Vec<Document> {
    let mut docs = vec![
        doc(json!({"_id": "p1", "_schemaName": "Project", "name": "Site C", "code": "site-c",
                   "read": ["staff", "sysadmin"], "proponent": "o1", "projectLead": "u2"})),
        doc(json!({"_id": "p2", "_schemaName": "Project", "name": "alpha mine", "code": "alpha",
                   "read": ["public", "staff"], "proponent": "o1", "projectLead": "u404"})),
        doc(json!({"_id": "p3", "_schemaName": "Project", "name": "Brucejack", "code": "brucejack",
                   "proponent": "o2"})),
        doc(json!({"_id": "s1", "_schemaName": "Survey", "name": "C", "read": ["staff"], "project": "p1"})),
        doc(json!({"_id": "s2", "_schemaName": "Survey", "name": "A", "read": ["public"], "project": "p2"})),
        doc(json!({"_id": "s3", "_schemaName": "Survey", "name": "B", "read": ["staff", "sysadmin"], "project": "p2"})),
        doc(json!({"_id": "u1", "_schemaName": "User", "sub": "u1", "displayName": "Una One",
                   "email": "una@example.com", "read": ["staff", "sysadmin"], "projectPermissions": []})),
        doc(json!({"_id": "u2", "_schemaName": "User", "sub": "u2", "displayName": "Uli Two",
                   "email": "uli@example.com", "read": ["staff", "sysadmin"], "projectPermissions": ["p1"]})),
        doc(json!({"_id": "o1", "_schemaName": "Organization", "name": "Acme Resources",
                   "tags": [["public"], ["sysadmin"]], "postal": "V8W 1A1"})),
        doc(json!({"_id": "o2", "_schemaName": "Organization", "name": "Pretium",
                   "tags": [["public"], ["sysadmin"]]})),
        doc(json!({"_id": "c1", "_schemaName": "Comment", "comment": "Please protect the wetland",
                   "tags": [["public"], ["sysadmin"]],
                   "commentAuthor": {
                       "contactName": "Pat Doe",
                       "tags": [["public"], ["sysadmin"]],
                       "internal": {"email": "pat@example.com", "tags": [["sysadmin"]]}
                   }})),
        doc(json!({"_id": "c2", "_schemaName": "Comment", "comment": "Pending review",
                   "tags": [["sysadmin"]]})),
    ];

    for i in 0..23 {
        docs.push(doc(json!({
            "_id": format!("a{:02}", i),
            "_schemaName": "Application",
            "name": format!("App {:02}", i),
            "status": if i % 2 == 0 { "ACCEPTED" } else { "Abandoned" },
            "areaHectares": i,
            "tags": [["public"], ["sysadmin"]],
        })));
    }
    docs.push(doc(json!({"_id": "h1", "_schemaName": "Application", "name": "Hidden 1",
                         "tags": [["sysadmin"]]})));
    docs.push(doc(json!({"_id": "h2", "_schemaName": "Application", "name": "Hidden 2",
                         "tags": [["sysadmin"]]})));
    docs.push(doc(json!({"_id": "d1", "_schemaName": "Application", "name": "Deleted 1",
                         "tags": [["public"], ["sysadmin"]], "isDeleted": true})));
    docs
}

pub async fn seeded_store() -> Arc<MemoryDocumentStore> {
    let store = Arc::new(MemoryDocumentStore::new());
    store.seed(fixtures()).await.expect("fixtures seed");
    store
}

pub fn engine(store: Arc<MemoryDocumentStore>) -> QueryEngine {
    let store: Arc<dyn DocumentStore> = store;
    let permissions = Arc::new(StorePermissionResolver::new(store.clone()));
    QueryEngine::new(store, permissions, Arc::new(ResourceRegistry::builtin()), test_config().query)
}

pub fn app(store: Arc<MemoryDocumentStore>) -> Router {
    router(AppState::new(store, &test_config()))
}

pub fn bearer(sub: &str, roles: &[&str]) -> String {
    let claims = Claims::new(sub, roles.iter().map(|r| r.to_string()).collect(), 1);
    format!("Bearer {}", generate_jwt(&claims, TEST_SECRET).expect("token"))
}

pub async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.expect("request");
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("json body")
    };
    (status, body)
}

pub fn search(resource: &str, body: Value, auth: Option<String>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(format!("/api/search/{}", resource))
        .header("content-type", "application/json");
    if let Some(auth) = auth {
        builder = builder.header("authorization", auth);
    }
    builder.body(Body::from(body.to_string())).expect("request")
}

pub fn names(records: &[Document]) -> Vec<String> {
    records
        .iter()
        .map(|r| r.get("name").and_then(Value::as_str).unwrap_or_default().to_string())
        .collect()
}
