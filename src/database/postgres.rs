use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::PgArguments;
use sqlx::query::Query;
use sqlx::{PgPool, Postgres, Row};
use std::time::Instant;
use tracing::{debug, info, warn};

use super::document::Document;
use super::store::{prepare_insert, DocumentStore, StoreError};
use crate::config::DatabaseConfig;
use crate::filter::{Collation, Filter};

const CREATE_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS documents (
    schema_name TEXT NOT NULL,
    id TEXT NOT NULL,
    body JSONB NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    PRIMARY KEY (schema_name, id)
)"#;

const CREATE_BODY_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS documents_body_idx ON documents USING GIN (body jsonb_path_ops)";

/// Postgres-backed store: one `documents` table, bodies as JSONB.
///
/// Filters are pushed down as a superset predicate and re-checked in process,
/// so results never depend on how much of a filter SQL could express.
pub struct PgDocumentStore {
    pool: PgPool,
    config: DatabaseConfig,
}

impl PgDocumentStore {
    pub fn new(pool: PgPool, config: DatabaseConfig) -> Self {
        Self { pool, config }
    }

    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        sqlx::query(CREATE_TABLE).execute(&self.pool).await?;
        sqlx::query(CREATE_BODY_INDEX).execute(&self.pool).await?;
        info!("Document table ready");
        Ok(())
    }

    fn log_timing(&self, schema: &str, rows: usize, started: Instant) {
        let elapsed = started.elapsed();
        if self.config.enable_slow_query_warning
            && elapsed.as_millis() as u64 >= self.config.slow_query_threshold_ms
        {
            warn!("Slow scan of {}: {} rows in {}ms", schema, rows, elapsed.as_millis());
        } else if self.config.enable_query_logging {
            debug!("Scan of {}: {} rows in {}ms", schema, rows, elapsed.as_millis());
        }
    }
}

#[async_trait]
impl DocumentStore for PgDocumentStore {
    async fn scan(
        &self,
        schema: &str,
        filter: &Filter,
        collation: &Collation,
    ) -> Result<Vec<Document>, StoreError> {
        let (sql, params) = scan_sql(filter, collation);

        let started = Instant::now();
        let mut query = sqlx::query(&sql).bind(schema);
        for param in &params {
            query = bind_param(query, param);
        }
        let rows = query.fetch_all(&self.pool).await?;
        self.log_timing(schema, rows.len(), started);

        let mut docs = Vec::with_capacity(rows.len());
        for row in rows {
            let body: Value = row.try_get("body")?;
            match body {
                Value::Object(doc) if filter.matches(&doc, collation) => docs.push(doc),
                Value::Object(_) => {}
                other => warn!("Skipping non-object body in {}: {}", schema, other),
            }
        }
        Ok(docs)
    }

    async fn insert(&self, schema: &str, doc: Document) -> Result<Document, StoreError> {
        let (id, doc) = prepare_insert(schema, doc)?;
        let body = Value::Object(doc);
        sqlx::query(
            "INSERT INTO documents (schema_name, id, body) VALUES ($1, $2, $3) \
             ON CONFLICT (schema_name, id) DO UPDATE SET body = EXCLUDED.body, updated_at = now()",
        )
        .bind(schema)
        .bind(&id)
        .bind(&body)
        .execute(&self.pool)
        .await?;

        match body {
            Value::Object(doc) => Ok(doc),
            _ => Err(StoreError::InvalidDocument(id)),
        }
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

/// Scan statement for one schema; `$1` is the schema name and the pushdown
/// parameters follow from `$2`.
fn scan_sql(filter: &Filter, collation: &Collation) -> (String, Vec<Value>) {
    let pushdown = filter.to_sql(1, collation);
    let sql = format!(
        "SELECT body FROM documents WHERE schema_name = $1 AND {} ORDER BY created_at, id",
        pushdown.query
    );
    (sql, pushdown.params)
}

/// Binds a pushdown parameter: jsonpath text or a JSONB variables object.
fn bind_param<'q>(
    q: Query<'q, Postgres, PgArguments>,
    v: &'q Value,
) -> Query<'q, Postgres, PgArguments> {
    match v {
        Value::String(s) => q.bind(s),
        Value::Null => q.bind(Option::<String>::None),
        Value::Bool(b) => q.bind(*b),
        _ => q.bind(v),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use regex::Regex;
    use serde_json::json;
    use std::collections::BTreeSet;

    /// Placeholders referenced by the statement must be exactly `$1..=$n`
    /// where `n` is the number of bound values.
    fn assert_contiguous(filter: Value) {
        let filter = Filter::parse(&filter).unwrap();
        let (sql, params) = scan_sql(&filter, &Collation::default());
        let placeholder = Regex::new(r"\$(\d+)::").unwrap();
        let mut used: BTreeSet<usize> = placeholder
            .captures_iter(&sql)
            .map(|c| c[1].parse().unwrap())
            .collect();
        used.insert(1);
        let expected: BTreeSet<usize> = (1..=params.len() + 1).collect();
        assert_eq!(used, expected, "sql: {}", sql);
    }

    #[test]
    fn mixed_pushdown_keeps_parameters_contiguous() {
        assert_contiguous(json!({"$or": [{"a": 1}, {"b": {"$regex": "x"}}]}));
        assert_contiguous(json!({"$or": [{"a": 1}, {"b": {"$regex": "x"}}], "name": "x"}));
        assert_contiguous(json!({"status": {"$in": ["x", null]}, "code": "abc"}));
        assert_contiguous(json!({"$nor": [{"a": 1, "b": {"$regex": "x"}}], "c": {"$gte": 2}}));
        assert_contiguous(json!({"name": {"$regex": "^sk"}, "isDeleted": {"$ne": true}, "n": 3}));
    }

    #[test]
    fn match_all_binds_only_the_schema() {
        let (sql, params) = scan_sql(&Filter::all(), &Collation::default());
        assert!(sql.contains("schema_name = $1 AND TRUE"), "sql: {}", sql);
        assert!(params.is_empty());
    }
}
