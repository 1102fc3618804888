use serde_json::Value;

use super::collation::Collation;
use super::error::FilterError;
use super::filter_match::FilterMatch;
use super::filter_sql::FilterSql;
use super::filter_where::FilterWhere;
use super::types::{FilterCondition, FilterExpr, Predicate, SqlResult};
use crate::database::document::Document;

/// A validated match filter.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    expr: FilterExpr,
}

impl Filter {
    /// Matches every document.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn parse(where_data: &Value) -> Result<Self, FilterError> {
        Ok(Self { expr: FilterWhere::parse(where_data)? })
    }

    pub fn from_expr(expr: FilterExpr) -> Self {
        Self { expr }
    }

    pub fn condition(path: impl Into<String>, predicate: Predicate) -> Self {
        Self::from_expr(FilterExpr::Condition(FilterCondition { path: path.into(), predicate }))
    }

    pub fn eq(path: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::condition(path, Predicate::Eq(value.into()))
    }

    pub fn is_in(path: impl Into<String>, values: Vec<Value>) -> Self {
        Self::condition(path, Predicate::In(values))
    }

    /// Conjunction with another filter, flattening nested ANDs.
    pub fn and(self, other: Filter) -> Self {
        let mut parts = match self.expr {
            FilterExpr::And(parts) => parts,
            expr => vec![expr],
        };
        match other.expr {
            FilterExpr::And(more) => parts.extend(more),
            expr => parts.push(expr),
        }
        Self::from_expr(FilterExpr::And(parts))
    }

    pub fn expr(&self) -> &FilterExpr {
        &self.expr
    }

    pub fn is_match_all(&self) -> bool {
        matches!(&self.expr, FilterExpr::And(parts) if parts.is_empty())
    }

    pub fn matches(&self, doc: &Document, collation: &Collation) -> bool {
        FilterMatch::new(collation).matches(&self.expr, doc)
    }

    /// Superset predicate over the `body` column, numbering parameters after
    /// `starting_param_index`.
    pub fn to_sql(&self, starting_param_index: usize, collation: &Collation) -> SqlResult {
        FilterSql::generate(&self.expr, starting_param_index, collation)
    }
}
