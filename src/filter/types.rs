use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOp {
    #[serde(rename = "$eq")] Eq,
    #[serde(rename = "$ne")] Ne,
    #[serde(rename = "$gt")] Gt,
    #[serde(rename = "$gte")] Gte,
    #[serde(rename = "$lt")] Lt,
    #[serde(rename = "$lte")] Lte,

    #[serde(rename = "$in")] In,
    #[serde(rename = "$nin")] NIn,

    #[serde(rename = "$exists")] Exists,
    #[serde(rename = "$regex")] Regex,
    #[serde(rename = "$options")] Options,

    #[serde(rename = "$all")] All,
    #[serde(rename = "$size")] Size,
    #[serde(rename = "$elemMatch")] ElemMatch,
    #[serde(rename = "$not")] Not,

    #[serde(rename = "$geoWithin")] GeoWithin,

    #[serde(rename = "$and")] And,
    #[serde(rename = "$or")] Or,
    #[serde(rename = "$nor")] NOr,
}

impl FilterOp {
    pub fn from_key(key: &str) -> Option<Self> {
        Some(match key {
            "$eq" => FilterOp::Eq,
            "$ne" | "$neq" => FilterOp::Ne,
            "$gt" => FilterOp::Gt,
            "$gte" => FilterOp::Gte,
            "$lt" => FilterOp::Lt,
            "$lte" => FilterOp::Lte,
            "$in" => FilterOp::In,
            "$nin" => FilterOp::NIn,
            "$exists" => FilterOp::Exists,
            "$regex" => FilterOp::Regex,
            "$options" => FilterOp::Options,
            "$all" => FilterOp::All,
            "$size" => FilterOp::Size,
            "$elemMatch" => FilterOp::ElemMatch,
            "$not" => FilterOp::Not,
            "$geoWithin" => FilterOp::GeoWithin,
            "$and" => FilterOp::And,
            "$or" => FilterOp::Or,
            "$nor" => FilterOp::NOr,
            _ => return None,
        })
    }

    pub fn is_logical(&self) -> bool {
        matches!(self, FilterOp::And | FilterOp::Or | FilterOp::NOr)
    }
}

/// Parsed filter document.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterExpr {
    /// Every branch must hold; an empty list matches everything.
    And(Vec<FilterExpr>),
    Or(Vec<FilterExpr>),
    Nor(Vec<FilterExpr>),
    Condition(FilterCondition),
}

impl Default for FilterExpr {
    fn default() -> Self {
        FilterExpr::And(vec![])
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FilterCondition {
    pub path: String,
    pub predicate: Predicate,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Eq(Value),
    Ne(Value),
    Gt(Value),
    Gte(Value),
    Lt(Value),
    Lte(Value),
    In(Vec<Value>),
    NIn(Vec<Value>),
    Exists(bool),
    Regex(Pattern),
    All(Vec<Value>),
    Size(usize),
    ElemMatch(ElemMatch),
    Not(Vec<Predicate>),
    GeoWithin(CenterSphere),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ElemMatch {
    /// Array elements are documents matched against a nested filter
    Document(Box<FilterExpr>),
    /// Array elements are scalars matched against operators directly
    Value(Vec<Predicate>),
}

/// Compiled `$regex`/`$options` pair.
#[derive(Debug, Clone)]
pub struct Pattern {
    pub source: String,
    pub options: String,
    pub compiled: Regex,
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source && self.options == other.options
    }
}

/// `$centerSphere: [[lng, lat], radius]` with the radius in radians.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CenterSphere {
    pub lng: f64,
    pub lat: f64,
    pub radius: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn apply(&self, ordering: std::cmp::Ordering) -> std::cmp::Ordering {
        match self {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortKey {
    pub field: String,
    pub direction: SortDirection,
}

impl SortKey {
    pub fn asc(field: impl Into<String>) -> Self {
        Self { field: field.into(), direction: SortDirection::Asc }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self { field: field.into(), direction: SortDirection::Desc }
    }
}

#[derive(Debug, Clone)]
pub struct SqlResult {
    pub query: String,
    pub params: Vec<Value>,
}
