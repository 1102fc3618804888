use thiserror::Error;

#[derive(Error, Debug)]
pub enum FilterError {
    #[error("Invalid field name: {0}")]
    InvalidField(String),

    #[error("Invalid WHERE clause: {0}")]
    InvalidWhereClause(String),

    #[error("Unsupported operator: {0}")]
    UnsupportedOperator(String),

    #[error("Invalid operator data: {0}")]
    InvalidOperatorData(String),

    #[error("Invalid regular expression: {0}")]
    InvalidRegex(String),

    #[error("Filter nesting exceeds {0} levels")]
    TooDeep(usize),

    #[error("Invalid sort: {0}")]
    InvalidSort(String),

    #[error("JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),
}
