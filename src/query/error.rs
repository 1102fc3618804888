use thiserror::Error;

use crate::database::StoreError;
use crate::filter::FilterError;

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("Unknown collection: {0}")]
    UnknownCollection(String),

    #[error(transparent)]
    Filter(#[from] FilterError),

    #[error(transparent)]
    Store(#[from] StoreError),
}
