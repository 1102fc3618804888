pub mod engine;
pub mod error;
pub mod executor;
pub mod pipeline;
pub mod request;

pub use engine::{needs_project_grants, QueryEngine};
pub use error::QueryError;
pub use executor::PipelineExecutor;
pub use pipeline::{CountedPage, Lookup, Pipeline, QueryOutput, SortWarmup, Stage};
pub use request::{Joins, QueryRequest};
