pub mod auth;
pub mod response;

pub use auth::caller_middleware;
pub use response::{ApiResponse, ApiResult};
