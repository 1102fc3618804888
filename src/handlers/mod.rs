pub mod record_get;
pub mod root;
pub mod search;

pub use record_get::record_get;
pub use root::{health, root};
pub use search::{search_post, SearchBody};
