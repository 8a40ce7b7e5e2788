pub mod error;
pub mod idf;
pub mod index;
pub mod persist;
pub mod query;
pub mod snapshot;
pub mod tokenizer;

pub use error::{Error, Result};
pub use index::*;
pub use query::{search, search_counted, SearchHit, SearchResults, DEFAULT_LIMIT};
pub use snapshot::{Snapshot, SnapshotHandle};
