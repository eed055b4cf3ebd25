//! Metaindex Query
//!
//! Reads the artifacts written by `metaindex-indexer`: resolves record
//! sources through the manifest, filters, sorts and renders rows.

mod engine;
mod error;
mod filter;
mod render;

pub use engine::{read_records, QueryEngine, QueryResult, SourceStats};
pub use error::{QueryError, Result};
pub use filter::{normalize_ext, QueryOptions, RecordFilter, DEFAULT_LIMIT, SCOPE_ALL};
pub use render::{render_json, render_table};
