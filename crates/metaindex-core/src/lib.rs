//! metaindex core components
//!
//! Shared configuration and error types used by the indexer, the query
//! engine and the command-line interface.

mod config;
mod error;

pub use config::{
    expand_home, fallback_message, resolve_against, BuildMode, IndexConfig, CONFIG_FILE_NAME, DEFAULT_EXCLUDES,
};
pub use error::CoreError;
