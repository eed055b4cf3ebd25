//! File system scanner module.
//!
//! Provides symlink-safe traversal, metadata fingerprints, language
//! detection and text/binary classification.

mod classify;
mod fingerprint;
mod language;
mod walker;

pub use classify::{classify_extension, probe_text, ExtensionClass, ProbeOutcome, PROBE_BYTES};
pub use fingerprint::{mtime_ns, Fingerprint};
pub use language::{detect_language, normalized_extension, Language};
pub use walker::{relative_key, Walk, WalkCounts, Walker};
