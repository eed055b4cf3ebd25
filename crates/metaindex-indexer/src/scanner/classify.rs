//! Text/binary classification.
//!
//! Known extensions decide immediately. Anything else is settled by a small
//! content probe: text unless the probe contains a NUL byte.

use std::path::Path;
use tokio::io::AsyncReadExt;
use tracing::debug;

/// Upper bound on bytes read from a single file when probing.
pub const PROBE_BYTES: u64 = 1024;

/// Extensions always treated as text.
const TEXT_EXTENSIONS: &[&str] = &[
    ".c", ".cc", ".cfg", ".cpp", ".cs", ".css", ".csv", ".go", ".h", ".hpp", ".html", ".ini",
    ".java", ".js", ".json", ".jsonl", ".kt", ".m", ".md", ".php", ".py", ".rb", ".rs", ".sh",
    ".sql", ".swift", ".toml", ".ts", ".tsx", ".txt", ".xml", ".yaml", ".yml",
];

/// Extensions always treated as binary.
const BINARY_EXTENSIONS: &[&str] = &[
    // Archives
    ".7z", ".gz", ".jar", ".tar", ".zip",
    // Compiled objects and libraries
    ".a", ".bin", ".class", ".dll", ".dylib", ".exe", ".lib", ".o", ".obj", ".pyc", ".so",
    // Images
    ".bmp", ".gif", ".ico", ".jpeg", ".jpg", ".png", ".svgz", ".webp",
    // Media
    ".mp3", ".mp4", ".wav", ".webm",
    // Documents and fonts
    ".pdf", ".ttf", ".woff", ".woff2",
];

/// What the extension alone says about a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtensionClass {
    Text,
    Binary,
    /// The content has to be probed.
    Unknown,
}

/// Classify a normalized extension (lower-case, leading dot).
pub fn classify_extension(ext: &str) -> ExtensionClass {
    if TEXT_EXTENSIONS.contains(&ext) {
        ExtensionClass::Text
    } else if BINARY_EXTENSIONS.contains(&ext) {
        ExtensionClass::Binary
    } else {
        ExtensionClass::Unknown
    }
}

/// Result of a content probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// The prefix was read; `bytes` counts toward the read budget.
    Read { text_like: bool, bytes: u64 },
    /// The file could not be opened or read.
    Unreadable,
}

/// Read at most `limit` bytes from the start of `path` and look for a NUL.
///
/// An empty file is text. The probed bytes are only inspected, never kept.
pub async fn probe_text(path: &Path, limit: u64) -> ProbeOutcome {
    let file = match tokio::fs::File::open(path).await {
        Ok(f) => f,
        Err(e) => {
            debug!(path = ?path, error = %e, "Probe open failed");
            return ProbeOutcome::Unreadable;
        }
    };

    let mut chunk = Vec::with_capacity(limit.min(PROBE_BYTES) as usize);
    if let Err(e) = file.take(limit).read_to_end(&mut chunk).await {
        debug!(path = ?path, error = %e, "Probe read failed");
        return ProbeOutcome::Unreadable;
    }

    ProbeOutcome::Read {
        text_like: !chunk.contains(&0),
        bytes: chunk.len() as u64,
    }
}
