//! Symlink-safe directory walker with name-based exclusions.

use ignore::{DirEntry, WalkBuilder};
use std::collections::BTreeSet;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Counters the walker maintains while it runs.
#[derive(Debug, Default)]
struct WalkStats {
    dirs_skipped: AtomicU64,
    symlinks_skipped: AtomicU64,
    entries_unreadable: AtomicU64,
}

/// A point-in-time copy of the walker's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WalkCounts {
    /// Excluded directories plus directories that could not be read
    pub dirs_skipped: u64,
    /// Symbolic links, to files or directories
    pub symlinks_skipped: u64,
    /// Entries whose type could not be determined
    pub entries_unreadable: u64,
}

/// File system walker that never follows symlinks.
///
/// Unlike a source-code discovery walk, no ignore files and no hidden-file
/// rules apply: the only pruning is by bare directory name.
pub struct Walker {
    root: PathBuf,
    excludes: Arc<BTreeSet<String>>,
}

impl Walker {
    /// Create a new walker for the given root directory.
    pub fn new(root: &Path, excludes: BTreeSet<String>) -> Self {
        Self {
            root: root.to_path_buf(),
            excludes: Arc::new(excludes),
        }
    }

    /// Start walking. Files are produced lazily so a caller can stop early.
    pub fn walk(&self) -> Walk {
        let stats = Arc::new(WalkStats::default());

        let excludes = Arc::clone(&self.excludes);
        let filter_stats = Arc::clone(&stats);

        let inner = WalkBuilder::new(&self.root)
            .standard_filters(false)
            .follow_links(false)
            .sort_by_file_name(|a, b| a.cmp(b))
            .filter_entry(move |entry| {
                if is_excluded_dir(entry, &excludes) {
                    filter_stats.dirs_skipped.fetch_add(1, Ordering::Relaxed);
                    debug!(path = ?entry.path(), "Skipping excluded directory");
                    return false;
                }
                true
            })
            .build();

        Walk { inner, stats }
    }
}

fn is_excluded_dir(entry: &DirEntry, excludes: &BTreeSet<String>) -> bool {
    if entry.depth() == 0 {
        return false;
    }
    let is_dir = entry.file_type().map(|ft| ft.is_dir()).unwrap_or(false);
    is_dir
        && entry
            .file_name()
            .to_str()
            .map(|name| excludes.contains(name))
            .unwrap_or(false)
}

/// Iterator over regular files below the walk root.
pub struct Walk {
    inner: ignore::Walk,
    stats: Arc<WalkStats>,
}

impl Walk {
    pub fn counts(&self) -> WalkCounts {
        WalkCounts {
            dirs_skipped: self.stats.dirs_skipped.load(Ordering::Relaxed),
            symlinks_skipped: self.stats.symlinks_skipped.load(Ordering::Relaxed),
            entries_unreadable: self.stats.entries_unreadable.load(Ordering::Relaxed),
        }
    }
}

impl Iterator for Walk {
    type Item = PathBuf;

    fn next(&mut self) -> Option<PathBuf> {
        loop {
            match self.inner.next()? {
                Ok(entry) => {
                    if entry.depth() == 0 {
                        continue;
                    }
                    if entry.path_is_symlink() {
                        self.stats.symlinks_skipped.fetch_add(1, Ordering::Relaxed);
                        continue;
                    }
                    match entry.file_type() {
                        Some(ft) if ft.is_file() => return Some(entry.into_path()),
                        // Directories, sockets, fifos
                        Some(_) => continue,
                        None => {
                            self.stats.entries_unreadable.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                }
                Err(e) => {
                    // Don't fail the entire walk for individual errors
                    debug!(error = %e, "Skipping unreadable directory");
                    self.stats.dirs_skipped.fetch_add(1, Ordering::Relaxed);
                }
            }
        }
    }
}

/// Repository-relative key for `path`: forward-slash separated, no leading
/// slash. Returns `None` when `path` is not below `root`.
pub fn relative_key(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    let parts: Vec<String> = rel
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("/"))
    }
}
