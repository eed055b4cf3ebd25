//! Query options and the record predicate built from them.

use crate::error::{QueryError, Result};
use metaindex_indexer::FileRecord;

/// Scope value meaning "every record".
pub const SCOPE_ALL: &str = "all";

/// Default row limit.
pub const DEFAULT_LIMIT: usize = 200;

/// What to look for.
#[derive(Debug, Clone)]
pub struct QueryOptions {
    /// Case-insensitive substring of the path
    pub path_contains: Option<String>,
    /// Extension, with or without the leading dot
    pub ext: Option<String>,
    /// Language name, case-insensitive
    pub lang: Option<String>,
    /// Inclusive lower size bound in bytes
    pub min_size: Option<u64>,
    /// Inclusive upper size bound in bytes
    pub max_size: Option<u64>,
    /// Only records modified at or after this epoch second
    pub changed_since_epoch: Option<i64>,
    /// `all` or a top-level name
    pub scope: String,
    /// Maximum rows returned
    pub limit: usize,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            path_contains: None,
            ext: None,
            lang: None,
            min_size: None,
            max_size: None,
            changed_since_epoch: None,
            scope: SCOPE_ALL.to_string(),
            limit: DEFAULT_LIMIT,
        }
    }
}

impl QueryOptions {
    /// Reject arguments that cannot describe a valid query.
    pub fn validate(&self) -> Result<()> {
        if self.limit < 1 {
            return Err(QueryError::InvalidLimit(self.limit));
        }
        if let (Some(min), Some(max)) = (self.min_size, self.max_size) {
            if min > max {
                return Err(QueryError::InvalidSizeRange { min, max });
            }
        }
        Ok(())
    }

    /// Scope with blanks folded into `all`.
    pub fn effective_scope(&self) -> &str {
        let scope = self.scope.trim();
        if scope.is_empty() {
            SCOPE_ALL
        } else {
            scope
        }
    }
}

/// Conjunction of every filter in a [`QueryOptions`], normalized once.
#[derive(Debug, Clone, Default)]
pub struct RecordFilter {
    path_contains: Option<String>,
    ext: Option<String>,
    lang: Option<String>,
    min_size: Option<u64>,
    max_size: Option<u64>,
    min_mtime_ns: Option<i64>,
    top_level: Option<String>,
}

impl RecordFilter {
    /// Build the predicate. `filter_scope` restricts by `top_level`; it is
    /// off when the scope was already applied by picking a shard.
    pub fn new(options: &QueryOptions, filter_scope: bool) -> Self {
        let scope = options.effective_scope();
        Self {
            path_contains: options
                .path_contains
                .as_deref()
                .filter(|s| !s.is_empty())
                .map(str::to_lowercase),
            ext: options
                .ext
                .as_deref()
                .filter(|s| !s.is_empty())
                .map(normalize_ext),
            lang: options
                .lang
                .as_deref()
                .filter(|s| !s.is_empty())
                .map(str::to_lowercase),
            min_size: options.min_size,
            max_size: options.max_size,
            min_mtime_ns: options
                .changed_since_epoch
                .map(|secs| secs.saturating_mul(1_000_000_000)),
            top_level: (filter_scope && scope != SCOPE_ALL).then(|| scope.to_string()),
        }
    }

    pub fn matches(&self, record: &FileRecord) -> bool {
        if let Some(needle) = &self.path_contains {
            if !record.path.to_lowercase().contains(needle.as_str()) {
                return false;
            }
        }
        if let Some(ext) = &self.ext {
            if record.ext != *ext {
                return false;
            }
        }
        if let Some(lang) = &self.lang {
            if record.lang.to_lowercase() != *lang {
                return false;
            }
        }
        if self.min_size.is_some_and(|min| record.size < min) {
            return false;
        }
        if self.max_size.is_some_and(|max| record.size > max) {
            return false;
        }
        if self.min_mtime_ns.is_some_and(|min| record.mtime_ns < min) {
            return false;
        }
        if let Some(top_level) = &self.top_level {
            if record.top_level != *top_level {
                return false;
            }
        }
        true
    }
}

/// `py`, `.py` and `.PY` all become `.py`.
pub fn normalize_ext(ext: &str) -> String {
    let ext = ext.trim().to_lowercase();
    if ext.starts_with('.') {
        ext
    } else {
        format!(".{}", ext)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use metaindex_indexer::Fingerprint;

    fn record(path: &str, size: u64, mtime_ns: i64) -> FileRecord {
        FileRecord::new(path, &Fingerprint(size, mtime_ns, 0, 0), true)
    }

    #[test]
    fn test_validate() {
        assert!(QueryOptions::default().validate().is_ok());

        let zero = QueryOptions {
            limit: 0,
            ..Default::default()
        };
        assert!(matches!(zero.validate(), Err(QueryError::InvalidLimit(0))));

        let inverted = QueryOptions {
            min_size: Some(10),
            max_size: Some(5),
            ..Default::default()
        };
        assert!(matches!(
            inverted.validate(),
            Err(QueryError::InvalidSizeRange { min: 10, max: 5 })
        ));
    }

    #[test]
    fn test_normalize_ext() {
        assert_eq!(normalize_ext("py"), ".py");
        assert_eq!(normalize_ext(".PY"), ".py");
        assert_eq!(normalize_ext(" rs "), ".rs");
    }

    #[test]
    fn test_effective_scope() {
        let blank = QueryOptions {
            scope: "  ".to_string(),
            ..Default::default()
        };
        assert_eq!(blank.effective_scope(), "all");
    }

    #[test]
    fn test_filters_are_a_conjunction() {
        let options = QueryOptions {
            path_contains: Some("SRC/".to_string()),
            ext: Some("rs".to_string()),
            lang: Some("Rust".to_string()),
            min_size: Some(10),
            max_size: Some(100),
            ..Default::default()
        };
        let filter = RecordFilter::new(&options, true);

        assert!(filter.matches(&record("src/lib.rs", 50, 0)));
        assert!(filter.matches(&record("src/lib.rs", 10, 0)));
        assert!(filter.matches(&record("src/lib.rs", 100, 0)));
        assert!(!filter.matches(&record("src/lib.rs", 101, 0)));
        assert!(!filter.matches(&record("src/lib.py", 50, 0)));
        assert!(!filter.matches(&record("docs/lib.rs", 50, 0)));
    }

    #[test]
    fn test_changed_since() {
        let options = QueryOptions {
            changed_since_epoch: Some(100),
            ..Default::default()
        };
        let filter = RecordFilter::new(&options, true);

        assert!(filter.matches(&record("a", 1, 100_000_000_000)));
        assert!(!filter.matches(&record("a", 1, 99_999_999_999)));
    }

    #[test]
    fn test_scope_filter_only_when_requested() {
        let options = QueryOptions {
            scope: "src".to_string(),
            ..Default::default()
        };

        let scoped = RecordFilter::new(&options, true);
        assert!(scoped.matches(&record("src/a.rs", 1, 0)));
        assert!(!scoped.matches(&record("docs/a.md", 1, 0)));

        let unscoped = RecordFilter::new(&options, false);
        assert!(unscoped.matches(&record("docs/a.md", 1, 0)));
    }
}
