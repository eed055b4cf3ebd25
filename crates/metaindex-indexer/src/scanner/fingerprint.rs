//! Metadata fingerprints for change detection.

use serde::{Deserialize, Serialize};
use std::fs::Metadata;
use std::path::Path;

/// `(size, mtime_ns, device_id, inode)`, serialized as a 4-element array.
///
/// Equality of all four components is the only test for "unchanged". File
/// contents are never hashed, so a rewrite that preserves size, mtime,
/// device and inode is not detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint(pub u64, pub i64, pub u64, pub u64);

impl Fingerprint {
    pub fn from_metadata(metadata: &Metadata) -> Self {
        let (dev, ino) = device_and_inode(metadata);
        Fingerprint(metadata.len(), mtime_ns(metadata), dev, ino)
    }

    /// Stat `path` without following symlinks.
    pub fn of_path(path: &Path) -> std::io::Result<(Self, Metadata)> {
        let metadata = std::fs::symlink_metadata(path)?;
        Ok((Self::from_metadata(&metadata), metadata))
    }

    pub fn size(&self) -> u64 {
        self.0
    }

    pub fn mtime_ns(&self) -> i64 {
        self.1
    }
}

/// Modification time in nanoseconds since the Unix epoch.
#[cfg(unix)]
pub fn mtime_ns(metadata: &Metadata) -> i64 {
    use std::os::unix::fs::MetadataExt;
    metadata
        .mtime()
        .saturating_mul(1_000_000_000)
        .saturating_add(metadata.mtime_nsec())
}

#[cfg(not(unix))]
pub fn mtime_ns(metadata: &Metadata) -> i64 {
    metadata
        .modified()
        .ok()
        .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
        .map(|d| d.as_nanos().min(i64::MAX as u128) as i64)
        .unwrap_or(0)
}

#[cfg(unix)]
fn device_and_inode(metadata: &Metadata) -> (u64, u64) {
    use std::os::unix::fs::MetadataExt;
    (metadata.dev(), metadata.ino())
}

// No stable device/inode on this platform; size and mtime carry the fingerprint.
#[cfg(not(unix))]
fn device_and_inode(_metadata: &Metadata) -> (u64, u64) {
    (0, 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_serializes_as_array() {
        let fp = Fingerprint(12, 1_700_000_000_123_456_789, 2049, 77);
        assert_eq!(
            serde_json::to_string(&fp).unwrap(),
            "[12,1700000000123456789,2049,77]"
        );
        let parsed: Fingerprint = serde_json::from_str("[12,1700000000123456789,2049,77]").unwrap();
        assert_eq!(parsed, fp);
    }

    #[test]
    fn test_wrong_arity_is_rejected() {
        assert!(serde_json::from_str::<Fingerprint>("[1,2,3]").is_err());
        assert!(serde_json::from_str::<Fingerprint>("[1,2,3,4,5]").is_err());
    }

    #[test]
    fn test_equality_needs_all_components() {
        let base = Fingerprint(1, 2, 3, 4);
        assert_eq!(base, Fingerprint(1, 2, 3, 4));
        assert_ne!(base, Fingerprint(1, 2, 3, 5));
        assert_ne!(base, Fingerprint(1, 9, 3, 4));
    }

    #[test]
    fn test_of_path_reads_size_and_mtime() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("a.txt");
        std::fs::write(&path, "hello").unwrap();

        let (fp, metadata) = Fingerprint::of_path(&path).unwrap();
        assert_eq!(fp.size(), 5);
        assert!(fp.mtime_ns() > 0);
        assert!(metadata.is_file());

        let (again, _) = Fingerprint::of_path(&path).unwrap();
        assert_eq!(fp, again);
    }

    #[test]
    fn test_mtime_change_changes_fingerprint() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("a.txt");
        std::fs::write(&path, "hello").unwrap();
        let (before, _) = Fingerprint::of_path(&path).unwrap();

        let file = std::fs::File::options().write(true).open(&path).unwrap();
        file.set_modified(std::time::UNIX_EPOCH + std::time::Duration::from_secs(1_000_000))
            .unwrap();
        let (after, _) = Fingerprint::of_path(&path).unwrap();

        assert_ne!(before, after);
        assert_eq!(after.mtime_ns(), 1_000_000 * 1_000_000_000);
    }
}
