//! Snapshot provenance records in extended attributes.
//!
//! The recorded checksum is bound to the file mtime observed at hashing
//! time; a later hash that differs while the mtime is unchanged is silent
//! corruption. The `silently_corrupted` flag is sticky: no write path here
//! flips a recorded `true` back to `false`. The only way to clear it is
//! [`reset`], which removes the record so the next job hashes afresh.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::HashError;

/// Extended attribute key holding the provenance record.
pub const XATTR_KEY: &str = "user.longhorn.metadata";

/// Upper bound on the serialized record.
pub const MAX_XATTR_VALUE_LEN: usize = 256;

/// Provenance record attached to a snapshot disk file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotHashInfo {
    /// Hash method that produced `checksum`.
    pub method: String,

    /// Checksum of the snapshot contents, lowercase hex.
    pub checksum: String,

    /// The file's mtime at the moment of hashing.
    pub mod_time: String,

    /// When the hash was last computed, RFC 3339 UTC.
    pub last_hashed_at: String,

    /// Sticky silent-corruption marker.
    #[serde(default)]
    pub silently_corrupted: bool,
}

/// Loads the provenance record of `path`, if any.
pub fn load(path: &Path) -> Result<Option<SnapshotHashInfo>, HashError> {
    match xattr::get(path, XATTR_KEY)? {
        Some(value) => {
            if value.len() > MAX_XATTR_VALUE_LEN {
                return Err(HashError::ValueTooLarge(value.len()));
            }
            Ok(Some(serde_json::from_slice(&value)?))
        }
        None => Ok(None),
    }
}

/// Stores a provenance record on `path`.
///
/// Guards the sticky bit: when an existing record carries
/// `silently_corrupted=true`, the stored record keeps it set no matter
/// what the caller passed.
pub fn store(path: &Path, info: &SnapshotHashInfo) -> Result<(), HashError> {
    let mut record = info.clone();
    if !record.silently_corrupted {
        match load(path) {
            Ok(Some(existing)) if existing.silently_corrupted => {
                warn!(
                    snapshot = %path.display(),
                    "refusing to clear sticky silent-corruption marker"
                );
                record.silently_corrupted = true;
            }
            Ok(_) => {}
            // An unreadable record must not block recording provenance.
            Err(err) => {
                warn!(snapshot = %path.display(), %err, "ignoring unreadable provenance record");
            }
        }
    }

    let value = serde_json::to_vec(&record)?;
    if value.len() > MAX_XATTR_VALUE_LEN {
        return Err(HashError::ValueTooLarge(value.len()));
    }
    xattr::set(path, XATTR_KEY, &value)?;
    Ok(())
}

/// Removes the provenance record of `path`, if present.
pub fn remove(path: &Path) -> Result<(), HashError> {
    match xattr::remove(path, XATTR_KEY) {
        Ok(()) => Ok(()),
        // Missing attribute: nothing to remove.
        Err(err) if err.raw_os_error() == Some(61) || err.kind() == std::io::ErrorKind::NotFound => {
            Ok(())
        }
        Err(err) => Err(err.into()),
    }
}

/// The explicit delete-and-rehash entry point: drops the record, sticky
/// bit included, so the next hash job records fresh provenance.
pub fn reset(path: &Path) -> Result<(), HashError> {
    remove(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn xattr_supported(dir: &Path) -> bool {
        let probe = dir.join(".xattr-probe");
        fs::write(&probe, b"x").unwrap();
        xattr::set(&probe, "user.basalt.probe", b"1").is_ok()
    }

    fn record(checksum: &str, corrupted: bool) -> SnapshotHashInfo {
        SnapshotHashInfo {
            method: "crc64-iso".to_string(),
            checksum: checksum.to_string(),
            mod_time: "2026-01-01T00:00:00Z".to_string(),
            last_hashed_at: "2026-01-01T00:00:01Z".to_string(),
            silently_corrupted: corrupted,
        }
    }

    #[test]
    fn store_and_load_round_trip() {
        let dir = TempDir::new().unwrap();
        if !xattr_supported(dir.path()) {
            eprintln!("skipping: no user xattr support on test filesystem");
            return;
        }
        let file = dir.path().join("snap.img");
        fs::write(&file, b"data").unwrap();

        let info = record("b90956c775a41001", false);
        store(&file, &info).unwrap();

        assert_eq!(load(&file).unwrap(), Some(info));
    }

    #[test]
    fn load_missing_is_none() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("snap.img");
        fs::write(&file, b"data").unwrap();

        assert_eq!(load(&file).unwrap(), None);
    }

    #[test]
    fn sticky_bit_survives_a_clearing_store() {
        let dir = TempDir::new().unwrap();
        if !xattr_supported(dir.path()) {
            eprintln!("skipping: no user xattr support on test filesystem");
            return;
        }
        let file = dir.path().join("snap.img");
        fs::write(&file, b"data").unwrap();

        store(&file, &record("abc", true)).unwrap();
        store(&file, &record("def", false)).unwrap();

        let loaded = load(&file).unwrap().unwrap();
        assert!(loaded.silently_corrupted);
        assert_eq!(loaded.checksum, "def");
    }

    #[test]
    fn reset_clears_the_sticky_bit() {
        let dir = TempDir::new().unwrap();
        if !xattr_supported(dir.path()) {
            eprintln!("skipping: no user xattr support on test filesystem");
            return;
        }
        let file = dir.path().join("snap.img");
        fs::write(&file, b"data").unwrap();

        store(&file, &record("abc", true)).unwrap();
        reset(&file).unwrap();

        assert_eq!(load(&file).unwrap(), None);
        store(&file, &record("def", false)).unwrap();
        assert!(!load(&file).unwrap().unwrap().silently_corrupted);
    }

    #[test]
    fn remove_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("snap.img");
        fs::write(&file, b"data").unwrap();

        remove(&file).unwrap();
        remove(&file).unwrap();
    }

    #[test]
    fn oversized_record_rejected() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("snap.img");
        fs::write(&file, b"data").unwrap();

        let mut info = record("abc", false);
        info.checksum = "f".repeat(MAX_XATTR_VALUE_LEN);

        assert!(matches!(
            store(&file, &info),
            Err(HashError::ValueTooLarge(_))
        ));
    }
}
