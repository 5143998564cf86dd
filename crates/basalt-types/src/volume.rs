//! Replica volume metadata.
//!
//! Each replica directory carries a `volume.meta` JSON file describing the
//! volume it holds. The backup orchestrator reads it to learn the volume
//! size and the optional backing image path.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// File name of the volume metadata record inside a replica directory.
pub const VOLUME_META_FILE: &str = "volume.meta";

/// Metadata describing a replica's volume.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeInfo {
    /// Logical volume size in bytes.
    pub size: i64,

    /// Name of the current head disk file.
    #[serde(default)]
    pub head: String,

    /// Whether the head has unsynced writes.
    #[serde(default)]
    pub dirty: bool,

    /// Sector size in bytes.
    #[serde(default = "default_sector_size")]
    pub sector_size: i64,

    /// Path to the backing image file, empty if none.
    #[serde(default)]
    pub backing_file_path: String,
}

fn default_sector_size() -> i64 {
    512
}

/// Errors reading or writing `volume.meta`.
#[derive(Debug, thiserror::Error)]
pub enum VolumeMetaError {
    #[error("i/o error reading volume metadata: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed volume metadata: {0}")]
    Malformed(#[from] serde_json::Error),
}

impl VolumeInfo {
    /// Reads the volume metadata from `dir/volume.meta`.
    pub fn read_from(dir: &Path) -> Result<Self, VolumeMetaError> {
        let content = fs::read(dir.join(VOLUME_META_FILE))?;
        Ok(serde_json::from_slice(&content)?)
    }

    /// Writes the volume metadata to `dir/volume.meta`.
    pub fn write_to(&self, dir: &Path) -> Result<(), VolumeMetaError> {
        let content = serde_json::to_vec(self)?;
        fs::write(dir.join(VOLUME_META_FILE), content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn round_trip() {
        let dir = TempDir::new().unwrap();
        let info = VolumeInfo {
            size: 1 << 30,
            head: "volume-head-001.img".to_string(),
            dirty: true,
            sector_size: 512,
            backing_file_path: String::new(),
        };

        info.write_to(dir.path()).unwrap();
        let loaded = VolumeInfo::read_from(dir.path()).unwrap();

        assert_eq!(loaded, info);
    }

    #[test]
    fn missing_fields_take_defaults() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(VOLUME_META_FILE), br#"{"size": 4096}"#).unwrap();

        let info = VolumeInfo::read_from(dir.path()).unwrap();

        assert_eq!(info.size, 4096);
        assert_eq!(info.sector_size, 512);
        assert!(info.backing_file_path.is_empty());
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            VolumeInfo::read_from(dir.path()),
            Err(VolumeMetaError::Io(_))
        ));
    }
}
