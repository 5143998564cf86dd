//! # basalt-config: Configuration for Basalt daemons
//!
//! A single TOML file with per-section structs; every field has a
//! default, so a missing file or a partial file both work. The section
//! defaults are the values baked into the daemons.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Errors loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("i/o error reading config: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed config: {0}")]
    Malformed(#[from] toml::de::Error),
}

/// Top-level Basalt configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BasaltConfig {
    pub node: NodeConfig,
    pub engine: EngineConfig,
    pub hash: HashConfig,
}

/// Node-local paths.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Persistent state directory.
    pub data_dir: PathBuf,

    /// Lock directory; holds the node-wide hash lock.
    pub lock_dir: PathBuf,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("/var/lib/basalt"),
            lock_dir: PathBuf::from("/var/lib/basalt/lock"),
        }
    }
}

impl NodeConfig {
    /// Path of the data-plane UNIX socket beneath the state directory.
    pub fn data_socket(&self) -> PathBuf {
        self.data_dir.join("uds").join("data.sock")
    }
}

/// Engine-side data plane settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Upper bound on every engine-to-replica operation, in seconds.
    pub replica_timeout_secs: u64,

    /// TCP port replicas listen on when not using the UNIX socket.
    pub data_port: u16,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            replica_timeout_secs: 8,
            data_port: 9502,
        }
    }
}

impl EngineConfig {
    /// The replica timeout as a [`Duration`].
    pub fn replica_timeout(&self) -> Duration {
        Duration::from_secs(self.replica_timeout_secs)
    }
}

/// Snapshot hash settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HashConfig {
    /// Hash method name (`crc64-iso` or `sha256`).
    pub method: String,

    /// Streaming read chunk size in mebibytes.
    pub block_size_mib: usize,
}

impl Default for HashConfig {
    fn default() -> Self {
        Self {
            method: "crc64-iso".to_string(),
            block_size_mib: 2,
        }
    }
}

impl HashConfig {
    /// The streaming chunk size in bytes.
    pub fn block_size(&self) -> usize {
        self.block_size_mib * 1024 * 1024
    }
}

impl BasaltConfig {
    /// Loads configuration from `path`; a missing or empty file yields
    /// the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)?;
        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        Ok(toml::from_str(&content)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = TempDir::new().unwrap();

        let config = BasaltConfig::load(&dir.path().join("basalt.toml")).unwrap();

        assert_eq!(config.engine.replica_timeout(), Duration::from_secs(8));
        assert_eq!(config.hash.method, "crc64-iso");
        assert_eq!(config.hash.block_size(), 2 * 1024 * 1024);
        assert!(config.node.data_socket().starts_with("/var/lib/basalt"));
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("basalt.toml");
        fs::write(
            &path,
            "[engine]\nreplica_timeout_secs = 30\n\n[hash]\nmethod = \"sha256\"\n",
        )
        .unwrap();

        let config = BasaltConfig::load(&path).unwrap();

        assert_eq!(config.engine.replica_timeout_secs, 30);
        assert_eq!(config.engine.data_port, 9502);
        assert_eq!(config.hash.method, "sha256");
        assert_eq!(config.hash.block_size_mib, 2);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("basalt.toml");
        fs::write(&path, "not toml [").unwrap();

        assert!(matches!(
            BasaltConfig::load(&path),
            Err(ConfigError::Malformed(_))
        ));
    }
}
