//! Method-dispatched streaming hasher for snapshot contents.

use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

use crate::Crc64;

/// Recognized snapshot hash methods.
///
/// `Crc64Iso` is the default; `Sha256` is recognized for deployments that
/// prefer a cryptographic digest. A deployment must use exactly one method
/// for a given snapshot so that recorded checksums stay comparable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HashMethod {
    #[default]
    Crc64Iso,
    Sha256,
}

/// The method name string is malformed or unrecognized.
#[derive(Debug, thiserror::Error)]
#[error("unrecognized hash method: {0}")]
pub struct UnknownMethod(String);

impl FromStr for HashMethod {
    type Err = UnknownMethod;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "crc64-iso" => Ok(Self::Crc64Iso),
            "sha256" => Ok(Self::Sha256),
            other => Err(UnknownMethod(other.to_string())),
        }
    }
}

impl fmt::Display for HashMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Crc64Iso => write!(f, "crc64-iso"),
            Self::Sha256 => write!(f, "sha256"),
        }
    }
}

/// Streaming hasher over the selected [`HashMethod`].
///
/// Feed file contents through [`update`](Self::update) and read the final
/// checksum as a lowercase hex string from [`finalize`](Self::finalize).
#[derive(Debug, Clone)]
pub enum SnapshotHasher {
    Crc64Iso(Crc64),
    Sha256(Sha256),
}

impl SnapshotHasher {
    /// Creates a hasher for the given method.
    #[must_use]
    pub fn new(method: HashMethod) -> Self {
        match method {
            HashMethod::Crc64Iso => Self::Crc64Iso(Crc64::new()),
            HashMethod::Sha256 => Self::Sha256(Sha256::new()),
        }
    }

    /// Updates the hash state with the given data.
    pub fn update(&mut self, data: &[u8]) {
        match self {
            Self::Crc64Iso(h) => h.update(data),
            Self::Sha256(h) => h.update(data),
        }
    }

    /// Finalizes the computation, returning the checksum as lowercase hex.
    #[must_use]
    pub fn finalize(self) -> String {
        match self {
            Self::Crc64Iso(h) => format!("{:016x}", h.finalize()),
            Self::Sha256(h) => hex_string(&h.finalize()),
        }
    }
}

fn hex_string(bytes: &[u8]) -> String {
    use fmt::Write;

    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        // Writing to a String cannot fail.
        let _ = write!(out, "{byte:02x}");
    }
    out
}
