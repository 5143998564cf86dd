//! # basalt-crypto: Checksum primitives for Basalt
//!
//! Streaming hashers used by the snapshot integrity engine:
//!
//! - [`Crc64`]: CRC-64 with the ISO 3309 polynomial, the default snapshot
//!   checksum. Table-driven, generated at compile time.
//! - [`SnapshotHasher`]: method-dispatched streaming hasher over the
//!   recognized [`HashMethod`]s (`crc64-iso`, `sha256`).

pub mod crc64;
mod hasher;

pub use crc64::{Crc64, crc64};
pub use hasher::{HashMethod, SnapshotHasher, UnknownMethod};
