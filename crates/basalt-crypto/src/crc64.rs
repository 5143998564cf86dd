//! CRC-64 (ISO 3309) checksum implementation.
//!
//! Provides fast, table-driven CRC-64 calculation using the ISO 3309
//! polynomial (reversed form 0xD800000000000000). Used as the default
//! checksum for snapshot integrity hashing.
//!
//! ## Usage
//!
//! ```
//! use basalt_crypto::crc64;
//!
//! // One-shot calculation
//! let checksum = crc64(b"hello world");
//!
//! // Incremental calculation for streaming data
//! let mut hasher = basalt_crypto::Crc64::new();
//! hasher.update(b"hello ");
//! hasher.update(b"world");
//! let checksum = hasher.finalize();
//! ```

/// ISO 3309 CRC-64 polynomial (reversed): x^64 + x^4 + x^3 + x + 1.
const POLYNOMIAL: u64 = 0xD800_0000_0000_0000;

/// Precomputed CRC-64 lookup table (256 entries).
/// Generated at compile time using const evaluation.
const CRC64_TABLE: [u64; 256] = generate_table();

/// Generates the CRC-64 lookup table at compile time.
const fn generate_table() -> [u64; 256] {
    let mut table = [0u64; 256];
    let mut i = 0;
    while i < 256 {
        let mut crc = i as u64;
        let mut j = 0;
        while j < 8 {
            if crc & 1 == 1 {
                crc = (crc >> 1) ^ POLYNOMIAL;
            } else {
                crc >>= 1;
            }
            j += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
}

/// Computes the CRC-64/ISO checksum of the given data in one shot.
pub fn crc64(data: &[u8]) -> u64 {
    let mut crc = 0xFFFF_FFFF_FFFF_FFFF; // Initial value
    for &byte in data {
        let index = ((crc ^ u64::from(byte)) & 0xFF) as usize;
        crc = (crc >> 8) ^ CRC64_TABLE[index];
    }
    crc ^ 0xFFFF_FFFF_FFFF_FFFF // Final XOR
}

/// Incremental CRC-64 hasher for streaming or chunked data.
///
/// Allows computing CRC-64 over multiple calls to `update()`.
#[derive(Debug, Clone)]
pub struct Crc64 {
    state: u64,
}

impl Crc64 {
    /// Creates a new CRC-64 hasher.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: 0xFFFF_FFFF_FFFF_FFFF,
        }
    }

    /// Updates the CRC-64 state with the given data.
    pub fn update(&mut self, data: &[u8]) {
        for &byte in data {
            let index = ((self.state ^ u64::from(byte)) & 0xFF) as usize;
            self.state = (self.state >> 8) ^ CRC64_TABLE[index];
        }
    }

    /// Finalizes the CRC-64 computation and returns the checksum.
    ///
    /// Consumes the hasher to prevent reuse after finalization.
    #[must_use]
    pub fn finalize(self) -> u64 {
        self.state ^ 0xFFFF_FFFF_FFFF_FFFF
    }
}

impl Default for Crc64 {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crc64_empty() {
        assert_eq!(crc64(b""), 0x0000_0000_0000_0000);
    }

    #[test]
    fn test_crc64_known_vectors() {
        // "123456789" - standard CRC-64/GO-ISO check value
        assert_eq!(crc64(b"123456789"), 0xB909_56C7_75A4_1001);
    }

    #[test]
    fn test_incremental_matches_oneshot() {
        let data = b"hello world this is a test";

        let mut hasher = Crc64::new();
        hasher.update(data);
        let incremental = hasher.finalize();

        let oneshot = crc64(data);

        assert_eq!(incremental, oneshot);
    }

    #[test]
    fn test_chunking_invariant() {
        let data = b"The quick brown fox jumps over the lazy dog";

        // Split at various points
        for split in 0..data.len() {
            let mut hasher = Crc64::new();
            hasher.update(&data[..split]);
            hasher.update(&data[split..]);
            assert_eq!(hasher.finalize(), crc64(data));
        }
    }

    #[test]
    fn test_multiple_chunks() {
        let mut hasher = Crc64::new();
        hasher.update(b"hello ");
        hasher.update(b"world ");
        hasher.update(b"from ");
        hasher.update(b"basalt");

        assert_eq!(hasher.finalize(), crc64(b"hello world from basalt"));
    }

    #[test]
    fn proptest_incremental_matches_oneshot() {
        use proptest::prelude::*;

        proptest!(|(data: Vec<u8>, split: usize)| {
            let mut hasher = Crc64::new();
            if data.is_empty() {
                hasher.update(&data);
            } else {
                let split = split % data.len();
                hasher.update(&data[..split]);
                hasher.update(&data[split..]);
            }
            prop_assert_eq!(hasher.finalize(), crc64(&data));
        });
    }
}
