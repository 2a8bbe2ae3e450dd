//! Content digest utilities.

use xxhash_rust::xxh3::Xxh3;

/// Compute XXH128 hash of a byte slice.
///
/// # Arguments
/// * `data` - Bytes to hash
///
/// # Returns
/// 32-character lowercase hex string (128 bits).
pub fn hash_bytes(data: &[u8]) -> String {
    let hash: u128 = xxhash_rust::xxh3::xxh3_128(data);
    format!("{:032x}", hash)
}

/// Compute an entity tag for a part body.
///
/// Uses XXH3-64 and wraps the hex digest in double quotes, matching the
/// quoted form S3 returns for `ETag` headers.
///
/// # Arguments
/// * `data` - Part body
pub fn etag_for(data: &[u8]) -> String {
    let hash: u64 = xxhash_rust::xxh3::xxh3_64(data);
    format!("\"{:016x}\"", hash)
}

/// Streaming hasher for incremental XXH128 hashing.
///
/// Used to digest a payload chunk by chunk while it is being uploaded,
/// without holding the whole payload in memory.
pub struct Xxh3Hasher {
    inner: Xxh3,
    bytes: u64,
}

impl Xxh3Hasher {
    /// Create a new streaming hasher.
    pub fn new() -> Self {
        Self {
            inner: Xxh3::new(),
            bytes: 0,
        }
    }

    /// Update the hasher with additional data.
    ///
    /// # Arguments
    /// * `data` - Bytes to add to the hash computation
    pub fn update(&mut self, data: &[u8]) {
        self.inner.update(data);
        self.bytes += data.len() as u64;
    }

    /// Total number of bytes hashed so far.
    pub fn bytes_hashed(&self) -> u64 {
        self.bytes
    }

    /// Finalize and return the hash as u128.
    pub fn finish(&self) -> u128 {
        self.inner.digest128()
    }

    /// Finalize and return the hash as 32-char hex string.
    pub fn finish_hex(&self) -> String {
        format!("{:032x}", self.finish())
    }
}

impl Default for Xxh3Hasher {
    fn default() -> Self {
        Self::new()
    }
}
