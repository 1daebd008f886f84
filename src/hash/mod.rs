//! Content hashing.
//!
//! The primitive is BLAKE3, truncated to its leftmost 8 bytes (16 hex chars) to form a
//! `Fingerprint`. Any collision-resistant 256-bit hash with a streaming API would do; the
//! `hash_algorithm` identifier written alongside the fingerprint (see `constants::HASH_ALGORITHM_ID`)
//! is what makes a future substitution detectable by readers.

use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use crate::constants::{FINGERPRINT_HEX_LEN, HASH_CHUNK_SIZE};
use crate::error::{ReelVaultError, Result};

/// A 64-bit content fingerprint, rendered as 16 lowercase hex characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint(String);

impl Fingerprint {
    fn from_full_hash(hash: &blake3::Hash) -> Self {
        let hex = hash.to_hex();
        Fingerprint(hex[..FINGERPRINT_HEX_LEN].to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Compute the full-file fingerprint, reading the entire file once.
pub fn fingerprint_of_file(path: &Path) -> Result<Fingerprint> {
    let mut file =
        File::open(path).map_err(|e| ReelVaultError::Hash(format!("open {}: {e}", path.display())))?;
    let mut hasher = blake3::Hasher::new();
    let mut buffer = vec![0u8; HASH_CHUNK_SIZE];

    loop {
        let read = file
            .read(&mut buffer)
            .map_err(|e| ReelVaultError::Hash(format!("read {}: {e}", path.display())))?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }

    Ok(Fingerprint::from_full_hash(&hasher.finalize()))
}

pub fn fingerprint_of_bytes(data: &[u8]) -> Fingerprint {
    Fingerprint::from_full_hash(&blake3::hash(data))
}

/// Streams `reader` through the hasher while copying every byte into `sink`, returning the
/// resulting fingerprint and the number of bytes read. This is the inline-hash contract the
/// copy engine's network mode relies on: the source is read exactly once, and the fingerprint
/// falls out as a by-product of that single pass.
pub fn hash_stream<R: Read, W: Write>(mut reader: R, mut sink: W, buffer_bytes: usize) -> Result<(Fingerprint, u64)> {
    let mut hasher = blake3::Hasher::new();
    let mut buffer = vec![0u8; buffer_bytes.max(8192)];
    let mut total: u64 = 0;

    loop {
        let read = reader
            .read(&mut buffer)
            .map_err(|e| ReelVaultError::Hash(format!("stream read: {e}")))?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
        sink.write_all(&buffer[..read])
            .map_err(|e| ReelVaultError::Hash(format!("stream write: {e}")))?;
        total += read as u64;
    }

    Ok((Fingerprint::from_full_hash(&hasher.finalize()), total))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_is_sixteen_lowercase_hex_chars() {
        let fp = fingerprint_of_bytes(b"hello world");
        assert_eq!(fp.as_str().len(), FINGERPRINT_HEX_LEN);
        assert!(fp.as_str().chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn fingerprint_is_leading_bits_of_full_digest() {
        let full = blake3::hash(b"hello world").to_hex().to_string();
        let fp = fingerprint_of_bytes(b"hello world");
        assert_eq!(fp.as_str(), &full[..FINGERPRINT_HEX_LEN]);
    }

    #[test]
    fn hash_stream_reads_source_exactly_once_and_matches_full_hash() {
        let data = b"network source bytes".to_vec();
        let mut sink = Vec::new();
        let (fp, n) = hash_stream(&data[..], &mut sink, 64).unwrap();
        assert_eq!(n, data.len() as u64);
        assert_eq!(sink, data);
        assert_eq!(fp, fingerprint_of_bytes(&data));
    }
}
