//! Content hashing for cache artifacts and cache-busted URLs using blake3.

use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

/// Number of hex characters kept in URL cache-buster tokens.
pub const SHORT_HASH_LEN: usize = 16;

/// A 256-bit content hash (blake3 output).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentHash([u8; 32]);

impl ContentHash {
    /// Create a new ContentHash from raw bytes.
    #[inline]
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Hash an in-memory buffer.
    pub fn of(data: impl AsRef<[u8]>) -> Self {
        Self(*blake3::hash(data.as_ref()).as_bytes())
    }

    /// Hash everything a reader yields.
    pub fn of_reader(reader: impl Read) -> io::Result<Self> {
        let mut reader = BufReader::with_capacity(64 * 1024, reader);
        let mut hasher = blake3::Hasher::new();
        let mut buffer = [0u8; 64 * 1024];

        loop {
            match reader.read(&mut buffer) {
                Ok(0) => break,
                Ok(n) => {
                    hasher.update(&buffer[..n]);
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }

        Ok(Self(*hasher.finalize().as_bytes()))
    }

    /// Hash a file on disk.
    pub fn of_file(path: &Path) -> io::Result<Self> {
        Self::of_reader(File::open(path)?)
    }

    /// Get the raw bytes.
    #[inline]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Full lowercase hex form, used for artifact names and mapping files.
    pub fn to_hex(self) -> String {
        hex::encode(self.0)
    }

    /// Shortened hex form embedded in cache-busted URLs.
    pub fn short(self) -> String {
        self.to_hex()[..SHORT_HASH_LEN].to_string()
    }

    /// Create from a full hex string.
    pub fn from_hex(s: &str) -> Option<Self> {
        let bytes = hex::decode(s).ok()?;
        let arr: [u8; 32] = bytes.try_into().ok()?;
        Some(Self(arr))
    }
}

impl std::fmt::Display for ContentHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.short())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_content_hash_display() {
        let hash = ContentHash::new([0xab; 32]);
        assert_eq!(format!("{}", hash), "abababababababab");
    }

    #[test]
    fn test_content_hash_hex_roundtrip() {
        let original = ContentHash::new([0x12; 32]);
        assert_eq!(ContentHash::from_hex(&original.to_hex()), Some(original));
        assert_eq!(ContentHash::from_hex("abcd"), None);
        assert_eq!(ContentHash::from_hex("not hex"), None);
    }

    #[test]
    fn test_hash_changes_iff_content_changes() {
        assert_eq!(ContentHash::of("body{}"), ContentHash::of("body{}"));
        assert_ne!(ContentHash::of("body{}"), ContentHash::of("body{ }"));
    }

    #[test]
    fn test_file_and_buffer_hashes_agree() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("logo.svg");
        fs::write(&path, "<svg/>").unwrap();

        assert_eq!(ContentHash::of_file(&path).unwrap(), ContentHash::of("<svg/>"));
        assert!(ContentHash::of_file(&dir.path().join("missing.svg")).is_err());
    }
}
