//! SHA-256 content checksums.
//!
//! Rollback bundles record a checksum per backed-up file so a restore can
//! verify what it copied back.

use std::fs;
use std::path::Path;

use sha2::{Digest, Sha256};

use crate::{Error, Result};

/// Hex-encoded SHA-256 of a byte slice.
pub fn sha256_hex(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    format!("{:x}", hasher.finalize())
}

/// Hex-encoded SHA-256 of a file's contents.
pub fn file_checksum(path: &Path) -> Result<String> {
    let content = fs::read(path).map_err(|e| Error::io(path, e))?;
    Ok(sha256_hex(&content))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_sha256_hex_known_value() {
        assert_eq!(
            sha256_hex(b"hello world"),
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }

    #[test]
    fn test_file_checksum_matches_content_checksum() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("file.txt");
        fs::write(&path, "hello world").unwrap();
        assert_eq!(file_checksum(&path).unwrap(), sha256_hex(b"hello world"));
    }

    #[test]
    fn test_file_checksum_missing_file() {
        let temp = TempDir::new().unwrap();
        assert!(file_checksum(&temp.path().join("missing")).is_err());
    }
}
