//! Shared utility helpers.

use std::path::Path;

use encoding_rs::WINDOWS_1252;
use sha2::{Digest, Sha256};

/// Number of hex characters kept from a SHA-256 digest when used as a version tag.
const SHORT_HASH_LEN: usize = 12;

/// Short lowercase hex SHA-256 of `text`, used to version query texts.
pub fn short_sha256(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let mut digest = hex::encode(hasher.finalize());
    digest.truncate(SHORT_HASH_LEN);
    digest
}

/// Read a file as a string, trying UTF-8 first, then Windows-1252 as fallback
pub fn read_file_with_encoding_fallback(path: &Path) -> std::io::Result<String> {
    let bytes = std::fs::read(path)?;

    // Strip a UTF-8 BOM so it never ends up in the hashed query text
    let body = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF][..]).unwrap_or(&bytes);

    match std::str::from_utf8(body) {
        Ok(s) => Ok(s.to_string()),
        Err(_) => {
            // Fall back to Windows-1252 (common for SQL files saved by SSMS)
            let (decoded, _, had_errors) = WINDOWS_1252.decode(body);
            if had_errors {
                Err(std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    "File contains invalid characters",
                ))
            } else {
                Ok(decoded.into_owned())
            }
        }
    }
}
