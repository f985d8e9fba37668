//! Content-addressed cache keys
//!
//! Every entry is identified by the SHA-256 digest of its request URI. The
//! digest is stored as its raw 32 bytes and rendered as lowercase hex when it
//! names files on disk.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use url::Url;

use crate::errors::CacheError;

/// Length of the hex form of a key
pub const KEY_HEX_LEN: usize = 64;

/// Fixed-length digest naming one cache entry
///
/// Identical URI strings always produce identical keys. Every call site that
/// needs a key (lookup, store, peek, completion listeners) must go through
/// [`CacheKey::for_url`] or [`CacheKey::for_uri`] so that they agree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey([u8; 32]);

impl CacheKey {
    /// Derive the key for a parsed URL
    pub fn for_url(url: &Url) -> Self {
        Self::for_uri(url.as_str())
    }

    /// Derive the key for the string form of a URI
    pub fn for_uri(uri: &str) -> Self {
        let digest = Sha256::digest(uri.as_bytes());
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&digest);
        CacheKey(bytes)
    }

    /// Parse a key from its 64-character hex form (case insensitive)
    pub fn from_hex(hex: &str) -> Result<Self, CacheError> {
        if hex.len() != KEY_HEX_LEN || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(CacheError::NotFound {
                key: hex.to_string(),
            });
        }

        let mut bytes = [0u8; 32];
        for (i, chunk) in hex.as_bytes().chunks(2).enumerate() {
            let pair = std::str::from_utf8(chunk).map_err(|_| CacheError::NotFound {
                key: hex.to_string(),
            })?;
            bytes[i] = u8::from_str_radix(pair, 16).map_err(|_| CacheError::NotFound {
                key: hex.to_string(),
            })?;
        }

        Ok(CacheKey(bytes))
    }

    /// Lowercase hex form, used as the file stem of both entry files
    pub fn to_hex(&self) -> String {
        use std::fmt::Write;
        self.0
            .iter()
            .fold(String::with_capacity(KEY_HEX_LEN), |mut acc, b| {
                let _ = write!(&mut acc, "{:02x}", b);
                acc
            })
    }

    /// Raw digest bytes
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl FromStr for CacheKey {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl Serialize for CacheKey {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for CacheKey {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let hex = String::deserialize(deserializer)?;
        Self::from_hex(&hex).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_uri_same_key() {
        let a = CacheKey::for_uri("http://x/y");
        let b = CacheKey::for_uri("http://x/y");
        assert_eq!(a, b);
    }

    #[test]
    fn test_different_uri_different_key() {
        let uris = [
            "http://x/y",
            "http://x/y/",
            "http://x/Y",
            "https://x/y",
            "http://x/y?a=1",
        ];
        for (i, a) in uris.iter().enumerate() {
            for b in &uris[i + 1..] {
                assert_ne!(CacheKey::for_uri(a), CacheKey::for_uri(b), "{a} vs {b}");
            }
        }
    }

    #[test]
    fn test_url_and_string_agree() {
        let url = Url::parse("http://example.com/a/b.png").unwrap();
        assert_eq!(CacheKey::for_url(&url), CacheKey::for_uri(url.as_str()));
    }

    #[test]
    fn test_known_digest() {
        // sha256("abc")
        let key = CacheKey::for_uri("abc");
        assert_eq!(
            key.to_hex(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_hex_parsing() {
        let key = CacheKey::for_uri("http://x/y");
        let parsed: CacheKey = key.to_hex().to_uppercase().parse().unwrap();
        assert_eq!(parsed, key);

        assert!(CacheKey::from_hex("").is_err());
        assert!(CacheKey::from_hex(&"g".repeat(KEY_HEX_LEN)).is_err());
        assert!(CacheKey::from_hex(&key.to_hex()[1..]).is_err());
    }

    #[test]
    fn test_serialization() {
        let key = CacheKey::for_uri("http://x/y");
        let json = serde_json::to_string(&key).unwrap();
        assert_eq!(json, format!("\"{}\"", key.to_hex()));
        let back: CacheKey = serde_json::from_str(&json).unwrap();
        assert_eq!(back, key);
    }
}
