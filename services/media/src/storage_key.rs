//! Collision-resistant object keys partitioned by aspect bucket.

use crate::models::AspectClass;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngCore;
use rand::rngs::OsRng;
use std::fmt;
use thiserror::Error;

/// Bytes of randomness per key (128 bits)
pub const TOKEN_BYTES: usize = 16;

#[derive(Debug, Error)]
pub enum KeyError {
    #[error("operating system randomness unavailable: {0}")]
    Randomness(#[from] rand::Error),

    #[error("content type {0:?} has no subtype to use as an extension")]
    NoExtension(String),
}

/// Object key of the form `<aspect>/<token>.<ext>`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StorageKey(String);

impl StorageKey {
    /// Derive a fresh key with a token drawn from the OS CSPRNG
    pub fn derive(aspect: AspectClass, extension: &str) -> Result<Self, KeyError> {
        let mut token = [0u8; TOKEN_BYTES];
        OsRng.try_fill_bytes(&mut token)?;
        Ok(Self::from_token(aspect, &token, extension))
    }

    fn from_token(aspect: AspectClass, token: &[u8; TOKEN_BYTES], extension: &str) -> Self {
        Self(format!(
            "{}/{}.{}",
            aspect,
            URL_SAFE_NO_PAD.encode(token),
            extension
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// File extension implied by a media type: the subtype, without parameters
pub fn extension_for(content_type: &str) -> Result<String, KeyError> {
    let essence = content_type.split(';').next().unwrap_or_default().trim();
    match essence.split_once('/') {
        Some((_, subtype)) if !subtype.is_empty() => Ok(subtype.to_ascii_lowercase()),
        _ => Err(KeyError::NoExtension(content_type.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn key_has_bucket_token_and_extension() {
        let key = StorageKey::derive(AspectClass::Portrait, "mp4").unwrap();
        let (prefix, file) = key.as_str().split_once('/').unwrap();
        let (token, ext) = file.split_once('.').unwrap();

        assert_eq!(prefix, "portrait");
        assert_eq!(ext, "mp4");
        // 16 bytes encode to 22 unpadded base64 characters
        assert_eq!(token.len(), 22);
        assert!(
            token
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        );
    }

    #[test]
    fn encoding_is_deterministic_for_a_token() {
        let token = [0xffu8; TOKEN_BYTES];
        let key = StorageKey::from_token(AspectClass::Landscape, &token, "mp4");
        assert_eq!(key.as_str(), "landscape/_____________________w.mp4");
    }

    #[test]
    fn successive_keys_never_collide() {
        let mut seen = HashSet::new();
        for _ in 0..10_000 {
            let key = StorageKey::derive(AspectClass::Other, "mp4").unwrap();
            assert!(seen.insert(key), "duplicate storage key derived");
        }
    }

    #[test]
    fn extension_comes_from_subtype() {
        assert_eq!(extension_for("video/mp4").unwrap(), "mp4");
        assert_eq!(extension_for("video/MP4; codecs=avc1").unwrap(), "mp4");
        assert!(matches!(
            extension_for("mp4"),
            Err(KeyError::NoExtension(_))
        ));
        assert!(matches!(
            extension_for("video/"),
            Err(KeyError::NoExtension(_))
        ));
    }
}
