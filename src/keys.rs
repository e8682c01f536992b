//! Session key material: derivation, validation and rotation ordering.
//!
//! Keys are immutable once constructed. A [`SessionKeys`] list is ordered:
//! index 0 is the primary key used to seal every new payload, later entries
//! are retired keys still accepted when opening, which is what makes gradual
//! key rotation possible. Rotation is performed by reconfiguring the list at
//! startup, never by mutating existing keys.

use std::fmt;

use argon2::{Algorithm, Argon2, Params, Version};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

use crate::crypto::KEY_SIZE;
use crate::error::ConfigError;

/// Fixed salt length for the key derivation function
pub const SALT_SIZE: usize = 16;

/// Minimum secret length accepted by [`SessionKeys::derive`]
pub const SECRET_MIN_SIZE: usize = 32;

// Argon2id "moderate" cost tier: 256 MiB, 3 passes, single lane. Expensive on
// purpose; derivation runs once per named session at startup, never per
// request.
const KDF_MEMORY_KIB: u32 = 256 * 1024;
const KDF_PASSES: u32 = 3;
const KDF_LANES: u32 = 1;

/// A single symmetric key of exactly the AEAD key length.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionKey([u8; KEY_SIZE]);

impl SessionKey {
    /// Validate raw bytes into a key.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::KeyLength` unless `bytes` is exactly
    /// [`KEY_SIZE`] bytes long.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ConfigError> {
        let raw: [u8; KEY_SIZE] = bytes.try_into().map_err(|_| ConfigError::KeyLength {
            expected: KEY_SIZE,
            actual: bytes.len(),
        })?;
        Ok(Self(raw))
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }
}

impl fmt::Debug for SessionKey {
    // never log key material
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionKey(..)")
    }
}

/// Raw bytes or a standard-base64 string, the two accepted explicit key
/// encodings.
#[derive(Debug, Clone)]
pub enum KeySource {
    Raw(Vec<u8>),
    Base64(String),
}

impl KeySource {
    fn resolve(self) -> Result<SessionKey, ConfigError> {
        match self {
            Self::Raw(bytes) => SessionKey::from_bytes(&bytes),
            Self::Base64(text) => {
                let bytes = STANDARD.decode(text)?;
                SessionKey::from_bytes(&bytes)
            }
        }
    }
}

impl From<Vec<u8>> for KeySource {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Raw(bytes)
    }
}

impl From<&[u8]> for KeySource {
    fn from(bytes: &[u8]) -> Self {
        Self::Raw(bytes.to_vec())
    }
}

impl From<[u8; KEY_SIZE]> for KeySource {
    fn from(bytes: [u8; KEY_SIZE]) -> Self {
        Self::Raw(bytes.to_vec())
    }
}

impl From<&str> for KeySource {
    fn from(text: &str) -> Self {
        Self::Base64(text.to_string())
    }
}

impl From<String> for KeySource {
    fn from(text: String) -> Self {
        Self::Base64(text)
    }
}

/// Ordered list of session keys; index 0 is the primary.
#[derive(Debug, Clone)]
pub struct SessionKeys(Vec<SessionKey>);

impl SessionKeys {
    /// Derive exactly one key from a secret and salt via Argon2id at the
    /// fixed moderate cost tier.
    ///
    /// The derivation is memory- and CPU-hard and runs on the blocking pool;
    /// call this once at configuration time, not per request.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the secret is shorter than
    /// [`SECRET_MIN_SIZE`], the salt is not exactly [`SALT_SIZE`] bytes, or
    /// the KDF itself fails.
    pub async fn derive(
        secret: impl Into<Vec<u8>>,
        salt: impl Into<Vec<u8>>,
    ) -> Result<Self, ConfigError> {
        let secret = secret.into();
        let salt = salt.into();
        if secret.len() < SECRET_MIN_SIZE {
            return Err(ConfigError::SecretTooShort {
                min: SECRET_MIN_SIZE,
                actual: secret.len(),
            });
        }
        if salt.len() != SALT_SIZE {
            return Err(ConfigError::SaltLength {
                expected: SALT_SIZE,
                actual: salt.len(),
            });
        }

        let key = tokio::task::spawn_blocking(move || derive_key(&secret, &salt))
            .await
            .map_err(|e| ConfigError::Kdf(e.to_string()))??;
        Ok(Self(vec![key]))
    }

    /// Validate a single explicit key.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the key does not decode to exactly
    /// [`KEY_SIZE`] bytes.
    pub fn from_key(key: impl Into<KeySource>) -> Result<Self, ConfigError> {
        Self::from_keys([key.into()])
    }

    /// Validate an ordered list of explicit keys, preserving caller order.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if any entry does not decode to exactly
    /// [`KEY_SIZE`] bytes.
    pub fn from_keys<I>(keys: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator,
        I::Item: Into<KeySource>,
    {
        let keys = keys
            .into_iter()
            .map(|key| key.into().resolve())
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self(keys))
    }

    /// The current primary key, used for all new encryption.
    #[must_use]
    pub fn primary(&self) -> Option<&SessionKey> {
        self.0.first()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, SessionKey> {
        self.0.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<'a> IntoIterator for &'a SessionKeys {
    type Item = &'a SessionKey;
    type IntoIter = std::slice::Iter<'a, SessionKey>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

fn derive_key(secret: &[u8], salt: &[u8]) -> Result<SessionKey, ConfigError> {
    let params = Params::new(KDF_MEMORY_KIB, KDF_PASSES, KDF_LANES, Some(KEY_SIZE))
        .map_err(|e| ConfigError::Kdf(e.to_string()))?;
    let argon = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);
    let mut out = [0u8; KEY_SIZE];
    argon
        .hash_password_into(secret, salt, &mut out)
        .map_err(|e| ConfigError::Kdf(e.to_string()))?;
    Ok(SessionKey(out))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConfigError;

    #[test]
    fn test_explicit_key_wrong_length() {
        let result = SessionKeys::from_key(vec![1u8; 16]);
        assert!(matches!(
            result,
            Err(ConfigError::KeyLength {
                expected: KEY_SIZE,
                actual: 16
            })
        ));
    }

    #[test]
    fn test_explicit_key_from_base64() {
        let encoded = STANDARD.encode([42u8; KEY_SIZE]);
        let keys = SessionKeys::from_key(encoded).unwrap();
        assert_eq!(keys.primary().unwrap().as_bytes(), &[42u8; KEY_SIZE]);
    }

    #[test]
    fn test_explicit_key_invalid_base64() {
        let result = SessionKeys::from_key("not valid base64!!!");
        assert!(matches!(result, Err(ConfigError::KeyEncoding(_))));
    }

    #[test]
    fn test_key_list_preserves_order() {
        let keys = SessionKeys::from_keys([[1u8; KEY_SIZE], [2u8; KEY_SIZE]]).unwrap();
        assert_eq!(keys.len(), 2);
        assert_eq!(keys.primary().unwrap().as_bytes(), &[1u8; KEY_SIZE]);
        let collected: Vec<_> = keys.iter().map(|k| k.as_bytes()[0]).collect();
        assert_eq!(collected, vec![1, 2]);
    }

    #[test]
    fn test_key_list_rejects_any_bad_entry() {
        let sources = [KeySource::from([1u8; KEY_SIZE]), KeySource::Raw(vec![2u8; 8])];
        assert!(SessionKeys::from_keys(sources).is_err());
    }

    #[test]
    fn test_key_debug_is_redacted() {
        let keys = SessionKeys::from_key([3u8; KEY_SIZE]).unwrap();
        let debug = format!("{:?}", keys.primary().unwrap());
        assert_eq!(debug, "SessionKey(..)");
    }

    #[tokio::test]
    async fn test_derive_rejects_short_secret() {
        let result = SessionKeys::derive(vec![b'a'; 16], vec![0u8; SALT_SIZE]).await;
        assert!(matches!(result, Err(ConfigError::SecretTooShort { .. })));
    }

    #[tokio::test]
    async fn test_derive_rejects_wrong_salt_length() {
        let result = SessionKeys::derive(vec![b'a'; 32], vec![0u8; 8]).await;
        assert!(matches!(
            result,
            Err(ConfigError::SaltLength {
                expected: SALT_SIZE,
                actual: 8
            })
        ));
    }

    #[tokio::test]
    async fn test_derive_is_deterministic() {
        let first = SessionKeys::derive(vec![b'a'; 32], vec![0u8; SALT_SIZE])
            .await
            .unwrap();
        let second = SessionKeys::derive(vec![b'a'; 32], vec![0u8; SALT_SIZE])
            .await
            .unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(
            first.primary().unwrap().as_bytes(),
            second.primary().unwrap().as_bytes()
        );
    }
}
