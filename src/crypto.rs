// Cryptographic primitives for sealing and opening session payloads

use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{Key, XChaCha20Poly1305, XNonce};
use rand::RngCore;

use crate::error::SessionError;
use crate::keys::SessionKey;

/// Nonce size for XChaCha20-Poly1305 (192 bits)
pub const NONCE_SIZE: usize = 24;

/// Encryption key size (256 bits)
pub const KEY_SIZE: usize = 32;

/// Poly1305 authentication tag size appended to the ciphertext
pub const TAG_SIZE: usize = 16;

/// Generate a fresh random nonce for one seal operation.
///
/// Nonces must never be reused under the same key; callers get a new one per
/// encoded session.
#[must_use]
pub fn generate_nonce() -> [u8; NONCE_SIZE] {
    let mut nonce = [0u8; NONCE_SIZE];
    rand::rng().fill_bytes(&mut nonce);
    nonce
}

/// Seal a plaintext payload under `key` and `nonce`.
///
/// Returns the ciphertext with the authentication tag appended.
///
/// # Errors
///
/// Returns an error if the AEAD encryption itself fails.
pub fn seal(
    plaintext: &[u8],
    nonce: &[u8; NONCE_SIZE],
    key: &SessionKey,
) -> Result<Vec<u8>, SessionError> {
    let cipher = XChaCha20Poly1305::new(Key::from_slice(key.as_bytes()));
    cipher
        .encrypt(XNonce::from_slice(nonce), plaintext)
        .map_err(|e| SessionError::Crypto(format!("AEAD seal failed: {e}")))
}

/// Open a sealed payload, authenticating it against `key`.
///
/// Returns `None` on any failure — wrong key, tampered ciphertext, wrong
/// nonce length. Callers treat a miss as an ordinary result, not an error.
#[must_use]
pub fn open(ciphertext: &[u8], nonce: &[u8], key: &SessionKey) -> Option<Vec<u8>> {
    if nonce.len() != NONCE_SIZE {
        return None;
    }
    let cipher = XChaCha20Poly1305::new(Key::from_slice(key.as_bytes()));
    cipher.decrypt(XNonce::from_slice(nonce), ciphertext).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::SessionKeys;

    fn test_key() -> SessionKey {
        SessionKeys::from_key([7u8; KEY_SIZE])
            .unwrap()
            .primary()
            .unwrap()
            .clone()
    }

    #[test]
    fn test_seal_open_roundtrip() {
        let key = test_key();
        let nonce = generate_nonce();
        let sealed = seal(b"{\"a\":1}", &nonce, &key).unwrap();

        assert_eq!(sealed.len(), 7 + TAG_SIZE);
        let opened = open(&sealed, &nonce, &key).unwrap();
        assert_eq!(opened, b"{\"a\":1}");
    }

    #[test]
    fn test_open_rejects_tampered_ciphertext() {
        let key = test_key();
        let nonce = generate_nonce();
        let mut sealed = seal(b"payload", &nonce, &key).unwrap();

        sealed[0] ^= 0x01;
        assert!(open(&sealed, &nonce, &key).is_none());
    }

    #[test]
    fn test_open_rejects_wrong_key() {
        let key = test_key();
        let other = SessionKeys::from_key([9u8; KEY_SIZE])
            .unwrap()
            .primary()
            .unwrap()
            .clone();
        let nonce = generate_nonce();
        let sealed = seal(b"payload", &nonce, &key).unwrap();

        assert!(open(&sealed, &nonce, &other).is_none());
    }

    #[test]
    fn test_open_rejects_wrong_nonce_length() {
        let key = test_key();
        let nonce = generate_nonce();
        let sealed = seal(b"payload", &nonce, &key).unwrap();

        assert!(open(&sealed, &nonce[..12], &key).is_none());
    }

    #[test]
    fn test_nonces_are_unique() {
        assert_ne!(generate_nonce(), generate_nonce());
    }
}
