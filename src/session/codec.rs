//! The session codec: sealing sessions into cookie values and back.
//!
//! Pure functions over `(SessionOptions, Session)`; no request or response
//! objects, no server-side state. The wire format is
//! `base64(ciphertext‖tag)` `;` `base64(nonce)`.
//!
//! Decode is deliberately oracle-free: every reason a cookie can be rejected
//! — malformed, tampered, sealed under an unknown key, expired, failing
//! schema validation — collapses into the same outward behavior, a fresh
//! schema-default session. The only loud decode path is a setup defect: a
//! schema that cannot produce a default instance.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chrono::Utc;
use serde_json::{Map, Value};

use crate::crypto::{self, NONCE_SIZE, TAG_SIZE};
use crate::error::{ConfigError, SessionError};
use crate::session::entity::Session;
use crate::session::registry::SessionOptions;
use crate::TIMESTAMP_KEY;

/// Separator between the ciphertext and nonce halves of the cookie value.
pub const SEPARATOR: char = ';';

/// Encode a session into a cookie value under the primary key.
///
/// # Errors
///
/// Returns `ConfigError::NoEncryptionKey` when the key list is empty, and a
/// fatal [`crate::ValidationError`] when the session content cannot be
/// serialized to match its declared schema — an unserializable payload is a
/// programming error, never silently dropped.
pub fn encode_session(options: &SessionOptions, session: &Session) -> Result<String, SessionError> {
    let key = options
        .keys()
        .primary()
        .ok_or(ConfigError::NoEncryptionKey)?;
    let payload = options
        .schema()
        .serialize(&session.data(), session.last_updated())?;

    let nonce = crypto::generate_nonce();
    let sealed = crypto::seal(payload.as_bytes(), &nonce, key)?;
    Ok(format!(
        "{}{SEPARATOR}{}",
        STANDARD.encode(&sealed),
        STANDARD.encode(nonce)
    ))
}

/// Decode a cookie value into a session, falling back to a schema-default
/// session on any invalid, tampered or expired input.
///
/// Decryption is attempted against the keys in list order; the first key
/// that authenticates wins. When the winner is not the primary key, the
/// session comes back `changed` so the next response re-encrypts it under
/// the primary key, completing rotation transparently.
///
/// # Errors
///
/// Only fails when the schema cannot produce a default instance from empty
/// input — a configuration defect, not a client input problem.
pub fn decode_session(
    options: &SessionOptions,
    cookie: Option<&str>,
) -> Result<Session, SessionError> {
    match cookie.and_then(|raw| try_decode(options, raw)) {
        Some(session) => Ok(session),
        None => default_session(options),
    }
}

fn try_decode(options: &SessionOptions, raw: &str) -> Option<Session> {
    let (sealed_b64, nonce_b64) = raw.split_once(SEPARATOR)?;
    if sealed_b64.is_empty() || nonce_b64.is_empty() {
        return None;
    }
    let sealed = STANDARD.decode(sealed_b64).ok()?;
    let nonce = STANDARD.decode(nonce_b64).ok()?;
    if sealed.len() < TAG_SIZE || nonce.len() != NONCE_SIZE {
        return None;
    }

    let (key_index, plaintext) = options
        .keys()
        .iter()
        .enumerate()
        .find_map(|(index, key)| crypto::open(&sealed, &nonce, key).map(|msg| (index, msg)))?;

    let mut payload: Map<String, Value> = serde_json::from_slice(&plaintext).ok()?;
    let timestamp = payload.remove(TIMESTAMP_KEY)?.as_i64()?;
    if Utc::now().timestamp() - timestamp > options.expiry().num_seconds() {
        log::debug!(
            "session cookie for {} past expiry, issuing default session",
            options.session_name()
        );
        return None;
    }

    let content = options.schema().deserialize(&Value::Object(payload)).ok()?;
    let mut session = Session::with_timestamp(content, timestamp);
    if key_index > 0 {
        // sealed under a retired key: re-encrypt under the primary key on
        // the next response, keeping the original timestamp
        session.mark_changed();
    }
    Some(session)
}

fn default_session(options: &SessionOptions) -> Result<Session, SessionError> {
    let content = options
        .schema()
        .default_instance()
        .map_err(ConfigError::DefaultSession)?;
    Ok(Session::new(content))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Field, Schema, SchemaPipeline};
    use crate::session::registry::{create_session, SessionConfig};
    use serde_json::json;

    const KEY_A: [u8; 32] = [1u8; 32];
    const KEY_B: [u8; 32] = [2u8; 32];

    fn test_schema() -> Schema {
        Schema::new().field("a", Field::number().default_value(0))
    }

    async fn options_with_keys(keys: &[[u8; 32]]) -> SessionOptions {
        let config = SessionConfig::new("user", test_schema()).keys(keys.to_vec());
        create_session(&SchemaPipeline::new(), config).await.unwrap()
    }

    #[tokio::test]
    async fn test_roundtrip() {
        let options = options_with_keys(&[KEY_A]).await;
        let mut session = decode_session(&options, None).unwrap();
        session.set("a", 1).unwrap();

        let cookie = encode_session(&options, &session).unwrap();
        let decoded = decode_session(&options, Some(&cookie)).unwrap();

        assert_eq!(decoded.get("a"), Some(&json!(1)));
        assert!(!decoded.changed());
        assert_eq!(decoded.last_updated(), session.last_updated());
    }

    #[tokio::test]
    async fn test_absent_cookie_yields_default() {
        let options = options_with_keys(&[KEY_A]).await;
        let session = decode_session(&options, None).unwrap();
        assert_eq!(session.get("a"), Some(&json!(0)));
        assert!(!session.changed());
    }

    #[tokio::test]
    async fn test_malformed_cookies_yield_default() {
        let options = options_with_keys(&[KEY_A]).await;
        for raw in ["", "a", "a;", ";b", ";", "a;b", "%%%;###"] {
            let session = decode_session(&options, Some(raw)).unwrap();
            assert_eq!(session.get("a"), Some(&json!(0)), "input {raw:?}");
        }
    }

    #[tokio::test]
    async fn test_wrong_nonce_length_yields_default() {
        let options = options_with_keys(&[KEY_A]).await;
        let session = decode_session(&options, None).unwrap();
        let cookie = encode_session(&options, &session).unwrap();
        let (sealed_b64, _) = cookie.split_once(SEPARATOR).unwrap();

        let short_nonce = STANDARD.encode([0u8; 12]);
        let tampered = format!("{sealed_b64}{SEPARATOR}{short_nonce}");
        let decoded = decode_session(&options, Some(&tampered)).unwrap();
        assert_eq!(decoded.get("a"), Some(&json!(0)));
    }

    #[tokio::test]
    async fn test_undersized_ciphertext_yields_default() {
        let options = options_with_keys(&[KEY_A]).await;
        let sealed = STANDARD.encode([0u8; TAG_SIZE - 1]);
        let nonce = STANDARD.encode([0u8; NONCE_SIZE]);
        let raw = format!("{sealed}{SEPARATOR}{nonce}");
        let session = decode_session(&options, Some(&raw)).unwrap();
        assert_eq!(session.get("a"), Some(&json!(0)));
    }

    #[tokio::test]
    async fn test_tampered_ciphertext_yields_default() {
        let options = options_with_keys(&[KEY_A]).await;
        let mut session = decode_session(&options, None).unwrap();
        session.set("a", 7).unwrap();
        let cookie = encode_session(&options, &session).unwrap();

        let (sealed_b64, nonce_b64) = cookie.split_once(SEPARATOR).unwrap();
        let mut sealed = STANDARD.decode(sealed_b64).unwrap();
        sealed[0] ^= 0x01;
        let tampered = format!("{}{SEPARATOR}{nonce_b64}", STANDARD.encode(&sealed));

        let decoded = decode_session(&options, Some(&tampered)).unwrap();
        assert_eq!(decoded.get("a"), Some(&json!(0)));
    }

    #[tokio::test]
    async fn test_unknown_key_yields_default() {
        let sender = options_with_keys(&[KEY_A]).await;
        let receiver = options_with_keys(&[KEY_B]).await;

        let mut session = decode_session(&sender, None).unwrap();
        session.set("a", 5).unwrap();
        let cookie = encode_session(&sender, &session).unwrap();

        let decoded = decode_session(&receiver, Some(&cookie)).unwrap();
        assert_eq!(decoded.get("a"), Some(&json!(0)));
    }

    #[tokio::test]
    async fn test_rotated_key_decodes_and_marks_changed() {
        let old = options_with_keys(&[KEY_B]).await;
        let rotated = options_with_keys(&[KEY_A, KEY_B]).await;

        let mut session = decode_session(&old, None).unwrap();
        session.set("a", 3).unwrap();
        let cookie = encode_session(&old, &session).unwrap();

        let decoded = decode_session(&rotated, Some(&cookie)).unwrap();
        assert_eq!(decoded.get("a"), Some(&json!(3)));
        assert!(decoded.changed());
        // rotation re-encrypts but does not shorten the remaining lifetime
        assert_eq!(decoded.last_updated(), session.last_updated());
    }

    #[tokio::test]
    async fn test_primary_key_decode_is_not_marked_changed() {
        let options = options_with_keys(&[KEY_A, KEY_B]).await;
        let mut session = decode_session(&options, None).unwrap();
        session.set("a", 3).unwrap();
        let cookie = encode_session(&options, &session).unwrap();

        let decoded = decode_session(&options, Some(&cookie)).unwrap();
        assert!(!decoded.changed());
    }

    #[tokio::test]
    async fn test_expiry_boundary() {
        let options = options_with_keys(&[KEY_A]).await;
        let expiry = options.expiry().num_seconds();
        let now = Utc::now().timestamp();

        // just inside the window
        let mut content = Map::new();
        content.insert("a".to_string(), json!(9));
        let live = Session::with_timestamp(content.clone(), now - expiry + 1);
        let cookie = encode_session(&options, &live).unwrap();
        let decoded = decode_session(&options, Some(&cookie)).unwrap();
        assert_eq!(decoded.get("a"), Some(&json!(9)));

        // just past the window
        let stale = Session::with_timestamp(content, now - expiry - 1);
        let cookie = encode_session(&options, &stale).unwrap();
        let decoded = decode_session(&options, Some(&cookie)).unwrap();
        assert_eq!(decoded.get("a"), Some(&json!(0)));
    }

    #[tokio::test]
    async fn test_decoded_session_keeps_original_timestamp() {
        let options = options_with_keys(&[KEY_A]).await;
        let mut content = Map::new();
        content.insert("a".to_string(), json!(1));
        let session = Session::with_timestamp(content, Utc::now().timestamp() - 60);
        let cookie = encode_session(&options, &session).unwrap();

        let decoded = decode_session(&options, Some(&cookie)).unwrap();
        assert_eq!(decoded.last_updated(), session.last_updated());
    }

    #[tokio::test]
    async fn test_schema_validation_failure_yields_default() {
        // seal a payload whose field has the wrong type
        let options = options_with_keys(&[KEY_A]).await;
        let payload = format!("{{\"a\":\"oops\",\"{TIMESTAMP_KEY}\":{}}}", Utc::now().timestamp());
        let nonce = crypto::generate_nonce();
        let sealed =
            crypto::seal(payload.as_bytes(), &nonce, options.keys().primary().unwrap()).unwrap();
        let raw = format!(
            "{}{SEPARATOR}{}",
            STANDARD.encode(&sealed),
            STANDARD.encode(nonce)
        );

        let session = decode_session(&options, Some(&raw)).unwrap();
        assert_eq!(session.get("a"), Some(&json!(0)));
    }

    #[tokio::test]
    async fn test_missing_timestamp_yields_default() {
        let options = options_with_keys(&[KEY_A]).await;
        let nonce = crypto::generate_nonce();
        let sealed =
            crypto::seal(b"{\"a\":1}", &nonce, options.keys().primary().unwrap()).unwrap();
        let raw = format!(
            "{}{SEPARATOR}{}",
            STANDARD.encode(&sealed),
            STANDARD.encode(nonce)
        );

        let session = decode_session(&options, Some(&raw)).unwrap();
        assert_eq!(session.get("a"), Some(&json!(0)));
    }

    #[tokio::test]
    async fn test_undefaultable_schema_fails_loudly() {
        let schema = Schema::new().field("required", Field::string());
        let config = SessionConfig::new("user", schema).keys([KEY_A]);
        let options = create_session(&SchemaPipeline::new(), config).await.unwrap();

        let err = decode_session(&options, None).unwrap_err();
        assert!(matches!(
            err,
            SessionError::Config(ConfigError::DefaultSession(_))
        ));
    }

    #[tokio::test]
    async fn test_encode_strips_unknown_and_applies_defaults() {
        let options = options_with_keys(&[KEY_A]).await;
        let mut session = decode_session(&options, None).unwrap();
        session.set("stray", "value").unwrap();

        let cookie = encode_session(&options, &session).unwrap();
        let decoded = decode_session(&options, Some(&cookie)).unwrap();
        assert!(decoded.get("stray").is_none());
        assert_eq!(decoded.get("a"), Some(&json!(0)));
    }
}
