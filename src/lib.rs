#![warn(clippy::pedantic)]
#![warn(clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Encrypted, schema-validated client-held sessions.
//!
//! Session content lives entirely inside an authenticated-encryption
//! protected cookie value; there is no server-side session storage and
//! therefore nothing to revoke except by key rotation or expiry. The host
//! request/response lifecycle stays outside this crate: it hands an optional
//! raw cookie string to [`decode_session`], exposes the resulting [`Session`]
//! to application code, and calls [`encode_session`] when the session is
//! `changed` (or clears the cookie when it is `deleted`).

/// Version of the cachet library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Reserved wire-payload key carrying the session timestamp. Never a
/// settable application field.
pub const TIMESTAMP_KEY: &str = "__ts";

pub mod crypto;
pub mod error;
pub mod keys;
pub mod schema;
pub mod session;

/// Re-export commonly used items
pub use error::{CompileError, ConfigError, SessionError, ValidationError, Violation};
pub use keys::{KeySource, SessionKey, SessionKeys};
pub use schema::{Codec, CompiledSchema, Field, Schema, SchemaPipeline};
pub use session::{
    create_session, decode_session, encode_session, CookieOptions, KeyMaterial, SameSite, Session,
    SessionConfig, SessionOptions, SessionRegistry,
};
