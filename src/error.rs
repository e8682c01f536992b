//! Error taxonomy for session configuration, schema compilation and validation.
//!
//! Two failure classes matter here:
//!
//! - **Configuration errors** are setup defects (bad key material, unknown
//!   session names, uncompilable schemas) and always surface loudly.
//! - **Validation errors** are recoverable on the decode path (a stale or
//!   tampered cookie simply yields a default session) but fatal on the encode
//!   path, where they mean the application is about to emit a payload that
//!   violates its own declared contract.
//!
//! Everything else that can go wrong while decoding a client-supplied cookie
//! is deliberately collapsed into the default-session fallback and never
//! produces an error value at all, so callers cannot be used as a decryption
//! or validation oracle.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// Fatal, setup-time configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Secret handed to the KDF is below the minimum length.
    #[error("secret must be at least {min} bytes, got {actual}")]
    SecretTooShort { min: usize, actual: usize },

    /// Salt is not exactly the KDF salt length.
    #[error("salt must be exactly {expected} bytes, got {actual}")]
    SaltLength { expected: usize, actual: usize },

    /// Explicit key is not exactly the AEAD key length.
    #[error("key must be exactly {expected} bytes, got {actual}")]
    KeyLength { expected: usize, actual: usize },

    /// Explicit key given as a string that is not valid base64.
    #[error("key is not valid base64: {0}")]
    KeyEncoding(#[from] base64::DecodeError),

    /// The key derivation function itself failed.
    #[error("key derivation failed: {0}")]
    Kdf(String),

    /// Calling code referenced a session name that was never registered.
    #[error("unknown session name: {0}")]
    UnknownSession(String),

    /// Encode was attempted with an empty key list.
    #[error("no encryption key configured")]
    NoEncryptionKey,

    /// The session schema did not compile.
    #[error(transparent)]
    Schema(#[from] CompileError),

    /// The schema cannot produce a valid instance from empty input, so the
    /// decode fallback has nothing safe to hand back.
    #[error("schema cannot produce a default session: {0}")]
    DefaultSession(ValidationError),
}

/// Schema compilation errors. Compilation happens once at configuration time,
/// so these are configuration defects rather than runtime conditions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    /// A named reference does not exist in the pipeline's registry.
    #[error("unresolved schema reference: {0}")]
    UnresolvedReference(String),

    /// A reference was used while reference resolution is disabled.
    #[error("schema reference {0} used while references are disabled")]
    ReferencesDisabled(String),

    /// Reference resolution looped back on itself.
    #[error("circular schema reference: {0}")]
    CircularReference(String),
}

/// A single violated field path and the constraint it violated.
/// Serializable so operators can log the full failure surface structurally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Violation {
    pub path: String,
    pub message: String,
}

impl Violation {
    #[must_use]
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

/// Structured validation failure enumerating every violated field, not just
/// the first, so callers and tests can inspect the full failure surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationError {
    violations: Vec<Violation>,
}

impl ValidationError {
    #[must_use]
    pub fn new(violations: Vec<Violation>) -> Self {
        Self { violations }
    }

    pub(crate) fn single(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            violations: vec![Violation::new(path, message)],
        }
    }

    /// Every violation recorded during validation.
    #[must_use]
    pub fn violations(&self) -> &[Violation] {
        &self.violations
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "schema validation failed: ")?;
        for (i, violation) in self.violations.iter().enumerate() {
            if i > 0 {
                write!(f, "; ")?;
            }
            write!(f, "{violation}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

/// Top-level error type for the session codec and entity operations.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Application code tried to use the reserved timestamp key as a field.
    #[error("{:?} is a reserved session key", crate::TIMESTAMP_KEY)]
    ReservedKey,

    /// The AEAD primitive itself failed while sealing a payload.
    #[error("encryption failed: {0}")]
    Crypto(String),
}
