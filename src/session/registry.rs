//! Per-named-session configuration and the startup-time options registry.
//!
//! Options are built once at startup and consulted by the codec on every
//! request. The registry is an explicit, process-lifetime value passed by
//! reference to request-scoped code; nothing is attached to shared mutable
//! state at runtime. Key derivation and schema compilation both happen here,
//! once per named session, never on the request path.

use std::collections::HashMap;

use chrono::Duration;

use crate::error::{ConfigError, SessionError};
use crate::keys::{KeySource, SessionKeys};
use crate::schema::{CompiledSchema, Schema, SchemaPipeline};
use crate::session::cookie::CookieOptions;

/// Key material for one named session: either a secret + salt to derive from,
/// or an ordered list of explicit keys.
#[derive(Debug, Clone)]
pub enum KeyMaterial {
    Secret { secret: Vec<u8>, salt: Vec<u8> },
    Keys(Vec<KeySource>),
}

/// Builder-style input for one named session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    session_name: String,
    schema: Schema,
    key_material: Option<KeyMaterial>,
    cookie_name: Option<String>,
    cookie: CookieOptions,
    expiry: Option<Duration>,
}

impl SessionConfig {
    #[must_use]
    pub fn new(session_name: impl Into<String>, schema: Schema) -> Self {
        Self {
            session_name: session_name.into(),
            schema,
            key_material: None,
            cookie_name: None,
            cookie: CookieOptions::default(),
            expiry: None,
        }
    }

    /// Derive the single session key from a secret and salt.
    #[must_use]
    pub fn secret(mut self, secret: impl Into<Vec<u8>>, salt: impl Into<Vec<u8>>) -> Self {
        self.key_material = Some(KeyMaterial::Secret {
            secret: secret.into(),
            salt: salt.into(),
        });
        self
    }

    /// Use an explicit ordered key list; the first entry is the primary key.
    #[must_use]
    pub fn keys<I>(mut self, keys: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<KeySource>,
    {
        self.key_material = Some(KeyMaterial::Keys(
            keys.into_iter().map(Into::into).collect(),
        ));
        self
    }

    /// Override the cookie name. Defaults to the session name.
    #[must_use]
    pub fn cookie_name(mut self, name: impl Into<String>) -> Self {
        self.cookie_name = Some(name.into());
        self
    }

    #[must_use]
    pub fn cookie_options(mut self, options: CookieOptions) -> Self {
        self.cookie = options;
        self
    }

    /// Override the expiry duration. Defaults to 1 day.
    #[must_use]
    pub fn expiry(mut self, expiry: Duration) -> Self {
        self.expiry = Some(expiry);
        self
    }
}

/// Resolved, immutable configuration for one named session.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    cookie_name: String,
    cookie_options: CookieOptions,
    expiry: Duration,
    keys: SessionKeys,
    schema: CompiledSchema,
    session_name: String,
}

impl SessionOptions {
    #[must_use]
    pub fn cookie_name(&self) -> &str {
        &self.cookie_name
    }

    #[must_use]
    pub fn cookie_options(&self) -> &CookieOptions {
        &self.cookie_options
    }

    #[must_use]
    pub fn expiry(&self) -> Duration {
        self.expiry
    }

    #[must_use]
    pub fn keys(&self) -> &SessionKeys {
        &self.keys
    }

    #[must_use]
    pub fn schema(&self) -> &CompiledSchema {
        &self.schema
    }

    #[must_use]
    pub fn session_name(&self) -> &str {
        &self.session_name
    }
}

/// Resolve a [`SessionConfig`] into immutable [`SessionOptions`].
///
/// This is where the expensive work lives: the memory-hard key derivation
/// (on the blocking pool) and the compile-once schema step.
///
/// # Errors
///
/// Returns a `ConfigError` wrapped in [`SessionError`] for missing or
/// invalid key material and for schemas that fail to compile.
pub async fn create_session(
    pipeline: &SchemaPipeline,
    config: SessionConfig,
) -> Result<SessionOptions, SessionError> {
    let keys = match config.key_material {
        Some(KeyMaterial::Secret { secret, salt }) => SessionKeys::derive(secret, salt).await?,
        Some(KeyMaterial::Keys(list)) => SessionKeys::from_keys(list)?,
        None => return Err(ConfigError::NoEncryptionKey.into()),
    };
    let schema = pipeline
        .compile(&config.schema)
        .map_err(ConfigError::from)?;

    Ok(SessionOptions {
        cookie_name: config
            .cookie_name
            .unwrap_or_else(|| config.session_name.clone()),
        cookie_options: config.cookie,
        expiry: config.expiry.unwrap_or_else(|| Duration::days(1)),
        keys,
        schema,
        session_name: config.session_name,
    })
}

/// Registry of session options keyed by session name, built once at startup.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    pipeline: SchemaPipeline,
    sessions: HashMap<String, SessionOptions>,
}

impl SessionRegistry {
    #[must_use]
    pub fn new(pipeline: SchemaPipeline) -> Self {
        Self {
            pipeline,
            sessions: HashMap::new(),
        }
    }

    /// Register one named session, deriving its keys and compiling its
    /// schema.
    ///
    /// # Errors
    ///
    /// Propagates configuration errors from [`create_session`].
    pub async fn register(&mut self, config: SessionConfig) -> Result<(), SessionError> {
        let options = create_session(&self.pipeline, config).await?;
        self.sessions.insert(options.session_name().to_string(), options);
        Ok(())
    }

    /// Look up the options for a named session.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::UnknownSession` when calling code references a
    /// name that was never registered.
    pub fn get(&self, name: &str) -> Result<&SessionOptions, SessionError> {
        self.sessions
            .get(name)
            .ok_or_else(|| ConfigError::UnknownSession(name.to_string()).into())
    }

    #[must_use]
    pub fn pipeline(&self) -> &SchemaPipeline {
        &self.pipeline
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.sessions.keys().map(String::as_str)
    }
}
