//! The per-request session entity with dirty-tracking.
//!
//! A `Session` is constructed fresh for each request — either from a
//! successful cookie decode or as a schema-default instance — mutated by
//! application code, consumed once at response time, and discarded. It is
//! never shared across requests, so it carries no locking.
//!
//! State machine: fresh (`changed = false`) → touched (`changed = true`,
//! reached by any mutation) → deleted (terminal; `changed` stays true).

use chrono::Utc;
use serde_json::{Map, Value};

use crate::error::SessionError;
use crate::session::cookie::CookieOptions;
use crate::TIMESTAMP_KEY;

#[derive(Debug, Clone)]
pub struct Session {
    content: Map<String, Value>,
    timestamp: i64,
    changed: bool,
    deleted: bool,
    cookie_overrides: Option<CookieOptions>,
}

impl Session {
    /// Build a fresh session around validated content, stamped now.
    #[must_use]
    pub fn new(content: Map<String, Value>) -> Self {
        Self::with_timestamp(content, Utc::now().timestamp())
    }

    pub(crate) fn with_timestamp(content: Map<String, Value>, timestamp: i64) -> Self {
        Self {
            content,
            timestamp,
            changed: false,
            deleted: false,
            cookie_overrides: None,
        }
    }

    /// Read a field. No side effects.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.content.get(key)
    }

    /// Set a field, marking the session changed.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::ReservedKey` when `key` is the reserved
    /// timestamp key; it is never a settable application field.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Result<(), SessionError> {
        let key = key.into();
        if key == TIMESTAMP_KEY {
            return Err(SessionError::ReservedKey);
        }
        self.touch();
        self.content.insert(key, value.into());
        Ok(())
    }

    /// Mark the session for deletion. The host clears the cookie instead of
    /// re-setting it. Terminal: nothing transitions out of deleted.
    pub fn delete(&mut self) {
        self.deleted = true;
        self.touch();
    }

    /// Drop every content field not named in `ignored`; ignored fields keep
    /// their current value untouched.
    pub fn regenerate(&mut self, ignored: &[&str]) {
        self.content.retain(|key, _| ignored.contains(&key.as_str()));
        self.touch();
    }

    /// Defensive copy of the content; callers never observe the live
    /// internal container.
    #[must_use]
    pub fn data(&self) -> Map<String, Value> {
        self.content.clone()
    }

    /// Mark the session as updated.
    ///
    /// The single mutation point for dirty-tracking: sets `changed` and
    /// resets the timestamp to now, so dirty-state and timestamp freshness
    /// stay consistent.
    pub fn touch(&mut self) {
        self.changed = true;
        self.timestamp = Utc::now().timestamp();
    }

    // Rotation migration: force re-encryption under the primary key without
    // refreshing the timestamp.
    pub(crate) fn mark_changed(&mut self) {
        self.changed = true;
    }

    #[must_use]
    pub fn changed(&self) -> bool {
        self.changed
    }

    #[must_use]
    pub fn deleted(&self) -> bool {
        self.deleted
    }

    /// Unix-seconds timestamp of the last update.
    #[must_use]
    pub fn last_updated(&self) -> i64 {
        self.timestamp
    }

    /// Per-response cookie-attribute overrides, if any were set.
    #[must_use]
    pub fn cookie_overrides(&self) -> Option<&CookieOptions> {
        self.cookie_overrides.as_ref()
    }

    pub fn set_cookie_overrides(&mut self, options: CookieOptions) {
        self.cookie_overrides = Some(options);
    }
}
