//! Cookie attribute surface handed to the host when a session cookie is
//! written. The host merges these with its transport layer; this crate never
//! touches request or response objects itself.

use chrono::Duration;
use serde::{Deserialize, Serialize};

/// `SameSite` attribute values for the session cookie.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SameSite {
    Strict,
    Lax,
    None,
}

/// Options for session cookie creation.
///
/// `http_only`, `signed` and `same_site` default to their strict settings
/// unless explicitly overridden.
#[derive(Debug, Clone, PartialEq)]
pub struct CookieOptions {
    pub http_only: bool,
    /// Whether the host should apply its outer transport-level signature.
    pub signed: bool,
    pub same_site: SameSite,
    pub secure: bool,
    pub path: String,
    pub max_age: Option<Duration>,
}

impl Default for CookieOptions {
    fn default() -> Self {
        Self {
            http_only: true,
            signed: true,
            same_site: SameSite::Strict,
            secure: true,
            path: "/".to_string(),
            max_age: None,
        }
    }
}
