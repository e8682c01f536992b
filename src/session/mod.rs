//! Session Management Module
//!
//! Everything session-shaped lives here: the per-request entity, the
//! encode/decode codec, the cookie attribute surface and the startup-time
//! options registry.
//!
//! # Modules
//!
//! - [`entity`] - The mutable per-request session container with dirty-tracking
//! - [`codec`] - Sealing sessions into cookie values and back
//! - [`cookie`] - Cookie attribute options handed to the host
//! - [`registry`] - Per-named-session configuration built once at startup

pub mod codec;
pub mod cookie;
pub mod entity;
pub mod registry;

// Re-export commonly used items for convenience
pub use codec::{decode_session, encode_session, SEPARATOR};
pub use cookie::{CookieOptions, SameSite};
pub use entity::Session;
pub use registry::{create_session, KeyMaterial, SessionConfig, SessionOptions, SessionRegistry};
