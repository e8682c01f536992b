//! Declarative session schemas and the bidirectional validation pipeline.
//!
//! A [`Schema`] declares the data contract for one named session: the fields
//! it may contain, their types, defaults and optional encode/decode
//! transforms. A [`SchemaPipeline`] compiles a schema exactly once into a
//! [`CompiledSchema`], which both directions of the session codec then use:
//!
//! - `deserialize` on the decode path (default-fill, validate, decode
//!   transforms, strip undeclared properties);
//! - `serialize` on the encode path (clean, default-fill, encode transforms,
//!   validate the wire form, attach the reserved timestamp, render JSON).

pub mod compiled;
pub mod pipeline;

pub use compiled::CompiledSchema;
pub use pipeline::SchemaPipeline;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

type TransformFn = Arc<dyn Fn(&Value) -> Result<Value, String> + Send + Sync>;

/// A paired encode/decode transform declared on a schema field.
///
/// `decode` runs when a wire payload is turned back into session content,
/// `encode` when session content is rendered for the wire. A transform
/// returning `Err` is a validation violation on decode and a fatal contract
/// violation on encode.
#[derive(Clone)]
pub struct Codec {
    pub(crate) encode: TransformFn,
    pub(crate) decode: TransformFn,
}

impl Codec {
    pub fn new<E, D>(encode: E, decode: D) -> Self
    where
        E: Fn(&Value) -> Result<Value, String> + Send + Sync + 'static,
        D: Fn(&Value) -> Result<Value, String> + Send + Sync + 'static,
    {
        Self {
            encode: Arc::new(encode),
            decode: Arc::new(decode),
        }
    }
}

impl fmt::Debug for Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Codec { .. }")
    }
}

#[derive(Debug, Clone)]
pub(crate) enum Kind {
    String,
    Number,
    Integer,
    Boolean,
    Array(Box<Field>),
    Object(BTreeMap<String, Field>),
    Reference(String),
}

/// One declared field of a session schema.
#[derive(Debug, Clone)]
pub struct Field {
    pub(crate) kind: Kind,
    pub(crate) default: Option<Value>,
    pub(crate) optional: bool,
    pub(crate) codec: Option<Codec>,
}

impl Field {
    fn of(kind: Kind) -> Self {
        Self {
            kind,
            default: None,
            optional: false,
            codec: None,
        }
    }

    #[must_use]
    pub fn string() -> Self {
        Self::of(Kind::String)
    }

    /// Any JSON number.
    #[must_use]
    pub fn number() -> Self {
        Self::of(Kind::Number)
    }

    /// A JSON number with no fractional part.
    #[must_use]
    pub fn integer() -> Self {
        Self::of(Kind::Integer)
    }

    #[must_use]
    pub fn boolean() -> Self {
        Self::of(Kind::Boolean)
    }

    #[must_use]
    pub fn array(item: Field) -> Self {
        Self::of(Kind::Array(Box::new(item)))
    }

    #[must_use]
    pub fn object<I, N>(fields: I) -> Self
    where
        I: IntoIterator<Item = (N, Field)>,
        N: Into<String>,
    {
        let fields = fields
            .into_iter()
            .map(|(name, field)| (name.into(), field))
            .collect();
        Self::of(Kind::Object(fields))
    }

    /// A reference to a named schema registered with the pipeline; resolved
    /// at compile time.
    #[must_use]
    pub fn reference(name: impl Into<String>) -> Self {
        Self::of(Kind::Reference(name.into()))
    }

    /// Value filled in when the field is missing and default-filling is
    /// enabled.
    #[must_use]
    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// Mark the field as allowed to be absent.
    #[must_use]
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    #[must_use]
    pub fn with_codec(mut self, codec: Codec) -> Self {
        self.codec = Some(codec);
        self
    }
}

/// A session data contract: an object of named fields.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    pub(crate) fields: BTreeMap<String, Field>,
}

impl Schema {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn field(mut self, name: impl Into<String>, field: Field) -> Self {
        self.fields.insert(name.into(), field);
        self
    }
}
