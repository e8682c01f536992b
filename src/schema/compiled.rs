//! Compiled schema handle: the validate/default/clean/transform pipeline.
//!
//! Compilation (see [`super::pipeline`]) resolves references away, so the
//! compiled form is a plain tree that both codec directions walk without any
//! further lookups. Ordinary invalid input on `deserialize` is a normal
//! result carrying every violation found; a failure on `serialize` means the
//! caller is about to emit a payload that violates its own declared contract
//! and is therefore fatal.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use crate::error::{ValidationError, Violation};
use crate::schema::Codec;
use crate::TIMESTAMP_KEY;

#[derive(Debug, Clone)]
pub(crate) enum CompiledKind {
    String,
    Number,
    Integer,
    Boolean,
    Array(Box<CompiledField>),
    Object(BTreeMap<String, CompiledField>),
}

#[derive(Debug, Clone)]
pub(crate) struct CompiledField {
    pub(crate) kind: CompiledKind,
    pub(crate) default: Option<Value>,
    pub(crate) optional: bool,
    pub(crate) codec: Option<Codec>,
}

#[derive(Clone, Copy)]
enum Direction {
    Encode,
    Decode,
}

/// Opaque compiled-validator handle produced once per schema at
/// configuration time and stored in each session's options.
#[derive(Debug, Clone)]
pub struct CompiledSchema {
    fields: BTreeMap<String, CompiledField>,
    use_default: bool,
}

impl CompiledSchema {
    pub(crate) fn new(fields: BTreeMap<String, CompiledField>, use_default: bool) -> Self {
        Self {
            fields,
            use_default,
        }
    }

    /// Turn a raw decoded payload into validated session content.
    ///
    /// Pipeline order: default-fill (when enabled), structural validation,
    /// decode transforms, strip undeclared properties.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] enumerating every violated field path.
    /// Invalid input is a normal result here, never a panic.
    pub fn deserialize(&self, input: &Value) -> Result<Map<String, Value>, ValidationError> {
        let Some(object) = input.as_object() else {
            return Err(ValidationError::single("$", "expected an object"));
        };
        let mut value = object.clone();
        if self.use_default {
            fill_defaults(&self.fields, &mut value);
        }

        log::debug!("validating session payload against compiled schema");
        let mut violations = Vec::new();
        validate_object(&self.fields, &value, "", &mut violations);
        if !violations.is_empty() {
            return Err(ValidationError::new(violations));
        }

        apply_transforms(&self.fields, &mut value, "", Direction::Decode, &mut violations);
        if !violations.is_empty() {
            return Err(ValidationError::new(violations));
        }

        strip_undeclared(&self.fields, &mut value);
        Ok(value)
    }

    /// Render session content as the canonical wire payload with the
    /// reserved timestamp attached.
    ///
    /// Pipeline order: strip undeclared properties, default-fill (when
    /// enabled), encode transforms, structural validation of the resulting
    /// wire form, timestamp injection, JSON rendering.
    ///
    /// # Errors
    ///
    /// Any failure here is fatal: it is logged with full context and
    /// returned, because the caller would otherwise emit a payload violating
    /// its own declared contract.
    pub fn serialize(
        &self,
        data: &Map<String, Value>,
        timestamp: i64,
    ) -> Result<String, ValidationError> {
        let mut value = data.clone();
        strip_undeclared(&self.fields, &mut value);
        if self.use_default {
            fill_defaults(&self.fields, &mut value);
        }

        // transforms first: the schema types describe the wire form
        let mut violations = Vec::new();
        apply_transforms(&self.fields, &mut value, "", Direction::Encode, &mut violations);
        if violations.is_empty() {
            validate_object(&self.fields, &value, "", &mut violations);
        }
        if !violations.is_empty() {
            let err = ValidationError::new(violations);
            log::error!("cannot serialize session to match its declared schema: {err}");
            return Err(err);
        }

        value.insert(TIMESTAMP_KEY.to_string(), Value::from(timestamp));
        serde_json::to_string(&Value::Object(value))
            .map_err(|e| ValidationError::single("$", format!("JSON rendering failed: {e}")))
    }

    /// Build the schema-default instance used as the decode fallback.
    ///
    /// # Errors
    ///
    /// Fails when the schema cannot produce a valid instance from empty
    /// input, e.g. a required field with no default — a setup defect.
    pub fn default_instance(&self) -> Result<Map<String, Value>, ValidationError> {
        self.deserialize(&Value::Object(Map::new()))
    }
}

fn child_path(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}.{name}")
    }
}

fn fill_defaults(fields: &BTreeMap<String, CompiledField>, object: &mut Map<String, Value>) {
    for (name, field) in fields {
        if !object.contains_key(name) {
            if let Some(default) = &field.default {
                object.insert(name.clone(), default.clone());
            }
        }
        if let CompiledKind::Object(inner) = &field.kind {
            if let Some(Value::Object(nested)) = object.get_mut(name) {
                fill_defaults(inner, nested);
            }
        }
    }
}

fn validate_object(
    fields: &BTreeMap<String, CompiledField>,
    object: &Map<String, Value>,
    prefix: &str,
    violations: &mut Vec<Violation>,
) {
    for (name, field) in fields {
        let path = child_path(prefix, name);
        match object.get(name) {
            None => {
                if !field.optional {
                    violations.push(Violation::new(path, "missing required field"));
                }
            }
            Some(value) => validate_value(field, value, &path, violations),
        }
    }
}

fn validate_value(
    field: &CompiledField,
    value: &Value,
    path: &str,
    violations: &mut Vec<Violation>,
) {
    match &field.kind {
        CompiledKind::String => {
            if !value.is_string() {
                violations.push(Violation::new(path, "expected string"));
            }
        }
        CompiledKind::Number => {
            if !value.is_number() {
                violations.push(Violation::new(path, "expected number"));
            }
        }
        CompiledKind::Integer => {
            if !value.is_i64() && !value.is_u64() {
                violations.push(Violation::new(path, "expected integer"));
            }
        }
        CompiledKind::Boolean => {
            if !value.is_boolean() {
                violations.push(Violation::new(path, "expected boolean"));
            }
        }
        CompiledKind::Array(item) => match value.as_array() {
            None => violations.push(Violation::new(path, "expected array")),
            Some(items) => {
                for (index, entry) in items.iter().enumerate() {
                    validate_value(item, entry, &format!("{path}[{index}]"), violations);
                }
            }
        },
        CompiledKind::Object(inner) => match value.as_object() {
            None => violations.push(Violation::new(path, "expected object")),
            Some(nested) => validate_object(inner, nested, path, violations),
        },
    }
}

fn apply_transforms(
    fields: &BTreeMap<String, CompiledField>,
    object: &mut Map<String, Value>,
    prefix: &str,
    direction: Direction,
    violations: &mut Vec<Violation>,
) {
    for (name, field) in fields {
        let path = child_path(prefix, name);
        if let Some(value) = object.get_mut(name) {
            transform_value(field, value, &path, direction, violations);
        }
    }
}

fn transform_value(
    field: &CompiledField,
    value: &mut Value,
    path: &str,
    direction: Direction,
    violations: &mut Vec<Violation>,
) {
    // children first, then the field's own codec
    match &field.kind {
        CompiledKind::Array(item) => {
            if let Value::Array(items) = value {
                for (index, entry) in items.iter_mut().enumerate() {
                    transform_value(item, entry, &format!("{path}[{index}]"), direction, violations);
                }
            }
        }
        CompiledKind::Object(inner) => {
            if let Value::Object(nested) = value {
                apply_transforms(inner, nested, path, direction, violations);
            }
        }
        _ => {}
    }

    if let Some(codec) = &field.codec {
        let transform = match direction {
            Direction::Encode => &codec.encode,
            Direction::Decode => &codec.decode,
        };
        match transform(value) {
            Ok(transformed) => *value = transformed,
            Err(message) => violations.push(Violation::new(path, message)),
        }
    }
}

fn strip_undeclared(fields: &BTreeMap<String, CompiledField>, object: &mut Map<String, Value>) {
    object.retain(|name, _| fields.contains_key(name));
    for (name, field) in fields {
        match (&field.kind, object.get_mut(name)) {
            (CompiledKind::Object(inner), Some(Value::Object(nested))) => {
                strip_undeclared(inner, nested);
            }
            (CompiledKind::Array(item), Some(Value::Array(items))) => {
                if let CompiledKind::Object(inner) = &item.kind {
                    for entry in items.iter_mut() {
                        if let Value::Object(nested) = entry {
                            strip_undeclared(inner, nested);
                        }
                    }
                }
            }
            _ => {}
        }
    }
}
