//! Schema compilation: named-reference resolution and pipeline toggles.

use std::collections::BTreeMap;

use crate::error::CompileError;
use crate::schema::compiled::{CompiledField, CompiledKind, CompiledSchema};
use crate::schema::{Field, Kind, Schema};

/// Compiles schemas into [`CompiledSchema`] handles.
///
/// Compilation is a one-time setup cost: each session's schema is compiled
/// exactly once when its options are created and the handle is reused for the
/// schema's lifetime. The pipeline also holds the registry of named schemas
/// that [`Field::reference`] fields resolve against.
#[derive(Debug, Clone)]
pub struct SchemaPipeline {
    references: BTreeMap<String, Field>,
    use_default: bool,
    use_references: bool,
}

impl Default for SchemaPipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl SchemaPipeline {
    #[must_use]
    pub fn new() -> Self {
        Self {
            references: BTreeMap::new(),
            use_default: true,
            use_references: true,
        }
    }

    /// Toggle default-filling of missing fields on both codec directions.
    #[must_use]
    pub fn use_default(mut self, enabled: bool) -> Self {
        self.use_default = enabled;
        self
    }

    /// Toggle named-reference resolution. When disabled, any reference in a
    /// schema is a hard compilation error rather than a silent miss.
    #[must_use]
    pub fn use_references(mut self, enabled: bool) -> Self {
        self.use_references = enabled;
        self
    }

    /// Register a named schema that other schemas may reference.
    pub fn add_reference(&mut self, name: impl Into<String>, field: Field) {
        self.references.insert(name.into(), field);
    }

    /// Compile a schema, resolving every reference.
    ///
    /// # Errors
    ///
    /// Returns a [`CompileError`] for unresolved or circular references, or
    /// for any reference when resolution is disabled.
    pub fn compile(&self, schema: &Schema) -> Result<CompiledSchema, CompileError> {
        let mut fields = BTreeMap::new();
        let mut stack = Vec::new();
        for (name, field) in &schema.fields {
            fields.insert(name.clone(), self.compile_field(field, &mut stack)?);
        }
        Ok(CompiledSchema::new(fields, self.use_default))
    }

    fn compile_field(
        &self,
        field: &Field,
        stack: &mut Vec<String>,
    ) -> Result<CompiledField, CompileError> {
        let kind = match &field.kind {
            Kind::String => CompiledKind::String,
            Kind::Number => CompiledKind::Number,
            Kind::Integer => CompiledKind::Integer,
            Kind::Boolean => CompiledKind::Boolean,
            Kind::Array(item) => CompiledKind::Array(Box::new(self.compile_field(item, stack)?)),
            Kind::Object(inner) => {
                let mut fields = BTreeMap::new();
                for (name, inner_field) in inner {
                    fields.insert(name.clone(), self.compile_field(inner_field, stack)?);
                }
                CompiledKind::Object(fields)
            }
            Kind::Reference(name) => {
                if !self.use_references {
                    return Err(CompileError::ReferencesDisabled(name.clone()));
                }
                if stack.iter().any(|seen| seen == name) {
                    return Err(CompileError::CircularReference(name.clone()));
                }
                let target = self
                    .references
                    .get(name)
                    .ok_or_else(|| CompileError::UnresolvedReference(name.clone()))?;
                stack.push(name.clone());
                let resolved = self.compile_field(target, stack)?;
                stack.pop();

                // the referencing field's own default/optional/codec win over
                // whatever the target declares
                return Ok(CompiledField {
                    kind: resolved.kind,
                    default: field.default.clone().or(resolved.default),
                    optional: field.optional || resolved.optional,
                    codec: field.codec.clone().or(resolved.codec),
                });
            }
        };
        Ok(CompiledField {
            kind,
            default: field.default.clone(),
            optional: field.optional,
            codec: field.codec.clone(),
        })
    }
}
