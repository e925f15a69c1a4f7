// ABOUTME: Metadata specification types and verification
// ABOUTME: Checks required metadata keys and accumulates field-level errors

use std::fmt;

use serde::{Deserialize, Serialize};

use super::Meta;

/// Coarse type tags a specification may require for a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TypeTag {
    Bool,
    Int,
    Float,
    String,
    List,
    Meta,
    Any,
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TypeTag::Bool => "bool",
            TypeTag::Int => "int",
            TypeTag::Float => "float",
            TypeTag::String => "string",
            TypeTag::List => "list",
            TypeTag::Meta => "meta",
            TypeTag::Any => "any",
        };
        f.write_str(name)
    }
}

/// One required field: a name plus one or more acceptable types.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpecField {
    pub name: String,
    pub types: Vec<TypeTag>,
}

impl SpecField {
    pub fn new(name: impl Into<String>, types: impl IntoIterator<Item = TypeTag>) -> Self {
        Self {
            name: name.into(),
            types: types.into_iter().collect(),
        }
    }
}

/// What a task requires of its input metadata.
///
/// Either a record-type description (named, with ordered typed fields) or an
/// explicit field sequence. Both forms verify identically.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Specification {
    Record {
        type_name: String,
        fields: Vec<SpecField>,
    },
    Fields(Vec<SpecField>),
}

impl Specification {
    /// Start a record-type specification.
    pub fn record(type_name: impl Into<String>) -> Self {
        Specification::Record {
            type_name: type_name.into(),
            fields: Vec::new(),
        }
    }

    /// Build an explicit field-sequence specification.
    pub fn fields(fields: impl IntoIterator<Item = SpecField>) -> Self {
        Specification::Fields(fields.into_iter().collect())
    }

    /// Append a required field (builder style).
    pub fn field(mut self, name: impl Into<String>, types: impl IntoIterator<Item = TypeTag>) -> Self {
        let field = SpecField::new(name, types);
        match &mut self {
            Specification::Record { fields, .. } => fields.push(field),
            Specification::Fields(fields) => fields.push(field),
        }
        self
    }

    pub fn required_fields(&self) -> &[SpecField] {
        match self {
            Specification::Record { fields, .. } => fields,
            Specification::Fields(fields) => fields,
        }
    }
}

/// A required field that was absent from the verified metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetaFieldError {
    pub required_key: String,
    pub required_types: Vec<TypeTag>,
}

impl fmt::Display for MetaFieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let types: Vec<String> = self.required_types.iter().map(|t| t.to_string()).collect();
        write!(
            f,
            "missing required field '{}' (expected {})",
            self.required_key,
            types.join(" | ")
        )
    }
}

/// Outcome of verifying a metadata tree against a specification.
///
/// Field errors are accumulated, never raised individually, so a caller can
/// present every missing field at once.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Verification {
    errors: Vec<MetaFieldError>,
}

impl Verification {
    /// Check that every required key of `specification` is present in `meta`.
    ///
    /// Absence is the only checked condition; values are not type-checked.
    pub fn verify(meta: &Meta, specification: &Specification) -> Verification {
        let mut errors = Vec::new();

        for field in specification.required_fields() {
            if !meta.contains_key(&field.name) {
                errors.push(MetaFieldError {
                    required_key: field.name.clone(),
                    required_types: field.types.clone(),
                });
            }
        }

        Verification { errors }
    }

    /// True iff no field errors were collected.
    pub fn succeeded(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn errors(&self) -> &[MetaFieldError] {
        &self.errors
    }
}
