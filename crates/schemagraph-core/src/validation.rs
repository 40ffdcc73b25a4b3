//! Validation of entity metadata and relationship endpoints against schemas
//!
//! Pure functions: nothing here touches a store. Every violation of an
//! instance is collected, not just the first one.

use chrono::DateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::entity::{Entity, Metadata};
use crate::error::{Error, Result};
use crate::schema::{EntityTypeDefinition, FieldDefinition, FieldKind, RelationshipTypeDefinition, NAME_FIELD};

/// Broad category of a violation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    MissingField,
    TypeMismatch,
    InvalidEnumValue,
}

/// Which end of a relationship
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Endpoint {
    Source,
    Target,
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Source => f.write_str("source"),
            Self::Target => f.write_str("target"),
        }
    }
}

/// A single schema violation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "violation", rename_all = "snake_case")]
pub enum Violation {
    MissingField {
        field: String,
    },
    TypeMismatch {
        field: String,
        expected: FieldKind,
        actual: String,
    },
    InvalidEnumValue {
        field: String,
        value: String,
        allowed: Vec<String>,
    },
    EndpointTypeMismatch {
        endpoint: Endpoint,
        expected: String,
        actual: String,
    },
}

impl Violation {
    pub fn kind(&self) -> ViolationKind {
        match self {
            Self::MissingField { .. } => ViolationKind::MissingField,
            Self::TypeMismatch { .. } | Self::EndpointTypeMismatch { .. } => {
                ViolationKind::TypeMismatch
            }
            Self::InvalidEnumValue { .. } => ViolationKind::InvalidEnumValue,
        }
    }
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingField { field } => write!(f, "missing required field '{}'", field),
            Self::TypeMismatch {
                field,
                expected,
                actual,
            } => write!(f, "field '{}' expected {}, got {}", field, expected, actual),
            Self::InvalidEnumValue {
                field,
                value,
                allowed,
            } => write!(
                f,
                "field '{}' has invalid value '{}' (allowed: {})",
                field,
                value,
                allowed.join(", ")
            ),
            Self::EndpointTypeMismatch {
                endpoint,
                expected,
                actual,
            } => write!(
                f,
                "{} entity must be of type {}, got {}",
                endpoint, expected, actual
            ),
        }
    }
}

/// Outcome of validating one instance
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationReport {
    pub violations: Vec<Violation>,
    /// Metadata keys not declared by the type; accepted, but worth a warning
    pub unknown_fields: Vec<String>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.violations.is_empty()
    }

    /// Turn violations into a `SchemaViolation` error for `subject`
    pub fn into_result(self, subject: impl Into<String>) -> Result<()> {
        if self.violations.is_empty() {
            Ok(())
        } else {
            Err(Error::SchemaViolation {
                subject: subject.into(),
                violations: self.violations,
            })
        }
    }
}

/// Validate entity metadata against its type definition.
///
/// `name` is the entity's display name; it satisfies a declared `name`
/// field when metadata does not carry one. JSON `null` counts as absent.
pub fn validate_entity(def: &EntityTypeDefinition, name: &str, metadata: &Metadata) -> ValidationReport {
    let mut report = ValidationReport::default();

    for field in &def.fields {
        match metadata.get(&field.name) {
            Some(value) if !value.is_null() => {
                if let Some(violation) = check_value(field, value) {
                    report.violations.push(violation);
                }
            }
            _ if field.name == NAME_FIELD && !name.trim().is_empty() => {}
            _ if field.required => report.violations.push(Violation::MissingField {
                field: field.name.clone(),
            }),
            _ => {}
        }
    }

    report.unknown_fields = metadata
        .keys()
        .filter(|key| def.field(key).is_none())
        .cloned()
        .collect();

    report
}

/// Validate that relationship endpoints have the entity types the
/// relationship type allows
pub fn validate_relationship(
    def: &RelationshipTypeDefinition,
    source: &Entity,
    target: &Entity,
) -> ValidationReport {
    let mut report = ValidationReport::default();
    check_endpoint(&mut report, Endpoint::Source, &def.source_type, source.entity_type.as_str());
    check_endpoint(&mut report, Endpoint::Target, &def.target_type, target.entity_type.as_str());
    report
}

/// Same check as [`validate_relationship`] when only the endpoint type
/// names are known (e.g. entities not yet written during an import)
pub fn validate_endpoint_types(
    def: &RelationshipTypeDefinition,
    source_type: &str,
    target_type: &str,
) -> ValidationReport {
    let mut report = ValidationReport::default();
    check_endpoint(&mut report, Endpoint::Source, &def.source_type, source_type);
    check_endpoint(&mut report, Endpoint::Target, &def.target_type, target_type);
    report
}

fn check_endpoint(report: &mut ValidationReport, endpoint: Endpoint, expected: &str, actual: &str) {
    if expected != actual {
        report.violations.push(Violation::EndpointTypeMismatch {
            endpoint,
            expected: expected.to_string(),
            actual: actual.to_string(),
        });
    }
}

/// Check one present, non-null value against its field definition
pub fn check_value(field: &FieldDefinition, value: &Value) -> Option<Violation> {
    if field.kind == FieldKind::Array {
        let Some(elements) = value.as_array() else {
            return Some(mismatch(&field.name, FieldKind::Array, value));
        };
        let items = field.items?;
        return elements.iter().enumerate().find_map(|(i, element)| {
            check_kind(&format!("{}[{}]", field.name, i), items, &field.enum_values, element)
        });
    }
    check_kind(&field.name, field.kind, &field.enum_values, value)
}

fn check_kind(field: &str, kind: FieldKind, enum_values: &[String], value: &Value) -> Option<Violation> {
    let ok = match kind {
        FieldKind::String => value.is_string(),
        FieldKind::Integer => value.is_i64() || value.is_u64(),
        FieldKind::Number => value.is_number(),
        FieldKind::Boolean => value.is_boolean(),
        FieldKind::Array => value.is_array(),
        FieldKind::Object => value.is_object(),
        FieldKind::Any => true,
        FieldKind::Datetime => match value.as_str() {
            Some(s) => DateTime::parse_from_rfc3339(s).is_ok(),
            None => false,
        },
        FieldKind::Enum => {
            let Some(s) = value.as_str() else {
                return Some(mismatch(field, kind, value));
            };
            if enum_values.iter().any(|allowed| allowed == s) {
                return None;
            }
            return Some(Violation::InvalidEnumValue {
                field: field.to_string(),
                value: s.to_string(),
                allowed: enum_values.to_vec(),
            });
        }
    };

    if ok {
        None
    } else {
        Some(mismatch(field, kind, value))
    }
}

fn mismatch(field: &str, expected: FieldKind, value: &Value) -> Violation {
    let actual = match (expected, value) {
        (FieldKind::Datetime, Value::String(_)) => "string (not RFC 3339)",
        _ => describe(value),
    };
    Violation::TypeMismatch {
        field: field.to_string(),
        expected,
        actual: actual.to_string(),
    }
}

/// Short name of a JSON value's kind
pub fn describe(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_i64() || n.is_u64() => "integer",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
