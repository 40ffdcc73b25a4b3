//! Entity and relationship type definitions
//!
//! Types are data, not Rust types: a registry of definition records is
//! interpreted by the validator at write time, so the set of entity and
//! relationship types stays user-extensible.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::limits;

/// Name of the implicit display-name field
pub const NAME_FIELD: &str = "name";

/// Kind of value a metadata field accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    String,
    Integer,
    Number,
    Boolean,
    Enum,
    Array,
    Object,
    Datetime,
    Any,
}

impl FieldKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Enum => "enum",
            Self::Array => "array",
            Self::Object => "object",
            Self::Datetime => "datetime",
            Self::Any => "any",
        }
    }
}

impl std::fmt::Display for FieldKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for FieldKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "string" => Ok(Self::String),
            "integer" | "int" => Ok(Self::Integer),
            "number" => Ok(Self::Number),
            "boolean" | "bool" => Ok(Self::Boolean),
            "enum" => Ok(Self::Enum),
            "array" => Ok(Self::Array),
            "object" => Ok(Self::Object),
            "datetime" => Ok(Self::Datetime),
            "any" => Ok(Self::Any),
            other => Err(format!("unknown field kind: {}", other)),
        }
    }
}

/// A single field of an entity type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDefinition {
    /// Field name (key in entity metadata)
    pub name: String,

    /// Accepted value kind
    pub kind: FieldKind,

    /// Whether the field must be present (and non-null)
    #[serde(default)]
    pub required: bool,

    /// Allowed values when `kind` is `enum` (or `array` of `enum`)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub enum_values: Vec<String>,

    /// Element kind when `kind` is `array`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<FieldKind>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl FieldDefinition {
    /// Create an optional field of the given kind
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            required: false,
            enum_values: Vec::new(),
            items: None,
            description: None,
        }
    }

    /// Create an optional enum field
    pub fn enumeration<I, S>(name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut field = Self::new(name, FieldKind::Enum);
        field.enum_values = values.into_iter().map(Into::into).collect();
        field
    }

    /// Create an optional array field with element kind
    pub fn array_of(name: impl Into<String>, items: FieldKind) -> Self {
        let mut field = Self::new(name, FieldKind::Array);
        field.items = Some(items);
        field
    }

    /// Mark the field as required
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Whether this field constrains values to `enum_values`
    pub fn is_enum(&self) -> bool {
        self.kind == FieldKind::Enum
            || (self.kind == FieldKind::Array && self.items == Some(FieldKind::Enum))
    }

    fn check(&self, owner: &str) -> Result<()> {
        limits::validate_field_name(&self.name)?;

        if self.is_enum() {
            if self.enum_values.is_empty() {
                return Err(Error::invalid_definition(
                    owner,
                    format!("enum field '{}' has no allowed values", self.name),
                ));
            }
            limits::validate_enum_count(self.enum_values.len())?;
            let mut seen = HashSet::new();
            if let Some(dup) = self.enum_values.iter().find(|v| !seen.insert(v.as_str())) {
                return Err(Error::invalid_definition(
                    owner,
                    format!("enum field '{}' repeats value '{}'", self.name, dup),
                ));
            }
        } else if !self.enum_values.is_empty() {
            return Err(Error::invalid_definition(
                owner,
                format!("field '{}' of kind {} cannot list enum values", self.name, self.kind),
            ));
        }

        match (self.kind, self.items) {
            (FieldKind::Array, Some(FieldKind::Array)) => Err(Error::invalid_definition(
                owner,
                format!("array field '{}' cannot nest arrays", self.name),
            )),
            (FieldKind::Array, _) | (_, None) => Ok(()),
            (kind, Some(_)) => Err(Error::invalid_definition(
                owner,
                format!("field '{}' of kind {} cannot declare items", self.name, kind),
            )),
        }
    }
}

/// Definition of an entity type (e.g. `software_project`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityTypeDefinition {
    /// Unique type name
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Ordered field list
    #[serde(default)]
    pub fields: Vec<FieldDefinition>,
}

impl EntityTypeDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            fields: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_field(mut self, field: FieldDefinition) -> Self {
        self.fields.push(field);
        self
    }

    /// Look up a field by name
    pub fn field(&self, name: &str) -> Option<&FieldDefinition> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn required_fields(&self) -> impl Iterator<Item = &FieldDefinition> {
        self.fields.iter().filter(|f| f.required)
    }

    /// Check structural invariants: valid names, unique fields, coherent enums
    pub fn check(&self) -> Result<()> {
        limits::validate_type_name(&self.name)?;
        limits::validate_field_count(self.fields.len())?;

        let mut seen = HashSet::new();
        for field in &self.fields {
            if !seen.insert(field.name.as_str()) {
                return Err(Error::invalid_definition(
                    &self.name,
                    format!("duplicate field '{}'", field.name),
                ));
            }
            field.check(&self.name)?;
        }

        if let Some(name_field) = self.field(NAME_FIELD) {
            if !matches!(name_field.kind, FieldKind::String | FieldKind::Any) {
                return Err(Error::invalid_definition(
                    &self.name,
                    format!("field '{}' must be a string", NAME_FIELD),
                ));
            }
        }
        Ok(())
    }
}

/// Definition of a directed relationship type (e.g. `has_feature`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationshipTypeDefinition {
    /// Unique relationship type name
    pub name: String,

    /// Entity type allowed at the source end
    pub source_type: String,

    /// Entity type allowed at the target end
    pub target_type: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl RelationshipTypeDefinition {
    pub fn new(
        name: impl Into<String>,
        source_type: impl Into<String>,
        target_type: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            source_type: source_type.into(),
            target_type: target_type.into(),
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn check(&self) -> Result<()> {
        limits::validate_type_name(&self.name)?;
        limits::validate_type_name(&self.source_type)?;
        limits::validate_type_name(&self.target_type)?;
        Ok(())
    }
}

/// The registry document: every registered type, in registration order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchemaDocument {
    #[serde(default)]
    pub entity_types: Vec<EntityTypeDefinition>,

    #[serde(default)]
    pub relationship_types: Vec<RelationshipTypeDefinition>,
}

impl SchemaDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entity_type(mut self, def: EntityTypeDefinition) -> Self {
        self.entity_types.push(def);
        self
    }

    pub fn with_relationship_type(mut self, def: RelationshipTypeDefinition) -> Self {
        self.relationship_types.push(def);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.entity_types.is_empty() && self.relationship_types.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn project_type() -> EntityTypeDefinition {
        EntityTypeDefinition::new("software_project")
            .with_field(FieldDefinition::new("name", FieldKind::String).required())
            .with_field(FieldDefinition::enumeration(
                "status",
                ["active", "maintenance", "deprecated", "archived"],
            ))
    }

    #[test]
    fn test_entity_type_builder() {
        let def = project_type();
        assert_eq!(def.fields.len(), 2);
        assert_eq!(def.required_fields().count(), 1);
        assert!(def.field("status").unwrap().is_enum());
        assert!(def.field("missing").is_none());
        assert!(def.check().is_ok());
    }

    #[test]
    fn test_field_kind_from_str() {
        assert_eq!("integer".parse::<FieldKind>().unwrap(), FieldKind::Integer);
        assert_eq!("Bool".parse::<FieldKind>().unwrap(), FieldKind::Boolean);
        assert!("float".parse::<FieldKind>().is_err());
    }

    #[test]
    fn test_duplicate_field_rejected() {
        let def = project_type().with_field(FieldDefinition::new("status", FieldKind::String));
        let err = def.check().unwrap_err();
        assert!(matches!(err, Error::InvalidDefinition { .. }));
    }

    #[test]
    fn test_enum_without_values_rejected() {
        let def = EntityTypeDefinition::new("feature")
            .with_field(FieldDefinition::new("status", FieldKind::Enum));
        assert!(def.check().is_err());
    }

    #[test]
    fn test_enum_values_on_string_rejected() {
        let mut field = FieldDefinition::new("language", FieldKind::String);
        field.enum_values = vec!["rust".to_string()];
        let def = EntityTypeDefinition::new("component").with_field(field);
        assert!(def.check().is_err());
    }

    #[test]
    fn test_items_only_on_arrays() {
        let ok = EntityTypeDefinition::new("component")
            .with_field(FieldDefinition::array_of("dependencies", FieldKind::String));
        assert!(ok.check().is_ok());

        let mut field = FieldDefinition::new("path", FieldKind::String);
        field.items = Some(FieldKind::String);
        let bad = EntityTypeDefinition::new("component").with_field(field);
        assert!(bad.check().is_err());

        let nested = EntityTypeDefinition::new("component")
            .with_field(FieldDefinition::array_of("matrix", FieldKind::Array));
        assert!(nested.check().is_err());
    }

    #[test]
    fn test_name_field_must_be_string() {
        let def = EntityTypeDefinition::new("feature")
            .with_field(FieldDefinition::new("name", FieldKind::Integer));
        assert!(def.check().is_err());
    }

    #[test]
    fn test_field_kind_serde() {
        let field: FieldDefinition =
            serde_json::from_str(r#"{"name":"version","kind":"string"}"#).unwrap();
        assert_eq!(field.kind, FieldKind::String);
        assert!(!field.required);

        let json = serde_json::to_string(&FieldDefinition::new("ok", FieldKind::Datetime)).unwrap();
        assert!(json.contains(r#""kind":"datetime""#));
        assert!(!json.contains("enum_values"));
    }

    #[test]
    fn test_relationship_type_check() {
        let def = RelationshipTypeDefinition::new("has_component", "software_project", "component");
        assert!(def.check().is_ok());
        let bad = RelationshipTypeDefinition::new("has-component", "software_project", "component");
        assert!(bad.check().is_err());
    }
}
