//! Input validation limits for schema definitions and instances

/// Maximum length for entity display names (256 chars)
pub const MAX_ENTITY_NAME_LEN: usize = 256;

/// Maximum length for entity and relationship type names (64 chars)
pub const MAX_TYPE_NAME_LEN: usize = 64;

/// Maximum length for field names (64 chars)
pub const MAX_FIELD_NAME_LEN: usize = 64;

/// Maximum fields per entity type (128)
pub const MAX_FIELDS_PER_TYPE: usize = 128;

/// Maximum allowed values for a single enum field (256)
pub const MAX_ENUM_VALUES: usize = 256;

/// Maximum length for summaries and relationship facts (64KB)
pub const MAX_TEXT_LEN: usize = 64 * 1024;

/// Maximum traversal depth (50)
pub const MAX_TRAVERSAL_DEPTH: u32 = 50;

/// Maximum entities or relationships in one import (1000)
pub const MAX_IMPORT_BATCH: usize = 1000;

/// Validation error type
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    EmptyEntityName,
    EntityNameTooLong { len: usize, max: usize },
    InvalidTypeName { name: String },
    InvalidFieldName { name: String },
    TooManyFields { count: usize, max: usize },
    TooManyEnumValues { count: usize, max: usize },
    TextTooLong { len: usize, max: usize },
    TraversalDepthTooLarge { depth: u32, max: u32 },
    BatchTooLarge { count: usize, max: usize },
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyEntityName => write!(f, "Entity name cannot be empty"),
            Self::EntityNameTooLong { len, max } => {
                write!(f, "Entity name too long: {} chars (max {})", len, max)
            }
            Self::InvalidTypeName { name } => write!(
                f,
                "Invalid type name '{}': expected lowercase letters, digits and underscores, starting with a letter (max {} chars)",
                name, MAX_TYPE_NAME_LEN
            ),
            Self::InvalidFieldName { name } => write!(
                f,
                "Invalid field name '{}': expected letters, digits and underscores (max {} chars)",
                name, MAX_FIELD_NAME_LEN
            ),
            Self::TooManyFields { count, max } => {
                write!(f, "Too many fields: {} (max {})", count, max)
            }
            Self::TooManyEnumValues { count, max } => {
                write!(f, "Too many enum values: {} (max {})", count, max)
            }
            Self::TextTooLong { len, max } => {
                write!(f, "Text too long: {} bytes (max {})", len, max)
            }
            Self::TraversalDepthTooLarge { depth, max } => {
                write!(f, "Traversal depth too large: {} (max {})", depth, max)
            }
            Self::BatchTooLarge { count, max } => {
                write!(f, "Too many items in batch: {} (max {})", count, max)
            }
        }
    }
}

impl std::error::Error for ValidationError {}

/// Validate entity display name
pub fn validate_entity_name(name: &str) -> Result<(), ValidationError> {
    if name.trim().is_empty() {
        return Err(ValidationError::EmptyEntityName);
    }
    if name.len() > MAX_ENTITY_NAME_LEN {
        return Err(ValidationError::EntityNameTooLong {
            len: name.len(),
            max: MAX_ENTITY_NAME_LEN,
        });
    }
    Ok(())
}

/// Validate an entity or relationship type name (`software_project`, `has_feature`)
pub fn validate_type_name(name: &str) -> Result<(), ValidationError> {
    let mut chars = name.chars();
    let valid = name.len() <= MAX_TYPE_NAME_LEN
        && chars.next().is_some_and(|c| c.is_ascii_lowercase())
        && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');
    if !valid {
        return Err(ValidationError::InvalidTypeName {
            name: name.to_string(),
        });
    }
    Ok(())
}

/// Validate a metadata field name
pub fn validate_field_name(name: &str) -> Result<(), ValidationError> {
    let valid = !name.is_empty()
        && name.len() <= MAX_FIELD_NAME_LEN
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if !valid {
        return Err(ValidationError::InvalidFieldName {
            name: name.to_string(),
        });
    }
    Ok(())
}

/// Validate field count of an entity type
pub fn validate_field_count(count: usize) -> Result<(), ValidationError> {
    if count > MAX_FIELDS_PER_TYPE {
        return Err(ValidationError::TooManyFields {
            count,
            max: MAX_FIELDS_PER_TYPE,
        });
    }
    Ok(())
}

/// Validate number of allowed values on an enum field
pub fn validate_enum_count(count: usize) -> Result<(), ValidationError> {
    if count > MAX_ENUM_VALUES {
        return Err(ValidationError::TooManyEnumValues {
            count,
            max: MAX_ENUM_VALUES,
        });
    }
    Ok(())
}

/// Validate a summary or fact
pub fn validate_text(text: &str) -> Result<(), ValidationError> {
    if text.len() > MAX_TEXT_LEN {
        return Err(ValidationError::TextTooLong {
            len: text.len(),
            max: MAX_TEXT_LEN,
        });
    }
    Ok(())
}

/// Validate traversal depth
pub fn validate_traversal_depth(depth: u32) -> Result<(), ValidationError> {
    if depth > MAX_TRAVERSAL_DEPTH {
        return Err(ValidationError::TraversalDepthTooLarge {
            depth,
            max: MAX_TRAVERSAL_DEPTH,
        });
    }
    Ok(())
}

/// Validate import batch size
pub fn validate_batch(count: usize) -> Result<(), ValidationError> {
    if count > MAX_IMPORT_BATCH {
        return Err(ValidationError::BatchTooLarge {
            count,
            max: MAX_IMPORT_BATCH,
        });
    }
    Ok(())
}
