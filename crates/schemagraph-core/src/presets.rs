//! Built-in schema presets

use std::collections::HashSet;

use crate::graph::{ImportDocument, ImportRelationship};
use crate::schema::{
    EntityTypeDefinition, FieldDefinition, FieldKind, RelationshipTypeDefinition, SchemaDocument,
};

pub const PROJECT_STATUS: &[&str] = &["active", "maintenance", "deprecated", "archived"];
pub const FEATURE_STATUS: &[&str] = &["planned", "in_progress", "completed", "deprecated"];
pub const PRIORITY: &[&str] = &["critical", "high", "medium", "low"];
pub const COMPONENT_TYPE: &[&str] = &["service", "module", "library", "package", "plugin"];

/// Names accepted by [`preset`]
pub const PRESET_NAMES: &[&str] = &["software_project"];

/// Look up a preset by name
pub fn preset(name: &str) -> Option<SchemaDocument> {
    match name {
        "software_project" => Some(software_project()),
        _ => None,
    }
}

fn text(name: &str) -> FieldDefinition {
    FieldDefinition::new(name, FieldKind::String)
}

/// Projects, their features and components, and component dependencies
pub fn software_project() -> SchemaDocument {
    let project = EntityTypeDefinition::new("software_project")
        .with_description("Root entity for a software project")
        .with_field(text("name").required())
        .with_field(text("repo_url"))
        .with_field(text("language"))
        .with_field(text("framework"))
        .with_field(text("version"))
        .with_field(FieldDefinition::enumeration("status", PROJECT_STATUS.iter().copied()))
        .with_field(text("description"))
        .with_field(text("license"));

    let feature = EntityTypeDefinition::new("feature")
        .with_description("A major capability or functional area")
        .with_field(text("name").required())
        .with_field(FieldDefinition::enumeration("status", FEATURE_STATUS.iter().copied()))
        .with_field(FieldDefinition::enumeration("priority", PRIORITY.iter().copied()))
        .with_field(text("release_version"))
        .with_field(text("description"));

    let component = EntityTypeDefinition::new("component")
        .with_description("An architectural component, service, or module")
        .with_field(text("name").required())
        .with_field(FieldDefinition::enumeration("type", COMPONENT_TYPE.iter().copied()))
        .with_field(text("path"))
        .with_field(text("language"))
        .with_field(FieldDefinition::array_of("dependencies", FieldKind::String))
        .with_field(text("description"));

    SchemaDocument::new()
        .with_entity_type(project)
        .with_entity_type(feature)
        .with_entity_type(component)
        .with_relationship_type(
            RelationshipTypeDefinition::new("has_feature", "software_project", "feature")
                .with_description("Project includes a feature"),
        )
        .with_relationship_type(
            RelationshipTypeDefinition::new("has_component", "software_project", "component")
                .with_description("Project contains a component"),
        )
        .with_relationship_type(
            RelationshipTypeDefinition::new("depends_on", "component", "component")
                .with_description("Component depends on another component"),
        )
}

/// Add a `depends_on` relationship for every component dependency that names
/// another component of the document. External packages are left alone.
/// Returns the number of relationships added.
pub fn link_component_dependencies(document: &mut ImportDocument) -> usize {
    let components: HashSet<&str> = document
        .entities
        .iter()
        .filter(|e| e.entity_type == "component")
        .map(|e| e.name.as_str())
        .collect();

    let mut links = Vec::new();
    for component in document.entities.iter().filter(|e| e.entity_type == "component") {
        let Some(dependencies) = component.metadata.get("dependencies").and_then(|v| v.as_array())
        else {
            continue;
        };
        for dep in dependencies.iter().filter_map(|d| d.as_str()) {
            if dep != component.name && components.contains(dep) {
                links.push(ImportRelationship {
                    source: component.name.clone(),
                    target: dep.to_string(),
                    relationship_type: "depends_on".to_string(),
                    fact: format!("{} depends on {}", component.name, dep),
                    valid_from: None,
                });
            }
        }
    }

    let added = links.len();
    document.relationships.extend(links);
    added
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::NewEntity;
    use crate::registry::SchemaRegistry;
    use serde_json::json;

    #[test]
    fn test_software_project_preset_registers() {
        let doc = preset("software_project").unwrap();
        let registry = SchemaRegistry::from_document(&doc).unwrap();

        assert_eq!(registry.entity_types().unwrap().len(), 3);
        assert_eq!(registry.relationship_types().unwrap().len(), 3);

        let component = registry.lookup_entity_type("component").unwrap();
        assert_eq!(component.field("type").unwrap().enum_values, COMPONENT_TYPE);
        assert_eq!(
            component.field("dependencies").unwrap().items,
            Some(FieldKind::String)
        );
    }

    #[test]
    fn test_unknown_preset() {
        assert!(preset("crm").is_none());
    }

    #[test]
    fn test_link_component_dependencies() {
        let mut document = ImportDocument {
            entities: vec![
                NewEntity::new("component", "API Routes")
                    .with_field("dependencies", json!(["Next.js", "Prisma", "Workflow Engine"])),
                NewEntity::new("component", "Workflow Engine")
                    .with_field("dependencies", json!(["LangChain", "OpenAI"])),
                NewEntity::new("feature", "Prisma"),
            ],
            ..ImportDocument::default()
        };

        assert_eq!(link_component_dependencies(&mut document), 1);
        let link = &document.relationships[0];
        assert_eq!(link.source, "API Routes");
        assert_eq!(link.target, "Workflow Engine");
        assert_eq!(link.relationship_type, "depends_on");
        assert_eq!(link.fact, "API Routes depends on Workflow Engine");
    }

    #[test]
    fn test_external_dependencies_not_linked() {
        let mut document = ImportDocument {
            entities: vec![NewEntity::new("component", "MCP Integration")
                .with_field("dependencies", json!(["@modelcontextprotocol/sdk"]))],
            ..ImportDocument::default()
        };
        assert_eq!(link_component_dependencies(&mut document), 0);
        assert!(document.relationships.is_empty());
    }
}
