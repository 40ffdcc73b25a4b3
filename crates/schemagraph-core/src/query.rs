//! Filters for querying entities and relationships

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::entity::{Entity, EntityId, Metadata};
use crate::relationship::Relationship;

/// Relationship query filter; every set criterion must match
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RelationshipFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_id: Option<EntityId>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_id: Option<EntityId>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relationship_type: Option<String>,

    /// Only relationships valid at this instant
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub as_of: Option<DateTime<Utc>>,

    /// Only relationships not yet superseded
    #[serde(default)]
    pub current_only: bool,
}

impl RelationshipFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn source(mut self, id: EntityId) -> Self {
        self.source_id = Some(id);
        self
    }

    pub fn target(mut self, id: EntityId) -> Self {
        self.target_id = Some(id);
        self
    }

    pub fn of_type(mut self, relationship_type: impl Into<String>) -> Self {
        self.relationship_type = Some(relationship_type.into());
        self
    }

    pub fn as_of(mut self, at: DateTime<Utc>) -> Self {
        self.as_of = Some(at);
        self
    }

    pub fn current(mut self) -> Self {
        self.current_only = true;
        self
    }

    pub fn matches(&self, rel: &Relationship) -> bool {
        if let Some(ref id) = self.source_id {
            if &rel.source_id != id {
                return false;
            }
        }
        if let Some(ref id) = self.target_id {
            if &rel.target_id != id {
                return false;
            }
        }
        if let Some(ref rel_type) = self.relationship_type {
            if &rel.relationship_type != rel_type {
                return false;
            }
        }
        if let Some(at) = self.as_of {
            if !rel.was_valid_at(at) {
                return false;
            }
        }
        !(self.current_only && !rel.is_current())
    }
}

/// Order relationships by recording time, ties broken by id
pub fn sort_relationships(relationships: &mut [Relationship]) {
    relationships.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
}

/// Entity filter for `find_by_type`: entity type plus metadata predicates.
///
/// A metadata predicate matches when the entity's field equals the value,
/// or, for array fields, when the array contains it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_type: Option<String>,

    #[serde(default)]
    pub metadata: Metadata,
}

impl EntityFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn of_type(entity_type: impl Into<String>) -> Self {
        Self {
            entity_type: Some(entity_type.into()),
            metadata: Metadata::new(),
        }
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn matches(&self, entity: &Entity) -> bool {
        if let Some(ref entity_type) = self.entity_type {
            if entity.entity_type.as_str() != entity_type.as_str() {
                return false;
            }
        }

        self.metadata.iter().all(|(key, expected)| match entity.field(key) {
            Some(Value::Array(items)) if !expected.is_array() => items.contains(expected),
            Some(actual) => &actual == expected,
            None => expected.is_null(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use serde_json::json;

    fn component(name: &str, deps: Value) -> Entity {
        let mut metadata = Metadata::new();
        metadata.insert("type".to_string(), json!("module"));
        metadata.insert("dependencies".to_string(), deps);
        Entity::new("component", name).with_metadata(metadata)
    }

    #[test]
    fn test_entity_filter_equality_and_containment() {
        let engine = component("Workflow Engine", json!(["LangChain", "OpenAI"]));

        assert!(EntityFilter::of_type("component").matches(&engine));
        assert!(!EntityFilter::of_type("feature").matches(&engine));
        assert!(EntityFilter::of_type("component")
            .with_field("type", "module")
            .matches(&engine));
        assert!(!EntityFilter::of_type("component")
            .with_field("type", "service")
            .matches(&engine));
        assert!(EntityFilter::new()
            .with_field("dependencies", "OpenAI")
            .matches(&engine));
        assert!(EntityFilter::new()
            .with_field("dependencies", json!(["LangChain", "OpenAI"]))
            .matches(&engine));
        assert!(EntityFilter::new()
            .with_field("name", "Workflow Engine")
            .matches(&engine));
        assert!(!EntityFilter::new().with_field("path", "src/").matches(&engine));
    }

    #[test]
    fn test_relationship_filter() {
        let a = EntityId::new();
        let b = EntityId::new();
        let t0 = Utc::now();
        let mut rel = Relationship::new("depends_on", a.clone(), b.clone(), "a depends on b", t0);

        assert!(RelationshipFilter::new().matches(&rel));
        assert!(RelationshipFilter::new().source(a.clone()).matches(&rel));
        assert!(!RelationshipFilter::new().source(b.clone()).matches(&rel));
        assert!(RelationshipFilter::new().target(b.clone()).matches(&rel));
        assert!(!RelationshipFilter::new().of_type("has_feature").matches(&rel));
        assert!(!RelationshipFilter::new()
            .as_of(t0 - Duration::seconds(1))
            .matches(&rel));
        assert!(RelationshipFilter::new()
            .as_of(t0 + Duration::seconds(1))
            .matches(&rel));

        rel.valid_to = Some(t0 + Duration::minutes(5));
        assert!(!RelationshipFilter::new().current().matches(&rel));
        assert!(RelationshipFilter::new()
            .as_of(t0 + Duration::minutes(1))
            .matches(&rel));
    }

    #[test]
    fn test_sort_relationships() {
        let t0 = Utc::now();
        let mut first = Relationship::new("depends_on", EntityId::new(), EntityId::new(), "", t0);
        let mut second = first.clone();
        second.id = crate::relationship::RelationshipId::new();
        second.created_at = t0 + Duration::seconds(1);
        first.created_at = t0;

        let mut rels = vec![second.clone(), first.clone()];
        sort_relationships(&mut rels);
        assert_eq!(rels[0].id, first.id);
        assert_eq!(rels[1].id, second.id);
    }
}
