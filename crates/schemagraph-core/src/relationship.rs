//! Relationship (edge) types
//!
//! Relationships are never deleted. Retiring one sets `valid_to`, which keeps
//! the full history available to as-of queries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::entity::EntityId;

/// Unique identifier for a relationship
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RelationshipId(pub Ulid);

impl RelationshipId {
    pub fn new() -> Self {
        Self(Ulid::new())
    }

    pub fn from_string(s: &str) -> Result<Self, ulid::DecodeError> {
        Ok(Self(Ulid::from_string(s)?))
    }
}

impl Default for RelationshipId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RelationshipId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for RelationshipId {
    type Err = ulid::DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_string(s)
    }
}

/// Direction for graph traversal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Follow edges from source to target
    #[default]
    Outgoing,
    /// Follow edges from target back to source
    Incoming,
    Both,
}

impl std::str::FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "outgoing" | "out" => Ok(Self::Outgoing),
            "incoming" | "in" => Ok(Self::Incoming),
            "both" => Ok(Self::Both),
            other => Err(format!("unknown direction: {}", other)),
        }
    }
}

/// A directed, temporally scoped relationship between two entities
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    /// Unique identifier
    pub id: RelationshipId,

    /// Registered relationship type (e.g. "has_feature")
    pub relationship_type: String,

    /// Source entity ID
    pub source_id: EntityId,

    /// Target entity ID
    pub target_id: EntityId,

    /// Free-text statement of the relationship
    pub fact: String,

    /// When the fact became true
    pub valid_from: DateTime<Utc>,

    /// When the fact stopped being true; `None` while still valid
    #[serde(default)]
    pub valid_to: Option<DateTime<Utc>>,

    /// When the relationship was recorded
    pub created_at: DateTime<Utc>,
}

impl Relationship {
    /// Create an open relationship
    pub fn new(
        relationship_type: impl Into<String>,
        source_id: EntityId,
        target_id: EntityId,
        fact: impl Into<String>,
        valid_from: DateTime<Utc>,
    ) -> Self {
        Self {
            id: RelationshipId::new(),
            relationship_type: relationship_type.into(),
            source_id,
            target_id,
            fact: fact.into(),
            valid_from,
            valid_to: None,
            created_at: Utc::now(),
        }
    }

    /// Still valid (not superseded)
    pub fn is_current(&self) -> bool {
        self.valid_to.is_none()
    }

    /// Valid at instant `at`: `valid_from <= at < valid_to`
    pub fn was_valid_at(&self, at: DateTime<Utc>) -> bool {
        self.valid_from <= at && self.valid_to.map_or(true, |end| end > at)
    }

    /// Whether the entity is either endpoint
    pub fn touches(&self, id: &EntityId) -> bool {
        &self.source_id == id || &self.target_id == id
    }

    /// The endpoint opposite to `id`, if `id` is an endpoint
    pub fn other_end(&self, id: &EntityId) -> Option<&EntityId> {
        if &self.source_id == id {
            Some(&self.target_id)
        } else if &self.target_id == id {
            Some(&self.source_id)
        } else {
            None
        }
    }
}

/// Data for creating a new relationship
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewRelationship {
    pub relationship_type: String,
    pub source_id: EntityId,
    pub target_id: EntityId,
    #[serde(default)]
    pub fact: String,
    /// Defaults to the creation time when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valid_from: Option<DateTime<Utc>>,
}

impl NewRelationship {
    pub fn new(
        relationship_type: impl Into<String>,
        source_id: EntityId,
        target_id: EntityId,
    ) -> Self {
        Self {
            relationship_type: relationship_type.into(),
            source_id,
            target_id,
            fact: String::new(),
            valid_from: None,
        }
    }

    pub fn with_fact(mut self, fact: impl Into<String>) -> Self {
        self.fact = fact.into();
        self
    }

    pub fn valid_from(mut self, at: DateTime<Utc>) -> Self {
        self.valid_from = Some(at);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_relationship_creation() {
        let source = EntityId::new();
        let target = EntityId::new();
        let t0 = Utc::now();

        let rel = Relationship::new(
            "has_feature",
            source.clone(),
            target.clone(),
            "AgentForge includes the Feed System feature",
            t0,
        );

        assert_eq!(rel.relationship_type, "has_feature");
        assert!(rel.is_current());
        assert!(rel.touches(&source));
        assert_eq!(rel.other_end(&source), Some(&target));
        assert_eq!(rel.other_end(&EntityId::new()), None);
    }

    #[test]
    fn test_validity_window() {
        let t0 = Utc::now();
        let mut rel = Relationship::new("depends_on", EntityId::new(), EntityId::new(), "", t0);

        assert!(!rel.was_valid_at(t0 - Duration::seconds(1)));
        assert!(rel.was_valid_at(t0));
        assert!(rel.was_valid_at(t0 + Duration::days(365)));

        rel.valid_to = Some(t0 + Duration::hours(1));
        assert!(!rel.is_current());
        assert!(rel.was_valid_at(t0 + Duration::minutes(59)));
        assert!(!rel.was_valid_at(t0 + Duration::hours(1)));
    }

    #[test]
    fn test_direction_parse() {
        assert_eq!("outgoing".parse::<Direction>(), Ok(Direction::Outgoing));
        assert_eq!("IN".parse::<Direction>(), Ok(Direction::Incoming));
        assert_eq!("both".parse::<Direction>(), Ok(Direction::Both));
        assert!("sideways".parse::<Direction>().is_err());
    }
}
