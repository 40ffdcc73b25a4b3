//! Graph traversal types and algorithms

use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entity::{Entity, EntityId};
use crate::relationship::{Direction, Relationship, RelationshipId};

/// Traversal query builder
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraversalQuery {
    /// Starting entity
    pub start: EntityId,

    /// Target entity (for path finding, None for general traversal)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<EntityId>,

    /// Maximum traversal depth
    #[serde(default = "default_depth")]
    pub max_depth: u32,

    /// Traversal direction
    #[serde(default)]
    pub direction: Direction,

    /// Filter by relationship types (empty = all types)
    #[serde(default)]
    pub relationship_type_filter: Vec<String>,

    /// Filter by entity types of visited nodes (empty = all types)
    #[serde(default)]
    pub entity_type_filter: Vec<String>,

    /// Follow relationships valid at this instant instead of current ones
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub as_of: Option<DateTime<Utc>>,
}

fn default_depth() -> u32 {
    3
}

impl TraversalQuery {
    /// Create a new traversal query starting from an entity
    pub fn new(start: EntityId) -> Self {
        Self {
            start,
            target: None,
            max_depth: default_depth(),
            direction: Direction::default(),
            relationship_type_filter: Vec::new(),
            entity_type_filter: Vec::new(),
            as_of: None,
        }
    }

    /// Set target for path finding
    pub fn find_path_to(mut self, target: EntityId) -> Self {
        self.target = Some(target);
        self
    }

    /// Set maximum traversal depth
    pub fn with_depth(mut self, depth: u32) -> Self {
        self.max_depth = depth;
        self
    }

    /// Set traversal direction
    pub fn with_direction(mut self, direction: Direction) -> Self {
        self.direction = direction;
        self
    }

    /// Only follow relationships of these types
    pub fn filter_relationship_types(mut self, types: Vec<String>) -> Self {
        self.relationship_type_filter = types;
        self
    }

    /// Only visit entities of these types
    pub fn filter_entity_types(mut self, types: Vec<String>) -> Self {
        self.entity_type_filter = types;
        self
    }

    /// Traverse the graph as it was at `at`
    pub fn as_of(mut self, at: DateTime<Utc>) -> Self {
        self.as_of = Some(at);
        self
    }

    fn follows(&self, rel: &Relationship) -> bool {
        let valid = match self.as_of {
            Some(at) => rel.was_valid_at(at),
            None => rel.is_current(),
        };
        valid
            && (self.relationship_type_filter.is_empty()
                || self.relationship_type_filter.contains(&rel.relationship_type))
    }

    fn admits(&self, entity: &Entity) -> bool {
        self.entity_type_filter.is_empty()
            || self
                .entity_type_filter
                .iter()
                .any(|t| t == entity.entity_type.as_str())
    }
}

/// An entity reached by a traversal, with its BFS depth
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReachedEntity {
    pub entity: Entity,
    pub depth: u32,
}

/// A single path through the graph
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphPath {
    /// Ordered entity ids along the path
    pub nodes: Vec<EntityId>,

    /// Relationships connecting the nodes
    pub edges: Vec<PathEdge>,

    /// Path length (number of edges)
    pub length: usize,
}

/// Edge in a path
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathEdge {
    pub relationship_id: RelationshipId,
    pub source_id: EntityId,
    pub target_id: EntityId,
    pub relationship_type: String,
}

impl From<&Relationship> for PathEdge {
    fn from(rel: &Relationship) -> Self {
        Self {
            relationship_id: rel.id.clone(),
            source_id: rel.source_id.clone(),
            target_id: rel.target_id.clone(),
            relationship_type: rel.relationship_type.clone(),
        }
    }
}

/// Result of a traversal operation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraversalResult {
    /// Starting entity
    pub start: EntityId,

    /// Target entity (if path finding)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<EntityId>,

    /// Reached entities in discovery order; the start entity comes first at depth 0
    pub reached: Vec<ReachedEntity>,

    /// Followed relationships whose endpoints were both reached
    pub relationships: Vec<Relationship>,

    /// Found paths (for path finding)
    pub paths: Vec<GraphPath>,

    /// Statistics
    pub stats: TraversalStats,
}

impl TraversalResult {
    /// Depth at which `id` was reached, if it was
    pub fn depth_of(&self, id: &EntityId) -> Option<u32> {
        self.reached
            .iter()
            .find(|r| &r.entity.id == id)
            .map(|r| r.depth)
    }

    pub fn contains(&self, id: &EntityId) -> bool {
        self.depth_of(id).is_some()
    }
}

/// Traversal statistics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TraversalStats {
    pub nodes_visited: usize,
    pub edges_traversed: usize,
    pub max_depth_reached: u32,
    pub path_found: bool,
}

/// Graph traversal engine
pub struct TraversalEngine;

impl TraversalEngine {
    /// Execute a traversal query.
    ///
    /// Breadth-first from `query.start`; a visited set keyed by entity id makes
    /// it cycle-safe. With a target set, stops at the target and returns the
    /// shortest path. Relationships pointing at entities missing from
    /// `entities` are skipped.
    pub fn execute(
        query: &TraversalQuery,
        entities: &HashMap<EntityId, Entity>,
        relationships: &[Relationship],
    ) -> TraversalResult {
        tracing::debug!(
            "Executing traversal: start={}, target={:?}, depth={}, direction={:?}",
            query.start,
            query.target,
            query.max_depth,
            query.direction
        );

        let live: Vec<&Relationship> = relationships.iter().filter(|r| query.follows(r)).collect();
        let adjacency = Self::adjacency(&live, query.direction);

        let mut depths: HashMap<EntityId, u32> = HashMap::new();
        let mut order: Vec<EntityId> = Vec::new();
        let mut parent: HashMap<EntityId, (EntityId, PathEdge)> = HashMap::new();
        let mut queue: VecDeque<(EntityId, u32)> = VecDeque::new();
        let mut stats = TraversalStats::default();

        if entities.contains_key(&query.start) {
            depths.insert(query.start.clone(), 0);
            order.push(query.start.clone());
            queue.push_back((query.start.clone(), 0));
        }

        while let Some((current, depth)) = queue.pop_front() {
            stats.nodes_visited += 1;
            stats.max_depth_reached = stats.max_depth_reached.max(depth);

            if query.target.as_ref() == Some(&current) {
                stats.path_found = true;
                tracing::debug!("BFS found path at depth {}", depth);
                break;
            }

            if depth >= query.max_depth {
                continue;
            }

            let Some(neighbors) = adjacency.get(&current) else {
                continue;
            };

            for rel in neighbors {
                stats.edges_traversed += 1;

                let Some(next) = rel.other_end(&current) else {
                    continue;
                };
                if depths.contains_key(next) {
                    continue;
                }

                // Apply entity type filter
                match entities.get(next) {
                    Some(entity) if query.admits(entity) => {}
                    _ => continue,
                }

                depths.insert(next.clone(), depth + 1);
                order.push(next.clone());
                parent.insert(next.clone(), (current.clone(), PathEdge::from(*rel)));
                queue.push_back((next.clone(), depth + 1));
            }
        }

        let paths = match (&query.target, stats.path_found) {
            (Some(target), true) => vec![Self::reconstruct_path(&query.start, target, &parent)],
            _ => vec![],
        };

        tracing::debug!(
            "BFS visited {} nodes, traversed {} edges",
            stats.nodes_visited,
            stats.edges_traversed
        );

        let reached = order
            .iter()
            .filter_map(|id| {
                entities.get(id).map(|entity| ReachedEntity {
                    entity: entity.clone(),
                    depth: depths[id],
                })
            })
            .collect();

        let followed = live
            .iter()
            .filter(|r| depths.contains_key(&r.source_id) && depths.contains_key(&r.target_id))
            .map(|r| (*r).clone())
            .collect();

        TraversalResult {
            start: query.start.clone(),
            target: query.target.clone(),
            reached,
            relationships: followed,
            paths,
            stats,
        }
    }

    /// Index live relationships by the node they are followed from
    fn adjacency<'a>(
        live: &[&'a Relationship],
        direction: Direction,
    ) -> HashMap<EntityId, Vec<&'a Relationship>> {
        let mut adjacency: HashMap<EntityId, Vec<&'a Relationship>> = HashMap::new();
        for rel in live {
            if matches!(direction, Direction::Outgoing | Direction::Both) {
                adjacency.entry(rel.source_id.clone()).or_default().push(*rel);
            }
            if matches!(direction, Direction::Incoming | Direction::Both)
                && rel.source_id != rel.target_id
            {
                adjacency.entry(rel.target_id.clone()).or_default().push(*rel);
            }
        }
        adjacency
    }

    /// Reconstruct path from parent map
    fn reconstruct_path(
        start: &EntityId,
        end: &EntityId,
        parent: &HashMap<EntityId, (EntityId, PathEdge)>,
    ) -> GraphPath {
        let mut nodes = vec![end.clone()];
        let mut edges = Vec::new();
        let mut current = end.clone();

        while &current != start {
            match parent.get(&current) {
                Some((prev, edge)) => {
                    edges.push(edge.clone());
                    nodes.push(prev.clone());
                    current = prev.clone();
                }
                None => break,
            }
        }

        nodes.reverse();
        edges.reverse();

        GraphPath {
            length: edges.len(),
            nodes,
            edges,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    struct TestGraph {
        entities: HashMap<EntityId, Entity>,
        relationships: Vec<Relationship>,
        ids: HashMap<&'static str, EntityId>,
    }

    impl TestGraph {
        fn id(&self, name: &str) -> EntityId {
            self.ids[name].clone()
        }
    }

    fn create_test_graph() -> TestGraph {
        // A --> B --> C --> D
        //       |     |
        //       v     v
        //       E --> F
        // plus D --> A closing a cycle
        let mut entities = HashMap::new();
        let mut ids = HashMap::new();
        for name in ["A", "B", "C", "D", "E", "F"] {
            let entity = Entity::new("node", name);
            ids.insert(name, entity.id.clone());
            entities.insert(entity.id.clone(), entity);
        }

        let t0 = Utc::now() - Duration::days(1);
        let edge = |from: &str, to: &str| {
            Relationship::new("connects", ids[from].clone(), ids[to].clone(), "", t0)
        };
        let relationships = vec![
            edge("A", "B"),
            edge("B", "C"),
            edge("C", "D"),
            edge("B", "E"),
            edge("C", "F"),
            edge("E", "F"),
            edge("D", "A"),
        ];

        TestGraph {
            entities,
            relationships,
            ids,
        }
    }

    #[test]
    fn test_bfs_depths() {
        let g = create_test_graph();
        let query = TraversalQuery::new(g.id("A")).with_depth(2);
        let result = TraversalEngine::execute(&query, &g.entities, &g.relationships);

        assert_eq!(result.reached[0].entity.id, g.id("A"));
        assert_eq!(result.depth_of(&g.id("A")), Some(0));
        assert_eq!(result.depth_of(&g.id("B")), Some(1));
        assert_eq!(result.depth_of(&g.id("C")), Some(2));
        assert_eq!(result.depth_of(&g.id("E")), Some(2));
        assert!(!result.contains(&g.id("D")));
        assert!(!result.contains(&g.id("F")));
    }

    #[test]
    fn test_cycle_terminates() {
        let g = create_test_graph();
        let query = TraversalQuery::new(g.id("A")).with_depth(50);
        let result = TraversalEngine::execute(&query, &g.entities, &g.relationships);

        assert_eq!(result.reached.len(), 6);
        assert_eq!(result.depth_of(&g.id("D")), Some(3));
        assert_eq!(result.depth_of(&g.id("F")), Some(3));
    }

    #[test]
    fn test_bfs_shortest_path() {
        let g = create_test_graph();
        let query = TraversalQuery::new(g.id("A"))
            .with_depth(10)
            .find_path_to(g.id("F"));
        let result = TraversalEngine::execute(&query, &g.entities, &g.relationships);

        assert!(result.stats.path_found);
        assert_eq!(result.paths.len(), 1);
        assert_eq!(result.paths[0].length, 3);
        assert_eq!(result.paths[0].nodes.first(), Some(&g.id("A")));
        assert_eq!(result.paths[0].nodes.last(), Some(&g.id("F")));
    }

    #[test]
    fn test_no_path_found() {
        let g = create_test_graph();
        let query = TraversalQuery::new(g.id("F"))
            .with_depth(10)
            .find_path_to(g.id("A"));
        let result = TraversalEngine::execute(&query, &g.entities, &g.relationships);

        assert!(!result.stats.path_found);
        assert!(result.paths.is_empty());
    }

    #[test]
    fn test_direction_filtering() {
        let g = create_test_graph();

        let incoming = TraversalQuery::new(g.id("B"))
            .with_direction(Direction::Incoming)
            .with_depth(1);
        let result = TraversalEngine::execute(&incoming, &g.entities, &g.relationships);
        assert!(result.contains(&g.id("A")));
        assert!(!result.contains(&g.id("C")));

        let both = TraversalQuery::new(g.id("B"))
            .with_direction(Direction::Both)
            .with_depth(1);
        let result = TraversalEngine::execute(&both, &g.entities, &g.relationships);
        assert!(result.contains(&g.id("A")));
        assert!(result.contains(&g.id("C")));
        assert!(result.contains(&g.id("E")));
    }

    #[test]
    fn test_relationship_type_filter() {
        let mut g = create_test_graph();
        let t0 = Utc::now() - Duration::days(1);
        g.relationships.push(Relationship::new(
            "owns",
            g.id("A"),
            g.id("F"),
            "",
            t0,
        ));

        let query = TraversalQuery::new(g.id("A"))
            .with_depth(1)
            .filter_relationship_types(vec!["owns".to_string()]);
        let result = TraversalEngine::execute(&query, &g.entities, &g.relationships);

        assert!(result.contains(&g.id("F")));
        assert!(!result.contains(&g.id("B")));
        assert_eq!(result.relationships.len(), 1);
    }

    #[test]
    fn test_superseded_relationships_are_skipped() {
        let mut g = create_test_graph();
        let now = Utc::now();
        // Close A -> B an hour ago
        g.relationships[0].valid_to = Some(now - Duration::hours(1));

        let query = TraversalQuery::new(g.id("A")).with_depth(5);
        let result = TraversalEngine::execute(&query, &g.entities, &g.relationships);
        assert_eq!(result.reached.len(), 1);

        // ...but it is followed when looking at the graph before it closed
        let past = TraversalQuery::new(g.id("A"))
            .with_depth(5)
            .as_of(now - Duration::hours(2));
        let result = TraversalEngine::execute(&past, &g.entities, &g.relationships);
        assert!(result.contains(&g.id("B")));
    }

    #[test]
    fn test_entity_type_filter() {
        let mut g = create_test_graph();
        let b = g.id("B");
        if let Some(entity) = g.entities.get_mut(&b) {
            entity.entity_type = "hub".into();
        }

        let query = TraversalQuery::new(g.id("A"))
            .with_depth(5)
            .filter_entity_types(vec!["node".to_string()]);
        let result = TraversalEngine::execute(&query, &g.entities, &g.relationships);

        // B is filtered out, and everything downstream is only reachable through B
        assert_eq!(result.reached.len(), 1);
    }
}
