//! Traversal and path commands

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use clap::Args;

use super::{parse_timestamp, split_list};
use crate::output::{to_json, Table};
use crate::{AppContext, Cli};
use schemagraph_core::{Direction, EntityId, KnowledgeGraph, TraversalQuery};

/// Options shared by `traverse` and `path`
#[derive(Args)]
pub struct TraversalOptions {
    /// Maximum depth
    #[arg(long, default_value = "3")]
    pub depth: u32,
    /// Direction to follow: outgoing, incoming or both
    #[arg(long, default_value = "outgoing")]
    pub direction: Direction,
    /// Only follow these relationship types (comma-separated)
    #[arg(long)]
    pub relationship_types: Option<String>,
    /// Only visit these entity types (comma-separated)
    #[arg(long)]
    pub entity_types: Option<String>,
    /// Follow relationships valid at this instant instead of current ones
    #[arg(long, value_parser = parse_timestamp)]
    pub as_of: Option<DateTime<Utc>>,
}

impl TraversalOptions {
    fn query(&self, start: EntityId) -> TraversalQuery {
        let mut query = TraversalQuery::new(start)
            .with_depth(self.depth)
            .with_direction(self.direction);
        if let Some(types) = &self.relationship_types {
            query = query.filter_relationship_types(split_list(types));
        }
        if let Some(types) = &self.entity_types {
            query = query.filter_entity_types(split_list(types));
        }
        if let Some(at) = self.as_of {
            query = query.as_of(at);
        }
        query
    }
}

#[derive(Args)]
pub struct TraverseArgs {
    /// Start entity id or unique name
    pub start: String,

    #[command(flatten)]
    pub options: TraversalOptions,
}

#[derive(Args)]
pub struct PathArgs {
    /// Start entity id or unique name
    pub from: String,
    /// Target entity id or unique name
    pub to: String,

    #[command(flatten)]
    pub options: TraversalOptions,
}

pub async fn run_traverse(args: &TraverseArgs, _cli: &Cli, ctx: &AppContext) -> anyhow::Result<()> {
    let start = ctx.store.resolve_entity(&args.start).await?;
    let query = args.options.query(start.id.clone());
    let result = ctx.store.traverse(&query).await?;
    tracing::info!(
        "Traversal from {} reached {} entities",
        start.name,
        result.reached.len()
    );

    if ctx.json() {
        println!("{}", to_json(&result)?);
        return Ok(());
    }

    println!(
        "Traversal from '{}' (depth {}, {} entities, {} relationships):",
        start.name,
        args.options.depth,
        result.reached.len(),
        result.relationships.len()
    );
    let mut table = Table::new(["DEPTH", "ID", "TYPE", "NAME"]);
    for reached in &result.reached {
        table.add_row([
            reached.depth.to_string(),
            reached.entity.id.to_string(),
            reached.entity.entity_type.to_string(),
            reached.entity.name.clone(),
        ]);
    }
    print!("{}", table);
    Ok(())
}

pub async fn run_path(args: &PathArgs, _cli: &Cli, ctx: &AppContext) -> anyhow::Result<()> {
    let from = ctx.store.resolve_entity(&args.from).await?;
    let to = ctx.store.resolve_entity(&args.to).await?;
    let query = args.options.query(from.id.clone());

    let path = ctx.store.find_path(&from.id, &to.id, query).await?;

    if ctx.json() {
        println!("{}", to_json(&path)?);
        return Ok(());
    }

    let Some(path) = path else {
        println!(
            "No path from '{}' to '{}' within depth {}",
            from.name, to.name, args.options.depth
        );
        return Ok(());
    };

    let mut names: HashMap<EntityId, String> = HashMap::new();
    for id in &path.nodes {
        let entity = ctx.store.get_entity(id).await?;
        names.insert(id.clone(), entity.name);
    }
    let name = |id: &EntityId| names.get(id).cloned().unwrap_or_else(|| id.to_string());

    println!("Path from '{}' to '{}' ({} hops):", from.name, to.name, path.length);
    println!("  {}", name(&from.id));
    for (pair, edge) in path.nodes.windows(2).zip(&path.edges) {
        let arrow = if edge.source_id == pair[0] { "-->" } else { "<--" };
        println!("  {}[{}] {}", arrow, edge.relationship_type, name(&pair[1]));
    }
    Ok(())
}
