//! Relationship commands

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use clap::{Args, Subcommand};

use super::parse_timestamp;
use crate::output::{to_json, truncate, Table};
use crate::{AppContext, Cli};
use schemagraph_core::{
    EntityId, KnowledgeGraph, NewRelationship, Relationship, RelationshipFilter, RelationshipId,
};

#[derive(Args)]
pub struct RelationshipArgs {
    #[command(subcommand)]
    pub command: RelationshipCommands,
}

#[derive(Subcommand)]
pub enum RelationshipCommands {
    /// Create a relationship between two entities
    Add {
        /// Source entity id or unique name
        source: String,
        /// Target entity id or unique name
        target: String,
        /// Relationship type
        #[arg(short = 't', long)]
        r#type: String,
        /// Free-text statement of the fact
        #[arg(long, default_value = "")]
        fact: String,
        /// Start of validity (RFC 3339, YYYY-MM-DD or now)
        #[arg(long, value_parser = parse_timestamp)]
        valid_from: Option<DateTime<Utc>>,
    },
    /// Get relationship details
    Get {
        /// Relationship id
        id: RelationshipId,
    },
    /// List relationships
    List {
        /// Source entity id or unique name
        #[arg(long)]
        source: Option<String>,
        /// Target entity id or unique name
        #[arg(long)]
        target: Option<String>,
        /// Relationship type
        #[arg(short = 't', long)]
        r#type: Option<String>,
        /// Only relationships valid at this instant
        #[arg(long, value_parser = parse_timestamp, conflicts_with = "current")]
        as_of: Option<DateTime<Utc>>,
        /// Only relationships that are still open
        #[arg(long)]
        current: bool,
    },
    /// Close a relationship so it is no longer current
    Supersede {
        /// Relationship id
        id: RelationshipId,
        /// End of validity (defaults to now)
        #[arg(long, value_parser = parse_timestamp)]
        valid_to: Option<DateTime<Utc>>,
    },
}

pub async fn run(args: &RelationshipArgs, _cli: &Cli, ctx: &AppContext) -> anyhow::Result<()> {
    match &args.command {
        RelationshipCommands::Add {
            source,
            target,
            r#type,
            fact,
            valid_from,
        } => {
            let source = ctx.store.resolve_entity(source).await?;
            let target = ctx.store.resolve_entity(target).await?;

            let mut new = NewRelationship::new(r#type.as_str(), source.id.clone(), target.id.clone())
                .with_fact(fact.as_str());
            new.valid_from = *valid_from;

            let rel = ctx.store.create_relationship(new).await?;

            if ctx.json() {
                println!("{}", to_json(&rel)?);
            } else {
                println!(
                    "Created relationship: {} --[{}]--> {}",
                    source.name, r#type, target.name
                );
                println!("  id: {}", rel.id);
            }
        }
        RelationshipCommands::Get { id } => {
            let rel = ctx.store.get_relationship(id).await?;
            if ctx.json() {
                println!("{}", to_json(&rel)?);
            } else {
                let names = entity_names(std::slice::from_ref(&rel), ctx).await?;
                println!("Relationship: {}", rel.id);
                println!("  Type: {}", rel.relationship_type);
                println!("  Source: {}", display_name(&names, &rel.source_id));
                println!("  Target: {}", display_name(&names, &rel.target_id));
                if !rel.fact.is_empty() {
                    println!("  Fact: {}", rel.fact);
                }
                println!("  Valid from: {}", rel.valid_from);
                match rel.valid_to {
                    Some(at) => println!("  Valid to: {}", at),
                    None => println!("  Valid to: (current)"),
                }
                println!("  Created: {}", rel.created_at);
            }
        }
        RelationshipCommands::List {
            source,
            target,
            r#type,
            as_of,
            current,
        } => {
            let mut filter = RelationshipFilter::new();
            if let Some(source) = source {
                filter = filter.source(ctx.store.resolve_entity(source).await?.id);
            }
            if let Some(target) = target {
                filter = filter.target(ctx.store.resolve_entity(target).await?.id);
            }
            if let Some(t) = r#type {
                filter = filter.of_type(t.as_str());
            }
            if let Some(at) = as_of {
                filter = filter.as_of(*at);
            }
            if *current {
                filter = filter.current();
            }

            let relationships = ctx.store.query_relationships(&filter).await?;
            tracing::info!("Found {} relationships", relationships.len());
            print_relationships(&relationships, ctx).await?;
        }
        RelationshipCommands::Supersede { id, valid_to } => {
            let valid_to = valid_to.unwrap_or_else(Utc::now);
            let rel = ctx.store.supersede_relationship(id, valid_to).await?;

            if ctx.json() {
                println!("{}", to_json(&rel)?);
            } else {
                println!("Superseded relationship: {} (valid to {})", rel.id, valid_to);
            }
        }
    }

    Ok(())
}

/// Names of every entity the relationships touch, keyed by id
pub async fn entity_names(
    relationships: &[Relationship],
    ctx: &AppContext,
) -> anyhow::Result<HashMap<EntityId, String>> {
    let mut names = HashMap::new();
    for rel in relationships {
        for id in [&rel.source_id, &rel.target_id] {
            if !names.contains_key(id) {
                let entity = ctx.store.get_entity(id).await?;
                names.insert(id.clone(), entity.name);
            }
        }
    }
    Ok(names)
}

pub fn display_name(names: &HashMap<EntityId, String>, id: &EntityId) -> String {
    names.get(id).cloned().unwrap_or_else(|| id.to_string())
}

pub async fn print_relationships(
    relationships: &[Relationship],
    ctx: &AppContext,
) -> anyhow::Result<()> {
    if ctx.json() {
        println!("{}", to_json(relationships)?);
        return Ok(());
    }

    if relationships.is_empty() {
        println!("No relationships found");
        return Ok(());
    }

    let names = entity_names(relationships, ctx).await?;
    let mut table = Table::new(["ID", "SOURCE", "TYPE", "TARGET", "VALID FROM", "VALID TO", "FACT"]);
    for rel in relationships {
        table.add_row([
            rel.id.to_string(),
            display_name(&names, &rel.source_id),
            rel.relationship_type.clone(),
            display_name(&names, &rel.target_id),
            rel.valid_from.format("%Y-%m-%d %H:%M").to_string(),
            rel.valid_to
                .map(|at| at.format("%Y-%m-%d %H:%M").to_string())
                .unwrap_or_else(|| "current".to_string()),
            truncate(&rel.fact, 40),
        ]);
    }
    print!("{}", table);
    println!("{} relationships", relationships.len());
    Ok(())
}
