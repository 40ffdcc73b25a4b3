//! Entity commands

use clap::{Args, Subcommand};
use serde_json::Value;

use super::{fields_to_metadata, parse_field};
use crate::output::{format_value, to_json, truncate, Table};
use crate::{AppContext, Cli};
use schemagraph_core::{Entity, EntityFilter, KnowledgeGraph, NewEntity};

#[derive(Args)]
pub struct EntityArgs {
    #[command(subcommand)]
    pub command: EntityCommands,
}

#[derive(Subcommand)]
pub enum EntityCommands {
    /// Add a new entity
    Add {
        /// Entity name
        name: String,
        /// Entity type
        #[arg(short = 't', long)]
        r#type: String,
        /// Short summary
        #[arg(short, long)]
        summary: Option<String>,
        /// Metadata field as key=value (JSON values accepted)
        #[arg(long = "field", value_parser = parse_field)]
        fields: Vec<(String, Value)>,
    },
    /// Get entity details
    Get {
        /// Entity id or unique name
        entity: String,
    },
    /// Update entity metadata (merged into existing fields unless --replace)
    Update {
        /// Entity id or unique name
        entity: String,
        /// Field to set as key=value
        #[arg(long = "field", value_parser = parse_field)]
        fields: Vec<(String, Value)>,
        /// Field to remove
        #[arg(long)]
        unset: Vec<String>,
        /// Replace all metadata with the given fields
        #[arg(long)]
        replace: bool,
    },
    /// List entities
    List {
        /// Filter by type
        #[arg(short = 't', long)]
        r#type: Option<String>,
    },
    /// Find entities by type, name and field values
    Find {
        /// Entity type
        #[arg(short = 't', long)]
        r#type: Option<String>,
        /// Required field value as key=value
        #[arg(long = "field", value_parser = parse_field)]
        fields: Vec<(String, Value)>,
        /// Exact entity name
        #[arg(short, long)]
        name: Option<String>,
    },
}

pub async fn run(args: &EntityArgs, _cli: &Cli, ctx: &AppContext) -> anyhow::Result<()> {
    match &args.command {
        EntityCommands::Add {
            name,
            r#type,
            summary,
            fields,
        } => {
            let mut new = NewEntity::new(r#type.as_str(), name.as_str())
                .with_metadata(fields_to_metadata(fields));
            new.summary = summary.clone();

            let entity = ctx.store.create_entity(new).await?;

            if ctx.json() {
                println!("{}", to_json(&entity)?);
            } else {
                println!("Created entity: {} (type: {})", entity.name, entity.entity_type);
                println!("  id: {}", entity.id);
            }
        }
        EntityCommands::Get { entity } => {
            let entity = ctx.store.resolve_entity(entity).await?;
            print_entity(&entity, ctx)?;
        }
        EntityCommands::Update {
            entity,
            fields,
            unset,
            replace,
        } => {
            let current = ctx.store.resolve_entity(entity).await?;
            let mut metadata = if *replace {
                fields_to_metadata(fields)
            } else {
                let mut merged = current.metadata.clone();
                merged.extend(fields_to_metadata(fields));
                merged
            };
            for key in unset {
                metadata.remove(key);
            }

            let updated = ctx.store.update_entity(&current.id, metadata).await?;

            if ctx.json() {
                println!("{}", to_json(&updated)?);
            } else {
                println!("Updated entity: {} ({})", updated.name, updated.id);
            }
        }
        EntityCommands::List { r#type } => {
            let entities = match r#type {
                Some(t) => ctx.store.list_entities_by_type(t).await?,
                None => ctx.store.find_by_type(&EntityFilter::new()).await?,
            };
            tracing::info!("Found {} entities", entities.len());
            print_entities(&entities, ctx)?;
        }
        EntityCommands::Find {
            r#type,
            fields,
            name,
        } => {
            let filter = EntityFilter {
                entity_type: r#type.clone(),
                metadata: fields_to_metadata(fields),
            };
            let entities = match name {
                Some(name) => ctx
                    .store
                    .find_entities_by_name(name)
                    .await?
                    .into_iter()
                    .filter(|e| filter.matches(e))
                    .collect(),
                None => ctx.store.find_by_type(&filter).await?,
            };
            tracing::info!("Found {} entities", entities.len());
            print_entities(&entities, ctx)?;
        }
    }

    Ok(())
}

fn print_entity(entity: &Entity, ctx: &AppContext) -> anyhow::Result<()> {
    if ctx.json() {
        println!("{}", to_json(entity)?);
        return Ok(());
    }

    println!("Entity: {}", entity.name);
    println!("  Id: {}", entity.id);
    println!("  Type: {}", entity.entity_type);
    if let Some(summary) = &entity.summary {
        println!("  Summary: {}", summary);
    }
    println!("  Created: {}", entity.created_at);
    println!("  Updated: {}", entity.updated_at);

    if !entity.metadata.is_empty() {
        println!("  Fields:");
        for (key, value) in &entity.metadata {
            println!("    {}: {}", key, format_value(value));
        }
    }
    Ok(())
}

fn print_entities(entities: &[Entity], ctx: &AppContext) -> anyhow::Result<()> {
    if ctx.json() {
        println!("{}", to_json(entities)?);
        return Ok(());
    }

    if entities.is_empty() {
        println!("No entities found");
        return Ok(());
    }

    let mut table = Table::new(["ID", "TYPE", "NAME", "SUMMARY"]);
    for entity in entities {
        table.add_row([
            entity.id.to_string(),
            entity.entity_type.to_string(),
            entity.name.clone(),
            truncate(entity.summary.as_deref().unwrap_or(""), 48),
        ]);
    }
    print!("{}", table);
    println!("{} entities", entities.len());
    Ok(())
}
