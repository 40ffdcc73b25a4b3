//! Schema commands

use std::path::{Path, PathBuf};

use clap::{Args, Subcommand};
use serde_json::Value;

use crate::output::{to_json, truncate, Table};
use crate::{AppContext, Cli};
use schemagraph_core::{
    presets, EntityTypeDefinition, Error, FieldDefinition, FieldKind, ImportDocument,
    KnowledgeGraph, RedefinitionReport, RelationshipTypeDefinition,
};

#[derive(Args)]
pub struct SchemaArgs {
    #[command(subcommand)]
    pub command: SchemaCommands,
}

#[derive(Subcommand)]
pub enum SchemaCommands {
    /// Register a built-in preset (types already present are skipped)
    Init {
        /// Preset name (defaults to the configured preset)
        #[arg(short, long)]
        preset: Option<String>,
    },
    /// List registered entity and relationship types
    List,
    /// Show one type definition
    Show {
        /// Entity or relationship type name
        name: String,
    },
    /// Register an entity type
    RegisterEntity {
        /// Type name
        #[arg(required_unless_present = "file")]
        name: Option<String>,
        /// Type description
        #[arg(long)]
        description: Option<String>,
        /// Field spec: name:kind[=v1|v2][:required], with array<kind> for arrays
        #[arg(long = "field", value_parser = parse_field_spec)]
        fields: Vec<FieldDefinition>,
        /// Read the definition from a JSON file instead
        #[arg(long, conflicts_with_all = ["name", "fields", "description"])]
        file: Option<PathBuf>,
    },
    /// Register a relationship type
    RegisterRelationship {
        /// Type name
        name: String,
        /// Entity type allowed at the source end
        #[arg(short, long)]
        source: String,
        /// Entity type allowed at the target end
        #[arg(short, long)]
        target: String,
        /// Type description
        #[arg(long)]
        description: Option<String>,
    },
    /// Replace a type definition and re-validate its instances
    Redefine {
        /// JSON file with the new entity or relationship type definition
        #[arg(long)]
        file: PathBuf,
    },
}

/// Parse `name:kind[=v1|v2][:required]`
pub fn parse_field_spec(spec: &str) -> Result<FieldDefinition, String> {
    let mut parts = spec.split(':');
    let name = parts
        .next()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .ok_or_else(|| format!("missing field name in '{}'", spec))?;
    let kind_spec = parts
        .next()
        .map(str::trim)
        .ok_or_else(|| format!("missing kind in '{}' (expected name:kind)", spec))?;

    let mut field = match kind_spec.split_once('=') {
        Some((kind, values)) => {
            if !kind.eq_ignore_ascii_case("enum") {
                return Err(format!("only enum fields take values, got '{}'", kind_spec));
            }
            FieldDefinition::enumeration(
                name,
                values.split('|').map(str::trim).filter(|v| !v.is_empty()),
            )
        }
        None => match kind_spec
            .strip_prefix("array<")
            .and_then(|rest| rest.strip_suffix('>'))
        {
            Some(items) => FieldDefinition::array_of(name, items.parse::<FieldKind>()?),
            None => FieldDefinition::new(name, kind_spec.parse::<FieldKind>()?),
        },
    };

    for flag in parts {
        match flag.trim() {
            "required" => field = field.required(),
            other => return Err(format!("unknown field flag '{}'", other)),
        }
    }
    Ok(field)
}

fn read_json(path: &Path) -> anyhow::Result<Value> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

pub async fn run(args: &SchemaArgs, _cli: &Cli, ctx: &AppContext) -> anyhow::Result<()> {
    match &args.command {
        SchemaCommands::Init { preset } => {
            let name = preset
                .clone()
                .or_else(|| ctx.config.preset.clone())
                .unwrap_or_else(|| "software_project".to_string());
            let schema = presets::preset(&name).ok_or_else(|| {
                anyhow::anyhow!(
                    "Unknown preset '{}'. Available presets: {}",
                    name,
                    presets::PRESET_NAMES.join(", ")
                )
            })?;

            let summary = ctx
                .store
                .import(ImportDocument {
                    schema,
                    ..ImportDocument::default()
                })
                .await?;
            tracing::info!("Initialized preset {}", name);

            if ctx.json() {
                println!("{}", to_json(&summary)?);
            } else {
                println!(
                    "Preset '{}': registered {} entity types, {} relationship types",
                    name, summary.entity_types_registered, summary.relationship_types_registered
                );
            }
        }
        SchemaCommands::List => {
            let schema = ctx.store.schema().await?;

            if ctx.json() {
                println!("{}", to_json(&schema)?);
            } else if schema.is_empty() {
                println!("No types registered. Run `schemagraph schema init` to load a preset.");
            } else {
                let mut table = Table::new(["KIND", "NAME", "SIGNATURE", "DESCRIPTION"]);
                for def in &schema.entity_types {
                    table.add_row([
                        "entity".to_string(),
                        def.name.clone(),
                        format!("{} fields", def.fields.len()),
                        truncate(def.description.as_deref().unwrap_or(""), 48),
                    ]);
                }
                for def in &schema.relationship_types {
                    table.add_row([
                        "relationship".to_string(),
                        def.name.clone(),
                        format!("{} -> {}", def.source_type, def.target_type),
                        truncate(def.description.as_deref().unwrap_or(""), 48),
                    ]);
                }
                print!("{}", table);
            }
        }
        SchemaCommands::Show { name } => match ctx.store.lookup_entity_type(name).await {
            Ok(def) => print_entity_type(&def, ctx)?,
            Err(Error::EntityTypeNotFound(_)) => {
                let def = ctx.store.lookup_relationship_type(name).await.map_err(|_| {
                    anyhow::anyhow!("No entity or relationship type named '{}'", name)
                })?;
                print_relationship_type(&def, ctx)?;
            }
            Err(e) => return Err(e.into()),
        },
        SchemaCommands::RegisterEntity {
            name,
            description,
            fields,
            file,
        } => {
            let def = match (file, name) {
                (Some(path), _) => serde_json::from_value(read_json(path)?)?,
                (None, Some(name)) => {
                    let mut def = EntityTypeDefinition::new(name.as_str());
                    def.description = description.clone();
                    def.fields = fields.clone();
                    def
                }
                (None, None) => anyhow::bail!("Either a type name or --file is required"),
            };
            let type_name = def.name.clone();
            ctx.store.register_entity_type(def).await?;
            println!("Registered entity type: {}", type_name);
        }
        SchemaCommands::RegisterRelationship {
            name,
            source,
            target,
            description,
        } => {
            let mut def = RelationshipTypeDefinition::new(name.as_str(), source.as_str(), target.as_str());
            def.description = description.clone();
            ctx.store.register_relationship_type(def).await?;
            println!("Registered relationship type: {} ({} -> {})", name, source, target);
        }
        SchemaCommands::Redefine { file } => {
            let value = read_json(file)?;
            let report = if value.get("source_type").is_some() {
                let def: RelationshipTypeDefinition = serde_json::from_value(value)?;
                ctx.store.redefine_relationship_type(def).await?
            } else {
                let def: EntityTypeDefinition = serde_json::from_value(value)?;
                ctx.store.redefine_entity_type(def).await?
            };
            print_report(&report, ctx)?;
        }
    }

    Ok(())
}

fn print_entity_type(def: &EntityTypeDefinition, ctx: &AppContext) -> anyhow::Result<()> {
    if ctx.json() {
        println!("{}", to_json(def)?);
        return Ok(());
    }

    println!("Entity type: {}", def.name);
    if let Some(description) = &def.description {
        println!("  Description: {}", description);
    }
    if def.fields.is_empty() {
        println!("  No fields declared");
        return Ok(());
    }

    let mut table = Table::new(["FIELD", "KIND", "REQUIRED", "VALUES"]);
    for field in &def.fields {
        let kind = match field.items {
            Some(items) if field.kind == FieldKind::Array => format!("array<{}>", items),
            _ => field.kind.to_string(),
        };
        table.add_row([
            field.name.clone(),
            kind,
            if field.required { "yes" } else { "" }.to_string(),
            field.enum_values.join(" | "),
        ]);
    }
    println!();
    print!("{}", table);
    Ok(())
}

fn print_relationship_type(def: &RelationshipTypeDefinition, ctx: &AppContext) -> anyhow::Result<()> {
    if ctx.json() {
        println!("{}", to_json(def)?);
        return Ok(());
    }

    println!("Relationship type: {}", def.name);
    println!("  Source: {}", def.source_type);
    println!("  Target: {}", def.target_type);
    if let Some(description) = &def.description {
        println!("  Description: {}", description);
    }
    Ok(())
}

fn print_report(report: &RedefinitionReport, ctx: &AppContext) -> anyhow::Result<()> {
    if ctx.json() {
        println!("{}", to_json(report)?);
        return Ok(());
    }

    println!(
        "Redefined {}: {} instances checked, {} invalid",
        report.type_name,
        report.instances_checked,
        report.violations.len()
    );
    for instance in &report.violations {
        println!("  {}", instance.instance_id);
        for violation in &instance.violations {
            println!("    - {}", violation);
        }
    }
    Ok(())
}
