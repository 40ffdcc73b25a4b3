//! Import/Export commands

use std::io::Read;
use std::path::PathBuf;

use clap::Args;

use crate::output::to_json;
use crate::{AppContext, Cli};
use schemagraph_core::{presets, ImportSource, ImportSummary, KnowledgeGraph};

#[derive(Args)]
pub struct ImportArgs {
    /// Import document or `export` output (`-` reads stdin)
    pub file: PathBuf,
    /// Add depends_on relationships for components whose `dependencies`
    /// field names another component in the document
    #[arg(long)]
    pub link_dependencies: bool,
}

#[derive(Args)]
pub struct ExportArgs {
    /// Output file (stdout if omitted)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

pub async fn run_import(args: &ImportArgs, _cli: &Cli, ctx: &AppContext) -> anyhow::Result<()> {
    tracing::info!("Importing from {:?}", args.file);

    let content = if args.file.as_os_str() == "-" {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        buf
    } else {
        std::fs::read_to_string(&args.file)?
    };

    let summary = match ImportSource::from_json(&content)? {
        ImportSource::Graph(document) => {
            if args.link_dependencies {
                tracing::warn!("--link-dependencies ignored for an exported graph");
            }
            tracing::debug!(
                "Restoring export: {} entities, {} relationships",
                document.entities.len(),
                document.relationships.len()
            );
            ctx.store.restore(document).await?
        }
        ImportSource::Batch(mut document) => {
            if args.link_dependencies {
                let linked = presets::link_component_dependencies(&mut document);
                tracing::debug!("Linked {} component dependencies", linked);
            }
            tracing::debug!(
                "Import document: {} entity types, {} relationship types, {} entities, {} relationships",
                document.schema.entity_types.len(),
                document.schema.relationship_types.len(),
                document.entities.len(),
                document.relationships.len()
            );
            ctx.store.import(document).await?
        }
    };

    print_summary(&summary, ctx)
}

fn print_summary(summary: &ImportSummary, ctx: &AppContext) -> anyhow::Result<()> {
    if ctx.json() {
        println!("{}", to_json(summary)?);
    } else {
        println!("Import complete:");
        println!("  Entity types registered: {}", summary.entity_types_registered);
        println!(
            "  Relationship types registered: {}",
            summary.relationship_types_registered
        );
        println!("  Entities created: {}", summary.entities_created);
        println!("  Relationships created: {}", summary.relationships_created);
    }

    Ok(())
}

pub async fn run_export(args: &ExportArgs, _cli: &Cli, ctx: &AppContext) -> anyhow::Result<()> {
    tracing::info!("Exporting graph");

    let document = ctx.store.export().await?;
    tracing::debug!(
        "Exporting {} entities, {} relationships",
        document.entities.len(),
        document.relationships.len()
    );
    let content = to_json(&document)?;

    if let Some(ref path) = args.output {
        // Owner read/write only
        #[cfg(unix)]
        {
            use std::io::Write;
            use std::os::unix::fs::OpenOptionsExt;

            let mut file = std::fs::OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .mode(0o600)
                .open(path)?;
            file.write_all(content.as_bytes())?;
        }
        #[cfg(not(unix))]
        {
            std::fs::write(path, &content)?;
        }
        println!("Exported to {:?}", path);
    } else {
        println!("{}", content);
    }

    Ok(())
}
