//! Schemagraph CLI - Command line interface for the schema-validated graph

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod commands;
mod config;
mod output;

use commands::{completions, entity, io, query, relationship, schema};
use config::Config;
use output::OutputFormat;
use schemagraph_storage::{GraphStore, RedbStorage};

/// Database file inside the data directory
const DB_FILE: &str = "schemagraph.redb";

#[derive(Parser)]
#[command(name = "schemagraph")]
#[command(author, version, about = "Schema-validated, bi-temporal entity/relationship graph")]
pub struct Cli {
    /// Data directory
    #[arg(short, long, global = true, env = "SCHEMAGRAPH_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Output format
    #[arg(short, long, global = true, value_enum)]
    pub format: Option<OutputFormat>,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Get the data directory path: flag, then config file, then the platform default
    pub fn data_dir(&self, config: &Config) -> PathBuf {
        self.data_dir
            .clone()
            .or_else(|| config.data_dir.clone())
            .unwrap_or_else(config::default_data_dir)
    }

    pub fn output_format(&self, config: &Config) -> OutputFormat {
        self.format.or(config.format).unwrap_or_default()
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Manage entity and relationship types
    Schema(schema::SchemaArgs),
    /// Manage entities
    Entity(entity::EntityArgs),
    /// Manage relationships
    Relationship(relationship::RelationshipArgs),
    /// Breadth-first traversal from an entity
    Traverse(query::TraverseArgs),
    /// Find the shortest path between two entities
    Path(query::PathArgs),
    /// Import types, entities and relationships from a JSON document
    Import(io::ImportArgs),
    /// Export the whole graph as JSON
    Export(io::ExportArgs),
    /// Manage CLI configuration
    Config(commands::config::ConfigArgs),
    /// Generate shell completions
    Completions(completions::CompletionsArgs),
}

/// Application context with the graph store
pub struct AppContext {
    pub store: Arc<GraphStore<RedbStorage>>,
    pub config: Config,
    pub format: OutputFormat,
}

impl AppContext {
    pub async fn new(cli: &Cli, config: Config) -> anyhow::Result<Self> {
        let data_dir = cli.data_dir(&config);
        std::fs::create_dir_all(&data_dir)?;

        let db_path = data_dir.join(DB_FILE);
        tracing::debug!("Using database at: {:?}", db_path);

        let storage = RedbStorage::open(&db_path)?;
        let store = GraphStore::open(storage).await?;

        Ok(Self {
            store: Arc::new(store),
            format: cli.output_format(&config),
            config,
        })
    }

    pub fn json(&self) -> bool {
        self.format == OutputFormat::Json
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .init();

    tracing::debug!("Starting schemagraph CLI");

    // Commands that never touch the database
    match &cli.command {
        Commands::Config(args) => return commands::config::run(args),
        Commands::Completions(args) => return completions::run(args),
        _ => {}
    }

    let config = Config::load();
    let ctx = AppContext::new(&cli, config).await?;

    match &cli.command {
        Commands::Schema(args) => schema::run(args, &cli, &ctx).await?,
        Commands::Entity(args) => entity::run(args, &cli, &ctx).await?,
        Commands::Relationship(args) => relationship::run(args, &cli, &ctx).await?,
        Commands::Traverse(args) => query::run_traverse(args, &cli, &ctx).await?,
        Commands::Path(args) => query::run_path(args, &cli, &ctx).await?,
        Commands::Import(args) => io::run_import(args, &cli, &ctx).await?,
        Commands::Export(args) => io::run_export(args, &cli, &ctx).await?,
        Commands::Config(_) | Commands::Completions(_) => {}
    }

    Ok(())
}
