//! Config command for managing CLI configuration

use clap::{Args, Subcommand};

use crate::config::{config_file_path, Config};

#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommands,
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Get a config value
    Get {
        /// Config key name
        key: String,
    },
    /// Set a config value
    Set {
        /// Config key name
        key: String,
        /// New value
        value: String,
    },
    /// List all config values
    List,
    /// Show config file path
    Path,
    /// Initialize default config file
    Init {
        /// Overwrite existing config
        #[arg(long)]
        force: bool,
    },
}

pub fn run(args: &ConfigArgs) -> anyhow::Result<()> {
    match &args.command {
        ConfigCommands::Get { key } => run_get(key),
        ConfigCommands::Set { key, value } => run_set(key, value),
        ConfigCommands::List => run_list(),
        ConfigCommands::Path => run_path(),
        ConfigCommands::Init { force } => run_init(*force),
    }
}

fn run_get(key: &str) -> anyhow::Result<()> {
    let value = Config::load().get(key).ok_or_else(|| {
        anyhow::anyhow!(
            "No config key named '{}' (known keys: {})",
            key,
            Config::keys().join(", ")
        )
    })?;
    println!("{}", value);
    Ok(())
}

fn run_set(key: &str, value: &str) -> anyhow::Result<()> {
    let mut config = Config::load();
    config.set(key, value)?;
    config.save()?;
    tracing::info!("Config {} updated", key);
    println!("Set {} = {}", key, value);
    Ok(())
}

fn run_list() -> anyhow::Result<()> {
    let config = Config::load();
    println!("# {}", config_file_path().display());
    for key in Config::keys() {
        if let Some(value) = config.get(key) {
            println!("{:<10}{}", key, value);
        }
    }
    Ok(())
}

fn run_path() -> anyhow::Result<()> {
    println!("{}", config_file_path().display());
    Ok(())
}

fn run_init(force: bool) -> anyhow::Result<()> {
    let path = config_file_path();

    if path.exists() && !force {
        anyhow::bail!(
            "Config file already exists at {}. Use --force to overwrite.",
            path.display()
        );
    }

    let config = Config {
        preset: Some("software_project".to_string()),
        ..Config::default()
    };
    config.save()?;
    println!("Created config file at {}", path.display());
    Ok(())
}
