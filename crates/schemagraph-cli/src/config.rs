//! CLI configuration file

use std::path::PathBuf;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::output::OutputFormat;

/// Environment variable overriding the config file location
pub const CONFIG_ENV: &str = "SCHEMAGRAPH_CONFIG";

/// Get default data directory
pub fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("schemagraph")
}

/// Location of `config.toml`
pub fn config_file_path() -> PathBuf {
    if let Some(path) = std::env::var_os(CONFIG_ENV) {
        return PathBuf::from(path);
    }
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("schemagraph")
        .join("config.toml")
}

/// Configuration for the CLI; command-line flags take precedence
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<OutputFormat>,

    /// Preset used by `schema init` when none is given
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preset: Option<String>,
}

impl Config {
    /// Load the config file, falling back to defaults when it is missing or unreadable
    pub fn load() -> Self {
        let path = config_file_path();
        if !path.exists() {
            return Self::default();
        }
        match std::fs::read_to_string(&path)
            .map_err(anyhow::Error::from)
            .and_then(|content| Self::parse(&content))
        {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("Ignoring config file {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    pub fn parse(content: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let path = config_file_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(&path, content).with_context(|| format!("writing {}", path.display()))?;
        Ok(())
    }

    pub fn keys() -> &'static [&'static str] {
        &["data_dir", "format", "preset"]
    }

    pub fn get(&self, key: &str) -> Option<String> {
        match key {
            "data_dir" => Some(
                self.data_dir
                    .as_ref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| "(not set)".to_string()),
            ),
            "format" => Some(
                self.format
                    .map(|f| f.to_string())
                    .unwrap_or_else(|| "(not set)".to_string()),
            ),
            "preset" => Some(
                self.preset
                    .clone()
                    .unwrap_or_else(|| "(not set)".to_string()),
            ),
            _ => None,
        }
    }

    pub fn set(&mut self, key: &str, value: &str) -> anyhow::Result<()> {
        match key {
            "data_dir" => self.data_dir = Some(PathBuf::from(value)),
            "format" => {
                self.format = Some(value.parse().map_err(|e: String| anyhow::anyhow!(e))?);
            }
            "preset" => {
                if schemagraph_core::presets::preset(value).is_none() {
                    anyhow::bail!(
                        "Unknown preset '{}'. Available: {}",
                        value,
                        schemagraph_core::presets::PRESET_NAMES.join(", ")
                    );
                }
                self.preset = Some(value.to_string());
            }
            _ => anyhow::bail!(
                "No config key named '{}' (known keys: {})",
                key,
                Self::keys().join(", ")
            ),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_render() {
        let config = Config::parse(
            r#"
            data_dir = "/tmp/graph"
            format = "json"
            preset = "software_project"
            "#,
        )
        .unwrap();
        assert_eq!(config.data_dir, Some(PathBuf::from("/tmp/graph")));
        assert_eq!(config.format, Some(OutputFormat::Json));

        let rendered = toml::to_string_pretty(&config).unwrap();
        assert_eq!(Config::parse(&rendered).unwrap(), config);
    }

    #[test]
    fn test_get_and_set() {
        let mut config = Config::default();
        assert_eq!(config.get("format").as_deref(), Some("(not set)"));
        assert!(config.get("project").is_none());

        config.set("format", "json").unwrap();
        assert_eq!(config.get("format").as_deref(), Some("json"));

        assert!(config.set("format", "csv").is_err());
        assert!(config.set("preset", "crm").is_err());
        assert!(config.set("colour", "red").is_err());
        config.set("preset", "software_project").unwrap();
        assert_eq!(config.preset.as_deref(), Some("software_project"));
    }
}
