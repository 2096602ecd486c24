//! Configuration parsing and validation.
//!
//! Configuration is loaded from a TOML file (default: `config/ctxr.toml`).
//! Every section except `[db]` is optional.
//!
//! # Example
//!
//! ```toml
//! [db]
//! path = "./data/ctxr.sqlite"
//!
//! [server]
//! bind = "127.0.0.1:7341"
//!
//! [logging]
//! level = "info"
//!
//! # Add a category or override a built-in one.
//! [categories.retail_partnership]
//! kind = "bounded"
//! buffer_days = 10
//! significant = "moderate"
//! comparison_window_days = 365
//! description = "Retail partner placements and co-marketing"
//! ```

use anyhow::{Context, Result};
use context_relevance_core::registry::{CategoryDescriptor, CategoryRegistry, ComparisonDefault};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Category additions and overrides, keyed by category name.
    #[serde(default)]
    pub categories: BTreeMap<String, CategoryConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:7341".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    /// Default filter directive, used when `CTXR_LOG` is unset.
    #[serde(default = "default_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
        }
    }
}

fn default_level() -> String {
    "info".to_string()
}

/// One `[categories.<key>]` table.
#[derive(Debug, Deserialize, Clone)]
pub struct CategoryConfig {
    /// `point`, `bounded`, `persistent`, or `always`.
    pub kind: String,
    pub tail_days: Option<u32>,
    pub buffer_days: Option<u32>,
    /// `true`/`false`, or a magnitude name meaning "at least this".
    #[serde(default)]
    pub significant: ComparisonDefault,
    #[serde(default)]
    pub comparison_window_days: u32,
    #[serde(default)]
    pub description: String,
}

impl Config {
    /// Built-in categories with the configured overrides applied.
    pub fn registry(&self) -> Result<CategoryRegistry> {
        let overrides = self
            .categories
            .iter()
            .map(|(key, c)| {
                CategoryDescriptor::from_parts(
                    key,
                    &c.kind,
                    c.tail_days,
                    c.buffer_days,
                    c.significant,
                    c.comparison_window_days,
                    &c.description,
                )
                .map(|descriptor| (key.clone(), descriptor))
            })
            .collect::<Result<Vec<_>, _>>()
            .context("Invalid [categories] configuration")?;

        CategoryRegistry::builtin()
            .with_overrides(overrides)
            .context("Invalid [categories] configuration")
    }
}

/// Parse and validate configuration from a TOML string.
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).context("Failed to parse config file")?;

    if config.db.path.as_os_str().is_empty() {
        anyhow::bail!("db.path must not be empty");
    }

    if config.server.bind.trim().is_empty() {
        anyhow::bail!("server.bind must not be empty");
    }

    if config.logging.level.trim().is_empty() {
        anyhow::bail!("logging.level must not be empty");
    }

    // Surface registry errors at load time rather than on first use.
    config.registry()?;

    Ok(config)
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_config(&content)
}
