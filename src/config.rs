//! TOML configuration.
//!
//! Only `[db]` is required; every other section falls back to the defaults
//! below. See `config/redirects.example.toml` for a complete file.

use anyhow::{Context, Result};
use regex::Regex;
use serde::Deserialize;
use std::path::{Path, PathBuf};

use redirect_handler_core::import::{
    ImportOptions, DEFAULT_CHECKPOINT_INTERVAL, DEFAULT_CREATOR, DEFAULT_SOURCE_PATTERN,
};
use redirect_handler_core::ResolveOptions;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub features: FeaturesConfig,
    #[serde(default)]
    pub validation: ValidationConfig,
    #[serde(default)]
    pub import: ImportConfig,
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Scheme of absolute `Location` URIs when no `X-Forwarded-Proto` is sent.
    #[serde(default = "default_scheme")]
    pub scheme: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            scheme: default_scheme(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8080".to_string()
}
fn default_scheme() -> String {
    "http".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct FeaturesConfig {
    #[serde(default = "default_true")]
    pub hit_counter: bool,
    #[serde(default = "default_true")]
    pub host_fallback: bool,
}

impl Default for FeaturesConfig {
    fn default() -> Self {
        Self {
            hit_counter: true,
            host_fallback: true,
        }
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize, Clone)]
pub struct ValidationConfig {
    #[serde(default = "default_source_uri_path")]
    pub source_uri_path: String,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            source_uri_path: default_source_uri_path(),
        }
    }
}

fn default_source_uri_path() -> String {
    DEFAULT_SOURCE_PATTERN.to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct ImportConfig {
    #[serde(default = "default_checkpoint_interval")]
    pub checkpoint_interval: usize,
    #[serde(default = "default_creator")]
    pub default_creator: String,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            checkpoint_interval: default_checkpoint_interval(),
            default_creator: default_creator(),
        }
    }
}

fn default_checkpoint_interval() -> usize {
    DEFAULT_CHECKPOINT_INTERVAL
}
fn default_creator() -> String {
    DEFAULT_CREATOR.to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct LogConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Plain,
    Json,
}

impl Config {
    /// In-code defaults with the database under `./data/`.
    pub fn minimal() -> Self {
        Self {
            db: DbConfig {
                path: PathBuf::from("./data/redirects.sqlite"),
            },
            server: ServerConfig::default(),
            features: FeaturesConfig::default(),
            validation: ValidationConfig::default(),
            import: ImportConfig::default(),
            log: LogConfig::default(),
        }
    }

    pub fn resolve_options(&self) -> ResolveOptions {
        ResolveOptions {
            hit_counter: self.features.hit_counter,
            host_fallback: self.features.host_fallback,
        }
    }

    pub fn import_options(&self) -> Result<ImportOptions> {
        let pattern = Regex::new(&self.validation.source_uri_path)
            .with_context(|| "validation.source_uri_path is not a valid regex")?;
        Ok(ImportOptions {
            source_pattern: pattern,
            default_creator: self.import.default_creator.clone(),
            checkpoint_interval: self.import.checkpoint_interval,
        })
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if Regex::new(&config.validation.source_uri_path).is_err() {
        anyhow::bail!(
            "validation.source_uri_path is not a valid regex: '{}'",
            config.validation.source_uri_path
        );
    }

    if config.import.checkpoint_interval == 0 {
        anyhow::bail!("import.checkpoint_interval must be > 0");
    }

    match config.server.scheme.as_str() {
        "http" | "https" => {}
        other => anyhow::bail!(
            "Unknown server scheme: '{}'. Must be http or https.",
            other
        ),
    }

    match config.log.level.as_str() {
        "off" | "error" | "warn" | "info" | "debug" | "trace" => {}
        other => anyhow::bail!(
            "Unknown log level: '{}'. Must be error, warn, info, debug, or trace.",
            other
        ),
    }

    Ok(())
}
