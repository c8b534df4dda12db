use anyhow::{bail, Context, Result};
use dirs::config_dir;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::discovery::Kind;
use crate::filter::EmptyIncludePolicy;

/// Main configuration structure for repomirror
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    /// Root under which one working copy per repository is kept
    #[serde(default = "default_sync_directory")]
    pub sync_directory: String,

    /// Repository filtering behaviour shared by all integrations
    #[serde(default)]
    pub filters: FilterConfig,

    /// Synchronization behavior settings
    #[serde(default)]
    pub sync: SyncConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Source → target bindings, processed in order
    #[serde(default)]
    pub integrations: Vec<Integration>,
}

/// Repository filtering configuration
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct FilterConfig {
    /// What an integration with no include rules selects
    #[serde(default)]
    pub empty_include: EmptyIncludePolicy,
}

/// Synchronization configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SyncConfig {
    /// Repositories synced concurrently within one integration
    #[serde(default = "default_max_parallel")]
    pub max_parallel: usize,

    /// Upper bound for one repository's sync in seconds (0 disables)
    #[serde(default)]
    pub repository_timeout: u64,

    /// Timeout for host REST calls in seconds
    #[serde(default = "default_http_timeout")]
    pub http_timeout: u64,
}

/// Logging configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String, // "info"

    /// Log format
    #[serde(default = "default_log_format")]
    pub format: String, // "compact", "pretty", "json"

    /// Enable colored output
    #[serde(default = "default_true")]
    pub color: bool,

    /// Also write logs to this file
    #[serde(default)]
    pub file: Option<String>,
}

/// One source → target binding
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Integration {
    pub name: String,

    #[serde(default = "default_true")]
    pub enabled: bool,

    pub source: SourceConfig,

    pub target: TargetConfig,
}

/// Where repositories are read from
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct SourceConfig {
    /// "bitbucket-cloud" or "bitbucket-server"
    #[serde(rename = "type")]
    pub source_type: String,

    #[serde(default)]
    pub base_url: Option<String>,

    /// Name of the environment variable holding the account id
    pub account_id: String,

    /// Name of the environment variable holding the access token
    pub access_token: String,

    /// "project/<KEY>" or "user/<name>"
    pub kind: String,

    #[serde(default, rename = "repos")]
    pub repositories: RepositoryRules,
}

/// Include/exclude rules, literal names or `/regex/`
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct RepositoryRules {
    #[serde(default)]
    pub include: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exclude: Vec<String>,
}

/// Where repositories are mirrored to
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct TargetConfig {
    /// "github-public"
    #[serde(rename = "type")]
    pub target_type: String,

    /// API base for self-hosted instances
    #[serde(default)]
    pub base_url: Option<String>,

    /// Name of the environment variable holding the account id
    pub account_id: String,

    /// Name of the environment variable holding the access token
    pub access_token: String,

    /// "org/<name>" or "user/<name>"
    pub kind: String,

    /// Create repositories missing on the target; otherwise skip them
    #[serde(default = "default_true")]
    pub create_missing: bool,

    #[serde(default)]
    pub branch_modifiers: Vec<BranchModifier>,
}

/// Rewrites the destination name of matching branches
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct BranchModifier {
    pub name: String,

    /// Literal branch name or `/regex/`
    #[serde(rename = "match")]
    pub pattern: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rename: Option<String>,
}

// Default value functions
fn default_sync_directory() -> String {
    "./syncDirectory".to_string()
}
fn default_true() -> bool {
    true
}
fn default_max_parallel() -> usize {
    1
}
fn default_http_timeout() -> u64 {
    15
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_format() -> String {
    "compact".to_string()
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            max_parallel: default_max_parallel(),
            repository_timeout: 0,
            http_timeout: default_http_timeout(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            color: default_true(),
            file: None,
        }
    }
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            target_type: String::new(),
            base_url: None,
            account_id: String::new(),
            access_token: String::new(),
            kind: String::new(),
            create_missing: default_true(),
            branch_modifiers: Vec::new(),
        }
    }
}

impl Integration {
    /// Directory name for this integration's working copies
    pub fn directory_name(&self) -> String {
        integration_directory_name(&self.name)
    }
}

/// Spaces in an integration name become dashes on disk
pub fn integration_directory_name(name: &str) -> String {
    name.replace(' ', "-")
}

impl SyncConfig {
    pub fn repository_timeout(&self) -> Option<Duration> {
        (self.repository_timeout > 0).then(|| Duration::from_secs(self.repository_timeout))
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout.max(1))
    }
}

impl Config {
    /// Load configuration from the default location or create a default config
    pub fn load_or_default() -> Result<Self> {
        let config_path = Self::default_config_path()?;

        if config_path.exists() {
            Self::load(&config_path)
        } else {
            let config = Self::default();

            if let Some(parent) = config_path.parent() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
            }

            config.save(&config_path)?;

            tracing::info!("Created default configuration at: {:?}", config_path);
            Ok(config)
        }
    }

    /// Load configuration from a specific file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        let mut config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;

        config.expand_paths()?;
        config
            .validate()
            .with_context(|| format!("Invalid config file: {:?}", path))?;

        Ok(config)
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_yaml::to_string(self).context("Failed to serialize configuration")?;

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {:?}", path))?;

        Ok(())
    }

    /// Get the default configuration file path (XDG compliant)
    pub fn default_config_path() -> Result<PathBuf> {
        let config_dir = config_dir().context("Failed to get user config directory")?;

        Ok(config_dir.join("repomirror").join("config.yml"))
    }

    /// Expand environment variables in configuration paths
    pub fn expand_paths(&mut self) -> Result<()> {
        self.sync_directory = shellexpand::full(&self.sync_directory)
            .context("Failed to expand sync_directory path")?
            .into_owned();

        if let Some(file) = &self.logging.file {
            self.logging.file = Some(
                shellexpand::full(file)
                    .context("Failed to expand logging.file path")?
                    .into_owned(),
            );
        }

        Ok(())
    }

    /// Check the parts serde cannot: names and kinds
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();

        for integration in &self.integrations {
            if integration.name.trim().is_empty() {
                bail!("Integration names must not be empty");
            }
            if !seen.insert(integration.directory_name()) {
                bail!("Duplicate integration name: {}", integration.name);
            }
            Kind::parse(&integration.source.kind)
                .with_context(|| format!("Integration '{}' source", integration.name))?;
            Kind::parse(&integration.target.kind)
                .with_context(|| format!("Integration '{}' target", integration.name))?;
        }

        Ok(())
    }

    /// Integrations that should run, in configuration order
    pub fn enabled_integrations(&self) -> impl Iterator<Item = &Integration> {
        self.integrations.iter().filter(|i| i.enabled)
    }

    pub fn sync_root(&self) -> PathBuf {
        PathBuf::from(&self.sync_directory)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sync_directory: default_sync_directory(),
            filters: FilterConfig::default(),
            sync: SyncConfig::default(),
            logging: LoggingConfig::default(),
            integrations: Vec::new(),
        }
    }
}
