use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

pub const DEFAULT_CONFIG_FILE: &str = "tablesync.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Missing required setting `{0}` (set it in the config file or the environment)")]
    Missing(&'static str),

    #[error("Invalid value for {name}: {value}")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub target: TargetConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub mapping: MappingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    /// Allow cross-origin requests from any origin
    #[serde(default = "default_true")]
    pub cors: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            cors: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum SourceKind {
    #[default]
    Airtable,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    #[serde(default)]
    pub kind: SourceKind,
    #[serde(default = "default_source_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub base_id: Option<String>,
    /// Table the target collection is built from
    #[serde(default = "default_collection")]
    pub collection: String,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            kind: SourceKind::default(),
            base_url: default_source_base_url(),
            api_key: None,
            base_id: None,
            collection: default_collection(),
        }
    }
}

/// Resolved credentials of the source store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceCredentials {
    pub api_key: String,
    pub base_id: String,
}

impl SourceConfig {
    pub fn credentials(&self) -> Result<SourceCredentials, ConfigError> {
        Ok(SourceCredentials {
            api_key: required(&self.api_key, "source.api_key")?,
            base_id: required(&self.base_id, "source.base_id")?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum TargetKind {
    #[default]
    Webflow,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetConfig {
    #[serde(default)]
    pub kind: TargetKind,
    #[serde(default = "default_target_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub collection_id: Option<String>,
    /// Sent as `accept-version` header
    #[serde(default = "default_api_version")]
    pub api_version: String,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            kind: TargetKind::default(),
            base_url: default_target_base_url(),
            api_key: None,
            collection_id: None,
            api_version: default_api_version(),
        }
    }
}

/// Resolved credentials of the target store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetCredentials {
    pub api_key: String,
    pub collection_id: String,
}

impl TargetConfig {
    pub fn credentials(&self) -> Result<TargetCredentials, ConfigError> {
        Ok(TargetCredentials {
            api_key: required(&self.api_key, "target.api_key")?,
            collection_id: required(&self.collection_id, "target.collection_id")?,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Maximum number of target operations in flight (1 = strictly sequential)
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Skip updates whose mapped fields already match the stored item
    #[serde(default)]
    pub skip_unchanged: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            skip_unchanged: false,
        }
    }
}

/// How a source value is rendered into the target schema
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum FieldKind {
    /// Passed through, empty string when missing
    #[default]
    Text,
    /// Rendered as a decimal string, "0" when missing
    Number,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldRule {
    pub source: String,
    pub target: String,
    #[serde(default)]
    pub kind: FieldKind,
}

impl FieldRule {
    pub fn new(source: impl Into<String>, target: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            kind,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingConfig {
    /// Target field holding the id of the source record an item was built from
    #[serde(default = "default_link_field")]
    pub link_field: String,
    /// Source field the slug is derived from
    #[serde(default = "default_slug_source")]
    pub slug_source: String,
    #[serde(default = "default_field_rules")]
    pub fields: Vec<FieldRule>,
}

impl Default for MappingConfig {
    fn default() -> Self {
        Self {
            link_field: default_link_field(),
            slug_source: default_slug_source(),
            fields: default_field_rules(),
        }
    }
}

fn default_port() -> u16 {
    3000
}

fn default_true() -> bool {
    true
}

fn default_source_base_url() -> String {
    "https://api.airtable.com/v0".to_string()
}

fn default_collection() -> String {
    "Biaw Classes".to_string()
}

fn default_target_base_url() -> String {
    "https://api.webflow.com".to_string()
}

fn default_api_version() -> String {
    "1.0.0".to_string()
}

fn default_concurrency() -> usize {
    1
}

fn default_link_field() -> String {
    "sourceRecordId".to_string()
}

fn default_slug_source() -> String {
    "Name".to_string()
}

fn default_field_rules() -> Vec<FieldRule> {
    vec![
        FieldRule::new("Name", "name", FieldKind::Text),
        FieldRule::new("Description", "description", FieldKind::Text),
        FieldRule::new("Date", "date", FieldKind::Text),
        FieldRule::new("End Time", "end-time", FieldKind::Text),
        FieldRule::new("Number of seats", "number-of-seats", FieldKind::Number),
        FieldRule::new("Price - Member", "price-member", FieldKind::Number),
    ]
}

fn required(value: &Option<String>, name: &'static str) -> Result<String, ConfigError> {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v.to_string()),
        _ => Err(ConfigError::Missing(name)),
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Like [`Config::load`], but a missing file yields the defaults.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Loads the config file (if any) and applies the process environment.
    pub fn from_path_and_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load_or_default(path)?;
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Overrides settings from environment variables.
    ///
    /// `lookup` resolves a variable name; the process environment in
    /// production, a map in tests.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(port) = lookup("PORT") {
            self.server.port = port.trim().parse().map_err(|_| ConfigError::Invalid {
                name: "PORT",
                value: port.clone(),
            })?;
        }
        if let Some(key) = lookup("AIRTABLE_API_KEY") {
            self.source.api_key = Some(key);
        }
        if let Some(base) = lookup("AIRTABLE_BASE_ID") {
            self.source.base_id = Some(base);
        }
        if let Some(key) = lookup("WEBFLOW_API_KEY") {
            self.target.api_key = Some(key);
        }
        if let Some(collection) = lookup("WEBFLOW_COLLECTION_ID") {
            self.target.collection_id = Some(collection);
        }
        Ok(())
    }
}
