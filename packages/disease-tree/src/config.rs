//! Job configuration (YAML loading + validation)
//!
//! ```yaml
//! version: 1
//! database: warehouse.db
//! root_id: "DOID:4"
//! batch_size: 5000
//! tables:
//!   index: ncats_do
//! ```
//!
//! Every field except `version` may be omitted; omitted fields take the
//! values of [`JobConfig::default`].

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Supported schema versions
pub const SUPPORTED_VERSIONS: &[u32] = &[1];

pub const DEFAULT_ROOT_ID: &str = "DOID:4";
pub const DEFAULT_ORPHAN_DEFINITION: &str = "non-standard DO name";
pub const DEFAULT_CANONICAL_PREFIX: &str = "DOID";
pub const DEFAULT_BATCH_SIZE: usize = 5_000;
pub const MAX_BATCH_SIZE: usize = 50_000;

/// Configuration error type
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Range validation error
    #[error("Invalid range for field '{field}': {value} not in {min}..={max}")]
    Range {
        field: String,
        value: String,
        min: String,
        max: String,
    },

    /// Missing version field in YAML
    #[error("Missing 'version' field in configuration file. Add 'version: 1' to the top of your YAML file.")]
    MissingVersion,

    /// Unsupported version
    #[error("Unsupported configuration version {found}. Supported versions: {}", supported.iter().map(|v| v.to_string()).collect::<Vec<_>>().join(", "))]
    UnsupportedVersion { found: u32, supported: Vec<u32> },

    /// Table name that cannot be interpolated into SQL
    #[error("Field '{field}' must be a plain SQL identifier, got '{value}'")]
    InvalidIdentifier { field: String, value: String },

    /// Required text field left empty
    #[error("Field '{0}' must not be empty")]
    Empty(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parsing error
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Configuration result type
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Relation names read and written by the job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct TableNames {
    /// Hierarchy node table `(doid, name, def)`
    pub nodes: String,
    /// Hierarchy edge table `(doid, parent_id)`
    pub edges: String,
    /// Disease assignment table `(ncats_name, did)`
    pub assignments: String,
    /// Published nested-set index
    pub index: String,
}

impl Default for TableNames {
    fn default() -> Self {
        Self {
            nodes: "do".to_string(),
            edges: "do_parent".to_string(),
            assignments: "disease".to_string(),
            index: "ncats_do".to_string(),
        }
    }
}

impl TableNames {
    /// Staging table the next generation is built into.
    pub fn staging(&self) -> String {
        format!("{}_staging", self.index)
    }

    /// Generation metadata table.
    pub fn meta(&self) -> String {
        format!("{}_meta", self.index)
    }
}

/// Rebuild job configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct JobConfig {
    /// Schema version (always 1 for v1)
    pub version: u32,
    /// SQLite database holding both the inputs and the published index
    pub database: PathBuf,
    /// Identifier the traversal starts from
    pub root_id: String,
    /// Rows per bulk INSERT statement
    pub batch_size: usize,
    /// Definition stored on synthetic records
    pub orphan_definition: String,
    /// Identifier prefix that marks a label as canonically linked
    pub canonical_prefix: String,
    /// Emit a progress event every N assigned counter values
    pub progress_every: u64,
    pub tables: TableNames,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            version: 1,
            database: PathBuf::from("warehouse.db"),
            root_id: DEFAULT_ROOT_ID.to_string(),
            batch_size: DEFAULT_BATCH_SIZE,
            orphan_definition: DEFAULT_ORPHAN_DEFINITION.to_string(),
            canonical_prefix: DEFAULT_CANONICAL_PREFIX.to_string(),
            progress_every: 1_000,
            tables: TableNames::default(),
        }
    }
}

impl JobConfig {
    /// Load and validate a YAML configuration file.
    pub fn from_yaml(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    pub fn from_yaml_str(content: &str) -> ConfigResult<Self> {
        let raw: serde_yaml::Value = serde_yaml::from_str(content)?;
        if raw.get("version").is_none() {
            return Err(ConfigError::MissingVersion);
        }

        let config: JobConfig = serde_yaml::from_value(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_yaml(&self) -> ConfigResult<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if !SUPPORTED_VERSIONS.contains(&self.version) {
            return Err(ConfigError::UnsupportedVersion {
                found: self.version,
                supported: SUPPORTED_VERSIONS.to_vec(),
            });
        }

        if self.batch_size == 0 || self.batch_size > MAX_BATCH_SIZE {
            return Err(ConfigError::Range {
                field: "batch_size".to_string(),
                value: self.batch_size.to_string(),
                min: "1".to_string(),
                max: MAX_BATCH_SIZE.to_string(),
            });
        }

        if self.progress_every == 0 {
            return Err(ConfigError::Range {
                field: "progress_every".to_string(),
                value: "0".to_string(),
                min: "1".to_string(),
                max: u64::MAX.to_string(),
            });
        }

        for (field, value) in [
            ("root_id", &self.root_id),
            ("canonical_prefix", &self.canonical_prefix),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::Empty(field.to_string()));
            }
        }

        for (field, value) in [
            ("tables.nodes", &self.tables.nodes),
            ("tables.edges", &self.tables.edges),
            ("tables.assignments", &self.tables.assignments),
            ("tables.index", &self.tables.index),
        ] {
            if !is_identifier(value) {
                return Err(ConfigError::InvalidIdentifier {
                    field: field.to_string(),
                    value: value.clone(),
                });
            }
        }

        Ok(())
    }
}

/// `[A-Za-z_][A-Za-z0-9_]*`
fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
