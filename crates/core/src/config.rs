//! Record and engine configuration
//!
//! Two layers:
//!
//! - [`RecordConfig`]: per-record settings carried by every version and
//!   merged over by [`ConfigOverride`].
//! - [`EngineConfig`]: policies shared by every record an engine creates,
//!   loadable from `recordchain.toml`.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

/// Config file name for engine policies.
pub const CONFIG_FILE_NAME: &str = "recordchain.toml";

/// Default id attribute name.
pub const DEFAULT_ID_ATTRIBUTE: &str = "id";

/// Default attribute used to carry a temporary id when serializing.
pub const DEFAULT_CLIENT_ID_ATTRIBUTE: &str = "clientId";

fn default_id_attribute() -> String {
    DEFAULT_ID_ATTRIBUTE.to_string()
}

fn default_client_id_attribute() -> String {
    DEFAULT_CLIENT_ID_ATTRIBUTE.to_string()
}

// ============================================================================
// Record configuration
// ============================================================================

/// Per-record configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordConfig {
    /// Name of the attribute holding the record's identity
    #[serde(default = "default_id_attribute")]
    pub id_attribute: String,
    /// Treat the record as new even if its id looks permanent (drafts)
    #[serde(default)]
    pub force_temporary: bool,
}

impl Default for RecordConfig {
    fn default() -> Self {
        Self {
            id_attribute: default_id_attribute(),
            force_temporary: false,
        }
    }
}

impl RecordConfig {
    /// Config with a custom id attribute
    pub fn with_id_attribute(id_attribute: impl Into<String>) -> Self {
        Self {
            id_attribute: id_attribute.into(),
            ..Self::default()
        }
    }

    /// Config for a record that stays new regardless of its id
    pub fn temporary() -> Self {
        Self {
            force_temporary: true,
            ..Self::default()
        }
    }

    /// Return a copy with `overrides` applied
    pub fn merged(&self, overrides: &ConfigOverride) -> Self {
        Self {
            id_attribute: overrides
                .id_attribute
                .clone()
                .unwrap_or_else(|| self.id_attribute.clone()),
            force_temporary: overrides.force_temporary.unwrap_or(self.force_temporary),
        }
    }
}

/// Partial configuration merged over a record's current config on merge
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigOverride {
    /// Replacement id attribute name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_attribute: Option<String>,
    /// Replacement `force_temporary` flag
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub force_temporary: Option<bool>,
}

impl ConfigOverride {
    /// Override only `force_temporary`
    pub fn force_temporary(value: bool) -> Self {
        Self {
            force_temporary: Some(value),
            ..Self::default()
        }
    }

    /// `true` when nothing is overridden
    pub fn is_empty(&self) -> bool {
        self.id_attribute.is_none() && self.force_temporary.is_none()
    }
}

// ============================================================================
// Engine configuration
// ============================================================================

/// What `on_can_be_created` does when the record is already ready
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadinessPolicy {
    /// Schedule the listener right away
    #[default]
    Immediate,
    /// Reject the registration with `AlreadyCanBeCreated`
    Strict,
}

/// How a new record's temporary id is serialized
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemporaryIdPolicy {
    /// Relabel the id under the client id attribute
    #[default]
    ClientId,
    /// Leave the id out entirely
    Omit,
}

/// Engine-wide policies loaded from `recordchain.toml`.
///
/// # Example
///
/// ```toml
/// readiness = "immediate"
/// temporary_ids = "client_id"
/// client_id_attribute = "clientId"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Policy for readiness listeners registered on ready records
    #[serde(default)]
    pub readiness: ReadinessPolicy,
    /// Policy for temporary ids in plain-object output
    #[serde(default)]
    pub temporary_ids: TemporaryIdPolicy,
    /// Attribute name used under `TemporaryIdPolicy::ClientId`
    #[serde(default = "default_client_id_attribute")]
    pub client_id_attribute: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            readiness: ReadinessPolicy::default(),
            temporary_ids: TemporaryIdPolicy::default(),
            client_id_attribute: default_client_id_attribute(),
        }
    }
}

impl EngineConfig {
    /// Check cross-field consistency.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if the client id attribute is blank.
    pub fn validate(&self) -> Result<()> {
        if self.temporary_ids == TemporaryIdPolicy::ClientId
            && self.client_id_attribute.trim().is_empty()
        {
            return Err(Error::InvalidConfig(
                "client_id_attribute must not be empty when temporary_ids = \"client_id\""
                    .to_string(),
            ));
        }
        Ok(())
    }

    /// Parse and validate config from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: EngineConfig = toml::from_str(content)
            .map_err(|e| Error::InvalidConfig(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Returns the default config file content with comments.
    pub fn default_toml() -> &'static str {
        r#"# recordchain engine configuration
#
# What on_can_be_created does when the record is already ready:
#   "immediate" = schedule the listener right away (default)
#   "strict"    = reject with AlreadyCanBeCreated
readiness = "immediate"

# How a new record's temporary id appears in plain-object output:
#   "client_id" = relabel it under client_id_attribute (default)
#   "omit"      = leave it out
temporary_ids = "client_id"
client_id_attribute = "clientId"
"#
    }

    /// Read and parse config from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed, or validated.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&content).map_err(|e| match e {
            Error::InvalidConfig(msg) => {
                Error::InvalidConfig(format!("{} ({})", msg, path.display()))
            }
            other => other,
        })?;
        debug!(target: "recordchain::config", path = %path.display(), ?config, "Loaded engine config");
        Ok(config)
    }

    /// Write the default config file if it does not already exist.
    pub fn write_default_if_missing(path: &Path) -> Result<()> {
        if !path.exists() {
            std::fs::write(path, Self::default_toml())?;
        }
        Ok(())
    }

    /// Serialize this config to TOML and write it to the given path.
    pub fn write_to_file(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::InvalidConfig(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
