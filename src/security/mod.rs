//! Security labeling
//!
//! This module holds the SELinux side of the extension: security identifiers
//! and their interning table, the policy interface, the label records
//! attached to subjects and objects, and the extension configuration.

pub mod labels;
pub mod policy;
pub mod sid;

pub use labels::*;
pub use policy::*;
pub use sid::*;

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// SELinux mode from the server configuration file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SelinuxMode {
    /// Follow the host's enforcing state
    #[default]
    Default,
    /// Do not load the extension
    Disabled,
    /// Log denials without enforcing them
    Permissive,
    /// Enforce policy decisions
    Enforcing,
}

impl SelinuxMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SelinuxMode::Default => "default",
            SelinuxMode::Disabled => "disabled",
            SelinuxMode::Permissive => "permissive",
            SelinuxMode::Enforcing => "enforcing",
        }
    }
}

impl fmt::Display for SelinuxMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors reading extension configuration values
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("invalid SELinux mode: {0}")]
    InvalidMode(String),
}

impl FromStr for SelinuxMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "default" => Ok(SelinuxMode::Default),
            "disabled" | "off" => Ok(SelinuxMode::Disabled),
            "permissive" => Ok(SelinuxMode::Permissive),
            "enforcing" => Ok(SelinuxMode::Enforcing),
            _ => Err(ConfigError::InvalidMode(s.to_string())),
        }
    }
}

/// Extension configuration
#[derive(Debug, Clone)]
pub struct SelinuxConfig {
    /// Mode from the configuration file
    pub mode: SelinuxMode,

    /// Policy boolean that must be active for the extension to load
    pub object_manager_boolean: String,

    /// Label of the server itself (None = unlabeled)
    pub server_context: Option<String>,

    /// Label given to every connecting client (None = unlabeled)
    pub client_context: Option<String>,
}

impl Default for SelinuxConfig {
    fn default() -> Self {
        SelinuxConfig {
            mode: SelinuxMode::Default,
            object_manager_boolean: OBJECT_MANAGER_BOOLEAN.to_string(),
            server_context: None,
            client_context: None,
        }
    }
}

impl SelinuxConfig {
    /// Configuration that keeps the extension from loading
    pub fn disabled() -> Self {
        SelinuxConfig {
            mode: SelinuxMode::Disabled,
            ..SelinuxConfig::default()
        }
    }

    pub fn with_mode(mut self, mode: SelinuxMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_server_context(mut self, context: &str) -> Self {
        self.server_context = Some(context.to_string());
        self
    }

    pub fn with_client_context(mut self, context: &str) -> Self {
        self.client_context = Some(context.to_string());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_parsing() {
        assert_eq!("Enforcing".parse(), Ok(SelinuxMode::Enforcing));
        assert_eq!("PERMISSIVE".parse(), Ok(SelinuxMode::Permissive));
        assert_eq!("off".parse(), Ok(SelinuxMode::Disabled));
        assert_eq!(
            "sometimes".parse::<SelinuxMode>(),
            Err(ConfigError::InvalidMode("sometimes".to_string()))
        );
        assert_eq!(SelinuxMode::default().to_string(), "default");
    }

    #[test]
    fn test_config_presets() {
        let config = SelinuxConfig::default();
        assert_eq!(config.object_manager_boolean, OBJECT_MANAGER_BOOLEAN);
        assert_eq!(SelinuxConfig::disabled().mode, SelinuxMode::Disabled);

        let config = SelinuxConfig::default()
            .with_mode(SelinuxMode::Enforcing)
            .with_client_context("u:r:client_t");
        assert_eq!(config.mode, SelinuxMode::Enforcing);
        assert_eq!(config.client_context.as_deref(), Some("u:r:client_t"));
    }
}
