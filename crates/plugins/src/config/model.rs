//! Configuration data structures for the ChatOps plugins.

use std::{path::PathBuf, time::Duration};

use chatops_api::DEFAULT_SLACK_API_BASE;
use chatops_engine::DispatchSettings;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::{ValidationError, interpolation::InterpolationError};

pub const DEFAULT_SCRIPTS_DIR: &str = "/scripts";
pub const DEFAULT_COMMUNICATION_CONFIG_PATH: &str = "/config/comm_config.yaml";
pub const DEFAULT_BOT_NAME_PLACEHOLDER: &str = "{{BotName}}";

/// Root configuration shared by every plugin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PluginConfig {
    /// Directory whose regular files are the selectable targets.
    pub scripts_dir: PathBuf,
    pub discovery_timeout_secs: u64,
    pub dispatch_timeout_secs: u64,
    /// Output up to this many bytes is posted inline.
    pub inline_output_limit: usize,
    pub bot_name_placeholder: String,
    pub snippet: SnippetConfig,
}

impl Default for PluginConfig {
    fn default() -> Self {
        Self {
            scripts_dir: PathBuf::from(DEFAULT_SCRIPTS_DIR),
            discovery_timeout_secs: 30,
            dispatch_timeout_secs: 300,
            inline_output_limit: 3000,
            bot_name_placeholder: DEFAULT_BOT_NAME_PLACEHOLDER.to_string(),
            snippet: SnippetConfig::default(),
        }
    }
}

impl PluginConfig {
    pub fn discovery_timeout(&self) -> Duration {
        Duration::from_secs(self.discovery_timeout_secs)
    }

    pub fn dispatch_settings(&self) -> DispatchSettings {
        DispatchSettings {
            timeout: Duration::from_secs(self.dispatch_timeout_secs),
            inline_output_limit: self.inline_output_limit,
        }
    }
}

/// Where the snippet plugin posts its attachments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SnippetConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel_id: Option<String>,
    /// Comment posted alongside each attachment.
    pub comment: String,
    /// YAML file holding the bot token.
    pub communication_config_path: PathBuf,
    pub api_base: String,
}

impl Default for SnippetConfig {
    fn default() -> Self {
        Self {
            channel_id: None,
            comment: "Output:".to_string(),
            communication_config_path: PathBuf::from(DEFAULT_COMMUNICATION_CONFIG_PATH),
            api_base: DEFAULT_SLACK_API_BASE.to_string(),
        }
    }
}

/// Errors raised while loading plugin configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Cannot read '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("YAML parsing error in '{path}': {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Interpolation error: {0}")]
    Interpolation(#[from] InterpolationError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Bottoken not found")]
    MissingBotToken,

    #[error("No snippet channel is configured")]
    MissingChannel,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        let config: PluginConfig = serde_yaml::from_str("{}").unwrap();
        assert_eq!(config, PluginConfig::default());
        assert_eq!(config.dispatch_settings().inline_output_limit, 3000);
    }

    #[test]
    fn keys_are_camel_case() {
        let yaml = r#"
scriptsDir: /opt/scripts
dispatchTimeoutSecs: 60
snippet:
  channelId: C0123
"#;
        let config: PluginConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.scripts_dir, PathBuf::from("/opt/scripts"));
        assert_eq!(config.dispatch_settings().timeout, Duration::from_secs(60));
        assert_eq!(config.snippet.channel_id.as_deref(), Some("C0123"));
        assert_eq!(config.snippet.comment, "Output:");
        assert_eq!(config.discovery_timeout(), Duration::from_secs(30));
    }
}
