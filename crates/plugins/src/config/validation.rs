//! Configuration validation.

use regex::Regex;
use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::config::{PluginConfig, SnippetConfig};

/// Validate the entire plugin configuration.
pub fn validate_config(config: &PluginConfig) -> Result<(), ValidationError> {
    if config.scripts_dir.as_os_str().is_empty() {
        return Err(ValidationError::MissingRequiredField {
            field: "scriptsDir".to_string(),
        });
    }
    if config.discovery_timeout_secs == 0 {
        return Err(ValidationError::NotPositive {
            field: "discoveryTimeoutSecs".to_string(),
        });
    }
    if config.dispatch_timeout_secs == 0 {
        return Err(ValidationError::NotPositive {
            field: "dispatchTimeoutSecs".to_string(),
        });
    }
    if config.inline_output_limit == 0 {
        return Err(ValidationError::NotPositive {
            field: "inlineOutputLimit".to_string(),
        });
    }
    if config.bot_name_placeholder.trim().is_empty() {
        return Err(ValidationError::MissingRequiredField {
            field: "botNamePlaceholder".to_string(),
        });
    }
    validate_snippet(&config.snippet)?;
    debug!("Validated plugin configuration");
    Ok(())
}

fn validate_snippet(snippet: &SnippetConfig) -> Result<(), ValidationError> {
    if let Some(channel) = &snippet.channel_id {
        validate_channel_id(channel)?;
    }

    let url = Url::parse(&snippet.api_base).map_err(|error| ValidationError::InvalidApiBase {
        reason: error.to_string(),
    })?;
    let scheme = url.scheme();
    if scheme != "http" && scheme != "https" {
        return Err(ValidationError::InvalidApiBase {
            reason: format!("Unsupported URL scheme: {} (expected http/https)", scheme),
        });
    }
    Ok(())
}

/// Validate a chat channel identifier.
pub fn validate_channel_id(channel: &str) -> Result<(), ValidationError> {
    let channel_regex = Regex::new(r"^[A-Z0-9]+$")?;
    if !channel_regex.is_match(channel) {
        return Err(ValidationError::InvalidChannelId {
            channel: channel.to_string(),
            reason: "Channel ids contain only uppercase letters and digits".to_string(),
        });
    }
    Ok(())
}

/// Errors that can occur during validation.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Missing required field '{field}'")]
    MissingRequiredField { field: String },

    #[error("'{field}' must be greater than zero")]
    NotPositive { field: String },

    #[error("Invalid channel id '{channel}': {reason}")]
    InvalidChannelId { channel: String, reason: String },

    #[error("Invalid snippet API base: {reason}")]
    InvalidApiBase { reason: String },

    #[error("Regex compilation error: {0}")]
    Regex(#[from] regex::Error),
}
