//! `${env:NAME}` substitution in configuration values.

use std::path::PathBuf;

use regex::Regex;
use thiserror::Error;
use tracing::debug;

use crate::config::PluginConfig;

/// Interpolate environment variables in every string-valued setting.
pub fn interpolate_config(config: &mut PluginConfig) -> Result<(), InterpolationError> {
    config.scripts_dir = interpolate_path(&config.scripts_dir)?;
    config.bot_name_placeholder = interpolate_string(&config.bot_name_placeholder)?;

    let snippet = &mut config.snippet;
    if let Some(channel) = &mut snippet.channel_id {
        *channel = interpolate_string(channel)?;
    }
    snippet.comment = interpolate_string(&snippet.comment)?;
    snippet.communication_config_path = interpolate_path(&snippet.communication_config_path)?;
    snippet.api_base = interpolate_string(&snippet.api_base)?;
    Ok(())
}

fn interpolate_path(path: &std::path::Path) -> Result<PathBuf, InterpolationError> {
    match path.to_str() {
        Some(raw) => Ok(PathBuf::from(interpolate_string(raw)?)),
        None => Ok(path.to_path_buf()),
    }
}

/// Replace each `${env:NAME}` in `value` with the variable's value.
pub fn interpolate_string(value: &str) -> Result<String, InterpolationError> {
    let env_regex = Regex::new(r"\$\{env:([\w+_-]*)}")?;

    let mut resolved = Vec::new();
    for cap in env_regex.captures_iter(value) {
        let var_name = cap[1].to_string();
        let env_value = std::env::var(&var_name).map_err(|_| InterpolationError::MissingEnvVar { name: var_name.clone() })?;
        debug!("Interpolated env var: {} -> [REDACTED]", var_name);
        resolved.push((cap[0].to_string(), env_value));
    }

    let mut result = value.to_string();
    for (placeholder, env_value) in resolved {
        result = result.replace(&placeholder, &env_value);
    }
    Ok(result)
}

#[derive(Debug, Error, Clone)]
pub enum InterpolationError {
    #[error("Missing environment variable: {name}")]
    MissingEnvVar { name: String },

    #[error("Regex compilation error: {0}")]
    Regex(#[from] regex::Error),
}
