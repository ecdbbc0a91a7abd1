//! Configuration IO helpers.

use std::{
    env, fs,
    path::{Path, PathBuf},
};

use chatops_util::expand_tilde;
use dirs_next::config_dir;
use tracing::debug;

use crate::config::{ConfigError, PluginConfig, interpolate_config, validate_config};

pub const CONFIG_PATH_ENV: &str = "CHATOPS_CONFIG_PATH";

/// Returns the default path for the plugin configuration file.
pub fn default_config_path() -> PathBuf {
    if let Ok(path) = env::var(CONFIG_PATH_ENV)
        && !path.trim().is_empty()
    {
        return expand_tilde(&path);
    }

    config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("chatops")
        .join("config.yaml")
}

/// Loads the plugin configuration from the default path.
pub fn load_config() -> Result<PluginConfig, ConfigError> {
    let path = default_config_path();
    load_config_from_path(&path)
}

/// Loads, interpolates and validates the configuration at `path`.
///
/// A missing file yields the defaults.
pub fn load_config_from_path(path: &Path) -> Result<PluginConfig, ConfigError> {
    if !path.exists() {
        debug!(path = %path.display(), "no configuration file; using defaults");
        return Ok(PluginConfig::default());
    }

    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut config: PluginConfig = if content.trim().is_empty() {
        PluginConfig::default()
    } else {
        serde_yaml::from_str(&content).map_err(|source| ConfigError::Yaml {
            path: path.to_path_buf(),
            source,
        })?
    };
    interpolate_config(&mut config)?;
    config.scripts_dir = expand_path(&config.scripts_dir);
    config.snippet.communication_config_path = expand_path(&config.snippet.communication_config_path);
    validate_config(&config)?;
    Ok(config)
}

fn expand_path(path: &Path) -> PathBuf {
    path.to_str().map(expand_tilde).unwrap_or_else(|| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_path_honors_environment_override() {
        let override_path = "~/custom/chatops/config.yaml";
        temp_env::with_var(CONFIG_PATH_ENV, Some(override_path), || {
            let path = default_config_path();
            let expected = expand_tilde(override_path);
            assert_eq!(path, expected);
        });
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config_from_path(&dir.path().join("absent.yaml")).unwrap();
        assert_eq!(config, PluginConfig::default());
    }

    #[test]
    fn loads_and_validates_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "scriptsDir: /opt/jobs\ninlineOutputLimit: 512\nsnippet:\n  channelId: C99").unwrap();
        let config = load_config_from_path(file.path()).unwrap();
        assert_eq!(config.scripts_dir, PathBuf::from("/opt/jobs"));
        assert_eq!(config.inline_output_limit, 512);
        assert_eq!(config.snippet.channel_id.as_deref(), Some("C99"));
    }

    #[test]
    fn invalid_values_are_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "snippet:\n  channelId: general").unwrap();
        let err = load_config_from_path(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }

    #[test]
    fn malformed_yaml_is_reported_with_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "scriptsDir: [unterminated").unwrap();
        let err = load_config_from_path(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Yaml { .. }));
    }
}
