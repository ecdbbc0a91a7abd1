//! The host's communication settings, read for the bot token.

use std::{fs, path::Path};

use serde::Deserialize;

use crate::config::{ConfigError, interpolation::interpolate_string};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CommunicationConfig {
    #[serde(default)]
    pub communications: Communications,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Communications {
    #[serde(default, rename = "default-group")]
    pub default_group: CommunicationGroup,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CommunicationGroup {
    #[serde(default, rename = "socketSlack")]
    pub socket_slack: SocketSlack,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SocketSlack {
    #[serde(default)]
    pub bot_token: String,
}

impl CommunicationConfig {
    /// The Slack bot token of the default group, when one is set.
    pub fn bot_token(&self) -> Option<&str> {
        let token = self.communications.default_group.socket_slack.bot_token.trim();
        (!token.is_empty()).then_some(token)
    }
}

/// Load the communication config at `path` and return its bot token.
pub fn load_bot_token(path: &Path) -> Result<String, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let config: CommunicationConfig = serde_yaml::from_str(&content).map_err(|source| ConfigError::Yaml {
        path: path.to_path_buf(),
        source,
    })?;
    let token = config.bot_token().ok_or(ConfigError::MissingBotToken)?;
    Ok(interpolate_string(token)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn reads_bot_token_from_default_group() {
        let file = write_config(
            r#"
communications:
  default-group:
    socketSlack:
      enabled: true
      botToken: xoxb-123
"#,
        );
        assert_eq!(load_bot_token(file.path()).unwrap(), "xoxb-123");
    }

    #[test]
    fn empty_token_is_reported() {
        let file = write_config("communications:\n  default-group:\n    socketSlack:\n      botToken: \"\"\n");
        let err = load_bot_token(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::MissingBotToken));
        assert_eq!(err.to_string(), "Bottoken not found");
    }

    #[test]
    fn token_supports_env_placeholders() {
        let file = write_config("communications:\n  default-group:\n    socketSlack:\n      botToken: ${env:CHATOPS_TEST_TOKEN}\n");
        temp_env::with_var("CHATOPS_TEST_TOKEN", Some("xoxb-env"), || {
            assert_eq!(load_bot_token(file.path()).unwrap(), "xoxb-env");
        });
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = load_bot_token(Path::new("/nonexistent/comm_config.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
