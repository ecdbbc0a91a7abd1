//! Configuration for the ChatOps plugins.
//! This module handles parsing, validation, and interpolation of the
//! ~/.config/chatops/config.yaml file and of the host's communication config.

mod communication;
mod interpolation;
mod io;
mod model;
mod validation;

pub use communication::{CommunicationConfig, load_bot_token};
pub use interpolation::{InterpolationError, interpolate_config, interpolate_string};
pub use io::{CONFIG_PATH_ENV, default_config_path, load_config, load_config_from_path};
pub use model::{
    ConfigError, DEFAULT_BOT_NAME_PLACEHOLDER, DEFAULT_COMMUNICATION_CONFIG_PATH, DEFAULT_SCRIPTS_DIR, PluginConfig,
    SnippetConfig,
};
pub use validation::{ValidationError, validate_channel_id, validate_config};
