//! Envelopes exchanged between the host bot runtime and a plugin.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::Message;

/// A command delivered by the host together with its per-call context.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteInput {
    /// Raw command text, e.g. `job select_target backup-job`.
    pub command: String,
    #[serde(default)]
    pub context: ExecuteContext,
}

impl ExecuteInput {
    pub fn new(command: impl Into<String>, context: ExecuteContext) -> Self {
        Self {
            command: command.into(),
            context,
        }
    }
}

#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteContext {
    /// Whether the originating platform can render dropdowns, inputs and buttons.
    #[serde(default)]
    pub is_interactivity_supported: bool,
    /// Raw kubeconfig bytes for cluster-scoped commands.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kube_config: Option<Vec<u8>>,
    /// Conversation identity; selection state is tracked per identity.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session: Option<SessionIdentity>,
}

impl fmt::Debug for ExecuteContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecuteContext")
            .field("is_interactivity_supported", &self.is_interactivity_supported)
            .field("kube_config", &self.kube_config.as_ref().map(|_| "[REDACTED]"))
            .field("session", &self.session)
            .finish()
    }
}

/// Stable identifier of one conversation as seen by the host.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionIdentity {
    pub user_id: String,
    pub channel_id: String,
    /// Thread within the channel, when the platform has threads.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,
}

impl SessionIdentity {
    pub fn new(user_id: impl Into<String>, channel_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            channel_id: channel_id.into(),
            thread_id: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecuteOutput {
    pub message: Message,
}

impl From<Message> for ExecuteOutput {
    fn from(message: Message) -> Self {
        Self { message }
    }
}

/// Static description of a plugin.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataOutput {
    pub version: String,
    pub description: String,
    /// External binaries the plugin needs, keyed by binary name.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub dependencies: IndexMap<String, Dependency>,
}

/// Download locations of an external binary, keyed by `os/arch`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependency {
    pub urls: IndexMap<String, String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_hides_kubeconfig() {
        let context = ExecuteContext {
            kube_config: Some(b"apiVersion: v1\ntoken: secret".to_vec()),
            ..Default::default()
        };
        let rendered = format!("{context:?}");
        assert!(rendered.contains("[REDACTED]"));
        assert!(!rendered.contains("secret"));
    }
}
