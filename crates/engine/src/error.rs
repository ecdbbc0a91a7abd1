//! Error taxonomy for the interactive flow.
//!
//! Every failure is recoverable from the user's point of view: the flow turns
//! an error into a chat reply with [`ChatOpsError::to_message`] and keeps the
//! session state as it was before the failing request.

use std::time::Duration;

use chatops_api::DeliveryError;
use chatops_types::Message;
use thiserror::Error;

use crate::command::CommandParseError;

/// Failures surfaced to the user of an interactive plugin.
#[derive(Debug, Error)]
pub enum ChatOpsError {
    /// Discovery of a target's parameters failed or produced unusable output.
    #[error("Cannot load the parameters of '{resource}': {reason}")]
    SchemaUnavailable { resource: String, reason: String },

    /// The target is not one of the resources the plugin is allowed to run.
    #[error("Unknown resource '{resource}'")]
    UnknownResource { resource: String },

    /// The chosen key or value does not fit the current schema.
    #[error("Invalid selection '{key}': {reason}")]
    InvalidSelection { key: String, reason: String },

    /// The command text could not be parsed.
    #[error(transparent)]
    InvalidCommand(#[from] CommandParseError),

    /// The assembled command could not be executed or exited unsuccessfully.
    #[error("Command `{command}` failed: {reason}")]
    DispatchFailure {
        command: String,
        reason: String,
        stderr: Option<String>,
    },

    /// The command ran but its output could not be handed to the channel.
    #[error("Command `{command}` ran, but its output could not be delivered: {source}")]
    DeliveryFailure {
        command: String,
        #[source]
        source: DeliveryError,
    },

    /// The request was abandoned before the command finished.
    #[error("Command `{command}` was cancelled")]
    Cancelled { command: String },

    /// No conversation identity was supplied, so selections cannot be tracked.
    #[error("Cannot track selections without a user and channel identity")]
    MissingSession,
}

impl ChatOpsError {
    pub fn schema_unavailable(resource: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::SchemaUnavailable {
            resource: resource.into(),
            reason: reason.into(),
        }
    }

    pub fn unknown_resource(resource: impl Into<String>) -> Self {
        Self::UnknownResource {
            resource: resource.into(),
        }
    }

    pub fn invalid_selection(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidSelection {
            key: key.into(),
            reason: reason.into(),
        }
    }

    pub fn dispatch_failure(command: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::DispatchFailure {
            command: command.into(),
            reason: reason.into(),
            stderr: None,
        }
    }

    pub fn timed_out(command: impl Into<String>, timeout: Duration) -> Self {
        Self::dispatch_failure(command, format!("timed out after {}s", timeout.as_secs()))
    }

    /// Render the error as an ephemeral code-block reply.
    pub fn to_message(&self) -> Message {
        let mut text = self.to_string();
        if let Self::DispatchFailure {
            stderr: Some(stderr), ..
        } = self
            && !stderr.trim().is_empty()
        {
            text.push_str("\n\n");
            text.push_str(stderr.trim_end());
        }
        Message::code_block(text, true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dispatch_failure_message_includes_stderr() {
        let error = ChatOpsError::DispatchFailure {
            command: "backup-job -n prod".into(),
            reason: "exit status 2".into(),
            stderr: Some("namespace not found\n".into()),
        };
        let message = error.to_message();
        let text = message.base_body.code_block.as_deref().unwrap();
        assert!(text.starts_with("Command `backup-job -n prod` failed: exit status 2"));
        assert!(text.ends_with("namespace not found"));
        assert!(message.only_visible_for_you);
    }

    #[test]
    fn delivery_failure_is_distinct_from_dispatch_failure() {
        let error = ChatOpsError::DeliveryFailure {
            command: "kubectl get pods".into(),
            source: DeliveryError::NotConfigured("no bot token".into()),
        };
        assert!(error.to_string().contains("ran, but its output could not be delivered"));
    }
}
