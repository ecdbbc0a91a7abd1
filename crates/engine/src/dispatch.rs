//! Runs assembled commands and turns their output into replies.

use std::{sync::Arc, time::Duration};

use chatops_api::{Attachment, AttachmentDelivery};
use chatops_types::Message;
use chatops_util::{redact_sensitive, truncate_output};
use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::{
    ChatOpsError,
    process::{ProcessCommand, ProcessError, ProcessExecutor, ProcessOutput},
};

pub const EMPTY_OUTPUT: &str = "empty output";

/// Where large output goes when it does not fit inline.
#[derive(Clone)]
pub struct AttachmentTarget {
    pub delivery: Arc<dyn AttachmentDelivery>,
    pub channel_id: String,
    pub comment: String,
}

impl std::fmt::Debug for AttachmentTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AttachmentTarget")
            .field("channel_id", &self.channel_id)
            .field("comment", &self.comment)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone)]
pub struct DispatchSettings {
    pub timeout: Duration,
    /// Output longer than this many bytes is not posted inline.
    pub inline_output_limit: usize,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(300),
            inline_output_limit: 3000,
        }
    }
}

/// Executes commands and formats their output for the channel.
#[derive(Clone)]
pub struct Dispatcher {
    executor: Arc<dyn ProcessExecutor>,
    attachments: Option<AttachmentTarget>,
    settings: DispatchSettings,
}

impl Dispatcher {
    pub fn new(executor: Arc<dyn ProcessExecutor>, settings: DispatchSettings) -> Self {
        Self {
            executor,
            attachments: None,
            settings,
        }
    }

    pub fn with_attachments(mut self, target: AttachmentTarget) -> Self {
        self.attachments = Some(target);
        self
    }

    pub fn settings(&self) -> &DispatchSettings {
        &self.settings
    }

    /// Run `command` and return its captured output.
    ///
    /// `shown` is the text reported to the user and written to logs.
    pub async fn run(
        &self,
        mut command: ProcessCommand,
        shown: &str,
        cancel: &CancellationToken,
    ) -> Result<ProcessOutput, ChatOpsError> {
        if command.timeout.is_zero() {
            command.timeout = self.settings.timeout;
        }
        info!(command = %redact_sensitive(shown), "dispatching command");
        self.executor
            .execute(&command, cancel)
            .await
            .map_err(|error| dispatch_error(shown, error))
    }

    /// Run `command`, replying inline when the output is short and as an
    /// attachment otherwise. Without an attachment target, long output is
    /// truncated inline.
    pub async fn dispatch(
        &self,
        command: ProcessCommand,
        shown: &str,
        cancel: &CancellationToken,
    ) -> Result<Message, ChatOpsError> {
        let output = self.run(command, shown, cancel).await?;
        let text = output_text(&output);
        if text.len() <= self.settings.inline_output_limit {
            return Ok(Message::code_block(text, false));
        }
        match &self.attachments {
            Some(target) => self.deliver(target, shown, text).await,
            None => {
                warn!(
                    command = %redact_sensitive(shown),
                    bytes = text.len(),
                    "output exceeds inline limit and no attachment target is configured; truncating"
                );
                Ok(Message::code_block(
                    truncate_output(&text, self.settings.inline_output_limit),
                    false,
                ))
            }
        }
    }

    /// Run `command` and always deliver its output as an attachment.
    pub async fn dispatch_as_attachment(
        &self,
        command: ProcessCommand,
        shown: &str,
        cancel: &CancellationToken,
    ) -> Result<Message, ChatOpsError> {
        let Some(target) = &self.attachments else {
            return Err(ChatOpsError::DeliveryFailure {
                command: shown.to_string(),
                source: chatops_api::DeliveryError::NotConfigured("no attachment target".into()),
            });
        };
        let output = self.run(command, shown, cancel).await?;
        self.deliver(target, shown, output_text(&output)).await
    }

    async fn deliver(&self, target: &AttachmentTarget, shown: &str, text: String) -> Result<Message, ChatOpsError> {
        let filename = format!("{}.log", Utc::now().timestamp());
        let attachment = Attachment::new(&filename, text, &target.channel_id, &target.comment);
        let receipt = target
            .delivery
            .deliver(attachment)
            .await
            .map_err(|source| ChatOpsError::DeliveryFailure {
                command: shown.to_string(),
                source,
            })?;
        info!(file_id = %receipt.file_id, filename = %receipt.filename, "command output delivered as attachment");
        Ok(Message::code_block(
            format!(
                "Command {shown} result sent, please check attachement the following name: {}",
                receipt.filename
            ),
            false,
        ))
    }
}

fn output_text(output: &ProcessOutput) -> String {
    if output.stdout.trim().is_empty() {
        EMPTY_OUTPUT.to_string()
    } else {
        output.stdout.clone()
    }
}

fn dispatch_error(shown: &str, error: ProcessError) -> ChatOpsError {
    match error {
        ProcessError::Cancelled { .. } => ChatOpsError::Cancelled {
            command: shown.to_string(),
        },
        ProcessError::Timeout { timeout, .. } => ChatOpsError::timed_out(shown, timeout),
        ProcessError::Failed { status, stderr, .. } => ChatOpsError::DispatchFailure {
            command: shown.to_string(),
            reason: match status {
                Some(code) => format!("exit status {code}"),
                None => "terminated by signal".to_string(),
            },
            stderr: Some(stderr),
        },
        other => ChatOpsError::dispatch_failure(shown, other.to_string()),
    }
}
