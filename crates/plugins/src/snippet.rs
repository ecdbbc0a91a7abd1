//! The `snippet` plugin: run a one-off command and post its output as a file.
//!
//! `kubectl` commands run directly with the request's kubeconfig exported.
//! Anything else is an operator-authored shell command and goes through
//! `sh -c`.

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chatops_api::{AttachmentDelivery, SlackUploader};
use chatops_engine::{
    AttachmentTarget, CommandLine, DispatchSettings, Dispatcher, ProcessCommand, ProcessExecutor, split_plugin,
};
use chatops_types::{Button, Dependency, ExecuteInput, ExecuteOutput, Message, MetadataOutput, Section};
use chatops_util::{redact_sensitive, split_words};
use indexmap::IndexMap;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::{
    Executor,
    config::{ConfigError, PluginConfig, SnippetConfig, load_bot_token},
    kubeconfig::{PersistedKubeconfig, kube_env},
};

pub const NAME: &str = "snippet";
const DESCRIPTION: &str = "snippet";
const KUBECTL: &str = "kubectl";
const KUBECTL_VERSION: &str = "v1.28.1";
const KUBECTL_PLATFORMS: &[&str] = &[
    "windows/amd64",
    "darwin/amd64",
    "darwin/arm64",
    "linux/amd64",
    "linux/s390x",
    "linux/ppc64le",
    "linux/arm64",
    "linux/386",
];

pub struct SnippetPlugin {
    config: SnippetConfig,
    settings: DispatchSettings,
    executor: Arc<dyn ProcessExecutor>,
    /// Replaces the Slack uploader built from the communication config.
    delivery: Option<Arc<dyn AttachmentDelivery>>,
}

impl SnippetPlugin {
    pub fn new(config: &PluginConfig, executor: Arc<dyn ProcessExecutor>) -> Self {
        Self {
            config: config.snippet.clone(),
            settings: config.dispatch_settings(),
            executor,
            delivery: None,
        }
    }

    pub fn with_delivery(mut self, delivery: Arc<dyn AttachmentDelivery>) -> Self {
        self.delivery = Some(delivery);
        self
    }

    fn delivery(&self) -> Result<Arc<dyn AttachmentDelivery>> {
        if let Some(delivery) = &self.delivery {
            return Ok(delivery.clone());
        }
        let token = load_bot_token(&self.config.communication_config_path)?;
        let uploader = SlackUploader::with_api_base(token, &self.config.api_base)?;
        Ok(Arc::new(uploader))
    }

    fn attachment_target(&self) -> Result<AttachmentTarget> {
        let channel_id = self.config.channel_id.clone().ok_or(ConfigError::MissingChannel)?;
        Ok(AttachmentTarget {
            delivery: self.delivery()?,
            channel_id,
            comment: self.config.comment.clone(),
        })
    }
}

/// Whether the first word of `command` is `kubectl` itself.
fn is_kubectl(command: &str) -> bool {
    split_words(command).first().is_some_and(|program| program == KUBECTL)
}

/// How `command` is started and with which extra environment.
fn command_line(command: &str, kubeconfig: Option<&PersistedKubeconfig>) -> (CommandLine, IndexMap<String, String>) {
    if is_kubectl(command) {
        let mut words = split_words(command).into_iter();
        if let Some(program) = words.next() {
            return (CommandLine::argv(program, words), kube_env(kubeconfig));
        }
    }
    (CommandLine::Shell(command.to_string()), IndexMap::new())
}

#[async_trait]
impl Executor for SnippetPlugin {
    fn name(&self) -> &str {
        NAME
    }

    fn metadata(&self) -> MetadataOutput {
        let urls = KUBECTL_PLATFORMS
            .iter()
            .map(|platform| {
                let binary = if platform.starts_with("windows") { "kubectl.exe" } else { KUBECTL };
                (
                    platform.to_string(),
                    format!("https://dl.k8s.io/release/{KUBECTL_VERSION}/bin/{platform}/{binary}"),
                )
            })
            .collect();
        MetadataOutput {
            version: env!("CARGO_PKG_VERSION").to_string(),
            description: DESCRIPTION.to_string(),
            dependencies: IndexMap::from([(KUBECTL.to_string(), Dependency { urls })]),
        }
    }

    async fn execute(&self, input: ExecuteInput, cancel: CancellationToken) -> Result<ExecuteOutput> {
        let command = split_plugin(&input.command).map(|(_, rest)| rest).unwrap_or_default();
        if command.is_empty() {
            return Ok(self.help().into());
        }
        let target = self.attachment_target()?;

        let kubeconfig = if is_kubectl(command) {
            PersistedKubeconfig::persist_optional(input.context.kube_config.as_deref())
                .context("Error writing kubeconfig file")?
        } else {
            None
        };
        let (line, env) = command_line(command, kubeconfig.as_ref());
        debug!(command = %redact_sensitive(command), shell = matches!(line, CommandLine::Shell(_)), "running snippet");

        let process = ProcessCommand::new(line, self.settings.timeout).with_env(&env);
        let dispatcher = Dispatcher::new(self.executor.clone(), self.settings.clone()).with_attachments(target);
        let message = match dispatcher.dispatch_as_attachment(process, command, &cancel).await {
            Ok(message) => message,
            Err(error) => {
                warn!(error = %redact_sensitive(&error.to_string()), "snippet failed");
                error.to_message()
            }
        };
        Ok(message.into())
    }

    fn help(&self) -> Message {
        Message {
            sections: vec![Section {
                header: Some("Run command and recieve resuilt ase snippet".to_string()),
                description: Some(DESCRIPTION.to_string()),
                buttons: vec![Button::for_command_with_description("Run", "snippet 'hello world'")],
                ..Default::default()
            }],
            ..Default::default()
        }
    }
}
