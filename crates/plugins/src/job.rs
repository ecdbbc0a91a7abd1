//! The `job` plugin: run a script from the scripts directory, optionally
//! against the cluster described by the request's kubeconfig.

use std::{sync::Arc, time::Duration};

use anyhow::Result;
use async_trait::async_trait;
use chatops_engine::{
    Action, CommandLine, FlowRequest, FlowSettings, InteractiveFlow, ProcessCommand, ProcessExecutor,
    ResourceCatalog, SessionStore,
};
use chatops_types::{ExecuteInput, ExecuteOutput, Message, MetadataOutput};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::{
    Executor,
    config::PluginConfig,
    interactive::{Prepared, catalog_flow, prepare, script_flow},
    plaintext_help,
};

pub const NAME: &str = "job";
const DESCRIPTION: &str = "Run Job.";

pub struct JobPlugin {
    flow: InteractiveFlow,
    executor: Arc<dyn ProcessExecutor>,
    namespace_timeout: Duration,
}

impl JobPlugin {
    pub fn new(config: &PluginConfig, executor: Arc<dyn ProcessExecutor>, store: Arc<SessionStore>) -> Self {
        let flow = script_flow(config, settings(config), executor.clone(), store);
        Self::from_flow(config, flow, executor)
    }

    /// Plugin over a custom catalog instead of the scripts directory.
    pub fn with_catalog(
        config: &PluginConfig,
        catalog: Arc<dyn ResourceCatalog>,
        executor: Arc<dyn ProcessExecutor>,
        store: Arc<SessionStore>,
    ) -> Self {
        let flow = catalog_flow(config, settings(config), catalog, executor.clone(), store);
        Self::from_flow(config, flow, executor)
    }

    fn from_flow(config: &PluginConfig, flow: InteractiveFlow, executor: Arc<dyn ProcessExecutor>) -> Self {
        Self {
            flow,
            executor,
            namespace_timeout: config.discovery_timeout(),
        }
    }

    async fn namespaces(&self, request: &FlowRequest) -> Result<Vec<String>> {
        let command = ProcessCommand::new(
            CommandLine::argv(
                "kubectl",
                ["get", "namespaces", "-o", "jsonpath={.items[*].metadata.name}"],
            ),
            self.namespace_timeout,
        )
        .with_env(&request.env);
        let output = self.executor.execute(&command, &request.cancel).await?;
        Ok(output.stdout.split_whitespace().map(str::to_owned).collect())
    }
}

fn settings(config: &PluginConfig) -> FlowSettings {
    FlowSettings {
        plugin_name: NAME.to_string(),
        bot_placeholder: config.bot_name_placeholder.clone(),
        target_label: "Job Name".to_string(),
        initial_prompt: "Please select the Job name.".to_string(),
        parameters_prompt: "Please select the Job parameters for {target}".to_string(),
    }
}

#[async_trait]
impl Executor for JobPlugin {
    fn name(&self) -> &str {
        NAME
    }

    fn metadata(&self) -> MetadataOutput {
        MetadataOutput {
            version: env!("CARGO_PKG_VERSION").to_string(),
            description: DESCRIPTION.to_string(),
            ..Default::default()
        }
    }

    async fn execute(&self, input: ExecuteInput, cancel: CancellationToken) -> Result<ExecuteOutput> {
        let request = match prepare(NAME, &input, cancel)? {
            Prepared::Reply(message) => return Ok(message.into()),
            Prepared::Request(request) => request,
        };

        let mut message = self.flow.handle(&request.flow, &request.command).await;
        if request.command.action == Action::Render && request.kubeconfig.is_some() {
            match self.namespaces(&request.flow).await {
                Ok(namespaces) if !namespaces.is_empty() => {
                    if let Some(prompt) = message.base_body.plaintext.as_mut() {
                        prompt.push_str(&format!(" Available namespaces: {}", namespaces.join(", ")));
                    }
                }
                Ok(_) => {}
                Err(error) => warn!(error = %error, "cannot list namespaces"),
            }
        }
        Ok(message.into())
    }

    fn help(&self) -> Message {
        plaintext_help(DESCRIPTION, &self.flow.settings().bot_placeholder, NAME)
    }
}
