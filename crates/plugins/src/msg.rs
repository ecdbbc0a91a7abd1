//! The `msg` plugin: the interactive flow over the scripts directory, without
//! cluster context.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chatops_engine::{FlowSettings, InteractiveFlow, ProcessExecutor, ResourceCatalog, SessionStore};
use chatops_types::{ExecuteInput, ExecuteOutput, Message, MetadataOutput};
use tokio_util::sync::CancellationToken;

use crate::{
    Executor,
    config::PluginConfig,
    interactive::{Prepared, catalog_flow, prepare, script_flow},
    plaintext_help,
};

pub const NAME: &str = "msg";
const DESCRIPTION: &str = "Msg sends an example interactive messages.";

pub struct MsgPlugin {
    flow: InteractiveFlow,
}

impl MsgPlugin {
    pub fn new(config: &PluginConfig, executor: Arc<dyn ProcessExecutor>, store: Arc<SessionStore>) -> Self {
        Self {
            flow: script_flow(config, settings(config), executor, store),
        }
    }

    pub fn with_catalog(
        config: &PluginConfig,
        catalog: Arc<dyn ResourceCatalog>,
        executor: Arc<dyn ProcessExecutor>,
        store: Arc<SessionStore>,
    ) -> Self {
        Self {
            flow: catalog_flow(config, settings(config), catalog, executor, store),
        }
    }
}

fn settings(config: &PluginConfig) -> FlowSettings {
    FlowSettings {
        plugin_name: NAME.to_string(),
        bot_placeholder: config.bot_name_placeholder.clone(),
        target_label: "Job Name".to_string(),
        initial_prompt: "Select a file from the dropdown.".to_string(),
        parameters_prompt: "You've selected from the dropdowns. Now run the command if ready.".to_string(),
    }
}

#[async_trait]
impl Executor for MsgPlugin {
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
        match prepare(NAME, &input, cancel)? {
            Prepared::Reply(message) => Ok(message.into()),
            Prepared::Request(request) => Ok(self.flow.handle(&request.flow, &request.command).await.into()),
        }
    }

    fn help(&self) -> Message {
        plaintext_help(DESCRIPTION, &self.flow.settings().bot_placeholder, NAME)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatops_engine::{ScriptedExecutor, StaticCatalog};
    use chatops_types::{ExecuteContext, Parameter, ParameterKind, ParameterSchema, SessionIdentity};

    fn plugin() -> MsgPlugin {
        let schema = ParameterSchema::new(vec![
            Parameter::new("-e", ParameterKind::Enumerated)
                .with_description("Environment")
                .with_values(["dev", "prod"]),
        ])
        .unwrap();
        MsgPlugin::with_catalog(
            &PluginConfig::default(),
            Arc::new(StaticCatalog::new().with_resource("deploy", schema)),
            Arc::new(ScriptedExecutor::new()),
            Arc::new(SessionStore::new()),
        )
    }

    fn input(command: &str) -> ExecuteInput {
        ExecuteInput::new(
            command,
            ExecuteContext {
                is_interactivity_supported: true,
                session: Some(SessionIdentity::new("U7", "C7")),
                ..Default::default()
            },
        )
    }

    #[tokio::test]
    async fn prompts_follow_the_selection() {
        let plugin = plugin();
        let output = plugin.execute(input("msg"), CancellationToken::new()).await.unwrap();
        assert_eq!(
            output.message.base_body.plaintext.as_deref(),
            Some("Select a file from the dropdown.")
        );
        assert!(!output.message.replace_original);

        let output = plugin
            .execute(input("msg select_target deploy"), CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(
            output.message.base_body.plaintext.as_deref(),
            Some("You've selected from the dropdowns. Now run the command if ready.")
        );
        assert!(output.message.replace_original);
        let commands: Vec<_> = output.message.selects().map(|select| select.command.as_str()).collect();
        assert_eq!(
            commands,
            vec!["{{BotName}} msg select_target", "{{BotName}} msg select_param deploy--e"]
        );
    }

    #[tokio::test]
    async fn unknown_action_is_echoed() {
        let output = plugin()
            .execute(input("msg frobnicate now"), CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(
            output.message.base_body.code_block.as_deref(),
            Some("Plain command: msg frobnicate now")
        );
    }

    #[test]
    fn help_mentions_the_invocation() {
        assert_eq!(
            plugin().help().base_body.plaintext.as_deref(),
            Some("Msg sends an example interactive messages.\nJust type `{{BotName}} msg`")
        );
    }
}
