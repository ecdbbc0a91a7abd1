//! Request plumbing shared by the interactive plugins.

use std::sync::Arc;

use anyhow::{Context, Result};
use chatops_engine::{
    ChatCommand, ChatOpsError, Dispatcher, FlowRequest, FlowSettings, InteractiveFlow, ProcessExecutor,
    ResourceCatalog, ScriptCatalog, SessionKey, SessionStore, parse_command,
};
use chatops_types::{ExecuteInput, Message};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::{
    config::PluginConfig,
    kubeconfig::{PersistedKubeconfig, kube_env},
};

pub const INTERACTIVITY_NOT_SUPPORTED: &str = "Interactivity for this platform is not supported";

/// A parsed request, ready for the flow.
pub(crate) struct InteractiveRequest {
    pub command: ChatCommand,
    pub flow: FlowRequest,
    /// Removed when the request is dropped.
    pub kubeconfig: Option<PersistedKubeconfig>,
}

pub(crate) enum Prepared {
    /// Answer immediately without touching the flow.
    Reply(Message),
    Request(InteractiveRequest),
}

/// Check interactivity, parse the command and set up the per-request environment.
pub(crate) fn prepare(plugin: &str, input: &ExecuteInput, cancel: CancellationToken) -> Result<Prepared> {
    if !input.context.is_interactivity_supported {
        return Ok(Prepared::Reply(Message::code_block(INTERACTIVITY_NOT_SUPPORTED, true)));
    }
    let command = match parse_command(&input.command) {
        Ok(command) => command,
        Err(error) => {
            debug!(plugin, error = %error, "unparseable command");
            return Ok(Prepared::Reply(ChatOpsError::from(error).to_message()));
        }
    };

    let kubeconfig = PersistedKubeconfig::persist_optional(input.context.kube_config.as_deref())
        .context("Error writing kubeconfig file")?;
    let flow = FlowRequest {
        session: input
            .context
            .session
            .as_ref()
            .map(|identity| SessionKey::new(plugin, identity)),
        env: kube_env(kubeconfig.as_ref()),
        cancel,
    };
    Ok(Prepared::Request(InteractiveRequest {
        command,
        flow,
        kubeconfig,
    }))
}

/// Flow over the scripts directory of `config`.
pub(crate) fn script_flow(
    config: &PluginConfig,
    settings: FlowSettings,
    executor: Arc<dyn ProcessExecutor>,
    store: Arc<SessionStore>,
) -> InteractiveFlow {
    let catalog = Arc::new(ScriptCatalog::new(
        config.scripts_dir.clone(),
        executor.clone(),
        config.discovery_timeout(),
    ));
    catalog_flow(config, settings, catalog, executor, store)
}

pub(crate) fn catalog_flow(
    config: &PluginConfig,
    settings: FlowSettings,
    catalog: Arc<dyn ResourceCatalog>,
    executor: Arc<dyn ProcessExecutor>,
    store: Arc<SessionStore>,
) -> InteractiveFlow {
    let dispatcher = Dispatcher::new(executor, config.dispatch_settings());
    InteractiveFlow::new(settings, catalog, dispatcher, store)
}
