//! Routes raw command lines to the plugin they name.

use std::{sync::Arc, time::Duration};

use anyhow::{Context, Result, bail};
use chatops_engine::{ProcessExecutor, SessionStore, TokioProcessExecutor, split_plugin};
use chatops_types::{ExecuteInput, ExecuteOutput};
use indexmap::IndexMap;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::{Executor, JobPlugin, MsgPlugin, SnippetPlugin, config::PluginConfig};

/// The set of plugins a bot exposes, keyed by command word.
#[derive(Default)]
pub struct PluginHost {
    plugins: IndexMap<String, Arc<dyn Executor>>,
    store: Arc<SessionStore>,
}

impl PluginHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Host with the `job`, `msg` and `snippet` plugins running real processes.
    pub fn from_config(config: &PluginConfig) -> Self {
        Self::with_executor(config, Arc::new(TokioProcessExecutor))
    }

    pub fn with_executor(config: &PluginConfig, executor: Arc<dyn ProcessExecutor>) -> Self {
        let host = Self::new();
        let store = host.store.clone();
        host.with_plugin(Arc::new(JobPlugin::new(config, executor.clone(), store.clone())))
            .with_plugin(Arc::new(MsgPlugin::new(config, executor.clone(), store)))
            .with_plugin(Arc::new(SnippetPlugin::new(config, executor)))
    }

    /// Register `plugin`, replacing any plugin with the same name.
    pub fn with_plugin(mut self, plugin: Arc<dyn Executor>) -> Self {
        self.plugins.insert(plugin.name().to_string(), plugin);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Executor>> {
        self.plugins.get(name)
    }

    pub fn plugins(&self) -> impl Iterator<Item = &Arc<dyn Executor>> {
        self.plugins.values()
    }

    /// Selection state shared by the interactive plugins.
    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    /// Forget conversations idle for longer than `max_idle`.
    pub async fn prune_idle(&self, max_idle: Duration) -> usize {
        let pruned = self.store.prune_idle(max_idle).await;
        if pruned > 0 {
            info!(pruned, "pruned idle sessions");
        }
        pruned
    }

    /// Hand `input` to the plugin named by its first word.
    pub async fn execute(&self, input: ExecuteInput, cancel: CancellationToken) -> Result<ExecuteOutput> {
        let Some((name, _)) = split_plugin(&input.command) else {
            bail!("Empty command");
        };
        let plugin = self
            .get(name)
            .with_context(|| format!("Unknown plugin '{name}'"))?
            .clone();
        debug!(plugin = %plugin.name(), "routing command");
        plugin
            .execute(input, cancel)
            .await
            .with_context(|| format!("Plugin '{}' failed", plugin.name()))
    }
}
