//! # ChatOps Plugins
//!
//! The `job`, `msg` and `snippet` chat plugins and the host that routes
//! incoming commands to them.
//!
//! - **`job`**: pick a script from the scripts directory, fill its parameters
//!   through dropdowns and inputs, then run it (optionally against a cluster)
//! - **`msg`**: the same interactive flow without cluster context
//! - **`snippet`**: run a one-off command and receive its output as a file
//!
//! Every plugin implements [`Executor`]; [`PluginHost`] dispatches a raw
//! command line to the plugin named by its first word.

use anyhow::Result;
use async_trait::async_trait;
use chatops_types::{ExecuteInput, ExecuteOutput, Message, MetadataOutput};
use tokio_util::sync::CancellationToken;

pub mod config;
mod host;
mod interactive;
pub mod job;
pub mod kubeconfig;
pub mod msg;
pub mod snippet;

pub use host::PluginHost;
pub use interactive::INTERACTIVITY_NOT_SUPPORTED;
pub use job::JobPlugin;
pub use msg::MsgPlugin;
pub use snippet::SnippetPlugin;

/// A chat plugin.
#[async_trait]
pub trait Executor: Send + Sync {
    /// Command word the plugin answers to.
    fn name(&self) -> &str;

    fn metadata(&self) -> MetadataOutput;

    /// Handle one command. Domain failures come back as error messages;
    /// `Err` is reserved for problems the host should log.
    async fn execute(&self, input: ExecuteInput, cancel: CancellationToken) -> Result<ExecuteOutput>;

    fn help(&self) -> Message;
}

/// Help text shared by the interactive plugins.
pub(crate) fn plaintext_help(description: &str, bot_placeholder: &str, plugin: &str) -> Message {
    Message::plaintext(format!("{description}\nJust type `{bot_placeholder} {plugin}`"), false)
}
