//! The select-then-run conversation.
//!
//! [`InteractiveFlow`] applies one [`Action`] to the caller's selection state
//! and answers with the message to render next:
//!
//! ```text
//! Idle --select_target--> TargetSelected --select_param--> ParametersPartial
//!                                             ... --> ParametersComplete --run--> Dispatched
//! ```
//!
//! Choosing another target from any phase resets the stored values. Failures
//! leave the state as it was before the request. A run is executed once per
//! round: another `run` in `Dispatched` is refused until a selection changes.

use std::{sync::Arc, time::Duration};

use chatops_types::{Body, Message, ParameterSchema};
use chatops_util::redact_sensitive;
use indexmap::IndexMap;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    ChatOpsError,
    assemble::assemble,
    command::{Action, ChatCommand},
    discovery::ResourceCatalog,
    dispatch::Dispatcher,
    plan::{PlanContext, build_plan, populate_defaults, target_section},
    process::ProcessCommand,
    selection::{FlowPhase, SelectionSnapshot, SessionKey, SessionStore},
};

/// Text and naming of one interactive plugin.
#[derive(Debug, Clone)]
pub struct FlowSettings {
    pub plugin_name: String,
    /// Placeholder the host replaces with the bot's name.
    pub bot_placeholder: String,
    pub target_label: String,
    /// Shown above the target selector.
    pub initial_prompt: String,
    /// Shown once a target is chosen; `{target}` is replaced with its name.
    pub parameters_prompt: String,
}

impl FlowSettings {
    pub fn command_prefix(&self) -> String {
        format!("{} {}", self.bot_placeholder, self.plugin_name)
    }

    fn parameters_prompt(&self, target: &str) -> String {
        self.parameters_prompt.replace("{target}", target)
    }
}

/// Per-request inputs.
#[derive(Debug, Clone, Default)]
pub struct FlowRequest {
    /// Conversation the request belongs to. Required for anything but the initial render.
    pub session: Option<SessionKey>,
    /// Extra environment for discovery and dispatch (e.g. `KUBECONFIG`).
    pub env: IndexMap<String, String>,
    pub cancel: CancellationToken,
}

impl FlowRequest {
    pub fn new(session: Option<SessionKey>) -> Self {
        Self {
            session,
            ..Default::default()
        }
    }

    pub fn with_env(mut self, env: IndexMap<String, String>) -> Self {
        self.env = env;
        self
    }

    fn session(&self) -> Result<&SessionKey, ChatOpsError> {
        self.session.as_ref().ok_or(ChatOpsError::MissingSession)
    }
}

pub struct InteractiveFlow {
    settings: FlowSettings,
    catalog: Arc<dyn ResourceCatalog>,
    dispatcher: Dispatcher,
    store: Arc<SessionStore>,
}

impl InteractiveFlow {
    pub fn new(
        settings: FlowSettings,
        catalog: Arc<dyn ResourceCatalog>,
        dispatcher: Dispatcher,
        store: Arc<SessionStore>,
    ) -> Self {
        Self {
            settings,
            catalog,
            dispatcher,
            store,
        }
    }

    pub fn settings(&self) -> &FlowSettings {
        &self.settings
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    /// Apply `command` and render the reply. Errors become error replies.
    pub async fn handle(&self, request: &FlowRequest, command: &ChatCommand) -> Message {
        match self.try_handle(request, command).await {
            Ok(message) => message,
            Err(error) => {
                warn!(
                    plugin = %self.settings.plugin_name,
                    error = %redact_sensitive(&error.to_string()),
                    "interactive request failed"
                );
                error.to_message()
            }
        }
    }

    pub async fn try_handle(&self, request: &FlowRequest, command: &ChatCommand) -> Result<Message, ChatOpsError> {
        match &command.action {
            Action::Render => self.render_initial().await,
            Action::SelectTarget(resource) => self.select_target(request, resource).await,
            Action::SelectParam { key, value } => self.select_param(request, key, value).await,
            Action::Run { expected } => self.run(request, expected.as_deref()).await,
            Action::Unknown { action, payload } => {
                let mut text = format!("{} {}", command.plugin, action);
                if !payload.is_empty() {
                    text.push(' ');
                    text.push_str(payload);
                }
                Ok(Message::code_block(format!("Plain command: {text}"), false))
            }
        }
    }

    /// Current phase of the caller's conversation.
    pub async fn phase(&self, request: &FlowRequest) -> Result<FlowPhase, ChatOpsError> {
        let state = self.store.session(request.session()?).await;
        let snapshot = state.lock().await.snapshot();
        let Some(target) = snapshot.target() else {
            return Ok(FlowPhase::Idle);
        };
        let schema = self.catalog.describe(target, &request.env, &request.cancel).await?;
        Ok(snapshot.phase(&schema))
    }

    async fn render_initial(&self) -> Result<Message, ChatOpsError> {
        let targets = self.catalog.list_resources().await?;
        let prefix = self.settings.command_prefix();
        let context = self.plan_context(&prefix, &targets);
        Ok(Message {
            base_body: Body {
                plaintext: Some(self.settings.initial_prompt.clone()),
                ..Default::default()
            },
            sections: vec![target_section(&context, None)],
            only_visible_for_you: true,
            replace_original: false,
        })
    }

    async fn select_target(&self, request: &FlowRequest, resource: &str) -> Result<Message, ChatOpsError> {
        let key = request.session()?;
        let targets = self.catalog.list_resources().await?;
        if !targets.iter().any(|known| known == resource) {
            return Err(ChatOpsError::unknown_resource(resource));
        }

        let state = self.store.session(key).await;
        let schema = self.catalog.describe(resource, &request.env, &request.cancel).await?;
        let mut state = state.lock().await;
        let reset = state.set_target(resource);
        let defaults = populate_defaults(&schema, &mut state);
        let snapshot = state.snapshot();
        drop(state);

        info!(session = %key, resource, reset, defaults, "target selected");
        Ok(self.render_plan(&targets, &schema, &snapshot, None))
    }

    async fn select_param(&self, request: &FlowRequest, key: &str, value: &str) -> Result<Message, ChatOpsError> {
        let session = request.session()?;
        let targets = self.catalog.list_resources().await?;

        let state = self.store.session(session).await;
        let current = state.lock().await.target().map(str::to_owned);
        let Some(target) = current else {
            return Err(ChatOpsError::invalid_selection(key, "select a resource first"));
        };
        let schema = self.catalog.describe(&target, &request.env, &request.cancel).await?;

        let mut state = state.lock().await;
        if state.target() != Some(target.as_str()) {
            return Err(ChatOpsError::invalid_selection(
                key,
                "the target changed while this selection was applied",
            ));
        }
        let rejection = match schema.find_by_selection_key(&target, key) {
            None => Some(ChatOpsError::invalid_selection(
                key,
                format!("not a parameter of '{target}'"),
            )),
            Some(parameter) => {
                let value = parameter.value_component(value).trim();
                if parameter.accepts(value) {
                    state.set_parameter(key, parameter.format_value(value));
                    None
                } else {
                    Some(ChatOpsError::invalid_selection(
                        key,
                        format!("'{value}' is not a valid {} value", parameter.kind),
                    ))
                }
            }
        };
        let snapshot = state.snapshot();
        drop(state);

        match &rejection {
            Some(error) => warn!(session = %session, key, error = %error, "ignoring selection"),
            None => debug!(session = %session, key, "parameter selected"),
        }
        Ok(self.render_plan(&targets, &schema, &snapshot, rejection))
    }

    async fn run(&self, request: &FlowRequest, expected: Option<&str>) -> Result<Message, ChatOpsError> {
        let session = request.session()?;
        let state = self.store.session(session).await;

        let snapshot = state.lock().await.snapshot();
        let Some(target) = snapshot.target() else {
            return Err(ChatOpsError::invalid_selection("run", "select a resource first"));
        };
        let schema = self.catalog.describe(target, &request.env, &request.cancel).await?;

        let incomplete = || {
            ChatOpsError::invalid_selection("run", "every parameter needs a value before the command can run")
        };
        if snapshot.phase(&schema) == FlowPhase::Dispatched {
            return self.refuse_run(&schema, &snapshot, already_ran()).await;
        }
        if !snapshot.is_complete(&schema) {
            return self.refuse_run(&schema, &snapshot, incomplete()).await;
        }
        let command = assemble(&schema, &snapshot).ok_or_else(incomplete)?;
        let preview = command.preview();
        if let Some(expected) = expected
            && expected.trim() != preview
        {
            warn!(
                session = %session,
                expected = %redact_sensitive(expected),
                actual = %redact_sensitive(&preview),
                "run control is stale"
            );
            return self.refuse_run(&schema, &snapshot, stale_selection()).await;
        }

        // Claim the round before releasing the lock so a second delivery of
        // the same run sees it as dispatched.
        let claimed = {
            let mut guard = state.lock().await;
            let current = guard.snapshot();
            if current.phase(&schema) == FlowPhase::Dispatched {
                drop(guard);
                return self.refuse_run(&schema, &current, already_ran()).await;
            }
            if current != snapshot {
                drop(guard);
                return self.refuse_run(&schema, &current, stale_selection()).await;
            }
            guard.mark_dispatched();
            guard.snapshot()
        };

        let process = ProcessCommand::new(self.catalog.invocation(&command), Duration::ZERO).with_env(&request.env);
        match self.dispatcher.dispatch(process, &preview, &request.cancel).await {
            Ok(message) => {
                info!(session = %session, command = %redact_sensitive(&preview), "command dispatched");
                Ok(message)
            }
            Err(error) => {
                let mut guard = state.lock().await;
                if guard.snapshot() == claimed {
                    guard.reopen();
                }
                Err(error)
            }
        }
    }

    async fn refuse_run(
        &self,
        schema: &ParameterSchema,
        snapshot: &SelectionSnapshot,
        warning: ChatOpsError,
    ) -> Result<Message, ChatOpsError> {
        let targets = self.catalog.list_resources().await?;
        Ok(self.render_plan(&targets, schema, snapshot, Some(warning)))
    }

    fn plan_context<'a>(&'a self, prefix: &'a str, targets: &'a [String]) -> PlanContext<'a> {
        PlanContext {
            command_prefix: prefix,
            target_label: &self.settings.target_label,
            targets,
        }
    }

    fn render_plan(
        &self,
        targets: &[String],
        schema: &ParameterSchema,
        snapshot: &SelectionSnapshot,
        warning: Option<ChatOpsError>,
    ) -> Message {
        let prefix = self.settings.command_prefix();
        let context = self.plan_context(&prefix, targets);
        let mut prompt = snapshot
            .target()
            .map(|target| self.settings.parameters_prompt(target))
            .unwrap_or_else(|| self.settings.initial_prompt.clone());
        if let Some(warning) = warning {
            prompt = format!("{warning}\n{prompt}");
        }
        Message {
            base_body: Body {
                plaintext: Some(prompt),
                ..Default::default()
            },
            sections: build_plan(&context, schema, snapshot),
            only_visible_for_you: true,
            replace_original: true,
        }
    }
}

fn already_ran() -> ChatOpsError {
    ChatOpsError::invalid_selection("run", "this command already ran; change a selection to run it again")
}

fn stale_selection() -> ChatOpsError {
    ChatOpsError::invalid_selection(
        "run",
        "the selection changed since this button was rendered; review the command and run it again",
    )
}
