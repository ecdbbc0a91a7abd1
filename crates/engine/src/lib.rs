//! # ChatOps Engine
//!
//! Drives the interactive "pick a target, fill its parameters, run it" flow
//! that chat plugins expose through dropdowns, text inputs and buttons.
//!
//! ## Key Features
//!
//! - **Schema discovery**: targets describe their own options (`--json-help`)
//! - **Per-conversation state**: selections are isolated per user, channel and thread
//! - **Deterministic rendering**: the UI plan is a pure function of schema and selection
//! - **Safe dispatch**: assembled commands run as argument vectors, never through a shell
//!
//! ## Usage
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use chatops_engine::{
//!     Dispatcher, DispatchSettings, FlowRequest, FlowSettings, InteractiveFlow, ScriptedExecutor, SessionKey,
//!     SessionStore, StaticCatalog, parse_command,
//! };
//! use chatops_types::{Parameter, ParameterKind, ParameterSchema, SessionIdentity};
//!
//! # tokio_test_block(async {
//! let schema = ParameterSchema::new(vec![Parameter::new("-n", ParameterKind::Text)]).unwrap();
//! let catalog = Arc::new(StaticCatalog::new().with_resource("backup-job", schema));
//! let dispatcher = Dispatcher::new(Arc::new(ScriptedExecutor::new()), DispatchSettings::default());
//! let flow = InteractiveFlow::new(
//!     FlowSettings {
//!         plugin_name: "job".into(),
//!         bot_placeholder: "{{BotName}}".into(),
//!         target_label: "Job Name".into(),
//!         initial_prompt: "Please select the Job name.".into(),
//!         parameters_prompt: "Please select the Job parameters for {target}".into(),
//!     },
//!     catalog,
//!     dispatcher,
//!     Arc::new(SessionStore::new()),
//! );
//!
//! let request = FlowRequest::new(Some(SessionKey::new("job", &SessionIdentity::new("U1", "C1"))));
//! flow.handle(&request, &parse_command("job select_target backup-job").unwrap()).await;
//! let reply = flow.handle(&request, &parse_command("job select_param backup-job--n prod").unwrap()).await;
//! assert_eq!(reply.sections.last().unwrap().body.code_block.as_deref(), Some("backup-job -n prod"));
//! # });
//! # fn tokio_test_block<F: std::future::Future>(future: F) -> F::Output {
//! #     tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(future)
//! # }
//! ```
//!
//! ## Architecture
//!
//! - **`discovery`**: resource catalogs and `--json-help` parsing
//! - **`selection`**: selection state, phases and the per-session store
//! - **`plan`**: message layout for the current selection
//! - **`assemble`**: schema-ordered argument vectors and previews
//! - **`dispatch`**: execution, inline replies and attachment delivery
//! - **`flow`**: the state machine tying the pieces together

pub mod assemble;
pub mod command;
pub mod discovery;
pub mod dispatch;
pub mod error;
pub mod flow;
pub mod plan;
pub mod process;
pub mod selection;

pub use assemble::{AssembledCommand, assemble};
pub use command::{Action, ChatCommand, CommandParseError, parse_command, split_plugin};
pub use discovery::{ResourceCatalog, ScriptCatalog, StaticCatalog, parse_description};
pub use dispatch::{AttachmentTarget, DispatchSettings, Dispatcher};
pub use error::ChatOpsError;
pub use flow::{FlowRequest, FlowSettings, InteractiveFlow};
pub use plan::{PlanContext, build_plan, populate_defaults};
pub use process::{
    CommandLine, ProcessCommand, ProcessError, ProcessExecutor, ProcessOutput, ScriptedExecutor, ScriptedReply,
    TokioProcessExecutor,
};
pub use selection::{FlowPhase, SelectionSnapshot, SelectionState, SessionKey, SessionStore};
