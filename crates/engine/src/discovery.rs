//! Parameter schema discovery.
//!
//! A [`ResourceCatalog`] knows which target resources exist, how to obtain
//! the parameter schema of each one, and how to turn an assembled command
//! into something runnable. [`ScriptCatalog`] treats every file of a
//! directory as a target and asks the script itself for its options;
//! [`StaticCatalog`] serves schemas registered up front.

use std::{path::PathBuf, str::FromStr, sync::Arc, time::Duration};

use async_trait::async_trait;
use chatops_types::{Parameter, ParameterKind, ParameterSchema};
use chatops_util::is_plain_file_name;
use indexmap::IndexMap;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::{
    ChatOpsError,
    assemble::AssembledCommand,
    process::{CommandLine, ProcessCommand, ProcessError, ProcessExecutor},
};

/// Flag every script answers with a JSON description of its options.
pub const DESCRIBE_FLAG: &str = "--json-help";

/// Directory entry written by Kubernetes volume projections; never a target.
const PROJECTION_DATA_ENTRY: &str = "..data";

/// Source of target resources and their parameter schemas.
#[async_trait]
pub trait ResourceCatalog: Send + Sync {
    /// All resources the user may target, sorted. This list is the allow-list.
    async fn list_resources(&self) -> Result<Vec<String>, ChatOpsError>;

    /// Parameter schema of `resource`, help switches removed.
    async fn describe(
        &self,
        resource: &str,
        env: &IndexMap<String, String>,
        cancel: &CancellationToken,
    ) -> Result<ParameterSchema, ChatOpsError>;

    /// The process invocation that runs `command`.
    fn invocation(&self, command: &AssembledCommand) -> CommandLine;

    /// Reject resources outside the allow-list.
    async fn ensure_known(&self, resource: &str) -> Result<(), ChatOpsError> {
        if self.list_resources().await?.iter().any(|known| known == resource) {
            Ok(())
        } else {
            Err(ChatOpsError::unknown_resource(resource))
        }
    }
}

/// Output of `<script> --json-help`.
#[derive(Debug, Deserialize)]
struct ScriptDescription {
    #[serde(default)]
    options: Vec<ScriptOption>,
}

#[derive(Debug, Deserialize)]
struct ScriptOption {
    #[serde(default)]
    flags: Vec<String>,
    #[serde(default)]
    description: String,
    #[serde(default, rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    values: Vec<String>,
    #[serde(default)]
    default: Option<DefaultValue>,
}

/// Scripts emit defaults either as strings or as JSON booleans.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum DefaultValue {
    Bool(bool),
    Number(serde_json::Number),
    Text(String),
}

impl DefaultValue {
    fn into_string(self) -> Option<String> {
        match self {
            Self::Bool(value) => Some(value.to_string()),
            Self::Number(value) => Some(value.to_string()),
            Self::Text(value) if value.is_empty() => None,
            Self::Text(value) => Some(value),
        }
    }
}

/// Parse a `--json-help` document into a schema, dropping help switches.
///
/// Options without a `type` are enumerated when they list values and
/// boolean otherwise.
pub fn parse_description(resource: &str, raw: &str) -> Result<ParameterSchema, ChatOpsError> {
    let description: ScriptDescription = serde_json::from_str(raw)
        .map_err(|error| ChatOpsError::schema_unavailable(resource, format!("malformed description: {error}")))?;

    let mut parameters = Vec::with_capacity(description.options.len());
    for (index, option) in description.options.into_iter().enumerate() {
        let mut flags = option.flags.into_iter().filter(|flag| !flag.trim().is_empty());
        let Some(flag) = flags.next() else {
            return Err(ChatOpsError::schema_unavailable(
                resource,
                format!("option #{index} declares no flags"),
            ));
        };
        let kind = match option.kind.as_deref() {
            Some(kind) => ParameterKind::from_str(kind)
                .map_err(|error| ChatOpsError::schema_unavailable(resource, format!("option '{flag}': {error}")))?,
            None if option.values.is_empty() => ParameterKind::Boolean,
            None => ParameterKind::Enumerated,
        };
        let mut parameter = Parameter::new(flag, kind)
            .with_description(option.description)
            .with_values(option.values);
        parameter.aliases = flags.collect();
        parameter.default = option.default.and_then(DefaultValue::into_string);
        if !parameter.is_help() {
            parameters.push(parameter);
        }
    }

    ParameterSchema::new(parameters).map_err(|error| ChatOpsError::schema_unavailable(resource, error.to_string()))
}

/// Resources backed by executable scripts in one directory.
pub struct ScriptCatalog {
    dir: PathBuf,
    interpreter: String,
    executor: Arc<dyn ProcessExecutor>,
    timeout: Duration,
}

impl ScriptCatalog {
    pub fn new(dir: impl Into<PathBuf>, executor: Arc<dyn ProcessExecutor>, timeout: Duration) -> Self {
        Self {
            dir: dir.into(),
            interpreter: "sh".to_string(),
            executor,
            timeout,
        }
    }

    pub fn dir(&self) -> &PathBuf {
        &self.dir
    }

    fn script_path(&self, resource: &str) -> String {
        self.dir.join(resource).to_string_lossy().into_owned()
    }
}

#[async_trait]
impl ResourceCatalog for ScriptCatalog {
    async fn list_resources(&self) -> Result<Vec<String>, ChatOpsError> {
        let unavailable = |error: std::io::Error| {
            ChatOpsError::schema_unavailable(self.dir.display().to_string(), format!("cannot list scripts: {error}"))
        };
        let mut entries = tokio::fs::read_dir(&self.dir).await.map_err(unavailable)?;
        let mut resources = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(unavailable)? {
            let file_type = entry.file_type().await.map_err(unavailable)?;
            if file_type.is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if name == PROJECTION_DATA_ENTRY || !is_plain_file_name(&name) {
                continue;
            }
            resources.push(name);
        }
        resources.sort();
        debug!(dir = %self.dir.display(), count = resources.len(), "listed script resources");
        Ok(resources)
    }

    async fn describe(
        &self,
        resource: &str,
        env: &IndexMap<String, String>,
        cancel: &CancellationToken,
    ) -> Result<ParameterSchema, ChatOpsError> {
        self.ensure_known(resource).await?;
        let command = ProcessCommand::new(
            CommandLine::argv(&self.interpreter, [self.script_path(resource), DESCRIBE_FLAG.to_string()]),
            self.timeout,
        )
        .with_env(env);

        let output = self
            .executor
            .execute(&command, cancel)
            .await
            .map_err(|error| match error {
                ProcessError::Cancelled { command } => ChatOpsError::Cancelled { command },
                ProcessError::Failed { stderr, status, .. } => {
                    warn!(resource, ?status, "schema discovery exited unsuccessfully");
                    let detail = stderr.trim();
                    let reason = if detail.is_empty() {
                        format!("{DESCRIBE_FLAG} exited with status {status:?}")
                    } else {
                        detail.to_string()
                    };
                    ChatOpsError::schema_unavailable(resource, reason)
                }
                other => {
                    warn!(resource, error = %other, "schema discovery failed");
                    ChatOpsError::schema_unavailable(resource, other.to_string())
                }
            })?;

        let schema = parse_description(resource, &output.stdout)?;
        debug!(resource, parameters = schema.len(), "discovered parameter schema");
        Ok(schema)
    }

    fn invocation(&self, command: &AssembledCommand) -> CommandLine {
        let mut args = Vec::with_capacity(command.args.len() + 1);
        args.push(self.script_path(&command.target));
        args.extend(command.args.iter().cloned());
        CommandLine::Argv {
            program: self.interpreter.clone(),
            args,
        }
    }
}

/// Resources whose schemas are known ahead of time.
///
/// Each resource name is also the program that runs it.
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    schemas: IndexMap<String, ParameterSchema>,
}

impl StaticCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_resource(mut self, name: impl Into<String>, schema: ParameterSchema) -> Self {
        self.schemas.insert(name.into(), schema.without_help());
        self
    }
}

#[async_trait]
impl ResourceCatalog for StaticCatalog {
    async fn list_resources(&self) -> Result<Vec<String>, ChatOpsError> {
        let mut names: Vec<String> = self.schemas.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    async fn describe(
        &self,
        resource: &str,
        _env: &IndexMap<String, String>,
        _cancel: &CancellationToken,
    ) -> Result<ParameterSchema, ChatOpsError> {
        self.schemas
            .get(resource)
            .cloned()
            .ok_or_else(|| ChatOpsError::unknown_resource(resource))
    }

    fn invocation(&self, command: &AssembledCommand) -> CommandLine {
        CommandLine::Argv {
            program: command.target.clone(),
            args: command.args.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::{ScriptedExecutor, ScriptedReply};

    const BACKUP_HELP: &str = r#"{
        "options": [
            {"flags": ["-h", "--help"], "description": "Show help", "type": "bool"},
            {"flags": ["-n", "--namespace"], "description": "Namespace", "type": "text"},
            {"flags": ["-i"], "description": "Incremental", "type": "bool", "default": false},
            {"flags": ["-e"], "description": "Environment", "type": "dropdown", "values": ["dev", "prod"], "default": "dev"}
        ]
    }"#;

    #[test]
    fn parses_options_and_drops_help() {
        let schema = parse_description("backup-job", BACKUP_HELP).unwrap();
        let flags: Vec<_> = schema.parameters().iter().map(|p| p.flag.as_str()).collect();
        assert_eq!(flags, vec!["-n", "-i", "-e"]);

        let namespace = schema.find("-n").unwrap();
        assert_eq!(namespace.kind, ParameterKind::Text);
        assert_eq!(namespace.aliases, vec!["--namespace"]);
        assert_eq!(schema.find("-i").unwrap().default.as_deref(), Some("false"));
        assert_eq!(schema.find("-e").unwrap().allowed_values, vec!["dev", "prod"]);
    }

    #[test]
    fn untyped_options_are_inferred() {
        let schema = parse_description(
            "msg",
            r#"{"options":[{"flags":["-f"],"values":["a.txt","b.txt"]},{"flags":["-v"],"default":""}]}"#,
        )
        .unwrap();
        assert_eq!(schema.find("-f").unwrap().kind, ParameterKind::Enumerated);
        assert_eq!(schema.find("-v").unwrap().kind, ParameterKind::Boolean);
        assert_eq!(schema.find("-v").unwrap().default, None);
    }

    #[test]
    fn malformed_descriptions_are_schema_errors() {
        for raw in [
            "not json",
            r#"{"options":[{"flags":[]}]}"#,
            r#"{"options":[{"flags":["-x"],"type":"number"}]}"#,
            r#"{"options":[{"flags":["-e"],"type":"dropdown"}]}"#,
        ] {
            let err = parse_description("job", raw).unwrap_err();
            assert!(matches!(err, ChatOpsError::SchemaUnavailable { .. }), "{raw}");
        }
    }

    #[tokio::test]
    async fn lists_scripts_sorted_without_projection_entries() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("zeta"), "").unwrap();
        std::fs::write(dir.path().join("alpha"), "").unwrap();
        std::fs::write(dir.path().join("..data"), "").unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();

        let catalog = ScriptCatalog::new(dir.path(), Arc::new(ScriptedExecutor::new()), Duration::from_secs(1));
        assert_eq!(catalog.list_resources().await.unwrap(), vec!["alpha", "zeta"]);
    }

    #[tokio::test]
    async fn describe_runs_script_with_describe_flag() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("backup-job"), "").unwrap();
        let script = dir.path().join("backup-job").to_string_lossy().into_owned();
        let executor = Arc::new(
            ScriptedExecutor::new().on(format!("sh {script} --json-help"), ScriptedReply::Success(BACKUP_HELP.into())),
        );

        let catalog = ScriptCatalog::new(dir.path(), executor.clone(), Duration::from_secs(1));
        let schema = catalog
            .describe("backup-job", &IndexMap::new(), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(schema.len(), 3);
        assert_eq!(executor.calls().len(), 1);
    }

    #[tokio::test]
    async fn describe_rejects_unknown_resources_without_running_anything() {
        let dir = tempfile::tempdir().unwrap();
        let executor = Arc::new(ScriptedExecutor::new());
        let catalog = ScriptCatalog::new(dir.path(), executor.clone(), Duration::from_secs(1));

        let err = catalog
            .describe("../../bin/rm", &IndexMap::new(), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ChatOpsError::UnknownResource { .. }));
        assert!(executor.calls().is_empty());
    }

    #[tokio::test]
    async fn failing_discovery_is_schema_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("broken"), "").unwrap();
        let script = dir.path().join("broken").to_string_lossy().into_owned();
        let executor = Arc::new(ScriptedExecutor::new().on(
            format!("sh {script} --json-help"),
            ScriptedReply::Failure {
                status: 1,
                stderr: "syntax error".into(),
            },
        ));

        let catalog = ScriptCatalog::new(dir.path(), executor, Duration::from_secs(1));
        let err = catalog
            .describe("broken", &IndexMap::new(), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(
            matches!(err, ChatOpsError::SchemaUnavailable { ref reason, .. } if reason == "syntax error"),
            "{err}"
        );
    }
}
