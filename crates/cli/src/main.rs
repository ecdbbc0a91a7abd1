use std::{path::PathBuf, time::Duration};

use anyhow::{Context, Result};
use chatops_plugins::{
    PluginHost,
    config::{PluginConfig, default_config_path, load_config_from_path},
};
use chatops_types::{ExecuteContext, ExecuteInput, ExecuteOutput, SessionIdentity};
use chatops_util::expand_tilde;
use clap::{Arg, ArgAction, ArgMatches, Command};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

mod render;

/// Selections idle for longer than this are dropped between REPL lines.
const SESSION_IDLE_LIMIT: Duration = Duration::from_secs(60 * 60);

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let matches = cli().get_matches();

    let config_path = matches
        .get_one::<String>("config")
        .map(|path| expand_tilde(path))
        .unwrap_or_else(default_config_path);
    let config = load_config_from_path(&config_path)
        .with_context(|| format!("cannot load configuration from {}", config_path.display()))?;
    let json = matches.get_flag("json");

    match matches.subcommand() {
        Some(("exec", sub)) => run_exec(&config, sub, json).await,
        Some(("repl", sub)) => run_repl(&config, sub, json).await,
        Some(("help", sub)) => run_help(&config, sub, json),
        Some(("plugins", _)) => run_plugins(&config, json),
        _ => {
            cli().print_help()?;
            Ok(())
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn cli() -> Command {
    let session_args = [
        Arg::new("user")
            .long("user")
            .default_value("local-user")
            .help("User id the selections are tracked for"),
        Arg::new("channel")
            .long("channel")
            .default_value("local")
            .help("Channel id the selections are tracked for"),
        Arg::new("thread").long("thread").help("Thread id within the channel"),
        Arg::new("no-interactive")
            .long("no-interactive")
            .action(ArgAction::SetTrue)
            .help("Behave like a platform without dropdowns and buttons"),
        Arg::new("kubeconfig")
            .long("kubeconfig")
            .help("Kubeconfig passed to cluster-scoped commands"),
    ];

    Command::new("chatops")
        .about("Run the ChatOps plugins locally")
        .version(env!("CARGO_PKG_VERSION"))
        .disable_help_subcommand(true)
        .arg(
            Arg::new("json")
                .long("json")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Print the raw plugin output as JSON"),
        )
        .arg(
            Arg::new("config")
                .long("config")
                .global(true)
                .help("Configuration file (defaults to $CHATOPS_CONFIG_PATH or the user config dir)"),
        )
        .subcommand(
            Command::new("exec")
                .about("Run one command, e.g. `job select_target backup-job`")
                .args(session_args.clone())
                .arg(
                    Arg::new("command")
                        .required(true)
                        .num_args(1..)
                        .trailing_var_arg(true)
                        .allow_hyphen_values(true),
                ),
        )
        .subcommand(
            Command::new("repl")
                .about("Read commands from stdin, one per line, keeping selections between lines")
                .args(session_args),
        )
        .subcommand(
            Command::new("help")
                .about("Show a plugin's help message")
                .arg(Arg::new("plugin").required(true)),
        )
        .subcommand(Command::new("plugins").about("List plugins and their metadata"))
}

/// Per-request context assembled from the session flags.
struct SessionOptions {
    identity: SessionIdentity,
    interactive: bool,
    kubeconfig: Option<PathBuf>,
}

impl SessionOptions {
    fn from_matches(matches: &ArgMatches) -> Self {
        let mut identity = SessionIdentity::new(
            matches.get_one::<String>("user").map(String::as_str).unwrap_or("local-user"),
            matches.get_one::<String>("channel").map(String::as_str).unwrap_or("local"),
        );
        identity.thread_id = matches.get_one::<String>("thread").cloned();
        Self {
            identity,
            interactive: !matches.get_flag("no-interactive"),
            kubeconfig: matches.get_one::<String>("kubeconfig").map(|path| expand_tilde(path)),
        }
    }

    fn input(&self, command: &str) -> Result<ExecuteInput> {
        let kube_config = match &self.kubeconfig {
            Some(path) => Some(std::fs::read(path).with_context(|| format!("cannot read kubeconfig {}", path.display()))?),
            None => None,
        };
        Ok(ExecuteInput::new(
            command,
            ExecuteContext {
                is_interactivity_supported: self.interactive,
                kube_config,
                session: Some(self.identity.clone()),
            },
        ))
    }
}

async fn run_exec(config: &PluginConfig, matches: &ArgMatches, json: bool) -> Result<()> {
    let command = matches
        .get_many::<String>("command")
        .context("expected a command")?
        .cloned()
        .collect::<Vec<_>>()
        .join(" ");
    let options = SessionOptions::from_matches(matches);
    let host = PluginHost::from_config(config);
    let output = execute_interruptible(&host, options.input(&command)?).await?;
    print_output(&output, json)
}

async fn run_repl(config: &PluginConfig, matches: &ArgMatches, json: bool) -> Result<()> {
    let options = SessionOptions::from_matches(matches);
    let host = PluginHost::from_config(config);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if matches!(line, "exit" | "quit") {
            break;
        }
        match execute_interruptible(&host, options.input(line)?).await {
            Ok(output) => print_output(&output, json)?,
            Err(error) => eprintln!("Error: {error:#}"),
        }
        host.prune_idle(SESSION_IDLE_LIMIT).await;
    }
    debug!("stdin closed; leaving repl");
    Ok(())
}

fn run_help(config: &PluginConfig, matches: &ArgMatches, json: bool) -> Result<()> {
    let name = matches.get_one::<String>("plugin").context("expected a plugin name")?;
    let host = PluginHost::from_config(config);
    let plugin = host.get(name).with_context(|| format!("Unknown plugin '{name}'"))?;
    print_output(&ExecuteOutput::from(plugin.help()), json)
}

fn run_plugins(config: &PluginConfig, json: bool) -> Result<()> {
    let host = PluginHost::from_config(config);
    if json {
        let mut metadata = serde_json::Map::new();
        for plugin in host.plugins() {
            metadata.insert(plugin.name().to_string(), serde_json::to_value(plugin.metadata())?);
        }
        println!("{}", serde_json::to_string_pretty(&metadata)?);
        return Ok(());
    }
    for plugin in host.plugins() {
        print!("{}", render::render_metadata(plugin.name(), &plugin.metadata()));
    }
    Ok(())
}

/// Execute `input`, cancelling the running command on Ctrl-C.
async fn execute_interruptible(host: &PluginHost, input: ExecuteInput) -> Result<ExecuteOutput> {
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received; cancelling the running command");
            trigger.cancel();
        }
    });
    let result = host.execute(input, cancel).await;
    interrupt.abort();
    result
}

fn print_output(output: &ExecuteOutput, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(output)?);
    } else {
        print!("{}", render::render_message(&output.message));
    }
    Ok(())
}
