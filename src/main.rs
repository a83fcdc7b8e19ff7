//! kerfuffle dashboard CLI
//!
//! Entry point for the `kerfuffle-dash` command-line tool.

use std::collections::BTreeMap;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use kerfuffle_dash::config::{CliOverrides, ConfigError, EffectiveConfig};
use kerfuffle_dash::host::{ClientError, HttpTransport, ResourceClient};
use kerfuffle_dash::logging::init_logging;
use kerfuffle_dash::path::LifecycleAction;
use kerfuffle_dash::protocol::{
    Application, ApplicationDocument, InstallConfiguration, Provision, StreamType,
    DEFAULT_BOOTSTRAP, DEFAULT_BRANCH,
};
use kerfuffle_dash::signal::{SignalHandler, StopSignal, EXIT_CODE_INTERRUPTED};
use kerfuffle_dash::tail::{LogTailer, LogTarget};
use kerfuffle_dash::watch::{StatusSnapshot, StatusWatcher};
use serde::Serialize;
use serde_json::Value;

/// Exit code for configuration problems
const EXIT_CODE_CONFIG: i32 = 10;

#[derive(Parser)]
#[command(name = "kerfuffle-dash")]
#[command(about = "Operate applications on a kerfuffle server", version)]
struct Cli {
    /// API base URL (overrides config file and KERFUFFLE_URL)
    #[arg(long, global = true)]
    url: Option<String>,

    /// Path to config file (default: ~/.config/kerfuffle/dash.toml)
    #[arg(long, short = 'c', global = true)]
    config: Option<PathBuf>,

    /// Output in JSON format
    #[arg(long, global = true)]
    json: bool,

    /// Debug logging to stderr
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Inspect applications
    Apps {
        #[command(subcommand)]
        action: AppsCommands,
    },

    /// Install an application from a git repository
    Deploy {
        /// Repository URL
        #[arg(long)]
        repository: String,

        #[arg(long, default_value = DEFAULT_BRANCH)]
        branch: String,

        /// Bootstrap file inside the repository
        #[arg(long, default_value = DEFAULT_BOOTSTRAP)]
        bootstrap: String,
    },

    /// Toggle maintenance mode
    Hold { id: String },

    /// Pull and restart an application
    Reload { id: String },

    /// Stop all provisions of an application
    Shutdown { id: String },

    /// Start all provisions of an application
    Startup { id: String },

    /// Remove an application
    Delete { id: String },

    /// Provision commands
    Provision {
        #[command(subcommand)]
        action: ProvisionCommands,
    },

    /// Print provision output
    Logs {
        id: String,
        provision: String,

        /// Stream to read: log (stdout) or err (stderr)
        #[arg(long, short = 's', default_value = "log")]
        stream: StreamType,

        /// Keep polling for new output until interrupted
        #[arg(long, short = 'f')]
        follow: bool,
    },

    /// Refresh application status until interrupted
    Watch { id: String },

    /// Configuration commands
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },
}

#[derive(Subcommand)]
enum AppsCommands {
    /// List applications
    List,
    /// Show one application
    Get { id: String },
    /// List process ids of an application
    Processes { id: String },
    /// Show provision definitions of an application
    Provisions { id: String },
}

#[derive(Subcommand)]
enum ProvisionCommands {
    /// Restart a single provision
    Reload { id: String, provision: String },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Print the effective configuration and its sources
    Show,
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("{}", .0.message())]
    Client(#[from] ClientError),

    #[error("{0}")]
    Io(#[from] io::Error),

    #[error("Error serializing output: {0}")]
    Serialize(#[from] serde_json::Error),

    /// Stopped by Ctrl-C; not reported as an error.
    #[error("interrupted")]
    Interrupted,
}

impl CliError {
    fn exit_code(&self) -> i32 {
        match self {
            CliError::Config(_) => EXIT_CODE_CONFIG,
            CliError::Client(e) => e.exit_code(),
            CliError::Io(_) | CliError::Serialize(_) => 1,
            CliError::Interrupted => EXIT_CODE_INTERRUPTED,
        }
    }
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli) {
        Ok(()) => {}
        Err(CliError::Interrupted) => process::exit(EXIT_CODE_INTERRUPTED),
        Err(e) => {
            eprintln!("error: {e}");
            process::exit(e.exit_code());
        }
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    let overrides = CliOverrides {
        base_url: cli.url.clone(),
        ..CliOverrides::default()
    };
    let effective = EffectiveConfig::load(cli.config.as_deref(), &overrides)?;
    let json = cli.json;

    if let Commands::Config {
        action: ConfigCommands::Show,
    } = cli.command
    {
        println!("{}", effective.to_json()?);
        return Ok(());
    }

    let config = &effective.config;
    let transport = HttpTransport::new(config.http_config());
    let client = ResourceClient::new(Arc::new(transport), &config.base_url);

    match cli.command {
        Commands::Apps { action } => match action {
            AppsCommands::List => {
                let apps = client.list_applications()?;
                emit(json, &apps, print_applications)
            }
            AppsCommands::Get { id } => {
                let document = client.get_application(&id)?;
                emit(json, &document, print_document)
            }
            AppsCommands::Processes { id } => {
                let processes = client.list_processes(&id)?;
                emit(json, &processes, |ids: &Vec<String>| {
                    for id in ids {
                        println!("{id}");
                    }
                })
            }
            AppsCommands::Provisions { id } => {
                let provisions = client.list_provisions(&id)?;
                emit(json, &provisions, print_provisions)
            }
        },
        Commands::Deploy {
            repository,
            branch,
            bootstrap,
        } => {
            let install = InstallConfiguration::new(repository, branch, bootstrap);
            let created = client.deploy_application(&install)?;
            emit(json, &created, |value: &Value| {
                match value.get("id").and_then(Value::as_str) {
                    Some(id) => println!("deployed {id}"),
                    None => println!("deployed"),
                }
            })
        }
        Commands::Hold { id } => lifecycle(&client, &id, LifecycleAction::Hold, json),
        Commands::Reload { id } => lifecycle(&client, &id, LifecycleAction::Reload, json),
        Commands::Shutdown { id } => lifecycle(&client, &id, LifecycleAction::Shutdown, json),
        Commands::Startup { id } => lifecycle(&client, &id, LifecycleAction::Startup, json),
        Commands::Delete { id } => {
            let confirmation = client.delete_application(&id)?;
            emit(json, &confirmation, |_: &Value| println!("deleted {id}"))
        }
        Commands::Provision {
            action: ProvisionCommands::Reload { id, provision },
        } => {
            let result = client.reload_provision(&id, &provision)?;
            emit(json, &result, |_: &Value| {
                println!("reloaded {id}/{provision}")
            })
        }
        Commands::Logs {
            id,
            provision,
            stream,
            follow,
        } => {
            let target = LogTarget::new(id, provision, stream);
            if follow {
                follow_logs(client, target, config.log_poll_interval())
            } else {
                let chunk = client.fetch_output(&target.application, &target.provision, stream, 0)?;
                emit(json, &chunk, |chunk| print!("{}", chunk.content))
            }
        }
        Commands::Watch { id } => watch_status(client, &id, config.status_poll_interval(), json),
        Commands::Config { .. } => Ok(()),
    }
}

fn lifecycle(
    client: &ResourceClient,
    id: &str,
    action: LifecycleAction,
    json: bool,
) -> Result<(), CliError> {
    let response = client.apply_action(id, action)?;
    emit(json, &response, |_: &Value| println!("{action} requested for {id}"))
}

/// Print `value` as pretty JSON, or through `human` otherwise.
fn emit<T: Serialize>(json: bool, value: &T, human: impl FnOnce(&T)) -> Result<(), CliError> {
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        human(value);
    }
    Ok(())
}

fn install_stop_signal() -> Arc<StopSignal> {
    let handler = SignalHandler::new();
    if let Err(e) = handler.install() {
        tracing::warn!(error = %e, "could not install interrupt handler");
    }
    handler.signal()
}

fn follow_logs(
    client: ResourceClient,
    target: LogTarget,
    interval: std::time::Duration,
) -> Result<(), CliError> {
    let stop = install_stop_signal();
    follow_until_stopped(client, target, interval, &stop)
}

/// Print new output every `interval` until `stop` fires.
fn follow_until_stopped(
    client: ResourceClient,
    target: LogTarget,
    interval: std::time::Duration,
    stop: &StopSignal,
) -> Result<(), CliError> {
    let mut tailer = LogTailer::with_interval(client, interval);
    tailer.open(target)?;

    let mut stdout = io::stdout();
    let mut reported: Option<String> = None;
    loop {
        let stopped = stop.sleep(interval);

        let new = tailer.take_new();
        if !new.is_empty() {
            stdout.write_all(new.as_bytes())?;
            stdout.flush()?;
        }
        let error = tailer.last_error();
        if error != reported {
            if let Some(message) = &error {
                eprintln!("warning: {message}");
            }
            reported = error;
        }

        if stopped {
            break;
        }
    }

    tailer.close();
    Err(CliError::Interrupted)
}

fn watch_status(
    client: ResourceClient,
    id: &str,
    interval: std::time::Duration,
    json: bool,
) -> Result<(), CliError> {
    let stop = install_stop_signal();
    let mut watcher = StatusWatcher::start(client, id, interval)?;

    let mut seen = (0, 0);
    while !stop.sleep(interval.min(std::time::Duration::from_millis(250))) {
        let snapshot = watcher.snapshot();
        let counts = (snapshot.refreshes, snapshot.failures);
        if counts == seen {
            continue;
        }
        seen = counts;
        print_snapshot(&snapshot, json)?;
    }

    watcher.stop();
    Err(CliError::Interrupted)
}

fn print_snapshot(snapshot: &StatusSnapshot, json: bool) -> Result<(), CliError> {
    if let Some(error) = &snapshot.last_error {
        eprintln!("warning: {error}");
        return Ok(());
    }
    let Some(document) = &snapshot.document else {
        return Ok(());
    };
    if json {
        println!("{}", serde_json::to_string(document)?);
    } else {
        print_status_line(document);
    }
    Ok(())
}

fn print_applications(apps: &Vec<Application>) {
    if apps.is_empty() {
        println!("No applications.");
        return;
    }
    for app in apps {
        let status = app
            .latest_status()
            .map(|s| s.flag.as_str())
            .unwrap_or("unknown");
        let hold = if app.maintenance_mode { " [hold]" } else { "" };
        println!("{:<40} {:<10} {}{}", app.id, status, app.display_name(), hold);
    }
}

fn print_document(document: &ApplicationDocument) {
    let app = &document.application;
    println!("Application: {}", app.id);
    println!("  Name: {}", app.display_name());
    if let Some(install) = &app.install_configuration {
        println!("  Repository: {} ({})", install.repository, install.branch);
        println!("  Bootstrap: {}", install.bootstrap);
    }
    println!("  Maintenance: {}", app.maintenance_mode);
    if let Some(status) = app.latest_status() {
        println!("  Status: {} ({})", status.flag, status.reason);
    }
    if !document.last_commit.is_empty() {
        println!("  Last commit: {}", document.last_commit.lines().next().unwrap_or(""));
    }
    println!("  Processes:");
    for (id, process) in &document.processes {
        let state = if process.alive { "alive" } else { "dead" };
        println!("    {id}: {state}");
    }
}

fn print_status_line(document: &ApplicationDocument) {
    let app = &document.application;
    let status = app
        .latest_status()
        .map(|s| s.flag.as_str())
        .unwrap_or("unknown");
    let alive = document.alive_processes();
    println!(
        "{} {} alive={}/{}",
        app.id,
        status,
        alive.len(),
        document.processes.len()
    );
}

fn print_provisions(provisions: &BTreeMap<String, Provision>) {
    for (id, provision) in provisions {
        let commands: Vec<String> = provision.run.iter().map(|argv| argv.join(" ")).collect();
        println!("{id}: {}", commands.join(" && "));
    }
}
