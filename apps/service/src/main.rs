mod config;
mod error;
mod models;
mod monitoring;
mod notify;
mod storage;
mod supervisor;
mod validation;
mod worker;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use tracing::error;

use config::Config;
use supervisor::{BatchReport, ProcessLauncher, Supervisor, Termination};

#[derive(Parser, Debug)]
#[command(name = "domainwatch", version)]
#[command(about = "Watches domains for downtime and registration changes")]
struct Cli {
    /// Path to the settings file
    #[arg(long, global = true, env = "DOMAINWATCH_CONFIG")]
    config: Option<PathBuf>,

    /// Directory holding one sub-directory per monitor (overrides the settings file)
    #[arg(long, global = true, env = "DOMAINWATCH_MONITORS_DIR")]
    monitors_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create a new monitor
    Create {
        /// Domain URL, e.g. https://example.com
        url: String,
        /// Webhook URL notifications are sent to
        webhook: String,
        /// Start the worker right away
        #[arg(long)]
        start: bool,
    },
    /// List monitors and the state of their workers
    List,
    /// Start monitor workers
    Start(Target),
    /// Stop monitor workers
    Stop(Target),
    /// Print the effective settings
    Config,
    /// Run the monitoring loop for one domain in the foreground
    #[command(hide = true)]
    Run {
        domain: String,
    },
}

#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
struct Target {
    /// Domain key as shown by `list`
    domain: Option<String>,
    /// Apply to every monitor
    #[arg(long)]
    all: bool,
}

impl Target {
    /// The single domain addressed, or `None` for every monitor
    fn selection(self) -> Option<String> {
        if self.all { None } else { self.domain }
    }
}

fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let output = match cli.command {
        Command::Run { .. } => logger::Output::Worker,
        _ => logger::Output::Terminal,
    };
    logger::init(output);

    match execute(cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

/// Returns whether every requested operation succeeded
fn execute(cli: Cli) -> Result<bool> {
    let Cli { config: config_path, monitors_dir, command } = cli;

    let mut config = Config::from_config(config_path.as_deref())?;
    if let Some(dir) = monitors_dir {
        config.storage.monitors_dir = dir;
    }

    let root = config.monitors_root();
    let launcher = ProcessLauncher::current(config_path.as_deref(), &root)?;
    let supervisor = Supervisor::new(&root, Box::new(launcher));

    let succeeded = match command {
        Command::Create { url, webhook, start } => {
            report(supervisor.create_monitor(&url, &webhook, start).map(|config| {
                format!("Created monitor for {} in {}", config.url(), root.join(config.domain()).display())
            }))
        }
        Command::List => {
            let states = supervisor.monitor_states()?;
            if states.is_empty() {
                println!("No monitors found.");
            }
            for (index, (domain, state)) in states.iter().enumerate() {
                println!("{}. {} ({})", index + 1, domain, state);
            }
            true
        }
        Command::Start(target) => match target.selection() {
            Some(domain) => report(
                supervisor
                    .start_monitor(&domain)
                    .map(|handle| format!("Started monitor for {} (pid {})", domain, handle.pid)),
            ),
            None => report_batch(supervisor.start_all()?, |handle| format!("started (pid {})", handle.pid)),
        },
        Command::Stop(target) => match target.selection() {
            Some(domain) => report(
                supervisor
                    .stop_monitor(&domain)
                    .map(|termination| format!("Monitor for {}: {}", domain, describe_stop(termination))),
            ),
            None => report_batch(supervisor.stop_all()?, |termination| describe_stop(*termination).to_string()),
        },
        Command::Config => {
            print!("{config}");
            true
        }
        Command::Run { domain } => {
            let runtime = tokio::runtime::Runtime::new()?;
            runtime.block_on(worker::run(&config, &domain))?;
            true
        }
    };

    Ok(succeeded)
}

fn describe_stop(termination: Termination) -> &'static str {
    match termination {
        Termination::Signalled => "stopped",
        Termination::AlreadyExited => "already exited",
    }
}

fn report(outcome: Result<String, error::SupervisorError>) -> bool {
    match outcome {
        Ok(message) => {
            println!("{message}");
            true
        }
        Err(e) => {
            println!("Error: {e}");
            false
        }
    }
}

fn report_batch<T>(batch: BatchReport<T>, describe: impl Fn(&T) -> String) -> bool {
    if batch.outcomes.is_empty() {
        println!("No monitors found.");
    }
    for (domain, outcome) in &batch.outcomes {
        match outcome {
            Ok(value) => println!("{}: {}", domain, describe(value)),
            Err(e) => println!("{}: Error: {}", domain, e),
        }
    }
    batch.failures() == 0
}
