//! procfleet: a Procfile-style process supervisor.
//!
//! This is the entry point of the application. It parses command-line
//! arguments, layers configuration, and hands the resolved inputs to the
//! supervisor (`start`) or the one-shot runner (`run`).

mod allocator;
mod config;
mod console;
mod envfile;
mod environment;
mod error;
mod events;
mod exit;
mod formation;
mod output;
mod policy;
mod process;
mod procfile;
mod registry;
mod runner;
mod shell;
mod signal;
mod supervisor;

use std::collections::HashMap;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{bail, Result};
use clap::builder::styling::{AnsiColor, Effects, Style};
use clap::builder::Styles;
use clap::{Args, Parser, Subcommand};
use tokio::sync::mpsc;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::config::{Config, RespawnSettings, DEFAULT_CONFIG_FILE};
use crate::console::{ConsoleOptions, TerminalConsole, SYSTEM_NAME};
use crate::environment::EnvSnapshot;
use crate::events::Event;
use crate::formation::Formation;
use crate::procfile::Procfile;
use crate::shell::Shell;
use crate::signal::Signal;
use crate::supervisor::{RunOutcome, Supervisor, SupervisorSettings, DEFAULT_SHUTDOWN_TIMEOUT};

const DEFAULT_PROCFILE: &str = "Procfile";
const DEFAULT_ENV_FILE: &str = ".env";
const DEFAULT_PORT: u16 = 5000;

/// Command-line interface definition.
#[derive(Debug, Parser)]
#[command(
    name = "procfleet",
    version,
    about = "Run and supervise a Procfile fleet",
    styles = help_styles()
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Start the fleet and keep every instance alive.
    Start(StartArgs),
    /// Run one command with the fleet environment, then exit with its code.
    Run(RunArgs),
    /// Validate a Procfile and list its process types.
    Check(CheckArgs),
}

#[derive(Debug, Args)]
struct StartArgs {
    /// Formation, e.g. "web=2,api=1" (default: one of each declared type).
    formation: Vec<String>,
    /// Path to the Procfile.
    #[arg(short = 'f', long)]
    procfile: Option<PathBuf>,
    /// Env file with overrides.
    #[arg(short = 'e', long)]
    env: Option<PathBuf>,
    /// Base port; instances get base + index + type * 100.
    #[arg(short = 'p', long)]
    port: Option<u16>,
    /// Delay before respawning an exited instance (ms).
    #[arg(long)]
    respawn_delay_ms: Option<u64>,
    /// Respawn delay growth ("fixed" or "exponential").
    #[arg(long)]
    backoff: Option<String>,
    /// Give up on an instance after this many consecutive respawns.
    #[arg(long)]
    max_attempts: Option<u32>,
    /// Time to wait after the shutdown signal before SIGKILL (ms).
    #[arg(long)]
    shutdown_timeout_ms: Option<u64>,
    /// Prepend elapsed time to each line.
    #[arg(long)]
    timestamp: bool,
    /// Disable colored prefixes.
    #[arg(long)]
    no_color: bool,
    /// Strip ANSI escapes from process output.
    #[arg(long)]
    strip_ansi: bool,
    #[command(flatten)]
    config: ConfigArgs,
}

#[derive(Debug, Args)]
struct RunArgs {
    /// Env file with overrides.
    #[arg(short = 'e', long)]
    env: Option<PathBuf>,
    #[command(flatten)]
    config: ConfigArgs,
    /// Command to run.
    #[arg(trailing_var_arg = true, required = true)]
    command: Vec<String>,
}

#[derive(Debug, Args)]
struct CheckArgs {
    /// Path to the Procfile.
    #[arg(short = 'f', long)]
    procfile: Option<PathBuf>,
    #[command(flatten)]
    config: ConfigArgs,
}

#[derive(Debug, Args)]
struct ConfigArgs {
    /// Path to procfleet.toml.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Ignore any procfleet.toml in the current directory.
    #[arg(long)]
    no_config: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<ExitCode> {
    init_logging();
    let cli = Cli::parse();
    // The only read of the live environment; everything downstream uses this snapshot.
    let snapshot = EnvSnapshot::capture();
    let code = match cli.command {
        Commands::Start(args) => start(args, snapshot).await?,
        Commands::Run(args) => run(args, snapshot).await?,
        Commands::Check(args) => check(args)?,
    };
    Ok(ExitCode::from((code & 0xff) as u8))
}

fn init_logging() {
    let filter = EnvFilter::try_from_env("PROCFLEET_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Everything `start` needs after CLI, environment and config file are layered.
#[derive(Debug)]
struct StartSettings {
    procfile: PathBuf,
    env_file: PathBuf,
    env_file_required: bool,
    port: u16,
    supervisor: SupervisorSettings,
    console: ConsoleOptions,
}

impl StartSettings {
    /// CLI flags win over the environment, which wins over the config file.
    fn resolve(args: &StartArgs, config: &Config, snapshot: &EnvSnapshot) -> Result<Self> {
        let mut respawn = RespawnSettings::from_config(config);
        if let Some(ms) = config::respawn_delay_from_env(snapshot)? {
            respawn.delay_ms = Some(ms);
        }
        if let Some(ms) = args.respawn_delay_ms {
            respawn.delay_ms = Some(ms);
        }
        if let Some(strategy) = &args.backoff {
            respawn.strategy = Some(strategy.clone());
        }
        if let Some(max) = args.max_attempts {
            respawn.max_attempts = Some(max);
        }
        let policy = respawn.into_policy()?;

        let shutdown_timeout = args
            .shutdown_timeout_ms
            .or(config.shutdown_timeout_ms)
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_SHUTDOWN_TIMEOUT);

        let colors = !args.no_color
            && config.colors.unwrap_or(true)
            && std::io::stdout().is_terminal();

        Ok(Self {
            procfile: args
                .procfile
                .clone()
                .or_else(|| config.procfile.clone())
                .unwrap_or_else(|| PathBuf::from(DEFAULT_PROCFILE)),
            env_file: args
                .env
                .clone()
                .or_else(|| config.env_file.clone())
                .unwrap_or_else(|| PathBuf::from(DEFAULT_ENV_FILE)),
            env_file_required: args.env.is_some() || config.env_file.is_some(),
            port: args.port.or(config.port).unwrap_or(DEFAULT_PORT),
            supervisor: SupervisorSettings {
                policy,
                shutdown_timeout,
            },
            console: ConsoleOptions {
                colors,
                timestamp: args.timestamp || config.timestamp.unwrap_or(false),
                strip_ansi: args.strip_ansi || config.strip_ansi.unwrap_or(false),
                prefix_length: config.prefix_length,
            },
        })
    }
}

async fn start(args: StartArgs, snapshot: EnvSnapshot) -> Result<i32> {
    let config = load_layered_config(&args.config)?;
    let mut settings = StartSettings::resolve(&args, &config, &snapshot)?;
    let procfile = procfile::load_procfile(&settings.procfile)?;
    let formation = if args.formation.is_empty() {
        Formation::one_each(&procfile)
    } else {
        Formation::parse(&args.formation)?
    };
    if formation.is_empty() {
        bail!("nothing to run: {} declares no process types", settings.procfile.display());
    }
    let overrides = envfile::load_env_file(&settings.env_file, settings.env_file_required)?;
    if settings.console.prefix_length.is_none() {
        settings.console.prefix_length = Some(prefix_width(&formation));
    }
    debug!(?settings, "resolved start settings");

    let console = TerminalConsole::stdout(settings.console.clone());
    let mut supervisor = Supervisor::new(console, snapshot, settings.supervisor);
    spawn_signal_listener(supervisor.sender());

    if supervisor
        .launch(&procfile, &formation, &overrides, settings.port)
        .is_err()
    {
        // Already reported through the console.
        return Ok(1);
    }
    let code = match supervisor.run().await {
        RunOutcome::Stopped => 0,
        RunOutcome::Exhausted => 1,
    };
    Ok(code)
}

async fn run(args: RunArgs, snapshot: EnvSnapshot) -> Result<i32> {
    let config = load_layered_config(&args.config)?;
    let (env_file, required) = match args.env.clone().or_else(|| config.env_file.clone()) {
        Some(path) => (path, true),
        None => (PathBuf::from(DEFAULT_ENV_FILE), false),
    };
    let overrides = envfile::load_env_file(&env_file, required)?;
    let command = command_line(&args.command);
    let shell = Shell::detect(&snapshot);
    runner::run_once(&shell, &snapshot, &command, &overrides).await
}

fn check(args: CheckArgs) -> Result<i32> {
    let config = load_layered_config(&args.config)?;
    let path = args
        .procfile
        .or(config.procfile)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_PROCFILE));
    let procfile = procfile::load_procfile(&path)?;
    if procfile.is_empty() {
        bail!("{} declares no process types", path.display());
    }
    print_declarations(&procfile);
    Ok(0)
}

fn print_declarations(procfile: &Procfile) {
    for (name, command) in procfile.iter() {
        println!("{}: {}", name, command);
    }
}

fn load_layered_config(args: &ConfigArgs) -> Result<Config> {
    if args.no_config {
        return Ok(Config::default());
    }
    let path = args
        .config
        .clone()
        .or_else(|| default_config_path().filter(|path| path.exists()));
    match path {
        Some(path) => config::load_config(&path),
        None => Ok(Config::default()),
    }
}

fn default_config_path() -> Option<PathBuf> {
    let path = Path::new(DEFAULT_CONFIG_FILE);
    if path.exists() {
        Some(path.to_path_buf())
    } else {
        None
    }
}

/// A single argument is taken as a full command line; several are quoted and joined.
fn command_line(words: &[String]) -> String {
    match words {
        [single] => single.clone(),
        _ => shell_words::join(words),
    }
}

/// Width of the longest `{type}.{n}` key (or the tool name) in the formation.
fn prefix_width(formation: &Formation) -> usize {
    formation
        .iter()
        .filter(|requirement| requirement.count > 0)
        .map(|requirement| requirement.name.len() + 1 + requirement.count.to_string().len())
        .max()
        .unwrap_or(0)
        .max(SYSTEM_NAME.len())
}

fn spawn_signal_listener(tx: mpsc::Sender<Event>) {
    tokio::spawn(async move {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};
            let (mut sigint, mut sigterm) =
                match (signal(SignalKind::interrupt()), signal(SignalKind::terminate())) {
                    (Ok(sigint), Ok(sigterm)) => (sigint, sigterm),
                    _ => return,
                };
            loop {
                let signal = tokio::select! {
                    _ = sigint.recv() => Signal::Int,
                    _ = sigterm.recv() => Signal::Term,
                };
                if tx.send(Event::Shutdown { signal }).await.is_err() {
                    break;
                }
            }
        }
        #[cfg(not(unix))]
        {
            while tokio::signal::ctrl_c().await.is_ok() {
                if tx
                    .send(Event::Shutdown {
                        signal: Signal::Int,
                    })
                    .await
                    .is_err()
                {
                    break;
                }
            }
        }
    });
}

fn help_styles() -> Styles {
    Styles::styled()
        .header(Style::new().fg_color(Some(AnsiColor::Cyan.into())).effects(Effects::BOLD))
        .usage(Style::new().fg_color(Some(AnsiColor::Cyan.into())).effects(Effects::BOLD))
        .literal(Style::new().fg_color(Some(AnsiColor::Green.into())))
        .placeholder(Style::new().fg_color(Some(AnsiColor::Yellow.into())))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn start_args(argv: &[&str]) -> StartArgs {
        let mut full = vec!["procfleet", "start"];
        full.extend_from_slice(argv);
        match Cli::try_parse_from(full).unwrap().command {
            Commands::Start(args) => args,
            other => panic!("expected start, got {:?}", other),
        }
    }

    #[test]
    fn parses_start_with_formation_and_flags() {
        let args = start_args(&["web=2,api=1", "-p", "6000", "-f", "Procfile.dev", "--timestamp"]);
        assert_eq!(args.formation, vec!["web=2,api=1"]);
        assert_eq!(args.port, Some(6000));
        assert_eq!(args.procfile.as_deref(), Some(Path::new("Procfile.dev")));
        assert!(args.timestamp);
    }

    #[test]
    fn run_collects_trailing_command() {
        let cli = Cli::try_parse_from(["procfleet", "run", "--", "rake", "db:migrate", "--trace"])
            .unwrap();
        match cli.command {
            Commands::Run(args) => {
                assert_eq!(args.command, vec!["rake", "db:migrate", "--trace"]);
                assert_eq!(command_line(&args.command), "rake db:migrate --trace");
            }
            other => panic!("expected run, got {:?}", other),
        }
    }

    #[test]
    fn single_word_command_is_passed_verbatim() {
        assert_eq!(command_line(&["echo $PORT".to_string()]), "echo $PORT");
        assert_eq!(
            command_line(&["echo".to_string(), "a b".to_string()]),
            "echo 'a b'"
        );
    }

    #[test]
    fn cli_beats_env_beats_config_for_respawn_delay() {
        let config = Config {
            respawn_delay_ms: Some(300),
            port: Some(7000),
            ..Config::default()
        };
        let env = EnvSnapshot::from_vars([(config::RESPAWN_DELAY_VAR, "200")]);

        let settings = StartSettings::resolve(&start_args(&[]), &config, &EnvSnapshot::default())
            .unwrap();
        assert_eq!(settings.supervisor.policy.delay, Duration::from_millis(300));
        assert_eq!(settings.port, 7000);

        let settings = StartSettings::resolve(&start_args(&[]), &config, &env).unwrap();
        assert_eq!(settings.supervisor.policy.delay, Duration::from_millis(200));

        let args = start_args(&["--respawn-delay-ms", "100", "-p", "9000"]);
        let settings = StartSettings::resolve(&args, &config, &env).unwrap();
        assert_eq!(settings.supervisor.policy.delay, Duration::from_millis(100));
        assert_eq!(settings.port, 9000);
    }

    #[test]
    fn defaults_when_nothing_is_configured() {
        let settings =
            StartSettings::resolve(&start_args(&[]), &Config::default(), &EnvSnapshot::default())
                .unwrap();
        assert_eq!(settings.procfile, PathBuf::from("Procfile"));
        assert_eq!(settings.env_file, PathBuf::from(".env"));
        assert!(!settings.env_file_required);
        assert_eq!(settings.port, 5000);
        assert_eq!(settings.supervisor.policy.delay, Duration::from_millis(1000));
        assert_eq!(settings.supervisor.policy.max_attempts, None);
        assert_eq!(settings.supervisor.shutdown_timeout, DEFAULT_SHUTDOWN_TIMEOUT);
    }

    #[test]
    fn prefix_width_fits_longest_key() {
        let formation = Formation::parse(&["web=12,worker=1"]).unwrap();
        assert_eq!(prefix_width(&formation), "procfleet".len());
        let formation = Formation::parse(&["background_jobs=3"]).unwrap();
        assert_eq!(prefix_width(&formation), "background_jobs.3".len());
    }
}
