//! SAM CLI
//!
//! Command-line interface for storing and editing Social Accounting Matrix documents.

use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use sam_core::{Config, GenerationStatus, StorageError, Store};

mod commands;
mod output;

use commands::sam::{CreateArgs, UpdateArgs};
use output::{Output, OutputFormat};

#[derive(Parser)]
#[command(name = "sam")]
#[command(about = "SAM - Local storage for Social Accounting Matrices")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Quiet mode - minimal output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Storage backend to use (overrides config)
    #[arg(long, global = true)]
    backend: Option<String>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Path to config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List all SAMs
    #[command(alias = "ls")]
    List,
    /// Create a new SAM
    #[command(alias = "add")]
    Create {
        /// Display name
        #[arg(short, long)]
        name: Option<String>,
        /// Free-text description
        #[arg(short, long)]
        description: Option<String>,
        /// Generation status (pending, completed, failed)
        #[arg(short, long)]
        status: Option<GenerationStatus>,
        /// Body as inline JSON, or @path to a JSON file
        #[arg(short, long)]
        body: Option<String>,
    },
    /// Show a SAM with its body
    Show {
        /// SAM key
        key: String,
    },
    /// Update fields of a SAM ("none" clears a field)
    Update {
        /// SAM key
        key: String,
        #[arg(short, long)]
        name: Option<String>,
        #[arg(short, long)]
        description: Option<String>,
        #[arg(short, long)]
        status: Option<String>,
        /// Body as inline JSON, or @path to a JSON file
        #[arg(short, long)]
        body: Option<String>,
    },
    /// Delete a SAM
    #[command(alias = "rm")]
    Delete {
        /// SAM key
        key: String,
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
    /// Show or set configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
    /// Show storage status and document counts
    Status,
}

#[derive(Subcommand, Clone)]
enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Set a configuration value
    Set {
        /// Configuration key (data_dir, backend, log_file)
        key: String,
        /// Configuration value
        value: String,
    },
}

/// Exit code for failures that may succeed on retry (EX_TEMPFAIL)
const EXIT_TEMPFAIL: i32 = 75;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        let (code, hint) = failure_report(&e);
        eprintln!("Error: {:#}", e);
        if let Some(hint) = hint {
            eprintln!("Hint: {}", hint);
        }
        std::process::exit(code);
    }
}

/// Exit code and recovery hint for a failed command
fn failure_report(err: &anyhow::Error) -> (i32, Option<&'static str>) {
    match err.downcast_ref::<StorageError>() {
        Some(storage) if storage.is_recoverable() => {
            (EXIT_TEMPFAIL, storage.recovery_suggestion())
        }
        Some(storage) => (1, storage.recovery_suggestion()),
        None => (1, None),
    }
}

async fn run(cli: Cli) -> Result<()> {
    let output = Output::new(OutputFormat::from_flags(cli.json, cli.quiet));

    // Config commands don't need the store
    if let Commands::Config { command } = &cli.command {
        return handle_config_command(command.clone(), cli.config.as_ref(), &output);
    }

    let mut config = Config::load_with_cli_override(cli.config.as_ref())
        .context("Failed to load configuration")?;
    if let Some(ref backend) = cli.backend {
        config.backend = backend.trim().to_ascii_lowercase();
    }

    init_logging(&config, cli.verbose);

    let store = Store::open_with_config(config)?;

    match cli.command {
        Commands::List => commands::sam::list(&store, &output).await,
        Commands::Create {
            name,
            description,
            status,
            body,
        } => {
            let args = CreateArgs {
                name,
                description,
                status,
                body,
            };
            commands::sam::create(&store, args, &output).await
        }
        Commands::Show { key } => commands::sam::show(&store, key, &output).await,
        Commands::Update {
            key,
            name,
            description,
            status,
            body,
        } => {
            let args = UpdateArgs {
                name,
                description,
                status,
                body,
            };
            commands::sam::update(&store, key, args, &output).await
        }
        Commands::Delete { key, yes } => commands::sam::delete(&store, key, yes, &output).await,
        Commands::Config { .. } => unreachable!(), // Handled above
        Commands::Status => commands::status::show(&store, &output).await,
    }
}

fn handle_config_command(
    command: Option<ConfigCommands>,
    config_path: Option<&PathBuf>,
    output: &Output,
) -> Result<()> {
    match command {
        Some(ConfigCommands::Show) | None => commands::config::show(config_path, output),
        Some(ConfigCommands::Set { key, value }) => {
            commands::config::set(key, value, config_path, output)
        }
    }
}

/// Log level from `-v` flags, falling back to SAM_LOG, then "warn"
fn log_level(verbose: u8) -> String {
    match verbose {
        0 => std::env::var("SAM_LOG")
            .ok()
            .filter(|level| !level.trim().is_empty())
            .unwrap_or_else(|| "warn".to_string()),
        1 => "debug".to_string(),
        _ => "trace".to_string(),
    }
}

/// Initialize logging to stderr, or to config.log_file when set
fn init_logging(config: &Config, verbose: u8) {
    let level = log_level(verbose);
    let env_filter = EnvFilter::new(format!("sam_core={},sam_cli={}", level, level));

    if let Some(ref log_path) = config.log_file {
        match OpenOptions::new().create(true).append(true).open(log_path) {
            Ok(file) => {
                let _ = tracing_subscriber::fmt()
                    .with_env_filter(env_filter)
                    .with_target(false)
                    .with_ansi(false)
                    .with_writer(Mutex::new(file))
                    .try_init();
                info!("Logging to {:?}", log_path);
                return;
            }
            Err(e) => {
                eprintln!("Warning: Could not open log file {:?}: {}", log_path, e);
            }
        }
    }

    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbose_flags_set_level() {
        assert_eq!(log_level(1), "debug");
        assert_eq!(log_level(2), "trace");
        assert_eq!(log_level(5), "trace");
    }

    #[test]
    fn test_cli_parses_create() {
        let cli = Cli::try_parse_from([
            "sam",
            "--json",
            "create",
            "--name",
            "Base 2020",
            "--status",
            "pending",
            "--body",
            "{}",
        ])
        .unwrap();

        assert!(cli.json);
        match cli.command {
            Commands::Create { name, status, body, .. } => {
                assert_eq!(name.as_deref(), Some("Base 2020"));
                assert_eq!(status, Some(GenerationStatus::Pending));
                assert_eq!(body.as_deref(), Some("{}"));
            }
            _ => panic!("expected create"),
        }
    }

    #[test]
    fn test_cli_rejects_unknown_status() {
        assert!(Cli::try_parse_from(["sam", "create", "--status", "running"]).is_err());
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli =
            Cli::try_parse_from(["sam", "list", "--backend", "memory", "-vv", "--quiet"]).unwrap();
        assert_eq!(cli.backend.as_deref(), Some("memory"));
        assert_eq!(cli.verbose, 2);
        assert!(cli.quiet);
    }

    #[test]
    fn test_recoverable_storage_error_gets_tempfail_and_hint() {
        let err = anyhow::Error::from(StorageError::KeyCollision {
            key: "k1".to_string(),
        })
        .context("Failed to create SAM");

        let (code, hint) = failure_report(&err);
        assert_eq!(code, EXIT_TEMPFAIL);
        assert_eq!(hint, Some("Retry the operation to get a fresh key."));
    }

    #[test]
    fn test_missing_key_exits_one_without_hint() {
        let err = anyhow::Error::from(StorageError::NotFound {
            key: "gone".to_string(),
        });
        assert_eq!(failure_report(&err), (1, None));
    }

    #[test]
    fn test_unknown_backend_hint() {
        let err = anyhow::Error::from(StorageError::UnknownBackend {
            tag: "indexeddb".to_string(),
        });
        let (code, hint) = failure_report(&err);
        assert_eq!(code, 1);
        assert!(hint.unwrap().contains("sqlite, memory"));
    }

    #[test]
    fn test_plain_errors_exit_one() {
        let err = anyhow::anyhow!("Nothing to update");
        assert_eq!(failure_report(&err), (1, None));
    }
}
