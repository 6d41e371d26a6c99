//! hitch CLI
//!
//! Runs a command with an interactive session attached:
//! - Raw TTY relay with a configurable detach sequence
//! - Window size propagation
//! - Signal forwarding when no TTY is allocated
//! - Exit status propagation

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use hitch::commands::{self, RunArgs};
use ht_core::config::ClientConfig;

#[derive(Parser)]
#[command(name = "hitch")]
#[command(author, version, about = "Attach your terminal to a running process")]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a command and attach to it
    Run {
        /// Keep standard input attached
        #[arg(short, long)]
        interactive: bool,
        /// Allocate a pseudo-terminal
        #[arg(short, long)]
        tty: bool,
        /// Remove the target when it exits
        #[arg(long)]
        rm: bool,
        /// Override the detach key sequence, e.g. "ctrl-a,d"
        #[arg(long, value_name = "KEYS")]
        detach_keys: Option<String>,
        /// Forward received signals to the process (non-TTY only)
        #[arg(long, value_name = "BOOL")]
        sig_proxy: Option<bool>,
        /// Set an environment variable
        #[arg(short, long = "env", value_name = "KEY=VALUE")]
        env: Vec<String>,
        /// Command to run
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        command: Vec<String>,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show the effective configuration
    Show,
    /// Show the config file path
    Path,
    /// Write a config file with default values
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
    /// Set a config value
    Set { key: String, value: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    let log_level = match (cli.quiet, cli.verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "info",
        (false, 2) => "debug",
        (false, _) => "trace",
    };

    // Standard output carries the attached process's output
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| log_level.into()),
        ))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Run {
            interactive,
            tty,
            rm,
            detach_keys,
            sig_proxy,
            env,
            command,
        } => {
            let config = ClientConfig::load_or_default(config_path);
            let args = RunArgs {
                interactive,
                tty,
                auto_remove: rm,
                detach_keys,
                sig_proxy,
                env,
                command,
            };
            let code = commands::run_command(&config, args).await?;
            // The local input thread may still be blocked in a read
            std::process::exit(code);
        }

        Commands::Config { action } => match action {
            ConfigAction::Show => commands::config_show(config_path)?,
            ConfigAction::Path => commands::config_path(config_path)?,
            ConfigAction::Init { force } => commands::config_init(config_path, force)?,
            ConfigAction::Set { key, value } => commands::config_set(config_path, &key, &value)?,
        },
    }

    Ok(())
}
