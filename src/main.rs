#![allow(clippy::uninlined_format_args)]

use anyhow::Result;
use clap::{Parser, Subcommand};
use serde_json::json;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use chatprobe::commands;
use chatprobe::commands::config::ConfigCommands;
use chatprobe::commands::daemon::DaemonCommands;
use chatprobe::config::Config;
use chatprobe::errors::exit_code_for;

const EXIT_SUCCESS: i32 = 0;

#[derive(Parser)]
#[command(name = "chatprobe")]
#[command(about = "Drive an IDE's agent chat over the DevTools protocol", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Remote debugging port of the IDE (overrides config and CHATPROBE_PORT)
    #[arg(long, global = true)]
    port: Option<u16>,

    /// Config file (defaults to ~/.chatprobe/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Run in this process even if a daemon is running
    #[arg(long, global = true)]
    local: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Type a message into the agent chat and submit it
    Send {
        /// Message text
        text: String,
    },

    /// Wait until the agent stops generating
    Wait {
        /// Overall timeout in milliseconds
        #[arg(long)]
        timeout: Option<u64>,
    },

    /// Send a message, then wait for the agent to finish
    Ask {
        /// Message text
        text: String,

        /// Overall timeout in milliseconds for the wait
        #[arg(long)]
        timeout: Option<u64>,
    },

    /// Capture a JPEG of the chat area
    Screenshot {
        /// Output file (defaults to chatprobe-<unix-seconds>.jpg)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List every DevTools target and whether it is searched
    Targets,

    /// Manage the background daemon
    Daemon {
        #[command(subcommand)]
        command: DaemonCommands,
    },

    /// Show or initialise the config file
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[tokio::main]
async fn main() {
    match run().await {
        Ok(()) => std::process::exit(EXIT_SUCCESS),
        Err(err) => {
            let exit_code = exit_code_for(&err);

            // Output JSON error to stdout for programmatic consumption
            let error_json = json!({
                "error": true,
                "message": format!("{:#}", err),
                "exit_code": exit_code
            });
            println!(
                "{}",
                serde_json::to_string(&error_json).unwrap_or_else(|_| "{}".to_string())
            );

            // Also log to stderr for human reading
            eprintln!("Error: {:#}", err);
            std::process::exit(exit_code);
        }
    }
}

async fn run() -> Result<()> {
    // Initialize tracing to stderr (so JSON output to stdout remains clean)
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "chatprobe=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref(), cli.port)?;

    match cli.command {
        Commands::Send { text } => commands::send::handle_send(&config, text, cli.local).await?,

        Commands::Wait { timeout } => {
            commands::wait::handle_wait(&config, timeout, cli.local).await?
        }

        Commands::Ask { text, timeout } => {
            commands::ask::handle_ask(&config, text, timeout, cli.local).await?
        }

        Commands::Screenshot { output } => {
            commands::screenshot::handle_screenshot(&config, output, cli.local).await?
        }

        Commands::Targets => commands::targets::handle_targets(&config, cli.local).await?,

        Commands::Daemon { command } => {
            commands::daemon::handle_daemon(command, &config, cli.config).await?
        }

        Commands::Config { command } => {
            commands::config::handle_config(command, &config, cli.config)?
        }
    }

    Ok(())
}
