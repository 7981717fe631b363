use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use agent_gateway::GatewayConfig;

mod commands;

#[derive(Parser)]
#[command(name = "agent-gateway")]
#[command(about = "Run allowlisted agent scripts as queued, time-limited jobs")]
#[command(version)]
struct Cli {
    /// Path to a TOML config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the worker pool and HTTP gateway (default)
    Serve {
        /// Listen port (overrides config and PORT)
        #[arg(long)]
        port: Option<u16>,

        /// Number of worker threads
        #[arg(long)]
        workers: Option<usize>,

        /// Directory holding agent scripts
        #[arg(long)]
        agents_dir: Option<PathBuf>,
    },

    /// Check which allowlisted agents have a script on disk
    Agents {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let mut config = GatewayConfig::resolve(cli.config.as_deref())?;

    match cli.command.unwrap_or(Commands::Serve {
        port: None,
        workers: None,
        agents_dir: None,
    }) {
        Commands::Serve {
            port,
            workers,
            agents_dir,
        } => {
            if let Some(port) = port {
                config.server.port = port;
            }
            if let Some(workers) = workers {
                config.workers.count = workers;
            }
            if let Some(dir) = agents_dir {
                config.agents.dir = dir;
            }
            commands::serve::run(config).await
        }
        Commands::Agents { json } => {
            let missing = commands::agents::run(&config, json)?;
            if missing > 0 {
                std::process::exit(1);
            }
            Ok(())
        }
    }
}
