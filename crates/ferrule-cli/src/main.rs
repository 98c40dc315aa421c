mod cmd_config;
mod cmd_serve;
mod cmd_status;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use cmd_config::ConfigCmd;

#[derive(Parser)]
#[command(name = "ferrule", version, about = "Editor bridge for agent-driven file edits")]
struct Cli {
    /// Project root (default: walk up from the current directory)
    #[arg(long, global = true)]
    root: Option<PathBuf>,
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the session command server until interrupted
    Serve {
        /// IDE identifier to advertise (overrides config)
        #[arg(long)]
        ide: Option<String>,
        /// Answer as soon as a command is dispatched
        #[arg(long, conflicts_with = "wait")]
        fire_and_forget: bool,
        /// Answer after the command finished, with per-file outcomes
        #[arg(long)]
        wait: bool,
        /// Bound on each host operation, in milliseconds (overrides config)
        #[arg(long)]
        timeout_ms: Option<u64>,
    },
    /// Show whether a server is advertised for this project
    Status,
    /// Read or change .ferrule/config.json
    Config {
        #[command(subcommand)]
        cmd: ConfigCmd,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let root = project_root(cli.root)?;

    match cli.cmd {
        Command::Serve {
            ide,
            fire_and_forget,
            wait,
            timeout_ms,
        } => cmd_serve::execute(
            &root,
            cmd_serve::Overrides {
                ide,
                wait_for_completion: if fire_and_forget {
                    Some(false)
                } else if wait {
                    Some(true)
                } else {
                    None
                },
                timeout_ms,
            },
        ),
        Command::Status => cmd_status::execute(&root),
        Command::Config { cmd } => cmd_config::run(cmd, &root),
    }
}

fn project_root(explicit: Option<PathBuf>) -> anyhow::Result<PathBuf> {
    if let Some(root) = explicit {
        return Ok(root);
    }
    let cwd = std::env::current_dir()?;
    Ok(ferrule_core::FerrulePaths::find_root(&cwd).unwrap_or(cwd))
}
