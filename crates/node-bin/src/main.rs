//! Edge node - runs itinerary activities and routes messages between them.

mod app;

use std::path::PathBuf;

use app::RunRequest;
use clap::{Parser, Subcommand};
use node_config_and_utils::{init_logging, Config, Paths};

/// Edge node command-line interface.
#[derive(Parser)]
#[command(name = "edge-node")]
#[command(about = "Edge node hosting itinerary activities")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Log level (trace, debug, info, warn, error). Defaults to the configured level
    #[arg(short, long, global = true)]
    log_level: Option<String>,

    /// Base directory for runtime files (config, logs, persisted records). Defaults to ~/.edgebus
    #[arg(long, global = true, env = "EDGEBUS_BASE_DIR")]
    base_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the node in the foreground
    Run {
        /// Itinerary JSON file to sign in with
        #[arg(short, long)]
        itinerary: Option<PathBuf>,

        /// Payload to deliver once the node has signed in
        #[arg(long, requires_all = ["itinerary", "to"])]
        send: Option<String>,

        /// Activity that receives the `--send` payload
        #[arg(long)]
        to: Option<String>,

        /// Content type of the `--send` payload
        #[arg(long, default_value = "application/json")]
        content_type: String,
    },
    /// List records waiting for a replay
    Pending,
    /// Print the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Load configuration
    let paths = match cli.base_dir {
        Some(base) => Paths::with_base_dir(base),
        None => Paths::new()?,
    };
    let config = Config::load(&paths)?;

    let level = cli.log_level.unwrap_or_else(|| config.log_level.clone());
    init_logging(&level, Some(paths.log_file()));

    match cli.command {
        Some(Commands::Run {
            itinerary,
            send,
            to,
            content_type,
        }) => {
            let request = RunRequest {
                itinerary,
                send,
                to,
                content_type,
            };
            let exit = app::run_node(config, paths, request).await?;
            if exit.is_failure() {
                std::process::exit(1);
            }
        }
        None => {
            let exit = app::run_node(config, paths, RunRequest::default()).await?;
            if exit.is_failure() {
                std::process::exit(1);
            }
        }
        Some(Commands::Pending) => {
            app::list_pending(&config, &paths).await?;
        }
        Some(Commands::Config) => {
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
    }

    Ok(())
}
