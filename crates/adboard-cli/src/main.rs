mod cmd;

use clap::{Parser, Subcommand};
use cmd::{config::ConfigSubcommand, review::ReviewSubcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "adboard",
    about = "Rate-limited, confirmable community ad broadcasts",
    version,
    propagate_version = true
)]
struct Cli {
    /// Path to adboard.yaml (created with defaults by `serve` if missing)
    #[arg(long, global = true, env = "ADBOARD_CONFIG", default_value = "adboard.yaml")]
    config: PathBuf,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP/SSE server
    Serve {
        /// Port to listen on (0 = OS-assigned)
        #[arg(long, default_value = "3180")]
        port: u16,
    },

    /// Validate the configuration
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },

    /// Inspect and resolve the review queue offline
    Review {
        #[command(subcommand)]
        subcommand: ReviewSubcommand,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = match &cli.command {
        Commands::Serve { .. } => tracing::Level::INFO,
        _ => tracing::Level::WARN,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .init();

    let result = match cli.command {
        Commands::Serve { port } => cmd::serve::run(cli.config, port),
        Commands::Config { subcommand } => cmd::config::run(&cli.config, subcommand, cli.json),
        Commands::Review { subcommand } => cmd::review::run(&cli.config, subcommand, cli.json),
    };

    if let Err(e) = result {
        // Print the full error chain (anyhow's alternate Display)
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
