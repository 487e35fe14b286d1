//! BuildForge CLI tool.

use clap::{Parser, Subcommand};

mod commands;
mod rpc_client;

#[derive(Parser)]
#[command(name = "buildforge")]
#[command(about = "BuildForge control-plane CLI", long_about = None)]
struct Cli {
    /// API server URL
    #[arg(long, env = "BUILDFORGE_API_URL", default_value = "http://localhost:3000")]
    api_url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Submit a new build from a JSON build-config file
    Create {
        /// Path to a JSON file describing the build
        config: String,
    },
    /// Show the current status of a build
    Status {
        /// Job id
        job_id: String,
    },
    /// Fetch captured logs for a build
    Logs {
        /// Job id
        job_id: String,
        /// Restrict to a single phase (build, test, publish)
        #[arg(long)]
        phase: Option<String>,
    },
    /// Cancel a running build
    Cancel {
        /// Job id
        job_id: String,
    },
    /// List recent completed builds
    History {
        #[arg(long, default_value = "20")]
        limit: u64,
        #[arg(long, default_value = "0")]
        offset: u64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Create { config } => commands::build::create(&cli.api_url, &config).await?,
        Commands::Status { job_id } => commands::build::status(&cli.api_url, &job_id).await?,
        Commands::Logs { job_id, phase } => commands::build::logs(&cli.api_url, &job_id, phase).await?,
        Commands::Cancel { job_id } => commands::build::cancel(&cli.api_url, &job_id).await?,
        Commands::History { limit, offset } => commands::build::history(&cli.api_url, limit, offset).await?,
    }

    Ok(())
}
