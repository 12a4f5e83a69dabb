use anyhow::Result;
use clap::{Parser, Subcommand};
use loopmemory::{cli, config, logging, server};
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Parser)]
#[command(
    name = "loopmemory",
    version,
    about = "Semantic memory MCP server for AI agents"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the MCP server
    Serve {
        /// Transport to serve on: stdio or http (overrides config)
        #[arg(long)]
        transport: Option<String>,
    },
    /// Search memories from the terminal
    Search {
        query: String,
        /// Maximum number of results
        #[arg(long)]
        limit: Option<i64>,
    },
    /// Re-index memories whose vector write is still pending
    Reconcile {
        /// Maximum number of pending memories to process
        #[arg(long, default_value_t = 100)]
        limit: usize,
        /// Include entries younger than the grace period (stop the server first)
        #[arg(long)]
        now: bool,
    },
    /// Manage projects
    Projects {
        #[command(subcommand)]
        action: ProjectsAction,
    },
    /// Check database and vector index health
    Doctor,
}

#[derive(Subcommand)]
enum ProjectsAction {
    /// List all projects
    List,
    /// Add a project
    Add {
        name: String,
        #[arg(long)]
        description: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();

    // Log to stderr so stdout stays clean for MCP JSON-RPC.
    let (subscriber, log_handle) = logging::subscriber(std::io::stderr);
    subscriber.init();

    let mut config = config::LoopConfig::load()?;
    logging::apply_level(&log_handle, &config.server.log_level)?;

    match args.command {
        Command::Serve { transport } => {
            if let Some(transport) = transport {
                config.server.transport = transport;
            }
            server::serve(config).await?;
        }
        Command::Search { query, limit } => {
            cli::search::search(&config, &query, limit).await?;
        }
        Command::Reconcile { limit, now } => {
            cli::reconcile::reconcile(&config, limit, now).await?;
        }
        Command::Projects { action } => match action {
            ProjectsAction::List => cli::projects::list(&config)?,
            ProjectsAction::Add { name, description } => {
                cli::projects::add(&config, &name, description.as_deref())?
            }
        },
        Command::Doctor => {
            cli::doctor::doctor(&config).await?;
        }
    }

    Ok(())
}
