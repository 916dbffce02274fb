//! # devspace CLI
//!
//! The `devspace` binary starts the HTTP API and offers the same workspace
//! operations from the command line.
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `devspace serve` | Start the HTTP API |
//! | `devspace init <user>` | Create (or refresh) a user workspace |
//! | `devspace files <user>` | List files in a workspace |
//! | `devspace read <user> <path>` | Print a file from a workspace |
//! | `devspace search <user>` | Search indexed markdown by tags and text |
//! | `devspace index <user>` | Re-index a workspace and print counters |
//! | `devspace env-example` | Write `.env.example` if no `.env` exists |
//!
//! ## Examples
//!
//! ```bash
//! devspace --config ./config/devspace.toml serve
//! devspace init alice
//! devspace search alice --tags rust,api --query axum
//! ```

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use devspace::config;
use devspace::server;
use devspace::server::parse_tags;
use devspace::workspace::WorkspaceManager;

/// devspace: per-user workspaces with markdown search and an AI
/// coding-assistant chat proxy.
#[derive(Parser)]
#[command(name = "devspace", version, about)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/devspace.toml`. When the file does not exist,
    /// built-in defaults are used. `ANTHROPIC_API_KEY`, `PORT` and
    /// `DEVSPACE_WORKSPACES_DIR` override the file.
    #[arg(long, global = true, default_value = "./config/devspace.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API server.
    Serve,

    /// Create a user workspace (idempotent) and index it.
    Init {
        /// User identifier.
        user_id: String,
    },

    /// List the files in a user workspace.
    Files {
        /// User identifier.
        user_id: String,
    },

    /// Print a file from a user workspace.
    Read {
        /// User identifier.
        user_id: String,
        /// Path relative to the workspace root.
        path: String,
    },

    /// Search indexed markdown in a user workspace.
    Search {
        /// User identifier.
        user_id: String,

        /// Case-insensitive text to look for in content and titles.
        #[arg(long)]
        query: Option<String>,

        /// Comma-separated tags; files must carry all of them.
        #[arg(long)]
        tags: Option<String>,
    },

    /// Re-index a user workspace and print counters.
    Index {
        /// User identifier.
        user_id: String,
    },

    /// Write `.env.example` next to the config when no `.env` exists.
    EnvExample,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=info,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let cfg = config::load_or_default(&cli.config)?;

    match cli.command {
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
        Commands::Init { user_id } => {
            let manager = WorkspaceManager::from_config(&cfg).await?;
            let ws = manager.ensure(&user_id).await?;
            println!("Workspace initialized: {}", ws.root.display());
        }
        Commands::Files { user_id } => {
            let manager = WorkspaceManager::from_config(&cfg).await?;
            manager.ensure(&user_id).await?;
            let mut files = manager.list_files(&user_id).await?;
            files.sort_by(|a, b| a.file_path.cmp(&b.file_path));
            for f in &files {
                println!("{}", f.file_path);
            }
            println!("{} files", files.len());
        }
        Commands::Read { user_id, path } => {
            let manager = WorkspaceManager::from_config(&cfg).await?;
            let content = manager.read_file(&user_id, &path).await?;
            print!("{}", content);
        }
        Commands::Search {
            user_id,
            query,
            tags,
        } => {
            let manager = WorkspaceManager::from_config(&cfg).await?;
            manager.ensure(&user_id).await?;
            let tags = parse_tags(tags.as_deref());
            let results = manager.search(&user_id, query.as_deref(), &tags).await?;
            if results.is_empty() {
                println!("No results.");
            }
            for (i, f) in results.iter().enumerate() {
                println!(
                    "{}. {} ({})",
                    i + 1,
                    f.file_path,
                    f.title.as_deref().unwrap_or("(untitled)")
                );
                if !f.tags.is_empty() {
                    println!("    tags: {}", f.tags.join(", "));
                }
            }
        }
        Commands::Index { user_id } => {
            let manager = WorkspaceManager::from_config(&cfg).await?;
            let ws = manager.workspace(&user_id)?;
            let indexer = manager
                .indexer()
                .ok_or_else(|| anyhow::anyhow!("indexing is disabled in the config"))?;
            manager.ensure(&user_id).await?;
            let stats = indexer.index_folder(&ws.root).await?;
            println!("index {}", ws.root.display());
            println!("  scanned: {}", stats.scanned);
            println!("  updated: {}", stats.updated);
            println!("  unchanged: {}", stats.unchanged);
            println!("  removed: {}", stats.removed);
            indexer.shutdown().await;
        }
        Commands::EnvExample => {
            write_env_example(Path::new("."))?;
        }
    }

    Ok(())
}

fn write_env_example(dir: &Path) -> anyhow::Result<()> {
    if dir.join(".env").exists() {
        println!(".env already exists; nothing to do.");
        return Ok(());
    }
    let content = "# Anthropic API Key\nANTHROPIC_API_KEY=your_api_key_here\n\n# Server Port\nPORT=3001\n";
    std::fs::write(dir.join(".env.example"), content)?;
    println!("Created .env.example");
    Ok(())
}
