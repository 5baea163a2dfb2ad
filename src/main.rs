//! # Chat Knowledge CLI (`chat-knowledge`)
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `chat-knowledge serve` | Start the HTTP server (default) |
//! | `chat-knowledge init` | Create the database schema and exit |
//!
//! Configuration is read from `--config` (optional TOML) and then the
//! environment (`DATABASE_URL`, `DATABASE_NAME`, `PORT`, `HOST`). Log
//! verbosity follows `RUST_LOG`, defaulting to `info`.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use chat_knowledge::{config, db, server};

/// Chat Knowledge — store and search knowledge items over HTTP.
#[derive(Parser)]
#[command(name = "chat-knowledge", version, about)]
struct Cli {
    /// Optional path to a TOML configuration file.
    ///
    /// Environment variables override values read from the file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server.
    ///
    /// The server starts even when the database is unreachable; `GET /test`
    /// reports the connection state.
    Serve,

    /// Initialize the database schema.
    ///
    /// Idempotent. Requires `DATABASE_URL`.
    Init,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let cfg = config::load_config(cli.config.as_deref())?;

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
        Commands::Init => {
            db::init_database(&cfg.db).await?;
        }
    }

    Ok(())
}
