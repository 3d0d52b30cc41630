use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};

use contas::config::{Config, DatabaseConfig};
use contas::db::connect_with_retry;
use contas::web::{AppState, start_server};

#[derive(Parser)]
#[command(name = "contas", version, about = "Bills and installments HTTP service")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP API (default).
    Serve {
        /// Override HTTP_PORT.
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Apply database migrations and exit.
    Migrate {
        /// Migrate this local libSQL file instead of the configured backend.
        #[arg(long)]
        libsql_path: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let mut config = Config::from_env().context("invalid configuration")?;
    contas::init_tracing(&config.logging);
    tracing::info!("contas v{}", env!("CARGO_PKG_VERSION"));

    match cli.command.unwrap_or(Command::Serve { port: None }) {
        Command::Serve { port } => {
            if let Some(port) = port {
                config.server.port = port;
            }
            serve(config).await
        }
        Command::Migrate { libsql_path } => {
            let database = match libsql_path {
                Some(path) => DatabaseConfig::libsql(path),
                None => config.database,
            };
            connect_with_retry(&database)
                .await
                .context("database migration failed")?;
            tracing::info!(backend = database.backend.as_str(), "migrations complete");
            Ok(())
        }
    }
}

async fn serve(config: Config) -> anyhow::Result<()> {
    let store = connect_with_retry(&config.database)
        .await
        .context("database unavailable")?;

    let state = AppState::new(store, config.server.cors.clone());
    let addr = start_server(config.server.addr(), Arc::clone(&state)).await?;
    tracing::info!(%addr, "contas is ready");

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    tracing::info!("received ctrl-c");
    state.shutdown().await;
    Ok(())
}
