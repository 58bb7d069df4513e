//! Entrypoint to the swiftlite server: `init`, `reindex`, and `server`
//! subcommands over the embedded metadata store and filesystem blob
//! backend.

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};

use swiftlite::blob::Blob;
use swiftlite::config::Config;
use swiftlite::metadata::Store;
use swiftlite::{scheduler, web};

#[derive(Parser)]
#[command(version, about = "A lightweight, single-node, OpenStack Swift-compatible object storage server.")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create the database schema, if it does not already exist.
    Init,

    /// Rebuild every secondary index from the primary record trees.
    Reindex,

    /// Start the HTTP service.
    Server {
        /// Address to bind.
        #[arg(short, long, default_value = "0.0.0.0")]
        binding: String,

        /// Port to listen on.
        #[arg(short, long, default_value_t = 5000)]
        port: u16,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args = Args::parse();
    let config = Config::from_env();

    match args.command {
        Command::Init => match Store::open(&config.database_path) {
            Ok(_) => ExitCode::SUCCESS,
            Err(err) => {
                tracing::error!(error = %err, "could not initialize database");
                ExitCode::FAILURE
            }
        },
        Command::Reindex => match Store::reindex(&config.database_path) {
            Ok(()) => ExitCode::SUCCESS,
            Err(err) => {
                tracing::error!(error = %err, "could not reindex database");
                ExitCode::FAILURE
            }
        },
        Command::Server { binding, port } => {
            let runtime = match tokio::runtime::Runtime::new() {
                Ok(runtime) => runtime,
                Err(err) => {
                    tracing::error!(error = %err, "could not start tokio runtime");
                    return ExitCode::FAILURE;
                }
            };
            runtime.block_on(serve(config, binding, port))
        }
    }
}

async fn serve(config: Config, binding: String, port: u16) -> ExitCode {
    let store = match Store::open(&config.database_path) {
        Ok(store) => store,
        Err(err) => {
            tracing::error!(error = %err, "could not open database");
            return ExitCode::FAILURE;
        }
    };
    let blob = Blob::new(&config.storage_path);

    tokio::spawn(scheduler::run(store.clone(), blob.clone(), scheduler::DEFAULT_CADENCE));

    let state = web::AppState { store, blob, config: Arc::new(config) };
    let app = web::router(state);
    web::print_routes();

    let address = format!("{binding}:{port}");
    let listener = match tokio::net::TcpListener::bind(&address).await {
        Ok(listener) => listener,
        Err(err) => {
            tracing::error!(error = %err, address, "could not bind listener");
            return ExitCode::FAILURE;
        }
    };

    tracing::info!(address, "listening");

    let shutdown = async {
        let _ = tokio::signal::ctrl_c().await;
        tracing::info!("shutting down");
    };

    if let Err(err) = axum::serve(listener, app).with_graceful_shutdown(shutdown).await {
        tracing::error!(error = %err, "server error");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}
