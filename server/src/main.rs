use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use server::config::USAGE;
use server::{FsStore, ServerArgs, ServerConfig};

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt::init();

    let args = match ServerArgs::try_parse() {
        Ok(args) => args,
        Err(e) if e.use_stderr() => {
            eprintln!("{USAGE}");
            return ExitCode::FAILURE;
        }
        Err(e) => {
            // --help / --version
            let _ = e.print();
            return ExitCode::SUCCESS;
        }
    };

    let config = match ServerConfig::from_args(args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{USAGE}");
            eprintln!("Error: {e}");
            return ExitCode::FAILURE;
        }
    };

    let listener = match tokio::net::TcpListener::bind((config.bind_addr, config.port)).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(error = %e, port = config.port, "failed to bind");
            return ExitCode::FAILURE;
        }
    };

    let store = Arc::new(FsStore::new(config.data_dir.clone()));
    tracing::info!(port = config.port, data_dir = %config.data_dir.display(), "chunk server listening");

    match server::serve(listener, store, config.max_request_bytes, shutdown_signal()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "server failed");
            ExitCode::FAILURE
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "ctrl-c handler unavailable; running until killed");
        std::future::pending::<()>().await;
    }
}
