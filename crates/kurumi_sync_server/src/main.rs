use std::process::ExitCode;

use kurumi_sync_server::{app, config::Config};
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_FILTER: &str = "kurumi_sync_server=debug,tower_http=debug";

#[tokio::main]
async fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_FILTER.into());
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match serve(config).await {
        Ok(()) => {
            info!("Stopped");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

/// Prepare the object directory, bind and serve until a stop signal.
async fn serve(config: Config) -> Result<(), String> {
    std::fs::create_dir_all(&config.data_dir)
        .map_err(|e| format!("Cannot create {}: {}", config.data_dir.display(), e))?;

    let addr = config.server_addr();
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| format!("Cannot listen on {}: {}", addr, e))?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        data_dir = %config.data_dir.display(),
        "Kurumi sync server listening on http://{}",
        addr
    );

    axum::serve(listener, app(&config))
        .with_graceful_shutdown(stop_requested())
        .await
        .map_err(|e| format!("Server error: {}", e))
}

/// Resolves on Ctrl+C, or SIGTERM on unix.
async fn stop_requested() {
    #[cfg(unix)]
    let sigterm = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("SIGTERM handler unavailable: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let sigterm = std::future::pending::<()>();

    let interrupt = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Ctrl+C handler unavailable: {}", e);
            std::future::pending::<()>().await;
        }
    };

    tokio::select! {
        _ = interrupt => {}
        _ = sigterm => {}
    }

    info!("Stop requested, draining connections");
}
