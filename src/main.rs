//! pdf-extractor server binary.

use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;
use tracing::{info, warn};

use pdf_extractor::config::{Cli, Config, ServerConfig};
use pdf_extractor::server::api::{build_router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env file is fine.
    let dotenv = dotenvy::dotenv();

    let cli = Cli::parse();
    init_tracing(&cli);

    info!("pdf-extractor v{}", env!("CARGO_PKG_VERSION"));
    if let Ok(path) = dotenv {
        info!(path = %path.display(), "Loaded environment file");
    }

    let mut config = Config::from_env();
    config.server = ServerConfig::from(&cli);

    info!(
        genai_model = %config.genai.model,
        vertex_model = %config.vertex.model,
        location = %config.vertex.location,
        auth_location = %config.vertex.auth_location,
        bucket = %config.storage.bucket,
        max_upload_bytes = config.server.max_upload_bytes,
        "Configuration loaded"
    );
    if config.genai.api_key.is_none() {
        warn!("GOOGLE_CLOUD_API_KEY is not set; /v1/extract will fail");
    }
    if config.vertex.project_id.is_none() {
        warn!("PROJECT_ID is not set; Vertex AI endpoints will fail");
    }

    let state = Arc::new(AppState::from_config(config)?);
    let listen_addr = state.config.server.listen.clone();
    let app = build_router(state);

    info!(addr = %listen_addr, "Starting server");
    let listener = TcpListener::bind(&listen_addr).await?;
    info!("Listening on {listen_addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

fn init_tracing(cli: &Cli) {
    let filter = if cli.verbose {
        "pdf_extractor=debug,tower_http=debug"
    } else {
        "pdf_extractor=info,tower_http=info"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| filter.into());

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);
    if cli.log_json {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}
