mod config;

use std::net::SocketAddr;
use std::sync::Arc;

use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::info;

use tidings_api::artifacts::{ArtifactStore, DiskArtifactStore};
use tidings_api::cloudinary::CloudinaryStore;
use tidings_api::{AppState, AppStateInner, Settings};
use tidings_crypto::CredentialHasher;
use tidings_db::Database;

use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tidings=debug,tower_http=debug".into()),
        )
        .init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("FATAL: {:#}", e);
            eprintln!("       Set it in your .env file and restart.");
            std::process::exit(1);
        }
    };

    // Init database
    let db = Database::open(&config.db_path)?;

    let artifacts: Arc<dyn ArtifactStore> = match &config.cloudinary {
        Some(c) => {
            info!("Video uploads go to Cloudinary cloud '{}'", c.cloud_name);
            Arc::new(CloudinaryStore::new(
                c.cloud_name.clone(),
                c.api_key.clone(),
                c.api_secret.clone(),
            ))
        }
        None => Arc::new(DiskArtifactStore::new(config.upload_dir.clone(), config.public_url.clone()).await?),
    };

    let state: AppState = Arc::new(AppStateInner {
        db,
        hasher: CredentialHasher::default(),
        artifacts,
        jwt_secret: config.jwt_secret.clone(),
        settings: Settings {
            frontend_url: config.frontend_url.clone(),
            login_token_ttl: config.login_token_ttl,
            share_token_ttl: config.share_token_ttl,
            session_ttl: config.session_ttl,
        },
    });

    let app = tidings_api::router(state)
        .nest_service("/uploads", ServeDir::new(&config.upload_dir))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("Tidings server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
                }
            }
            Err(e) => {
                tracing::warn!("No SIGTERM handler ({}), waiting for Ctrl+C", e);
                ctrl_c.await.ok();
            }
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
