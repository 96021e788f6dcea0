use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use huddle_backend_lib::{
    auth::{IdentityVerifier, JwtVerifier},
    config::Settings,
    storage::FlatFileStore,
    ws_router, AppState,
};

#[derive(Parser, Debug)]
#[command(name = "huddle-backend", about = "Real-time meeting coordination server")]
struct Cli {
    /// Path to the configuration file
    #[arg(long, default_value = "config.toml")]
    config: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = Settings::load_from(&cli.config)?;

    // RUST_LOG wins when set; the configured level is the fallback.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(settings.log_level.clone())),
        )
        .init();

    let store = FlatFileStore::new(&settings.data_dir)?;
    let verifier: Arc<dyn IdentityVerifier> = Arc::new(JwtVerifier::new(&settings.jwt_secret));
    let state = Arc::new(AppState::new(store, verifier));

    let app = ws_router::create_router(state);

    let listener = TcpListener::bind(settings.bind_addr).await?;
    tracing::info!(addr = %settings.bind_addr, "listening");

    axum::serve(listener, app).await?;

    Ok(())
}
