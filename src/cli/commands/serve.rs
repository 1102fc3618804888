use anyhow::Context;
use clap::Args;
use tracing::{info, warn};

use super::{open_store, StoreArgs};
use crate::api::{router, AppState};
use crate::config;
use crate::is_development;

#[derive(Args, Debug)]
pub struct ServeArgs {
    #[arg(long, help = "Port to listen on (defaults to API_PORT or 3000)")]
    pub port: Option<u16>,

    #[command(flatten)]
    pub store: StoreArgs,
}

pub async fn handle(args: ServeArgs) -> anyhow::Result<()> {
    let config = config::config();
    info!("Starting Disclosure API in {:?} mode", config.environment);
    if is_development!() {
        warn!("Development mode: tokens are signed with the built-in development secret unless JWT_SECRET is set");
    }

    let store = open_store(&args.store, config).await?;
    let app = router(AppState::new(store, config));

    let port = args.port.unwrap_or(config.api.port);
    let bind_addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;

    info!("Listening on http://{}", bind_addr);
    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
