use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use herald_core::{config::HeraldConfig, Clock, Deliverer, SystemClock};
use herald_scheduler::SchedulerService;
use tracing::info;

mod app;
mod delivery;
mod http;

#[derive(Parser)]
#[command(name = "herald-gateway", about = "Delayed message scheduler gateway")]
struct Cli {
    /// Path to herald.toml (default: $HERALD_CONFIG, then ~/.herald/herald.toml)
    #[arg(long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "herald_gateway=info,tower_http=debug".into()),
        )
        .init();

    let cli = Cli::parse();
    let config_path = cli.config.or_else(|| std::env::var("HERALD_CONFIG").ok());
    let config = HeraldConfig::load(config_path.as_deref()).unwrap_or_else(|e| {
        tracing::warn!("Config load failed ({}), using defaults", e);
        HeraldConfig::default()
    });

    let bind = config.gateway.bind.clone();
    let port = config.gateway.port;

    // scheduling core: service facade + background dispatch loop
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let scheduler = Arc::new(SchedulerService::new(config.scheduler.clone(), clock));
    let deliverer: Arc<dyn Deliverer> = Arc::new(delivery::ConsoleDeliverer);
    scheduler.start(deliverer);
    info!(
        workers = config.scheduler.max_workers,
        misfire_threshold_secs = config.scheduler.misfire_threshold_secs,
        "scheduler started"
    );

    let state = Arc::new(app::AppState::new(config, Arc::clone(&scheduler)));
    let router = app::build_router(state);

    let addr: SocketAddr = format!("{}:{}", bind, port).parse()?;
    info!("Herald gateway listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // refuse further submissions and stop the dispatch loop
    scheduler.stop();
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutdown signal received");
}
