mod config;
mod error;
mod handlers;
mod renderers;
mod router;
mod state;
mod templates;

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use config::GatewayConfig;
use render_engine::config::DisplayConfig;
use render_engine::metrics::RenderMetrics;
use render_engine::source::MemorySource;
use renderers::Renderers;
use router::create_router;
use state::AppState;
use templates::Templates;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;
use types::events::Event;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let (config, from_file) = GatewayConfig::load_or_default()?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    tracing::info!(version = render_engine::SERVICE_VERSION, "Starting render gateway");
    if !from_file {
        tracing::warn!("No config file found, running with defaults");
    }

    let templates = Templates::load(&config).context("loading templates")?;
    let source = Arc::new(match &config.seed_events {
        Some(path) => MemorySource::with_events(load_events(path)?),
        None => MemorySource::with_defaults(),
    });
    let metrics = Arc::new(RenderMetrics::new());

    let renderers = Renderers::new(&config.renderer, &templates, source.clone(), metrics.clone());
    renderers.bootstrap();

    let cancel = CancellationToken::new();
    let observers = renderers.spawn_observers(&cancel);

    let displays = DisplayConfig::new(&config.renderer.displays);
    tracing::info!(displays = ?displays.all(), "Display nodes configured");

    let state = AppState::new(
        renderers,
        displays,
        templates,
        metrics,
        source,
        config.server.minify,
    );
    let app = create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    let listener = TcpListener::bind(addr).await?;

    tracing::info!("Listening on {}", addr);
    let shutdown = cancel.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => tracing::info!("Shutdown signal received"),
                _ = shutdown.cancelled() => {}
            }
        })
        .await?;

    cancel.cancel();
    for observer in observers {
        match observer.await {
            Ok(outcome) => tracing::debug!(?outcome, "Observer stopped"),
            Err(e) => tracing::warn!(error = %e, "Observer task failed"),
        }
    }
    tracing::info!("Render gateway stopped");

    Ok(())
}

fn load_events(path: &Path) -> anyhow::Result<Vec<Event>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading seed events {}", path.display()))?;
    let events: Vec<Event> = serde_json::from_str(&raw)
        .with_context(|| format!("parsing seed events {}", path.display()))?;
    tracing::info!(count = events.len(), "Seed events loaded");
    Ok(events)
}
