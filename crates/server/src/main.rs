use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use cinevault_ingest::pipeline::IngestionService;
use cinevault_ingest::watcher::IngestWatcher;
use cinevault_metadata::provider::MetadataProvider;
use cinevault_metadata::tmdb::TmdbClient;
use cinevault_scanner::probe::{FfprobeProbe, VideoProbe};
use cinevault_scanner::stability::StabilityGate;
use cinevault_server::state::{AppState, INGEST_DIR_NAMES};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    // Media root layout: films/ holds the organized library, the ingest
    // directories receive raw downloads.
    let media_root: PathBuf = std::env::var("CINEVAULT_MEDIA_ROOT")
        .unwrap_or_else(|_| "./media".to_string())
        .into();
    std::fs::create_dir_all(&media_root).context("failed to create media root")?;

    let movies_dir = media_root.join("films");
    std::fs::create_dir_all(&movies_dir).context("failed to create films dir")?;

    let watch_roots: Vec<PathBuf> = INGEST_DIR_NAMES
        .iter()
        .map(|d| media_root.join(d))
        .collect();
    for root in &watch_roots {
        std::fs::create_dir_all(root).context("failed to create ingest dir")?;
    }
    info!(media_root = %media_root.display(), "media root ready");

    // Metadata provider: optional, the organizer works without one
    let provider: Option<Arc<dyn MetadataProvider>> = match std::env::var("CINEVAULT_TMDB_KEY") {
        Ok(key) if !key.is_empty() => Some(Arc::new(TmdbClient::new(key))),
        _ => {
            warn!("CINEVAULT_TMDB_KEY not set, organizing without metadata lookups");
            None
        }
    };

    let ffprobe = std::env::var("CINEVAULT_FFPROBE").unwrap_or_else(|_| "ffprobe".to_string());
    let probe: Arc<dyn VideoProbe> = Arc::new(FfprobeProbe::new(ffprobe));

    let debounce_secs: u64 = std::env::var("CINEVAULT_WATCH_DEBOUNCE_SECS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(5);

    let service = Arc::new(IngestionService::new(
        &movies_dir,
        provider,
        StabilityGate::default(),
    ));
    let ingest = IngestWatcher::new(service, watch_roots, Duration::from_secs(debounce_secs));

    // Organize leftovers from previous runs, then watch for new drops
    ingest.sweep_existing().await;
    tokio::spawn(async move {
        if let Err(e) = ingest.run().await {
            error!(error = %e, "ingest watcher stopped");
        }
    });

    let app_state = AppState {
        media_root,
        probe: Some(probe),
    };
    let app = cinevault_server::routes::build_router(app_state);

    let bind_addr = std::env::var("CINEVAULT_BIND").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .context("failed to bind")?;
    info!(addr = %bind_addr, "server listening");

    axum::serve(listener, app).await?;
    Ok(())
}
