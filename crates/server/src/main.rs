mod api;
mod config;
mod covers;
mod listing;
mod range;
mod state;
mod streaming;
mod thumbnail;
mod utils;

use std::sync::Arc;

use api::app_router;
use catalog::Catalog;
use config::{config_path_from_env, load_or_create_config, resolve_path};
use covers::{CoverCache, CoverResolver};
use listing::TrackPipeline;
use metadata::{LoftyTagReader, TagReader};
use state::AppState;
use thumbnail::JpegThumbnailer;
use tower_http::request_id::{MakeRequestUuid, SetRequestIdLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info".into());
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config_path = config_path_from_env();
    let (config, created) = load_or_create_config(&config_path)?;
    if created {
        info!("Created default config at {:?}", config_path);
    } else {
        info!("Loaded config from {:?}", config_path);
    }

    let music_root = resolve_path(&config_path, &config.music_root);
    if !music_root.is_dir() {
        warn!("Music directory {:?} is missing; listings will fail until it exists", music_root);
    }
    let catalog = Catalog::new(music_root);
    info!("Serving catalog from {:?}", catalog.root());

    let cover_cache = CoverCache::init(resolve_path(&config_path, &config.cover_cache_path))?;
    info!("Cover cache at {:?}", cover_cache.dir());

    let tags: Arc<dyn TagReader> = Arc::new(LoftyTagReader);
    let encoder = Arc::new(JpegThumbnailer::new(config.cover_size, config.cover_quality));
    let covers = CoverResolver::new(
        cover_cache,
        Arc::clone(&tags),
        encoder,
        config.fallback_cover_url.clone(),
        config.cover_timeout(),
    );
    let concurrency = config.resolve_concurrency();
    info!("Resolving up to {} tracks at a time per listing", concurrency);

    let state = AppState {
        catalog,
        tracks: TrackPipeline::new(tags, covers, concurrency),
        public_root: Arc::new(resolve_path(&config_path, &config.public_path)),
    };

    let app = app_router(state)
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(TraceLayer::new_for_http());

    let bind_addr = config.listen_addr();
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("Listening on {}", bind_addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut term = match signal(SignalKind::terminate()) {
            Ok(signal) => signal,
            Err(err) => {
                warn!("Failed to install terminate signal handler: {}", err);
                return;
            }
        };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {},
            _ = term.recv() => {},
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for ctrl-c: {}", err);
        }
    }

    info!("Shutdown signal received.");
}
