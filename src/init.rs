use std::{collections::HashMap, net::SocketAddr, path::Path, sync::Arc};

use anyhow::Context;
use tokio::{net::TcpListener, signal};

use crate::{
    config::{BackendKind, Config},
    discord::DiscordClient,
    gate::GuildAccessGate,
    models::quote::Quote,
    routes,
    store::{ListBackend, MemoryBackend, QuoteStore, RedisBackend},
};

async fn init_store(config: &Config) -> anyhow::Result<QuoteStore> {
    let backend: Arc<dyn ListBackend> = match config.backend {
        BackendKind::Redis => {
            tracing::info!(addr = %config.redis_addr, db = config.redis_db, "connecting to redis...");

            let backend = RedisBackend::connect(&config.redis_url()).await.inspect_err(
                |e| tracing::error!(err = ?e, "an error occurred when connecting to redis"),
            )?;

            Arc::new(backend)
        }
        BackendKind::Memory => {
            tracing::warn!("using the in-memory backend, quotes will not outlive the process");
            Arc::new(MemoryBackend::new())
        }
    };

    Ok(QuoteStore::new(backend))
}

async fn import_snapshot(store: &QuoteStore, path: &Path) -> anyhow::Result<()> {
    tracing::info!(path = %path.display(), "importing quotes...");

    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("reading snapshot {}", path.display()))?;
    let data: HashMap<String, Vec<Quote>> = serde_json::from_slice(&bytes)
        .with_context(|| format!("parsing snapshot {}", path.display()))?;

    let partitions = data.len();
    store.import(data).await?;

    tracing::info!(partitions, "finished importing quotes!");
    Ok(())
}

async fn export_snapshot(store: &QuoteStore, path: &Path) -> anyhow::Result<()> {
    tracing::info!(path = %path.display(), "exporting quotes...");

    let data = store.export().await?;
    let bytes = serde_json::to_vec_pretty(&data)?;

    tokio::fs::write(path, bytes)
        .await
        .with_context(|| format!("writing snapshot {}", path.display()))?;

    tracing::info!(partitions = data.len(), "finished exporting quotes!");
    Ok(())
}

fn init_access(config: &Config) -> anyhow::Result<GuildAccessGate> {
    tracing::info!(api = %config.discord_api, "initializing discord client...");

    let discord = DiscordClient::new(&config.discord_api, config.verify_timeout)?;

    if !config.verify_cache_ttl.is_zero() {
        tracing::info!(ttl = ?config.verify_cache_ttl, "caching successful guild checks");
    }

    Ok(GuildAccessGate::new(Arc::new(discord), config.verify_timeout)
        .with_cache_ttl(config.verify_cache_ttl))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => tracing::info!("received ctrl+c, shutting down"),
            Err(e) => {
                tracing::error!(err = ?e, "an error occurred when listening for ctrl+c");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut terminate) => {
                terminate.recv().await;
                tracing::info!("received terminate signal, shutting down");
            }
            Err(e) => {
                tracing::error!(err = ?e, "an error occurred when installing signal handler");
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
}

pub async fn init(config: Config) -> anyhow::Result<()> {
    tracing::info!("initializing... please wait warmly.");

    let store = init_store(&config).await?;

    if let Some(path) = &config.import_path {
        import_snapshot(&store, path).await?;
    }

    let access = init_access(&config)?;
    let app = routes::router(store.clone(), access);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;

    tracing::info!(%addr, "finished initializing! listening.");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("server stopped");

    if let Some(path) = &config.export_path {
        export_snapshot(&store, path).await?;
    }

    Ok(())
}
