mod cli;

use crate::cli::{LogFormatArg, StorageBackendArg, CLI};
use anyhow::Context;
use clap::Parser;
use ferry_core::Repository;
use ferry_depot::{DepotConfig, DepotService};
use ferry_gateway::{spawn_pruner, App, AppState, RateLimitConfig, RateLimiter};
use ferry_generator::RandomGenerator;
use ferry_storage::{BlobStore, InMemoryRepository, SqliteRepository};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = CLI::parse();
    init_tracing(config.log_format);

    info!(
        listen_addr = %config.listen_addr,
        storage_backend = %config.storage,
        upload_dir = %config.upload_dir.display(),
        "starting ferry http server"
    );

    let depot_config = DepotConfig::builder()
        .ttl(DepotConfig::ttl_from_hours(config.ttl_hours)?)
        .sweep_interval(Duration::from_secs(config.sweep_interval_secs))
        .build();
    depot_config.validate()?;

    let blobs = BlobStore::open(&config.upload_dir)
        .await
        .with_context(|| format!("opening upload directory {}", config.upload_dir.display()))?;

    match config.storage {
        StorageBackendArg::InMemory => {
            run_server(&config, InMemoryRepository::new(), blobs, depot_config).await
        }
        StorageBackendArg::Sqlite => {
            let repository = SqliteRepository::connect(&config.sqlite_path)
                .await
                .with_context(|| format!("opening {}", config.sqlite_path.display()))?;
            run_server(&config, repository, blobs, depot_config).await
        }
    }
}

fn init_tracing(format: LogFormatArg) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    match format {
        LogFormatArg::Text => builder.init(),
        LogFormatArg::Json => builder.json().init(),
    }
}

async fn run_server<R: Repository>(
    config: &CLI,
    repository: R,
    blobs: BlobStore,
    depot_config: DepotConfig,
) -> anyhow::Result<()> {
    let sweep_interval = depot_config.sweep_interval;
    let depot = DepotService::new(repository, RandomGenerator::new(), blobs, depot_config);
    let shutdown = CancellationToken::new();

    let sweeper = depot.sweeper().spawn(sweep_interval, shutdown.clone());

    let rate_limit_window = Duration::from_secs(config.rate_limit_window_secs);
    let limiter = Arc::new(RateLimiter::new(
        RateLimitConfig::builder()
            .window(rate_limit_window)
            .max_requests(config.rate_limit_max_requests)
            .build(),
    ));
    let pruner = spawn_pruner(Arc::clone(&limiter), rate_limit_window, shutdown.clone());

    let mut state = AppState::new(Arc::new(depot.clone()), limiter, config.max_upload_bytes);
    if let Some(key) = &config.admin_key {
        state = state.with_admin_key(key.as_str());
    }

    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    info!(listen_addr = %listener.local_addr()?, "listening");

    axum::serve(
        listener,
        App::router(state).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    shutdown.cancel();
    for (task, handle) in [("sweeper", sweeper), ("rate limit pruner", pruner)] {
        if let Err(err) = handle.await {
            error!(task, error = %err, "background task failed");
        }
    }
    depot.drain_disposals().await;

    info!("ferry http server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                error!(error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => { info!("received SIGINT"); }
        () = terminate => { info!("received SIGTERM"); }
    }
}
