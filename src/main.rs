use anyhow::anyhow;
use clap::Parser;
use dotenvy::dotenv;
use smart_file_manager::config::Config;
use smart_file_manager::infrastructure::{database, storage};
use smart_file_manager::services::adapters::Adapters;
use smart_file_manager::services::metadata_store::MetadataStore;
use smart_file_manager::services::overflow::{
    MemoryOverflowQueue, OverflowQueue, RedisOverflowQueue,
};
use smart_file_manager::services::pipeline::Dispatcher;
use smart_file_manager::services::pump::OverflowPump;
use smart_file_manager::services::queue::JobQueue;
use smart_file_manager::services::worker::{WorkerPool, wait_for_shutdown};
use smart_file_manager::{AppState, create_app};
use std::env;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tokio::task::JoinError;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Port for the API server (overrides API_PORT)
    #[arg(short, long)]
    port: Option<u16>,

    /// Number of pipeline workers (overrides WORKER_COUNT)
    #[arg(short, long)]
    workers: Option<usize>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Environment & logging
    dotenv().ok();
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "smart_file_manager=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("🚀 Starting Smart File Manager...");

    let config = Config::from_lookup(|key| match key {
        "API_PORT" => args
            .port
            .map(|p| p.to_string())
            .or_else(|| env::var(key).ok()),
        "WORKER_COUNT" => args
            .workers
            .map(|w| w.to_string())
            .or_else(|| env::var(key).ok()),
        _ => env::var(key).ok(),
    })?;
    info!(
        "⚙️  Workers={}, Queue capacity={}, Pump every {:?}, Max retries={}",
        config.pipeline.worker_count,
        config.pipeline.queue_capacity,
        config.pipeline.pump_interval,
        config.pipeline.max_retries
    );
    if config.security.jwt_secret.is_none() {
        warn!("⚠️  JWT_SECRET not set: API authentication is disabled");
    }

    // 2. Infrastructure
    let db = database::setup_database(&config.database_url).await?;
    let store = MetadataStore::connect(db).await?;
    let object_store = storage::setup_storage(&config.object_store).await;

    let overflow: Arc<dyn OverflowQueue> = match config.redis_url.as_deref() {
        Some(url) => {
            let queue = RedisOverflowQueue::connect(url).await?;
            info!("🧰 Overflow queue: Redis");
            Arc::new(queue)
        }
        None => {
            warn!("⚠️  REDIS_URL not set: overflow queue is in memory and not durable");
            Arc::new(MemoryOverflowQueue::new())
        }
    };

    let adapters = Adapters::from_config(&config.models, object_store);
    let (queue, receiver) = JobQueue::new(
        config.pipeline.queue_capacity,
        overflow,
        config.pipeline.max_retries,
    );

    // 3. Background pipeline
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);

    let dispatcher = Arc::new(Dispatcher::new(
        store.clone(),
        queue.clone(),
        adapters.clone(),
    ));
    let workers = WorkerPool::spawn(
        config.pipeline.worker_count,
        receiver,
        dispatcher,
        shutdown_rx.clone(),
    );

    let pump = OverflowPump::new(queue.clone(), config.pipeline.pump_interval);
    let pump_handle = tokio::spawn(pump.run(shutdown_rx.clone()));

    // 4. HTTP surface
    let state = AppState {
        store,
        queue,
        adapters,
        security: config.security.clone(),
        started_at: chrono::Utc::now(),
    };

    let app = create_app(state).layer(
        TraceLayer::new_for_http()
            .make_span_with(|request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("unknown");
                tracing::info_span!(
                    "http_request",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = %request_id,
                )
            })
            .on_request(|request: &axum::http::Request<_>, _span: &tracing::Span| {
                info!("📥 {} {}", request.method(), request.uri());
            })
            .on_response(
                |response: &axum::http::Response<_>,
                 latency: std::time::Duration,
                 _span: &tracing::Span| {
                    info!(
                        "📤 Finished in {:?} with status {}",
                        latency,
                        response.status()
                    );
                },
            ),
    );

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("✅ Server ready at http://{}", addr);
    info!("📖 Swagger UI: http://{}/swagger-ui", addr);

    let mut server_shutdown = shutdown_rx.clone();
    let mut server = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move { wait_for_shutdown(&mut server_shutdown).await })
            .await
    });

    let mut failure = None;
    tokio::select! {
        _ = shutdown_signal() => {}
        result = &mut server => {
            let err = unexpected_exit(result);
            error!("{:#}", err);
            failure = Some(err);
        }
    }

    // 5. Graceful shutdown
    if shutdown_tx.send(true).is_err() {
        warn!("No background task was listening for shutdown");
    }
    if !server.is_finished()
        && tokio::time::timeout(config.shutdown_grace, &mut server)
            .await
            .is_err()
    {
        warn!(
            "⏱️  In-flight requests still running after {:?}; aborting",
            config.shutdown_grace
        );
        server.abort();
    }

    workers.join().await;
    if let Err(e) = pump_handle.await {
        error!("Overflow pump task failed: {}", e);
    }

    if let Some(err) = failure {
        return Err(err);
    }
    info!("🛑 Server shut down gracefully.");
    Ok(())
}

/// Error for a server task that ended without a shutdown request.
fn unexpected_exit(result: Result<std::io::Result<()>, JoinError>) -> anyhow::Error {
    match result {
        Ok(Ok(())) => anyhow!("HTTP server stopped unexpectedly"),
        Ok(Err(e)) => anyhow!("HTTP server failed: {}", e),
        Err(e) => anyhow!("HTTP server task ended abnormally: {}", e),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("⌨️  Ctrl+C received, starting graceful shutdown...");
        },
        _ = terminate => {
            info!("💤 SIGTERM received, starting graceful shutdown...");
        },
    }
}
