use std::{path::PathBuf, sync::Arc, time::Duration};

use clap::Parser;
use footprint_core::{
    buffer::{RetentionPolicy, DEFAULT_FLUSH_THRESHOLD, DEFAULT_MAX_EVENTS, MIN_RETENTION_DAYS},
    clock::SystemClock,
    engine::{Engine, EngineConfig, EngineHandle, DEFAULT_HISTORY_CAP},
    remote::{RemoteClient, DEFAULT_TIMEOUT_SECONDS},
    server::{parse_listen, router, shutdown_signal, AppState},
    store::SqliteStore,
};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "footprint_core", version)]
struct Args {
    /// Listen address.
    ///
    /// Accepts ip:port (e.g. 127.0.0.1:17700), ip (implies port 17700),
    /// or localhost[:port].
    #[arg(long, default_value = "127.0.0.1:17700")]
    listen: String,

    /// SQLite database path.
    #[arg(long, default_value = "./data/footprint.db")]
    db: PathBuf,

    /// Days of events to keep (clamped to 14..=90).
    #[arg(long, default_value_t = MIN_RETENTION_DAYS)]
    retention_days: i64,

    /// Upper bound on stored events; the oldest are dropped first.
    #[arg(long, default_value_t = DEFAULT_MAX_EVENTS)]
    max_events: usize,

    /// Buffered events that trigger an immediate flush.
    #[arg(long, default_value_t = DEFAULT_FLUSH_THRESHOLD)]
    flush_threshold: usize,

    #[arg(long, default_value_t = 25)]
    flush_interval_seconds: u64,

    /// Archived sessions to keep.
    #[arg(long, default_value_t = DEFAULT_HISTORY_CAP)]
    history_cap: usize,

    /// Base URL of the remote ingestion backend. Nothing is sent when unset.
    #[arg(long)]
    remote_url: Option<String>,

    #[arg(long, default_value = "local")]
    user_id: String,

    #[arg(long, default_value_t = DEFAULT_TIMEOUT_SECONDS)]
    remote_timeout_seconds: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "footprint_core=info,tower_http=info".into()),
        )
        .init();

    let args = Args::parse();
    let addr = parse_listen(&args.listen)?;

    let store = SqliteStore::open(&args.db)?;
    let remote = match args.remote_url.as_deref() {
        Some(url) => Some(RemoteClient::new(
            url,
            &args.user_id,
            Duration::from_secs(args.remote_timeout_seconds.max(1)),
        )?),
        None => None,
    };
    let config = EngineConfig {
        retention: RetentionPolicy::new(args.retention_days, args.max_events),
        flush_threshold: args.flush_threshold,
        flush_interval: Duration::from_secs(args.flush_interval_seconds.max(1)),
        history_cap: args.history_cap.max(1),
        ..EngineConfig::default()
    };
    let engine = Engine::new(config, Box::new(store), Arc::new(SystemClock), remote)?;
    let (handle, engine_task) = EngineHandle::spawn(engine);

    let app = router(AppState {
        engine: handle.clone(),
    });

    info!("Core listening on http://{addr}");
    info!("DB: {}", args.db.display());
    if let Some(url) = &args.remote_url {
        info!("Remote backend: {url}");
    }

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    handle.shutdown().await;
    engine_task.await?;
    Ok(())
}
