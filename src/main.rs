#![forbid(unsafe_code)]
use anyhow::{Context, Result};
use clap::Parser;
use pv3_collector::bus::FanoutRegistry;
use pv3_collector::config::{self, CollectorMode, load_configuration};
use pv3_collector::delivery::{HttpSink, MetricSink, StorageSink};
use pv3_collector::http::server::run_http_server;
use pv3_collector::http::state::HttpServerState;
use pv3_collector::ingestors::mqtt::spawn_collector;
use pv3_collector::pipeline::Collector;
use pv3_collector::storage::StorageInstance;
use pv3_collector::storage::storage_factory::create_storage_from_connection_string;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{Level, event, info};

/// PV3 telemetry collector
#[derive(Parser, Debug)]
#[command(name = "pv3-collector")]
#[command(version)]
struct Cli {
    /// Delivery mode, `standalone` or `in-process`. Overrides PV3_MODE.
    #[arg(long)]
    mode: Option<String>,

    /// Run the collector without the live-update HTTP server
    #[arg(long)]
    no_http: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to create Tokio runtime")?;

    runtime.block_on(async_main(cli))
}

async fn async_main(cli: Cli) -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=info".into()),
        )
        .init();

    load_configuration().context("Failed to load configuration")?;
    let config = config::get().context("Failed to get configuration")?;

    let _sentry = config.sentry_dsn.as_ref().map(|dsn| {
        sentry::init((
            dsn.clone(),
            sentry::ClientOptions {
                release: sentry::release_name!(),
                ..Default::default()
            },
        ))
    });

    let mode = match cli.mode.as_deref() {
        Some(mode) => mode.parse::<CollectorMode>()?,
        None => config.collector_mode()?,
    };

    let (sink, storage): (Arc<dyn MetricSink>, Option<Arc<dyn StorageInstance>>) = match mode {
        CollectorMode::Standalone => {
            info!(api_url = %config.api_url, "Delivering batches over HTTP");
            let sink = HttpSink::new(
                &config.api_url,
                Duration::from_secs(config.delivery_timeout_seconds),
            )?;
            (Arc::new(sink), None)
        }
        CollectorMode::InProcess => {
            info!(
                connection_string = %config.storage_connection_string,
                "Connecting to storage"
            );
            let storage = create_storage_from_connection_string(&config.storage_connection_string)
                .await
                .context("Failed to create storage backend")?;
            storage
                .create_or_migrate()
                .await
                .context("Failed to create or migrate database schema")?;
            (Arc::new(StorageSink::new(storage.clone())), Some(storage))
        }
    };

    let fanout = Arc::new(FanoutRegistry::new());
    let collector = Collector::new(config.collector_config(), fanout.clone());
    let handle = spawn_collector(&config.mqtt, collector, sink, config.backoff()?);
    info!(
        device_id = %config.device_id,
        broker = %config.mqtt.address(),
        %mode,
        "Collector started"
    );

    let shutdown = CancellationToken::new();
    let ctrl_c_token = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown requested");
        }
        ctrl_c_token.cancel();
    });

    let server_result = if cli.no_http {
        shutdown.cancelled().await;
        Ok(())
    } else {
        let address = SocketAddr::from((config.endpoint, config.port));
        let mut state = HttpServerState::new("PV3 Collector", fanout);
        state.storage = storage;
        state.collector_status = Some(handle.status());
        state.ws_heartbeat = Duration::from_secs(config.ws_heartbeat_seconds);
        state.observer_buffer = config.observer_buffer;

        info!(%address, "Starting HTTP server");
        run_http_server(state, address, shutdown.clone()).await
    };
    // The server may also stop on its own, e.g. when the port is taken.
    shutdown.cancel();

    let status = handle.stop().await?;
    event!(
        Level::INFO,
        messages_received = status.counters.messages_received,
        flushes = status.counters.flushes,
        "Collector stopped"
    );

    if let Err(err) = server_result {
        event!(Level::ERROR, "HTTP server failed: {}", err);
        return Err(err);
    }
    Ok(())
}
