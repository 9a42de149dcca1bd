//! dapp-bridge: hosts an embedded dapp's JSON-RPC traffic between the dapp,
//! the wallet's signing gateway and the chain's node.

use eyre::{eyre, WrapErr};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use dapp_bridge_adapters::{
    parse_launch_query, AdapterConfig, ChannelDocument, FileStore, MemoryStore, NodeRelay,
    SigningGatewayAdapter, SystemClock,
};
use dapp_bridge_core::{Bridge, BridgeHandle, PersistencePort, PortError};

mod host;

const LAUNCH_QUERY_ENV: &str = "DAPP_BRIDGE_LAUNCH_QUERY";
const HOST_SCOPE: &str = "dapp-bridge";

#[tokio::main]
async fn main() -> eyre::Result<()> {
    // stdout carries the document channel
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let query = std::env::args()
        .nth(1)
        .or_else(|| std::env::var(LAUNCH_QUERY_ENV).ok())
        .ok_or_else(|| eyre!("usage: dapp-bridge <launch query> (or set {LAUNCH_QUERY_ENV})"))?;
    let launch = parse_launch_query(&query).wrap_err("invalid launch query")?;
    let config = AdapterConfig::from_env();

    tracing::info!(
        dapp = %launch.dapp_name,
        url = %launch.dapp_url,
        networks = launch.networks.len(),
        profile = ?config.runtime_profile,
        "Starting dapp-bridge"
    );

    let (document, mut outbox) = ChannelDocument::new();
    let relay = NodeRelay::with_config(&config)?;
    let (bridge, handle) = Bridge::new(
        &launch,
        config.bridge_config(),
        SigningGatewayAdapter::with_config(config.clone()),
        HostStore::from_config(&config),
        document,
        relay,
        SystemClock,
    )?;
    let bridge_task = tokio::spawn(bridge.run());

    let writer = tokio::spawn(async move {
        let mut stdout = tokio::io::stdout();
        while let Some(posted) = outbox.recv().await {
            let mut line = host::render_output(&posted)?;
            line.push('\n');
            stdout.write_all(line.as_bytes()).await?;
            stdout.flush().await?;
        }
        Ok::<_, eyre::Report>(())
    });

    let status_log = tokio::spawn(watch_status(handle.clone()));

    read_host_input(&handle).await?;
    handle.shutdown();
    drop(handle);

    bridge_task.await.wrap_err("bridge task failed")?;
    status_log.abort();
    writer.await.wrap_err("writer task failed")??;
    Ok(())
}

async fn read_host_input(handle: &BridgeHandle) -> eyre::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let input = match host::parse_line(&line) {
            Ok(Some(input)) => input,
            Ok(None) => continue,
            Err(e) => {
                tracing::warn!(error = %e, "ignoring malformed host input");
                continue;
            }
        };
        if host::dispatch(handle, input).is_break() {
            break;
        }
    }
    Ok(())
}

async fn watch_status(handle: BridgeHandle) {
    let mut status = handle.subscribe();
    drop(handle);
    while status.changed().await.is_ok() {
        let snapshot = status.borrow_and_update().clone();
        host::log_status(&snapshot);
    }
}

/// File-backed when a storage path is configured, in memory otherwise.
enum HostStore {
    File(FileStore),
    Memory(MemoryStore),
}

impl HostStore {
    fn from_config(config: &AdapterConfig) -> Self {
        match &config.storage_path {
            Some(path) => Self::File(FileStore::new(path, HOST_SCOPE)),
            None => Self::Memory(MemoryStore::default()),
        }
    }
}

impl PersistencePort for HostStore {
    fn read(&self, key: &str) -> Result<Option<String>, PortError> {
        match self {
            Self::File(store) => store.read(key),
            Self::Memory(store) => store.read(key),
        }
    }

    fn write(&self, key: &str, value: &str) -> Result<(), PortError> {
        match self {
            Self::File(store) => store.write(key, value),
            Self::Memory(store) => store.write(key, value),
        }
    }
}
