mod api;
mod constants;
mod relay;
mod store;

use anyhow::Context;
use clap::Parser;
use ledger_core::{Chain, MemoryStore};
use ledger_storage::SledStore;
use std::{net::SocketAddr, sync::Arc};
use tracing::{info, Level};

use crate::api::{router, AppState};
use crate::relay::Relay;
use crate::store::NodeStore;

#[derive(Parser, Debug)]
struct Args {
    /// Address to listen on, e.g. 127.0.0.1:8080
    #[arg(long, default_value = "127.0.0.1:8080")]
    listen: String,

    /// Data directory for sled
    #[arg(long, default_value = "./data")]
    data_dir: String,

    /// Keep the chain in memory only; nothing survives a restart
    #[arg(long)]
    in_memory: bool,

    /// Base URL of a peer to relay new blocks to (repeatable)
    #[arg(long = "peer")]
    peers: Vec<String>,

    /// URL peers can reach this node at, sent along with relayed blocks
    #[arg(long)]
    public_url: Option<String>,
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for ctrl-c");
    }
    info!("shutting down");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(Level::DEBUG)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let store = if args.in_memory {
        NodeStore::Memory(MemoryStore::new())
    } else {
        NodeStore::Sled(SledStore::open(&args.data_dir)?)
    };
    let chain = Chain::open(Arc::new(store)).context("opening chain")?;
    info!(
        height = chain.head().index(),
        weight = %chain.accumulated_weight(),
        "chain ready"
    );

    let relay = Relay::new(args.peers, args.public_url)?;
    if !relay.peers().is_empty() {
        info!(peers = ?relay.peers(), "relaying to static peers");
    }

    let app = router(AppState { chain, relay });

    let addr: SocketAddr = args.listen.parse()?;
    info!("ledger-node listening on http://{addr}");
    axum::serve(tokio::net::TcpListener::bind(addr).await?, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}
