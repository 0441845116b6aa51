use anyhow::{bail, Context, Result};
use ledger_core::Block;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use crate::constants::{MAX_BODY_BYTES, RELAY_TIMEOUT_SECS};

/// Body of `POST /blocks`: a block plus where the sender can be reached for a
/// full chain if the receiver turns out to be behind.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeerBlock {
    pub block: Block,
    #[serde(default)]
    pub origin: Option<String>,
}

/// Pushes new heads to a fixed list of peers over their HTTP API.
#[derive(Clone)]
pub struct Relay {
    client: reqwest::Client,
    peers: Vec<String>,
    public_url: Option<String>,
    max_chain_bytes: usize,
}

impl Relay {
    pub fn new(peers: Vec<String>, public_url: Option<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(RELAY_TIMEOUT_SECS))
            .build()?;
        let peers = peers
            .into_iter()
            .map(|p| p.trim_end_matches('/').to_string())
            .collect();
        Ok(Self {
            client,
            peers,
            public_url,
            max_chain_bytes: MAX_BODY_BYTES,
        })
    }

    #[cfg(test)]
    pub fn with_max_chain_bytes(mut self, limit: usize) -> Self {
        self.max_chain_bytes = limit;
        self
    }

    pub fn peers(&self) -> &[String] {
        &self.peers
    }

    /// Only configured peers are ever asked for a chain, whatever a relayed
    /// block claims as its origin.
    pub fn is_peer(&self, origin: &str) -> bool {
        let origin = origin.trim_end_matches('/');
        self.peers.iter().any(|p| p == origin)
    }

    /// Fire-and-forget: each peer gets its own task and failures are only logged.
    pub fn broadcast(&self, block: &Block) {
        let body = PeerBlock {
            block: block.clone(),
            origin: self.public_url.clone(),
        };
        for peer in &self.peers {
            let client = self.client.clone();
            let url = format!("{peer}/blocks");
            let body = body.clone();
            tokio::spawn(async move {
                match client.post(&url).json(&body).send().await {
                    Ok(res) if res.status().is_success() => {
                        debug!(%url, index = body.block.index(), "relayed block")
                    }
                    Ok(res) => warn!(%url, status = %res.status(), "peer refused relayed block"),
                    Err(e) => warn!(%url, error = %e, "failed to relay block"),
                }
            });
        }
    }

    /// Download a configured peer's whole chain, refusing bodies larger than
    /// the node itself would accept.
    pub async fn fetch_chain(&self, origin: &str) -> Result<Vec<Block>> {
        if !self.is_peer(origin) {
            bail!("{origin} is not a configured peer");
        }
        let url = format!("{}/blocks", origin.trim_end_matches('/'));
        let mut res = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("requesting {url}"))?
            .error_for_status()?;

        let limit = self.max_chain_bytes;
        if res.content_length().is_some_and(|len| len > limit as u64) {
            bail!("chain from {url} exceeds {limit} bytes");
        }
        let mut body = Vec::new();
        while let Some(chunk) = res
            .chunk()
            .await
            .with_context(|| format!("reading chain from {url}"))?
        {
            if body.len() + chunk.len() > limit {
                bail!("chain from {url} exceeds {limit} bytes");
            }
            body.extend_from_slice(&chunk);
        }
        let blocks = serde_json::from_slice(&body)
            .with_context(|| format!("decoding chain from {url}"))?;
        Ok(blocks)
    }
}
