use axum::{
    extract::{DefaultBodyLimit, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use ledger_core::validate::check_proof;
use ledger_core::{Block, BlockRejection, Chain, ChainRejection, LedgerError};
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::constants::MAX_BODY_BYTES;
use crate::relay::{PeerBlock, Relay};
use crate::store::NodeStore;

#[derive(Clone)]
pub struct AppState {
    pub chain: Chain<NodeStore>,
    pub relay: Relay,
}

#[derive(Serialize)]
struct Health {
    status: &'static str,
}

#[derive(Serialize, Deserialize)]
pub struct Length {
    pub length: usize,
}

#[derive(Deserialize)]
pub struct MineRequest {
    pub data: String,
}

#[derive(Serialize)]
struct Details {
    details: String,
}

pub enum ApiError {
    Ledger(LedgerError),
    NotFound(String),
    Internal(anyhow::Error),
}

impl From<LedgerError> for ApiError {
    fn from(e: LedgerError) -> Self {
        ApiError::Ledger(e)
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(e: tokio::task::JoinError) -> Self {
        ApiError::Internal(e.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, details) = match self {
            ApiError::Ledger(e @ LedgerError::Storage(_)) => {
                (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
            }
            ApiError::Ledger(e) => (StatusCode::BAD_REQUEST, e.to_string()),
            ApiError::NotFound(what) => (StatusCode::NOT_FOUND, what),
            ApiError::Internal(e) => {
                warn!(error = %format!("{e:#}"), "request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal error".to_string())
            }
        };
        (status, Json(Details { details })).into_response()
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { Json(Health { status: "ok" }) }))
        .route("/blocks", get(get_blocks).post(post_block))
        .route("/blocks/head", get(get_head))
        .route("/blocks/length", get(get_length))
        .route("/blocks/mine", post(mine_block))
        .route("/blocks/replace", post(replace_chain))
        .route("/blocks/{index}", get(get_block))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn get_blocks(State(state): State<AppState>) -> Json<Vec<Block>> {
    Json(state.chain.blocks().to_vec())
}

async fn get_head(State(state): State<AppState>) -> Json<Block> {
    Json(state.chain.head())
}

async fn get_length(State(state): State<AppState>) -> Json<Length> {
    Json(Length {
        length: state.chain.len(),
    })
}

async fn get_block(
    State(state): State<AppState>,
    Path(index): Path<usize>,
) -> Result<Json<Block>, ApiError> {
    state
        .chain
        .blocks()
        .get(index)
        .cloned()
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("no block at index {index}")))
}

/// Mining runs on the blocking pool so peers are still served meanwhile.
async fn mine_block(
    State(state): State<AppState>,
    Json(req): Json<MineRequest>,
) -> Result<Json<Block>, ApiError> {
    let chain = state.chain.clone();
    let block = tokio::task::spawn_blocking(move || chain.mine_next(req.data)).await??;
    state.relay.broadcast(&block);
    Ok(Json(block))
}

/// A block relayed by a peer. If it does not fit our head because the sender
/// is ahead of us or on a competing fork, and the sender is one of our peers,
/// try to catch up by adopting its whole chain.
async fn post_block(
    State(state): State<AppState>,
    Json(peer): Json<PeerBlock>,
) -> Result<Json<Block>, ApiError> {
    let head_index = state.chain.head().index();
    let index = peer.block.index();

    let reason = match state.chain.append(peer.block.clone()) {
        Ok(()) => {
            state.relay.broadcast(&peer.block);
            return Ok(Json(peer.block));
        }
        Err(LedgerError::InvalidBlock(reason)) => reason,
        Err(e) => return Err(e.into()),
    };

    let diverged = match reason {
        BlockRejection::Index { .. } => index > head_index.saturating_add(1),
        BlockRejection::PreviousHash => index == head_index.saturating_add(1),
        _ => false,
    };
    let origin = match peer.origin {
        Some(origin) if diverged && state.relay.is_peer(&origin) => origin,
        Some(origin) if diverged => {
            warn!(%origin, "ignoring catch-up request from unknown origin");
            return Err(LedgerError::InvalidBlock(reason).into());
        }
        _ => return Err(LedgerError::InvalidBlock(reason).into()),
    };
    // Do not fetch anything on behalf of a block nobody worked for.
    check_proof(&peer.block).map_err(LedgerError::InvalidBlock)?;

    info!(
        %origin,
        ours = head_index,
        theirs = index,
        %reason,
        "diverged from peer, requesting its chain"
    );
    let candidate = state
        .relay
        .fetch_chain(&origin)
        .await
        .map_err(ApiError::Internal)?;
    adopt(&state, candidate).await
}

async fn replace_chain(
    State(state): State<AppState>,
    Json(candidate): Json<Vec<Block>>,
) -> Result<Json<Block>, ApiError> {
    adopt(&state, candidate).await
}

/// Whole-chain validation is linear in the chain length, so keep it off the
/// async workers too. Answers with the adopted head, not whatever the head is
/// by the time the replacement returns.
async fn adopt(state: &AppState, candidate: Vec<Block>) -> Result<Json<Block>, ApiError> {
    let Some(head) = candidate.last().cloned() else {
        return Err(LedgerError::InvalidBlockChain(ChainRejection::Empty).into());
    };
    let chain = state.chain.clone();
    tokio::task::spawn_blocking(move || chain.replace(candidate)).await??;
    state.relay.broadcast(&head);
    Ok(Json(head))
}
