//! Consensus rules for single blocks and whole chains.
//!
//! Every rule has a `check_*` form that names the first failure and an
//! `is_valid_*` predicate on top of it. `now` is always passed in so callers
//! decide which clock a decision is made against.

use crate::constants::TIMESTAMP_TOLERANCE;
use crate::difficulty::satisfies_difficulty;
use crate::error::{BlockRejection, ChainRejection};
use crate::hash::digest;
use crate::Block;

pub fn is_valid_structure(block: &Block) -> bool {
    block.is_valid_structure()
}

/// Rejects a block more than the tolerance older than its parent, or more than
/// the tolerance ahead of `now`.
pub fn is_valid_timestamp(new_block: &Block, previous_block: &Block, now: u64) -> bool {
    let ts = new_block.timestamp();
    let not_too_old = ts.saturating_add(TIMESTAMP_TOLERANCE) > previous_block.timestamp();
    let not_too_new = ts < now.saturating_add(TIMESTAMP_TOLERANCE);
    not_too_old && not_too_new
}

pub fn check_new_block(
    new_block: &Block,
    previous_block: &Block,
    now: u64,
) -> Result<(), BlockRejection> {
    if !is_valid_structure(new_block) {
        return Err(BlockRejection::Structure);
    }
    if previous_block.index().checked_add(1) != Some(new_block.index()) {
        return Err(BlockRejection::Index {
            expected_prev: previous_block.index(),
            got: new_block.index(),
        });
    }
    if !is_valid_timestamp(new_block, previous_block, now) {
        return Err(BlockRejection::Timestamp {
            timestamp: new_block.timestamp(),
            parent: previous_block.timestamp(),
            now,
        });
    }
    if new_block.previous_hash() != Some(previous_block.hash()) {
        return Err(BlockRejection::PreviousHash);
    }
    check_proof(new_block)
}

/// Checks that need no parent: the hash commits to the contents and meets
/// the block's own difficulty.
pub fn check_proof(block: &Block) -> Result<(), BlockRejection> {
    if block.hash() != digest(&block.hash_payload()) {
        return Err(BlockRejection::Hash);
    }
    if !satisfies_difficulty(block.hash(), block.difficulty()) {
        return Err(BlockRejection::ProofOfWork(block.difficulty()));
    }
    Ok(())
}

pub fn is_valid_new_block(new_block: &Block, previous_block: &Block, now: u64) -> bool {
    check_new_block(new_block, previous_block, now).is_ok()
}

/// Full-chain check: exact genesis, then every link in order.
pub fn check_chain(chain: &[Block], now: u64) -> Result<(), ChainRejection> {
    let first = chain.first().ok_or(ChainRejection::Empty)?;
    if first != Block::genesis() {
        return Err(ChainRejection::Genesis);
    }
    for (i, pair) in chain.windows(2).enumerate() {
        check_new_block(&pair[1], &pair[0], now).map_err(|reason| ChainRejection::Block {
            index: i + 1,
            reason,
        })?;
    }
    Ok(())
}

pub fn is_valid_chain(chain: &[Block], now: u64) -> bool {
    check_chain(chain, now).is_ok()
}
