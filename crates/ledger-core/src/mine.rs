use rayon::prelude::*;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;

use crate::difficulty::satisfies_difficulty;
use crate::hash::{digest, HashPayload};
use crate::Block;

/// How often the sequential search polls its cancel token.
const CANCEL_POLL_INTERVAL: u64 = 1 << 12;

/// Everything about the next block except the nonce.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockTemplate {
    pub index: u64,
    pub previous_hash: Option<String>,
    pub timestamp: u64,
    pub data: String,
    pub difficulty: u32,
}

impl BlockTemplate {
    fn payload(&self, nonce: u64) -> HashPayload<'_> {
        HashPayload {
            index: self.index,
            previous_hash: self.previous_hash.as_deref(),
            timestamp: self.timestamp,
            data: &self.data,
            difficulty: self.difficulty,
            nonce,
        }
    }

    /// Hash for `nonce` if it meets the template's difficulty.
    fn try_nonce(&self, nonce: u64) -> Option<String> {
        let hash = digest(&self.payload(nonce));
        satisfies_difficulty(&hash, self.difficulty).then_some(hash)
    }

    fn seal(self, nonce: u64, hash: String) -> Block {
        info!(
            index = self.index,
            nonce,
            difficulty = self.difficulty,
            %hash,
            "mined block"
        );
        Block::from_parts(
            self.index,
            self.previous_hash,
            self.timestamp,
            self.data,
            self.difficulty,
            nonce,
            hash,
        )
    }
}

/// Shared flag telling an in-flight nonce search to give up.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Try nonces 0, 1, 2, ... until the hash meets the template's difficulty.
/// Unbounded; returns the first qualifying nonce.
pub fn mine(template: BlockTemplate) -> Block {
    let mut nonce = 0u64;
    loop {
        if let Some(hash) = template.try_nonce(nonce) {
            return template.seal(nonce, hash);
        }
        nonce = nonce.wrapping_add(1);
    }
}

/// Sequential search that stops with `None` once `cancel` fires.
pub fn mine_cancellable(template: BlockTemplate, cancel: &CancelToken) -> Option<Block> {
    let mut nonce = 0u64;
    loop {
        if nonce % CANCEL_POLL_INTERVAL == 0 && cancel.is_cancelled() {
            return None;
        }
        if let Some(hash) = template.try_nonce(nonce) {
            return Some(template.seal(nonce, hash));
        }
        nonce = nonce.wrapping_add(1);
    }
}

/// Search the nonce space across the rayon pool.
///
/// Returns the lowest qualifying nonce, so the result is the same block
/// [`mine`] would produce. Returns `None` if cancelled before a lower nonce
/// was settled.
pub fn mine_parallel(template: BlockTemplate, cancel: &CancelToken) -> Option<Block> {
    let found = (0u64..u64::MAX)
        .into_par_iter()
        .find_map_first(|nonce| {
            if cancel.is_cancelled() {
                return Some(None);
            }
            template.try_nonce(nonce).map(|hash| Some((nonce, hash)))
        })
        .flatten();

    let (nonce, hash) = found?;
    Some(template.seal(nonce, hash))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::digest;

    fn template(difficulty: u32) -> BlockTemplate {
        BlockTemplate {
            index: 1,
            previous_hash: Some(Block::genesis().hash().to_string()),
            timestamp: 1_652_722_600,
            data: "hello".into(),
            difficulty,
        }
    }

    #[test]
    fn difficulty_zero_takes_first_nonce() {
        let block = mine(template(0));
        assert_eq!(block.nonce(), 0);
        assert_eq!(block.hash(), digest(&block.hash_payload()));
    }

    #[test]
    fn mined_hash_meets_difficulty_and_recomputes() {
        let block = mine(template(8));
        assert!(satisfies_difficulty(block.hash(), 8));
        assert_eq!(block.hash(), digest(&block.hash_payload()));
        assert_eq!(block.difficulty(), 8);
        assert_eq!(block.index(), 1);
    }

    #[test]
    fn mine_returns_first_qualifying_nonce() {
        let t = template(6);
        let block = mine(t.clone());
        for nonce in 0..block.nonce() {
            assert!(t.try_nonce(nonce).is_none());
        }
    }

    #[test]
    fn parallel_search_matches_sequential() {
        let t = template(10);
        let seq = mine(t.clone());
        let par = mine_parallel(t, &CancelToken::new()).unwrap();
        assert_eq!(seq, par);
    }

    #[test]
    fn cancellable_search_matches_sequential_when_not_cancelled() {
        let t = template(6);
        assert_eq!(
            mine(t.clone()),
            mine_cancellable(t, &CancelToken::new()).unwrap()
        );
    }

    #[test]
    fn cancelled_search_gives_up() {
        let cancel = CancelToken::new();
        cancel.cancel();
        // 256 zero bits is unattainable, so only cancellation can end these.
        assert!(mine_cancellable(template(256), &cancel).is_none());
        assert!(mine_parallel(template(256), &cancel).is_none());
    }

    #[test]
    fn cancel_token_is_shared_between_clones() {
        let a = CancelToken::new();
        let b = a.clone();
        assert!(!b.is_cancelled());
        a.cancel();
        assert!(b.is_cancelled());
    }
}
