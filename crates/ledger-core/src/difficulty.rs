use tracing::debug;

use crate::constants::{BLOCK_GENERATION_INTERVAL, DIFFICULTY_ADJUSTMENT_INTERVAL};
use crate::hash::hex_to_binary;
use crate::Block;

/// Difficulty the next block on top of `chain` must be mined at.
///
/// Carries the head's difficulty forward, except on every non-zero multiple of
/// the adjustment interval where it retargets.
pub fn required_difficulty(chain: &[Block]) -> u32 {
    let Some(head) = chain.last() else {
        return 0;
    };
    if head.index() != 0 && head.index() % DIFFICULTY_ADJUSTMENT_INTERVAL == 0 {
        retarget(chain)
    } else {
        head.difficulty()
    }
}

/// Compare how long the last adjustment window took against the expected
/// window and nudge the reference block's difficulty by one step.
pub fn retarget(chain: &[Block]) -> u32 {
    let interval = DIFFICULTY_ADJUSTMENT_INTERVAL as usize;
    let (Some(head), Some(reference)) = (
        chain.last(),
        chain.len().checked_sub(interval).and_then(|i| chain.get(i)),
    ) else {
        return chain.last().map(Block::difficulty).unwrap_or(0);
    };

    let expected = i128::from(BLOCK_GENERATION_INTERVAL * DIFFICULTY_ADJUSTMENT_INTERVAL);
    // Timestamps may run backwards within tolerance, so the span can be negative.
    let taken = i128::from(head.timestamp()) - i128::from(reference.timestamp());

    let next = if taken < expected / 2 {
        reference.difficulty().saturating_add(1)
    } else if taken > expected * 2 {
        reference.difficulty().saturating_sub(1)
    } else {
        reference.difficulty()
    };
    debug!(
        height = head.index(),
        taken,
        expected,
        from = reference.difficulty(),
        to = next,
        "difficulty retarget"
    );
    next
}

/// Whether the binary expansion of `hash` starts with `difficulty` zeros.
/// A hash that is not lower-case hex never satisfies any difficulty.
pub fn satisfies_difficulty(hash: &str, difficulty: u32) -> bool {
    let Some(binary) = hex_to_binary(hash) else {
        return false;
    };
    let required = difficulty as usize;
    binary.len() >= required && binary.bytes().take(required).all(|b| b == b'0')
}
