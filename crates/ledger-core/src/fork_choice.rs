use crate::error::ChainRejection;
use crate::validate::check_chain;
use crate::Block;

/// Work proxy for one block: `2^difficulty`, saturating at `u128::MAX`.
pub fn block_weight(difficulty: u32) -> u128 {
    1u128.checked_shl(difficulty).unwrap_or(u128::MAX)
}

/// Sum of `2^difficulty` over every block, genesis included.
///
/// Summed over the whole history rather than from a common ancestor, so two
/// forks are compared by total work since genesis.
pub fn accumulated_weight(chain: &[Block]) -> u128 {
    chain
        .iter()
        .map(|b| block_weight(b.difficulty()))
        .fold(0u128, u128::saturating_add)
}

/// Decide whether `candidate` should replace `current`: it must be a valid
/// chain and strictly heavier. Ties keep the current chain.
pub fn should_replace(
    current: &[Block],
    candidate: &[Block],
    now: u64,
) -> Result<(), ChainRejection> {
    check_chain(candidate, now)?;
    let candidate_weight = accumulated_weight(candidate);
    let current_weight = accumulated_weight(current);
    if candidate_weight <= current_weight {
        return Err(ChainRejection::NotHeavier {
            candidate: candidate_weight,
            current: current_weight,
        });
    }
    Ok(())
}
