use thiserror::Error;

/// Why a single block was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BlockRejection {
    #[error("malformed block structure")]
    Structure,
    #[error("index {got} does not follow {expected_prev}")]
    Index { expected_prev: u64, got: u64 },
    #[error("timestamp {timestamp} outside tolerance (parent {parent}, now {now})")]
    Timestamp { timestamp: u64, parent: u64, now: u64 },
    #[error("previous hash does not match parent")]
    PreviousHash,
    #[error("hash does not match block contents")]
    Hash,
    #[error("hash does not meet difficulty {0}")]
    ProofOfWork(u32),
    #[error("head moved while mining")]
    Stale,
}

/// Why a candidate chain was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChainRejection {
    #[error("chain is empty")]
    Empty,
    #[error("first block is not the genesis block")]
    Genesis,
    #[error("block {index}: {reason}")]
    Block { index: usize, reason: BlockRejection },
    #[error("accumulated weight {candidate} does not exceed current {current}")]
    NotHeavier { candidate: u128, current: u128 },
}

/// Errors crossing the ledger boundary. The chain is unchanged whenever one is returned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("invalid block provided: {0}")]
    InvalidBlock(BlockRejection),
    #[error("invalid block chain provided: {0}")]
    InvalidBlockChain(ChainRejection),
    #[error("storage error: {0}")]
    Storage(String),
}

pub type Result<T> = std::result::Result<T, LedgerError>;

impl From<BlockRejection> for LedgerError {
    fn from(reason: BlockRejection) -> Self {
        LedgerError::InvalidBlock(reason)
    }
}

impl From<ChainRejection> for LedgerError {
    fn from(reason: ChainRejection) -> Self {
        LedgerError::InvalidBlockChain(reason)
    }
}
