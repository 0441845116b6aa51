use anyhow::Result;
use std::sync::{Mutex, PoisonError};

use crate::Block;

/// Persistence seam the chain writes through. Lives in `ledger-core` so
/// storage backends can depend on the core without a cycle.
///
/// The chain calls these only for mutations it has already validated, and
/// publishes a mutation to readers only after the store accepted it.
pub trait ChainStore: Send + Sync {
    /// Every persisted block in index order; empty for a fresh store.
    fn load(&self) -> Result<Vec<Block>>;
    /// Persist one block on top of the current tip.
    fn append(&self, block: &Block) -> Result<()>;
    /// Discard everything and persist `blocks` instead.
    fn replace(&self, blocks: &[Block]) -> Result<()>;
}

/// Volatile store, for tests and `--in-memory` nodes.
#[derive(Debug, Default)]
pub struct MemoryStore {
    blocks: Mutex<Vec<Block>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> Vec<Block> {
        self.blocks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl ChainStore for MemoryStore {
    fn load(&self) -> Result<Vec<Block>> {
        Ok(self.snapshot())
    }

    fn append(&self, block: &Block) -> Result<()> {
        self.blocks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(block.clone());
        Ok(())
    }

    fn replace(&self, blocks: &[Block]) -> Result<()> {
        *self.blocks.lock().unwrap_or_else(PoisonError::into_inner) = blocks.to_vec();
        Ok(())
    }
}
