use anyhow::Result;
use ledger_core::{Block, ChainStore, MemoryStore};
use ledger_storage::SledStore;

/// Backend picked at startup from the command line.
pub enum NodeStore {
    Memory(MemoryStore),
    Sled(SledStore),
}

impl ChainStore for NodeStore {
    fn load(&self) -> Result<Vec<Block>> {
        match self {
            NodeStore::Memory(s) => s.load(),
            NodeStore::Sled(s) => s.load(),
        }
    }

    fn append(&self, block: &Block) -> Result<()> {
        match self {
            NodeStore::Memory(s) => s.append(block),
            NodeStore::Sled(s) => s.append(block),
        }
    }

    fn replace(&self, blocks: &[Block]) -> Result<()> {
        match self {
            NodeStore::Memory(s) => s.replace(blocks),
            NodeStore::Sled(s) => s.replace(blocks),
        }
    }
}
