//! Proof-of-work ledger core: blocks, hashing, difficulty, validation,
//! mining, the chain store and fork choice.

pub mod block;
pub mod chain;
pub mod constants;
pub mod difficulty;
pub mod error;
pub mod fork_choice;
pub mod hash;
pub mod mine;
pub mod store;
pub mod validate;

pub use block::Block;
pub use chain::Chain;
pub use error::{BlockRejection, ChainRejection, LedgerError, Result};
pub use store::{ChainStore, MemoryStore};
