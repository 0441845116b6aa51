//! The authoritative block sequence and its single write path.

use anyhow::{bail, Context};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, info, warn};

use crate::difficulty::required_difficulty;
use crate::error::{BlockRejection, LedgerError, Result};
use crate::fork_choice::{accumulated_weight, should_replace};
use crate::hash::digest;
use crate::mine::{mine_parallel, BlockTemplate, CancelToken};
use crate::store::ChainStore;
use crate::validate::{check_chain, check_new_block};
use crate::Block;

/// Source of "now" in unix seconds.
pub type Clock = fn() -> u64;

pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

struct Inner<S> {
    store: Arc<S>,
    /// Last committed chain. Readers clone the `Arc` and never wait on a writer.
    blocks: RwLock<Arc<Vec<Block>>>,
    /// Serialises append and replace.
    write: Mutex<()>,
    /// Token handed to miners working on the current head.
    mining: Mutex<CancelToken>,
    clock: Clock,
}

/// Shared handle to the ledger. Cloning is cheap and every clone sees the
/// same chain.
pub struct Chain<S: ChainStore> {
    inner: Arc<Inner<S>>,
}

impl<S: ChainStore> Clone for Chain<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: ChainStore> Chain<S> {
    /// Load the persisted chain, seeding the store with genesis when it is empty.
    pub fn open(store: Arc<S>) -> anyhow::Result<Self> {
        Self::open_with_clock(store, unix_now)
    }

    pub fn open_with_clock(store: Arc<S>, clock: Clock) -> anyhow::Result<Self> {
        let genesis = Block::genesis();
        if digest(&genesis.hash_payload()) != genesis.hash() {
            bail!("genesis block constant is corrupted");
        }

        let mut blocks = store.load().context("loading persisted chain")?;
        if blocks.is_empty() {
            store.append(genesis).context("persisting genesis block")?;
            blocks.push(genesis.clone());
        } else {
            check_chain(&blocks, clock()).context("persisted chain failed validation")?;
        }
        info!(height = blocks.len() - 1, "chain opened");

        Ok(Self {
            inner: Arc::new(Inner {
                store,
                blocks: RwLock::new(Arc::new(blocks)),
                write: Mutex::new(()),
                mining: Mutex::new(CancelToken::new()),
                clock,
            }),
        })
    }

    pub fn store(&self) -> &Arc<S> {
        &self.inner.store
    }

    pub fn now(&self) -> u64 {
        (self.inner.clock)()
    }

    /// Snapshot of the whole chain as of the last completed mutation.
    pub fn blocks(&self) -> Arc<Vec<Block>> {
        Arc::clone(&self.inner.blocks.read().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn len(&self) -> usize {
        self.blocks().len()
    }

    pub fn head(&self) -> Block {
        let blocks = self.blocks();
        match blocks.last() {
            Some(head) => head.clone(),
            None => Block::genesis().clone(),
        }
    }

    pub fn accumulated_weight(&self) -> u128 {
        accumulated_weight(&self.blocks())
    }

    /// Validate `block` against the current head and, if it fits, make it the
    /// new head.
    pub fn append(&self, block: Block) -> Result<()> {
        let _writer = self.inner.write.lock().unwrap_or_else(PoisonError::into_inner);
        let checked = {
            let current = self.blocks();
            let head = current.last().unwrap_or(Block::genesis());
            check_new_block(&block, head, self.now())
        };
        if let Err(reason) = checked {
            warn!(index = block.index(), %reason, "rejected block");
            return Err(LedgerError::InvalidBlock(reason));
        }
        self.persist(|store| store.append(&block))?;

        info!(index = block.index(), hash = block.hash(), "appended block");
        // Pushes in place unless a reader still holds the previous snapshot.
        self.publish(|blocks| Arc::make_mut(blocks).push(block));
        Ok(())
    }

    /// Swap in `candidate` wholesale if it is valid and strictly heavier.
    pub fn replace(&self, candidate: Vec<Block>) -> Result<()> {
        let _writer = self.inner.write.lock().unwrap_or_else(PoisonError::into_inner);
        let current = self.blocks();

        if let Err(reason) = should_replace(&current, &candidate, self.now()) {
            warn!(len = candidate.len(), %reason, "rejected candidate chain");
            return Err(LedgerError::InvalidBlockChain(reason));
        }
        self.persist(|store| store.replace(&candidate))?;

        info!(
            old_len = current.len(),
            new_len = candidate.len(),
            weight = %accumulated_weight(&candidate),
            "received chain is valid and heavier, replacing current chain"
        );
        self.publish(|blocks| *blocks = Arc::new(candidate));
        Ok(())
    }

    /// What the next local block would look like, plus a token that fires as
    /// soon as the head it was built on is superseded.
    pub fn next_template(&self, data: impl Into<String>) -> (BlockTemplate, CancelToken) {
        let mining = self.inner.mining.lock().unwrap_or_else(PoisonError::into_inner);
        let blocks = self.blocks();
        let head = blocks.last().unwrap_or(Block::genesis());
        let template = BlockTemplate {
            index: head.index() + 1,
            previous_hash: Some(head.hash().to_string()),
            timestamp: self.now(),
            data: data.into(),
            difficulty: required_difficulty(&blocks),
        };
        (template, mining.clone())
    }

    /// Mine a block carrying `data` on the current head and append it.
    ///
    /// Blocks the calling thread for the whole search; run it off any thread
    /// that must stay responsive. Fails with [`BlockRejection::Stale`] if the
    /// head changed first.
    pub fn mine_next(&self, data: impl Into<String>) -> Result<Block> {
        let (template, cancel) = self.next_template(data);
        debug!(
            index = template.index,
            difficulty = template.difficulty,
            "mining next block"
        );
        let block = mine_parallel(template, &cancel).ok_or(BlockRejection::Stale)?;
        self.append(block.clone())?;
        Ok(block)
    }

    fn persist(&self, write: impl FnOnce(&S) -> anyhow::Result<()>) -> Result<()> {
        write(self.inner.store.as_ref()).map_err(|e| {
            warn!(error = %format!("{e:#}"), "failed to persist chain mutation");
            LedgerError::Storage(format!("{e:#}"))
        })
    }

    /// Apply `update` to the published chain and stop miners working on the
    /// old head.
    fn publish(&self, update: impl FnOnce(&mut Arc<Vec<Block>>)) {
        let mut mining = self.inner.mining.lock().unwrap_or_else(PoisonError::into_inner);
        update(&mut self.inner.blocks.write().unwrap_or_else(PoisonError::into_inner));
        mining.cancel();
        *mining = CancelToken::new();
    }
}
