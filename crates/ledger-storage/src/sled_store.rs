use anyhow::{anyhow, Context, Result};
use ledger_core::{Block, ChainStore};
use sled::transaction::{ConflictableTransactionError, TransactionError, Transactional};
use sled::{Db, Tree};
use std::convert::Infallible;
use std::path::Path;
use tracing::{debug, info};

const TREE_BLOCKS: &str = "blocks";
const TREE_META: &str = "meta";
const KEY_TIP_HEIGHT: &[u8] = b"tip_height";

fn block_key(index: u64) -> Vec<u8> {
    index.to_be_bytes().to_vec()
}

fn decode_height(bytes: &[u8]) -> Result<u64> {
    let arr: [u8; 8] = bytes
        .try_into()
        .map_err(|_| anyhow!("tip height has {} bytes, expected 8", bytes.len()))?;
    Ok(u64::from_be_bytes(arr))
}

fn tx_failed(e: TransactionError<Infallible>) -> anyhow::Error {
    anyhow!("sled transaction failed: {e}")
}

/// Blocks keyed by big-endian index so iteration order is chain order, plus
/// the tip height in a separate tree. Every mutation is one transaction across
/// both trees.
#[derive(Clone)]
pub struct SledStore {
    db: Db,
    blocks: Tree,
    meta: Tree,
}

impl SledStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let db = sled::open(path.as_ref())
            .with_context(|| format!("opening sled at {}", path.as_ref().display()))?;
        let blocks = db.open_tree(TREE_BLOCKS)?;
        let meta = db.open_tree(TREE_META)?;
        info!(path = %path.as_ref().display(), "sled store opened");
        Ok(Self { db, blocks, meta })
    }

    pub fn get_block(&self, index: u64) -> Result<Option<Block>> {
        self.blocks
            .get(block_key(index))?
            .map(|bytes| bincode::deserialize(&bytes).context("decoding stored block"))
            .transpose()
    }

    pub fn tip_height(&self) -> Result<Option<u64>> {
        self.meta
            .get(KEY_TIP_HEIGHT)?
            .map(|bytes| decode_height(&bytes))
            .transpose()
    }

    /// Drop every stored block.
    pub fn clear(&self) -> Result<()> {
        self.blocks.clear()?;
        self.meta.clear()?;
        self.db.flush()?;
        Ok(())
    }
}

impl ChainStore for SledStore {
    fn load(&self) -> Result<Vec<Block>> {
        let blocks = self
            .blocks
            .iter()
            .values()
            .map(|bytes| -> Result<Block> { Ok(bincode::deserialize(&bytes?)?) })
            .collect::<Result<Vec<_>>>()?;
        debug!(count = blocks.len(), "loaded blocks from sled");
        Ok(blocks)
    }

    fn append(&self, block: &Block) -> Result<()> {
        let bytes = bincode::serialize(block)?;
        let key = block_key(block.index());
        let tip = block.index().to_be_bytes().to_vec();

        (&self.blocks, &self.meta)
            .transaction(|(blocks, meta)| {
                blocks.insert(key.clone(), bytes.clone())?;
                meta.insert(KEY_TIP_HEIGHT, tip.clone())?;
                Ok::<_, ConflictableTransactionError<Infallible>>(())
            })
            .map_err(tx_failed)?;
        self.db.flush()?;
        Ok(())
    }

    fn replace(&self, blocks: &[Block]) -> Result<()> {
        let old_len = self.tip_height()?.map_or(0, |h| h + 1);
        let encoded = blocks
            .iter()
            .map(|b| Ok((block_key(b.index()), bincode::serialize(b)?)))
            .collect::<Result<Vec<_>>>()?;
        let new_len = blocks.len() as u64;
        let tip = blocks.last().map(|b| b.index().to_be_bytes().to_vec());

        (&self.blocks, &self.meta)
            .transaction(|(tx_blocks, meta)| {
                for index in new_len..old_len {
                    tx_blocks.remove(block_key(index))?;
                }
                for (key, bytes) in &encoded {
                    tx_blocks.insert(key.clone(), bytes.clone())?;
                }
                match &tip {
                    Some(tip) => meta.insert(KEY_TIP_HEIGHT, tip.clone())?,
                    None => meta.remove(KEY_TIP_HEIGHT)?,
                };
                Ok::<_, ConflictableTransactionError<Infallible>>(())
            })
            .map_err(tx_failed)?;
        self.db.flush()?;
        info!(old_len, new_len, "replaced stored chain");
        Ok(())
    }
}
