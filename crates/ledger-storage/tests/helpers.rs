use std::fs;

use ledger_core::mine::{mine, BlockTemplate};
use ledger_core::Block;
use ledger_storage::SledStore;
use tempfile::{tempdir, TempDir};

pub fn create_temp_store() -> (TempDir, SledStore) {
    // Create a temporary directory for the sled database
    let temp_dir = tempdir().expect("Failed to create temp dir");
    let db_path = temp_dir.path().to_path_buf();
    (
        temp_dir,
        SledStore::open(&db_path).expect("Failed to open SledStore"),
    )
}

pub fn teardown_store(temp_dir: TempDir, store: SledStore) {
    let db_path = temp_dir.path().to_path_buf();
    store.clear().expect("Failed to clear the store");
    drop(store);
    temp_dir.close().expect("Failed to delete temp dir");
    let _ = fs::remove_dir_all(&db_path);
    assert!(!db_path.exists(), "Database directory should be removed");
}

/// Genesis followed by `len - 1` mined blocks spaced ten seconds apart.
pub fn mined_chain(len: usize, difficulty: u32, tag: &str) -> Vec<Block> {
    let mut blocks = vec![Block::genesis().clone()];
    for i in 1..len {
        let parent = blocks.last().unwrap();
        let next = mine(BlockTemplate {
            index: parent.index() + 1,
            previous_hash: Some(parent.hash().to_string()),
            timestamp: parent.timestamp() + 10,
            data: format!("{tag}-{i}"),
            difficulty,
        });
        blocks.push(next);
    }
    blocks
}
