use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

use crate::constants::{GENESIS_DATA, GENESIS_HASH, GENESIS_TIMESTAMP, MAX_DIFFICULTY};
use crate::hash::{is_hash_hex, HashPayload};

static GENESIS: LazyLock<Block> = LazyLock::new(|| Block {
    index: 0,
    previous_hash: None,
    timestamp: GENESIS_TIMESTAMP,
    data: GENESIS_DATA.to_string(),
    difficulty: 0,
    nonce: 0,
    hash: GENESIS_HASH.to_string(),
});

/// A sealed ledger record.
///
/// Fields are private: a block is built once, by the miner or by deserialising
/// peer input, and never edited afterwards. Serialised field order is the wire
/// order peers exchange.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    index: u64,
    #[serde(default)]
    previous_hash: Option<String>,
    timestamp: u64,
    data: String,
    difficulty: u32,
    nonce: u64,
    hash: String,
}

impl Block {
    /// Assemble a block from already-known parts. Nothing is recomputed; use
    /// the validator to decide whether the parts are consistent.
    pub fn from_parts(
        index: u64,
        previous_hash: Option<String>,
        timestamp: u64,
        data: impl Into<String>,
        difficulty: u32,
        nonce: u64,
        hash: impl Into<String>,
    ) -> Self {
        Self {
            index,
            previous_hash,
            timestamp,
            data: data.into(),
            difficulty,
            nonce,
            hash: hash.into(),
        }
    }

    /// The hardcoded first block every node shares.
    pub fn genesis() -> &'static Block {
        &GENESIS
    }

    pub fn index(&self) -> u64 {
        self.index
    }

    pub fn previous_hash(&self) -> Option<&str> {
        self.previous_hash.as_deref()
    }

    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    pub fn data(&self) -> &str {
        &self.data
    }

    pub fn difficulty(&self) -> u32 {
        self.difficulty
    }

    pub fn nonce(&self) -> u64 {
        self.nonce
    }

    pub fn hash(&self) -> &str {
        &self.hash
    }

    /// The fields the block hash commits to.
    pub fn hash_payload(&self) -> HashPayload<'_> {
        HashPayload {
            index: self.index,
            previous_hash: self.previous_hash(),
            timestamp: self.timestamp,
            data: &self.data,
            difficulty: self.difficulty,
            nonce: self.nonce,
        }
    }

    /// Shape check only: hash is a full hex digest, the parent link is present
    /// exactly when this is not index 0, and the difficulty is attainable.
    pub fn is_valid_structure(&self) -> bool {
        let link_ok = match (self.index, self.previous_hash()) {
            (0, None) => true,
            (0, Some(_)) | (_, None) => false,
            (_, Some(prev)) => is_hash_hex(prev),
        };
        link_ok && is_hash_hex(&self.hash) && self.difficulty <= MAX_DIFFICULTY
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::digest;

    #[test]
    fn genesis_constant_hash_recomputes() {
        let genesis = Block::genesis();
        assert_eq!(genesis.index(), 0);
        assert_eq!(genesis.previous_hash(), None);
        assert_eq!(digest(&genesis.hash_payload()), genesis.hash());
        assert!(genesis.is_valid_structure());
    }

    #[test]
    fn wire_field_order() {
        let json = serde_json::to_string(Block::genesis()).unwrap();
        let expected = format!(
            r#"{{"index":0,"previousHash":null,"timestamp":1652722519,"data":"The Genesis block!!!","difficulty":0,"nonce":0,"hash":"{GENESIS_HASH}"}}"#
        );
        assert_eq!(json, expected);
    }

    #[test]
    fn missing_previous_hash_deserialises_as_none() {
        let json = format!(
            r#"{{"index":0,"timestamp":1652722519,"data":"The Genesis block!!!","difficulty":0,"nonce":0,"hash":"{GENESIS_HASH}"}}"#
        );
        let block: Block = serde_json::from_str(&json).unwrap();
        assert_eq!(&block, Block::genesis());
    }

    #[test]
    fn wrong_primitive_type_fails_to_deserialise() {
        let json = r#"{"index":"1","previousHash":null,"timestamp":1,"data":"x","difficulty":0,"nonce":0,"hash":"00"}"#;
        assert!(serde_json::from_str::<Block>(json).is_err());
        let json = r#"{"index":1,"previousHash":null,"timestamp":1,"data":"x","difficulty":-1,"nonce":0,"hash":"00"}"#;
        assert!(serde_json::from_str::<Block>(json).is_err());
    }

    #[test]
    fn structure_rules() {
        let h = "ab".repeat(32);
        let ok = Block::from_parts(1, Some(h.clone()), 1, "x", 0, 0, h.clone());
        assert!(ok.is_valid_structure());

        let missing_link = Block::from_parts(1, None, 1, "x", 0, 0, h.clone());
        assert!(!missing_link.is_valid_structure());

        let genesis_with_link = Block::from_parts(0, Some(h.clone()), 1, "x", 0, 0, h.clone());
        assert!(!genesis_with_link.is_valid_structure());

        let short_hash = Block::from_parts(1, Some(h.clone()), 1, "x", 0, 0, "abcd");
        assert!(!short_hash.is_valid_structure());

        let upper_link = Block::from_parts(1, Some("AB".repeat(32)), 1, "x", 0, 0, h.clone());
        assert!(!upper_link.is_valid_structure());

        let impossible = Block::from_parts(1, Some(h.clone()), 1, "x", MAX_DIFFICULTY + 1, 0, h);
        assert!(!impossible.is_valid_structure());
    }
}
