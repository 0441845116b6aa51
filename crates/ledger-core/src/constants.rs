pub const BYTE: usize = 8;
pub const HASH_SIZE: usize = 32;
pub const HASH_HEX_SIZE: usize = HASH_SIZE * 2;
/// Largest difficulty a 256-bit hash can ever satisfy.
pub const MAX_DIFFICULTY: u32 = (HASH_SIZE * BYTE) as u32;

/// Target seconds between blocks.
pub const BLOCK_GENERATION_INTERVAL: u64 = 10;
/// Retarget every this many blocks.
pub const DIFFICULTY_ADJUSTMENT_INTERVAL: u64 = 10;
/// How far a timestamp may drift behind its parent or ahead of the local clock.
pub const TIMESTAMP_TOLERANCE: u64 = 60;

pub const GENESIS_TIMESTAMP: u64 = 1_652_722_519;
pub const GENESIS_DATA: &str = "The Genesis block!!!";
pub const GENESIS_HASH: &str = "dde9fe7fc12f33c85337167644ac72c3f4436c81d4151d125a37c1026febaf75";
