//! Canonical hashing of block payloads.
//!
//! The digest is SHA-256 over the compact JSON encoding of [`HashPayload`],
//! hex encoded in lower case. Field order is fixed by the struct declaration
//! and must never change: every node has to derive the same hash from the same
//! block.

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::constants::HASH_HEX_SIZE;

/// The fields covered by a block hash. Mining and validation both hash this.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HashPayload<'a> {
    pub index: u64,
    pub previous_hash: Option<&'a str>,
    pub timestamp: u64,
    pub data: &'a str,
    pub difficulty: u32,
    pub nonce: u64,
}

impl HashPayload<'_> {
    /// Canonical byte encoding fed to the hasher.
    pub fn canonical_bytes(&self) -> Vec<u8> {
        // Plain struct of integers, strings and an option: serialisation cannot fail.
        serde_json::to_vec(self).expect("hash payload is always serialisable")
    }
}

/// Hex-encoded SHA-256 digest of the canonical payload.
pub fn digest(payload: &HashPayload<'_>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(payload.canonical_bytes());
    hex::encode(hasher.finalize())
}

fn nibble_bits(c: char) -> Option<&'static str> {
    let bits = match c {
        '0' => "0000",
        '1' => "0001",
        '2' => "0010",
        '3' => "0011",
        '4' => "0100",
        '5' => "0101",
        '6' => "0110",
        '7' => "0111",
        '8' => "1000",
        '9' => "1001",
        'a' => "1010",
        'b' => "1011",
        'c' => "1100",
        'd' => "1101",
        'e' => "1110",
        'f' => "1111",
        _ => return None,
    };
    Some(bits)
}

/// Expands a lower-case hex string into a string of `'0'`/`'1'` characters.
///
/// Returns `None` if any character falls outside `0-9a-f`; upper-case digits are
/// rejected too. Callers treat `None` as "does not satisfy difficulty".
pub fn hex_to_binary(hex: &str) -> Option<String> {
    let mut binary = String::with_capacity(hex.len() * 4);
    for c in hex.chars() {
        binary.push_str(nibble_bits(c)?);
    }
    Some(binary)
}

/// True for a full-length lower-case hex digest.
pub fn is_hash_hex(s: &str) -> bool {
    s.len() == HASH_HEX_SIZE && s.chars().all(|c| matches!(c, '0'..='9' | 'a'..='f'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    fn payload(data: &str, nonce: u64) -> HashPayload<'_> {
        HashPayload {
            index: 1,
            previous_hash: Some("00ff"),
            timestamp: 1_600_000_000,
            data,
            difficulty: 2,
            nonce,
        }
    }

    #[test]
    fn canonical_bytes_field_order() {
        let bytes = payload("hello", 7).canonical_bytes();
        assert_eq!(
            String::from_utf8(bytes).unwrap(),
            r#"{"index":1,"previousHash":"00ff","timestamp":1600000000,"data":"hello","difficulty":2,"nonce":7}"#
        );
    }

    #[test]
    fn genesis_style_payload_serialises_null_previous_hash() {
        let p = HashPayload {
            index: 0,
            previous_hash: None,
            timestamp: 1_652_722_519,
            data: "The Genesis block!!!",
            difficulty: 0,
            nonce: 0,
        };
        assert_eq!(
            digest(&p),
            "dde9fe7fc12f33c85337167644ac72c3f4436c81d4151d125a37c1026febaf75"
        );
    }

    #[test]
    fn digest_is_deterministic_and_field_sensitive() {
        let a = digest(&payload("hello", 7));
        let expected_hex = "d4be77acf1ce4c89d1aeb64236b417a12334da078458cd55a1752178f51f27e9";
        assert_eq!(a, expected_hex);
        assert_eq!(a, digest(&payload("hello", 7)));
        assert_eq!(a.len(), 64);
        assert!(is_hash_hex(&a));
        assert_ne!(a, digest(&payload("hello", 8)));
        assert_ne!(a, digest(&payload("hellp", 7)));
    }

    #[test]
    fn any_single_field_change_alters_digest() {
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..200 {
            let data: String = (0..rng.gen_range(0..32))
                .map(|_| rng.gen_range(b'a'..=b'z') as char)
                .collect();
            let base = HashPayload {
                index: rng.gen_range(1..1_000),
                previous_hash: Some("ab"),
                timestamp: rng.gen(),
                data: &data,
                difficulty: rng.gen_range(0..32),
                nonce: rng.gen_range(0..u64::MAX),
            };
            let base_digest = digest(&base);
            let variants = [
                HashPayload { index: base.index + 1, ..base },
                HashPayload { previous_hash: None, ..base },
                HashPayload { timestamp: base.timestamp.wrapping_add(1), ..base },
                HashPayload { data: "", ..base },
                HashPayload { difficulty: base.difficulty + 1, ..base },
                HashPayload { nonce: base.nonce + 1, ..base },
            ];
            for v in variants.iter().filter(|v| **v != base) {
                assert_ne!(digest(v), base_digest);
            }
        }
    }

    #[test]
    fn hex_to_binary_lookup() {
        assert_eq!(hex_to_binary("0").as_deref(), Some("0000"));
        assert_eq!(hex_to_binary("f").as_deref(), Some("1111"));
        assert_eq!(hex_to_binary("1a").as_deref(), Some("00011010"));
        assert_eq!(hex_to_binary("").as_deref(), Some(""));
    }

    #[test]
    fn hex_to_binary_rejects_non_hex() {
        assert_eq!(hex_to_binary("0g"), None);
        assert_eq!(hex_to_binary("AB"), None);
        assert_eq!(hex_to_binary("00 0"), None);
    }

    #[test]
    fn is_hash_hex_checks_length_and_alphabet() {
        assert!(is_hash_hex(&"a".repeat(64)));
        assert!(!is_hash_hex(&"a".repeat(63)));
        assert!(!is_hash_hex(&"A".repeat(64)));
    }
}
