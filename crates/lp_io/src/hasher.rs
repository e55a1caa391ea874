//! crates/lp_io/src/hasher.rs
//! SHA-256 over canonical JSON: record hashes of the audit chain and attempt
//! tags of progress documents. Scenario fingerprints live in `lp_core::hasher`.

use digest::Digest;
use serde::Serialize;
use sha2::Sha256;

use crate::canonical_json::canonical_bytes;
use crate::IoError;

/// Lowercase hex of any `digest` hasher over `bytes`.
pub fn digest_hex<D: Digest>(bytes: &[u8]) -> String {
    hex::encode(D::digest(bytes))
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    digest_hex::<Sha256>(bytes)
}

/// SHA-256 over canonical JSON bytes of any serializable value.
pub fn sha256_canonical<T: Serialize>(value: &T) -> Result<String, IoError> {
    Ok(sha256_hex(&canonical_bytes(value)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn known_digest() {
        assert_eq!(
            sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn key_order_does_not_change_the_hash() {
        let a = sha256_canonical(&json!({"b": 1, "a": [2, 3]})).unwrap();
        let b = sha256_canonical(&json!({"a": [2, 3], "b": 1})).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, sha256_canonical(&json!({"a": [3, 2], "b": 1})).unwrap());
    }
}
