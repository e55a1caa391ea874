//! crates/lp_core/src/hasher.rs
//!
//! Canonical serialization and fingerprinting of request parameters.
//!
//! The canonical string is every field of the table, in table order, as
//! `key=value,` (trailing comma included), with longitude folded onto
//! [0, 360). The fingerprint is the SHA-1 of that string: a 160-bit digest,
//! matching the width of scenario directories already on disk.

use sha1::{Digest, Sha1};

use crate::fields::Field;
use crate::ids::Fingerprint;
use crate::params::RequestParameters;

/// `launch_latitude=52.2,launch_longitude=0.1,...,descent_rate=5,`
pub fn canonical_string(p: &RequestParameters) -> String {
    let mut out = String::with_capacity(192);
    for field in Field::ALL {
        out.push_str(field.key());
        out.push('=');
        out.push_str(&p.canonical_text(field));
        out.push(',');
    }
    out
}

/// Dedup key of a scenario. Pure; same input, same output, on every platform.
pub fn fingerprint(p: &RequestParameters) -> Fingerprint {
    let digest: [u8; 20] = Sha1::digest(canonical_string(p).as_bytes()).into();
    Fingerprint::from_digest(&digest)
}
