//! crates/lp_core/src/ids.rs
//! Scenario fingerprint newtype. Strict shape (40 lowercase hex), no I/O.
//! Hashing lives in `lp_core::hasher`; this type only guards the shape so a
//! fingerprint can safely become a directory name.

use core::fmt;
use core::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Errors returned when validating or parsing IDs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdError {
    NonAscii,
    BadLength,
    BadShape,
}

impl fmt::Display for IdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdError::NonAscii => f.write_str("identifier contains non-ASCII bytes"),
            IdError::BadLength => write!(f, "identifier must be {FINGERPRINT_LEN} characters"),
            IdError::BadShape => f.write_str("identifier must be lowercase hex"),
        }
    }
}

impl std::error::Error for IdError {}

/// Digest width in hex characters (160-bit hash).
pub const FINGERPRINT_LEN: usize = 40;

#[inline]
pub fn is_valid_fingerprint(s: &str) -> bool {
    s.len() == FINGERPRINT_LEN
        && s.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}

/// Dedup key of one scenario. Ordered so it can key a `BTreeMap`.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "String", into = "String"))]
pub struct Fingerprint(String);

impl Fingerprint {
    #[inline] pub fn as_str(&self) -> &str { &self.0 }

    /// Build from a raw 160-bit digest. Always well-formed.
    pub fn from_digest(bytes: &[u8; FINGERPRINT_LEN / 2]) -> Self {
        const LUT: &[u8; 16] = b"0123456789abcdef";
        let mut out = String::with_capacity(FINGERPRINT_LEN);
        for &b in bytes {
            out.push(LUT[(b >> 4) as usize] as char);
            out.push(LUT[(b & 0x0F) as usize] as char);
        }
        Fingerprint(out)
    }
}

impl fmt::Display for Fingerprint {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

impl FromStr for Fingerprint {
    type Err = IdError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if !s.is_ascii() { return Err(IdError::NonAscii); }
        if s.len() != FINGERPRINT_LEN { return Err(IdError::BadLength); }
        if !is_valid_fingerprint(s) { return Err(IdError::BadShape); }
        Ok(Fingerprint(s.to_owned()))
    }
}

impl TryFrom<&str> for Fingerprint {
    type Error = IdError;
    #[inline]
    fn try_from(value: &str) -> Result<Self, Self::Error> { value.parse() }
}

impl TryFrom<String> for Fingerprint {
    type Error = IdError;
    #[inline]
    fn try_from(value: String) -> Result<Self, Self::Error> { value.parse() }
}

impl From<Fingerprint> for String {
    #[inline]
    fn from(fp: Fingerprint) -> String { fp.0 }
}
