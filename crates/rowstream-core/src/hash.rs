//! Cache keys for result sets.
//!
//! A key is the BLAKE3 digest of the JSON encoding of whatever identifies a
//! result set. JSON keeps `I64(1)` and `F64(1.0)` apart, so parameters that
//! compare equal in SQL but differ in type never share an entry.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, serde::Deserialize)]
pub struct Hash256(pub [u8; 32]);

impl Hash256 {
    pub fn to_hex(&self) -> String {
        blake3::Hash::from(self.0).to_hex().to_string()
    }

    /// First 12 hex digits; enough to tell keys apart in logs.
    pub fn short(&self) -> String {
        let mut hex = self.to_hex();
        hex.truncate(12);
        hex
    }
}

impl std::fmt::Display for Hash256 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.short())
    }
}

impl From<blake3::Hash> for Hash256 {
    fn from(h: blake3::Hash) -> Self {
        Self(h.into())
    }
}

pub fn hash_str(s: &str) -> Hash256 {
    blake3::hash(s.as_bytes()).into()
}

pub fn hash_serde<T: Serialize>(v: &T) -> crate::error::Result<Hash256> {
    let mut hasher = blake3::Hasher::new();
    serde_json::to_writer(&mut hasher, v)?;
    Ok(hasher.finalize().into())
}
