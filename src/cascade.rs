mod bloom;

pub use bloom::*;

use crate::{error::Error, StatusResult};
use log::debug;
use serde::{Deserialize, Serialize};

/// One level of a bloom filter cascade
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct FilterLayer {
    /// The number of addressable bits
    pub bit_count: u32,
    /// The number of hash functions per element
    pub hash_count: u8,
    /// The filter bits, least significant bit first
    #[serde(with = "hex_bytes")]
    pub buckets: Vec<u8>,
}

impl FilterLayer {
    /// A layer with no buckets, as left behind by payload padding
    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }
}

/// A decoded cascade: the salt and its ordered filter layers
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct Cascade {
    /// The ordered filter layers
    pub layers: Vec<FilterLayer>,
    /// The salt mixed into every hash
    #[serde(with = "hex_bytes")]
    pub salt: Vec<u8>,
}

impl Cascade {
    /// The number of layers
    pub fn level_count(&self) -> usize {
        self.layers.len()
    }
}

/// Decoding and membership testing of a cascade payload
pub trait CascadeCodec: Send + Sync {
    /// Decode raw payload bytes into layers and salt
    fn decode(&self, payload: &[u8]) -> StatusResult<Cascade>;
    /// Is `id` a member of the set the cascade encodes
    fn is_member(&self, id: &str, layers: &[FilterLayer], salt: &[u8]) -> bool;
}

/// Drop the empty layers, keeping the order of the rest
pub fn sanitize_layers(mut layers: Vec<FilterLayer>) -> Vec<FilterLayer> {
    layers.retain(|l| !l.is_empty());
    layers
}

/// Decode a hex blob payload, with or without `0x`, and sanitize its layers
pub fn reconstruct<C: CascadeCodec + ?Sized>(codec: &C, payload: &str) -> StatusResult<Cascade> {
    let digits = payload.trim();
    let digits = digits.strip_prefix("0x").unwrap_or(digits);
    let bytes = hex::decode(digits)
        .map_err(|e| Error::CorruptCascade(format!("payload is not hex: {}", e)))?;
    let cascade = codec.decode(&bytes)?;
    let decoded = cascade.layers.len();
    let layers = sanitize_layers(cascade.layers);
    debug!(
        "Reconstructed cascade with {} layers ({} empty layers dropped)",
        layers.len(),
        decoded - layers.len()
    );
    Ok(Cascade {
        layers,
        salt: cascade.salt,
    })
}

/// The revocation verdict: a member of the cascade is not revoked
pub fn check_revocation<C: CascadeCodec + ?Sized>(
    codec: &C,
    cascade: &Cascade,
    revocation_index: &str,
) -> bool {
    !codec.is_member(revocation_index, &cascade.layers, &cascade.salt)
}

mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(d)?;
        hex::decode(s).map_err(serde::de::Error::custom)
    }
}
