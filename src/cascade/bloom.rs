use super::{Cascade, CascadeCodec, FilterLayer};
use crate::{error::Error, StatusResult};
use log::debug;
use rand::RngCore;
use sha3::{Digest, Keccak256};
use std::collections::BTreeSet;

/// The salt length of an encoded cascade
pub const SALT_BYTES: usize = 32;
/// Bit count followed by hash count
const LAYER_HEADER_BYTES: usize = 5;
/// Cascades deeper than this are treated as a construction failure
const MAX_LEVELS: usize = 64;

/// The reference bloom filter cascade codec.
///
/// Payload layout:
/// - 32 byte salt
/// - per layer: bit count (`u32` big endian), hash count (`u8`), then
///   `ceil(bits / 8)` bytes of filter bits
///
/// An all zero header is an empty layer. Trailing bytes too short to hold a
/// header must be zero.
#[derive(Copy, Clone, Debug, Default)]
pub struct BloomCascade;

impl BloomCascade {
    /// Build a cascade where every id in `valid` is a member and every id
    /// in `revoked` is not.
    ///
    /// `false_positive_rate` sizes each layer and must be in `(0, 1)`.
    pub fn build<S: AsRef<str>>(
        valid: &[S],
        revoked: &[S],
        false_positive_rate: f64,
    ) -> StatusResult<Cascade> {
        let mut salt = vec![0u8; SALT_BYTES];
        rand::thread_rng().fill_bytes(&mut salt);
        Self::build_with_salt(valid, revoked, false_positive_rate, salt)
    }

    /// [`BloomCascade::build`] with a caller chosen salt
    pub fn build_with_salt<S: AsRef<str>>(
        valid: &[S],
        revoked: &[S],
        false_positive_rate: f64,
        salt: Vec<u8>,
    ) -> StatusResult<Cascade> {
        if !(false_positive_rate > 0.0 && false_positive_rate < 1.0) {
            return Err(Error::CorruptCascade(format!(
                "false positive rate {} is outside (0, 1)",
                false_positive_rate
            )));
        }
        if salt.len() != SALT_BYTES {
            return Err(Error::CorruptCascade(format!(
                "salt must be {} bytes, got {}",
                SALT_BYTES,
                salt.len()
            )));
        }
        let valid: BTreeSet<&str> = valid.iter().map(AsRef::as_ref).collect();
        let revoked: BTreeSet<&str> = revoked.iter().map(AsRef::as_ref).collect();
        if let Some(id) = valid.intersection(&revoked).next() {
            return Err(Error::CorruptCascade(format!(
                "{} is both valid and revoked",
                id
            )));
        }

        let mut layers = Vec::new();
        let mut include: Vec<&str> = valid.into_iter().collect();
        let mut exclude: Vec<&str> = revoked.into_iter().collect();
        while !include.is_empty() {
            let level = layers.len();
            if level == MAX_LEVELS {
                return Err(Error::CorruptCascade(
                    "cascade did not converge".to_string(),
                ));
            }
            let mut layer = FilterLayer::sized_for(include.len(), false_positive_rate);
            for id in &include {
                layer.insert(&salt, level, id);
            }
            let false_positives: Vec<&str> = exclude
                .into_iter()
                .filter(|id| layer.contains(&salt, level, id))
                .collect();
            layers.push(layer);
            exclude = include;
            include = false_positives;
        }
        debug!("Built cascade with {} layers", layers.len());
        Ok(Cascade { layers, salt })
    }
}

impl CascadeCodec for BloomCascade {
    fn decode(&self, payload: &[u8]) -> StatusResult<Cascade> {
        if payload.len() < SALT_BYTES {
            return Err(Error::CorruptCascade(format!(
                "payload of {} bytes is shorter than the salt",
                payload.len()
            )));
        }
        let (salt, mut rest) = payload.split_at(SALT_BYTES);
        let mut layers = Vec::new();
        while rest.len() >= LAYER_HEADER_BYTES {
            let bit_count = u32::from_be_bytes([rest[0], rest[1], rest[2], rest[3]]);
            let hash_count = rest[4];
            rest = &rest[LAYER_HEADER_BYTES..];
            match (bit_count, hash_count) {
                (0, 0) => {
                    layers.push(FilterLayer {
                        bit_count,
                        hash_count,
                        buckets: Vec::new(),
                    });
                    continue;
                }
                (0, _) | (_, 0) => {
                    return Err(Error::CorruptCascade(format!(
                        "layer {} has {} bits and {} hashes",
                        layers.len(),
                        bit_count,
                        hash_count
                    )))
                }
                _ => {}
            }
            let len = byte_len(bit_count);
            if rest.len() < len {
                return Err(Error::CorruptCascade(format!(
                    "layer {} needs {} bytes, {} left",
                    layers.len(),
                    len,
                    rest.len()
                )));
            }
            let (buckets, tail) = rest.split_at(len);
            layers.push(FilterLayer {
                bit_count,
                hash_count,
                buckets: buckets.to_vec(),
            });
            rest = tail;
        }
        if rest.iter().any(|b| *b != 0) {
            return Err(Error::CorruptCascade(
                "trailing bytes after the last layer".to_string(),
            ));
        }
        Ok(Cascade {
            layers,
            salt: salt.to_vec(),
        })
    }

    fn is_member(&self, id: &str, layers: &[FilterLayer], salt: &[u8]) -> bool {
        for (level, layer) in layers.iter().enumerate() {
            if !layer.contains(salt, level, id) {
                return level % 2 == 1;
            }
        }
        layers.len() % 2 == 1
    }
}

impl Cascade {
    /// Encode into the [`BloomCascade`] payload layout
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = self.salt.clone();
        for layer in &self.layers {
            out.extend_from_slice(&layer.bit_count.to_be_bytes());
            out.push(layer.hash_count);
            out.extend_from_slice(&layer.buckets);
        }
        out
    }

    /// Encode as a `0x` prefixed hex string, the form blob providers return
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.to_bytes()))
    }
}

impl FilterLayer {
    /// An empty filter sized for `n` elements at the given false positive rate
    pub fn sized_for(n: usize, false_positive_rate: f64) -> Self {
        let n = n.max(1) as f64;
        let ln2 = core::f64::consts::LN_2;
        let bits = (-(n * false_positive_rate.ln()) / (ln2 * ln2)).ceil().max(8.0);
        let bit_count = bits.min(f64::from(u32::MAX)) as u32;
        let hashes = (f64::from(bit_count) / n * ln2).round().clamp(1.0, 32.0);
        Self {
            bit_count,
            hash_count: hashes as u8,
            buckets: vec![0u8; byte_len(bit_count)],
        }
    }

    /// Set the bits for `id` at cascade level `level`
    pub fn insert(&mut self, salt: &[u8], level: usize, id: &str) {
        for bit in bit_positions(salt, level, self.hash_count, self.bit_count, id) {
            self.buckets[bit / 8] |= 1 << (bit % 8);
        }
    }

    /// Are all bits for `id` at cascade level `level` set
    pub fn contains(&self, salt: &[u8], level: usize, id: &str) -> bool {
        if self.bit_count == 0 || self.buckets.len() < byte_len(self.bit_count) {
            return false;
        }
        bit_positions(salt, level, self.hash_count, self.bit_count, id)
            .all(|bit| self.buckets[bit / 8] & (1 << (bit % 8)) != 0)
    }
}

fn byte_len(bit_count: u32) -> usize {
    (bit_count as usize).div_ceil(8)
}

fn bit_positions<'a>(
    salt: &'a [u8],
    level: usize,
    hash_count: u8,
    bit_count: u32,
    id: &'a str,
) -> impl Iterator<Item = usize> + 'a {
    (0..hash_count).map(move |k| {
        let mut hasher = Keccak256::new();
        hasher.update(salt);
        hasher.update([level as u8, k]);
        hasher.update(id.as_bytes());
        let digest = hasher.finalize();
        let mut word = [0u8; 8];
        word.copy_from_slice(&digest[..8]);
        (u64::from_be_bytes(word) % u64::from(bit_count)) as usize
    })
}
