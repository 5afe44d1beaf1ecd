use crate::{error::Error, StatusResult};
use core::{
    fmt::{self, Debug, Display, Formatter},
    str::FromStr,
};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha3::{Digest, Keccak256};

/// A 20 byte Ethereum account address
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address([u8; Address::BYTES]);

impl Address {
    /// The number of bytes in an address
    pub const BYTES: usize = 20;

    /// Parse an address, accepting an optional `0x` prefix.
    ///
    /// All-lowercase and all-uppercase hex is taken as is. Mixed case must
    /// carry a valid EIP-55 checksum.
    pub fn parse(s: &str) -> StatusResult<Self> {
        let digits = s.strip_prefix("0x").unwrap_or(s);
        if digits.len() != Self::BYTES * 2 {
            return Err(Error::InvalidAddress(s.to_string()));
        }
        let mut bytes = [0u8; Self::BYTES];
        hex::decode_to_slice(digits, &mut bytes)
            .map_err(|_| Error::InvalidAddress(s.to_string()))?;
        let address = Self(bytes);

        let has_lower = digits.bytes().any(|b| b.is_ascii_lowercase());
        let has_upper = digits.bytes().any(|b| b.is_ascii_uppercase());
        if has_lower && has_upper && address.checksum_digits() != digits {
            return Err(Error::InvalidAddress(s.to_string()));
        }
        Ok(address)
    }

    /// Is `s` a well formed address
    pub fn is_valid(s: &str) -> bool {
        Self::parse(s).is_ok()
    }

    /// The raw address bytes
    pub fn as_bytes(&self) -> &[u8; Self::BYTES] {
        &self.0
    }

    /// The `0x` prefixed lowercase form used in provider queries
    pub fn to_lower_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }

    /// The `0x` prefixed EIP-55 checksummed form
    pub fn to_checksum(&self) -> String {
        format!("0x{}", self.checksum_digits())
    }

    fn checksum_digits(&self) -> String {
        let lower = hex::encode(self.0);
        let hash = Keccak256::digest(lower.as_bytes());
        lower
            .chars()
            .enumerate()
            .map(|(i, c)| {
                let nibble = (hash[i / 2] >> (4 * (1 - i % 2))) & 0x0f;
                if c.is_ascii_alphabetic() && nibble >= 8 {
                    c.to_ascii_uppercase()
                } else {
                    c
                }
            })
            .collect()
    }
}

impl FromStr for Address {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl From<[u8; Address::BYTES]> for Address {
    fn from(bytes: [u8; Address::BYTES]) -> Self {
        Self(bytes)
    }
}

impl Display for Address {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_checksum())
    }
}

impl Debug for Address {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self.to_checksum())
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&self.to_checksum())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let s = String::deserialize(d)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}
