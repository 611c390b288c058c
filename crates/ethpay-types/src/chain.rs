//! EIP-155 chain identifiers and EVM addresses as they appear on the wire.
//!
//! The order backend reports chain ids as JSON numbers, wallets report them as
//! `0x`-prefixed hex strings (`chainChanged`), and the iframe reports them as numbers
//! again. [`Eip155ChainId`] accepts all of these.
//!
//! ```
//! use ethpay_types::chain::Eip155ChainId;
//!
//! let optimism: Eip155ChainId = "0xa".parse().unwrap();
//! assert_eq!(optimism, Eip155ChainId::new(10));
//! assert_eq!(optimism.to_hex(), "0xa");
//! assert_eq!(optimism.as_caip2(), "eip155:10");
//! ```

use alloy_primitives::{Address, hex};
use serde::{Deserialize, Deserializer, Serialize, Serializer, de};
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// The CAIP-2 namespace for EVM-compatible chains.
pub const EIP155_NAMESPACE: &str = "eip155";

/// A numeric EVM chain id (`1` for Ethereum mainnet, `10` for OP Mainnet, ...).
///
/// Serializes as a JSON number. Deserializes from a number, a decimal string,
/// or a `0x`-prefixed hex string.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct Eip155ChainId(u64);

impl Eip155ChainId {
    pub const fn new(chain_id: u64) -> Self {
        Self(chain_id)
    }

    pub fn inner(&self) -> u64 {
        self.0
    }

    /// Hex form used by `wallet_switchEthereumChain`, without zero padding.
    pub fn to_hex(&self) -> String {
        format!("0x{:x}", self.0)
    }

    pub fn as_caip2(&self) -> String {
        format!("{}:{}", EIP155_NAMESPACE, self.0)
    }
}

impl From<u64> for Eip155ChainId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl From<Eip155ChainId> for u64 {
    fn from(value: Eip155ChainId) -> Self {
        value.0
    }
}

impl Display for Eip155ChainId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, thiserror::Error)]
#[error("Invalid EIP-155 chain id {0:?}")]
pub struct ChainIdFormatError(String);

impl FromStr for Eip155ChainId {
    type Err = ChainIdFormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
            Some(hex_digits) => u64::from_str_radix(hex_digits, 16),
            None => s.parse::<u64>(),
        };
        parsed.map(Self).map_err(|_| ChainIdFormatError(s.to_string()))
    }
}

impl Serialize for Eip155ChainId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(self.0)
    }
}

impl<'de> Deserialize<'de> for Eip155ChainId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum NumberOrString {
            Number(u64),
            String(String),
        }

        match NumberOrString::deserialize(deserializer)? {
            NumberOrString::Number(n) => Ok(Self(n)),
            NumberOrString::String(s) => s.parse().map_err(de::Error::custom),
        }
    }
}

/// An Ethereum address that serializes with EIP-55 checksum encoding.
///
/// Parsing accepts any casing, so lowercase addresses coming from a backend
/// compare equal to the checksummed form a wallet reports.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct ChecksummedAddress(pub Address);

impl FromStr for ChecksummedAddress {
    type Err = hex::FromHexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let address = Address::from_str(s.trim())?;
        Ok(Self(address))
    }
}

impl Display for ChecksummedAddress {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.to_checksum(None))
    }
}

impl Serialize for ChecksummedAddress {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.0.to_checksum(None))
    }
}

impl<'de> Deserialize<'de> for ChecksummedAddress {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}

impl From<ChecksummedAddress> for Address {
    fn from(value: ChecksummedAddress) -> Self {
        value.0
    }
}

impl From<Address> for ChecksummedAddress {
    fn from(address: Address) -> Self {
        Self(address)
    }
}

impl PartialEq<ChecksummedAddress> for Address {
    fn eq(&self, other: &ChecksummedAddress) -> bool {
        self.eq(&other.0)
    }
}
