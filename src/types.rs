//! Shared primitive types
//!
//! Flow rates, units and amounts are exact integers. The protocol stores
//! them as `int96`/`uint128`/`uint256`; `i128` holds every value the ledger
//! produces without loss, and signed arithmetic keeps deltas simple.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Signed rate of value transfer per second.
pub type FlowRate = i128;

/// Distribution weight held by a pool member or subscriber (never negative).
pub type Units = i128;

/// Settled or accrued token amount.
pub type Amount = i128;

/// 20-byte account, token or contract address.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Address([u8; 20]);

/// Error returned when parsing an address fails.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid address {input:?}: {reason}")]
pub struct AddressParseError {
    pub input: String,
    pub reason: &'static str,
}

impl Address {
    pub const fn new(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Left-pad the address into a 32-byte ABI word.
    pub fn to_abi_word(&self) -> [u8; 32] {
        let mut word = [0u8; 32];
        word[12..].copy_from_slice(&self.0);
        word
    }
}

impl FromStr for Address {
    type Err = AddressParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")).unwrap_or(s);
        if trimmed.len() != 40 {
            return Err(AddressParseError {
                input: s.to_string(),
                reason: "expected 40 hex characters",
            });
        }
        let bytes = hex::decode(trimmed).map_err(|_| AddressParseError {
            input: s.to_string(),
            reason: "not hexadecimal",
        })?;
        let mut out = [0u8; 20];
        out.copy_from_slice(&bytes);
        Ok(Self(out))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self)
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Serde adapter for integers that GraphQL `BigInt`/`BigDecimal` fields
/// encode as JSON strings. Plain JSON numbers are accepted too.
pub mod bigint {
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};
    use std::fmt::Display;
    use std::str::FromStr;

    pub fn serialize<T: Display, S: Serializer>(value: &T, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(value)
    }

    pub fn deserialize<'de, T, D>(deserializer: D) -> Result<T, D::Error>
    where
        T: FromStr,
        T::Err: Display,
        D: Deserializer<'de>,
    {
        match serde_json::Value::deserialize(deserializer)? {
            serde_json::Value::String(s) => s.parse().map_err(D::Error::custom),
            serde_json::Value::Number(n) => n.to_string().parse().map_err(D::Error::custom),
            other => Err(D::Error::custom(format!("expected integer, got {}", other))),
        }
    }
}

/// Current wall clock as Unix seconds.
pub fn unix_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_parse_normalizes_case() {
        let a: Address = "0x6EeE6060f715257b970700bc2656De21dEdF074C".parse().unwrap();
        let b: Address = "6eee6060f715257b970700bc2656de21dedf074c".parse().unwrap();
        assert_eq!(a, b);
        assert_eq!(a.to_string(), "0x6eee6060f715257b970700bc2656de21dedf074c");
    }

    #[test]
    fn test_address_rejects_bad_input() {
        assert!("0x1234".parse::<Address>().is_err());
        assert!("0xzzzz6060f715257b970700bc2656de21dedf074c".parse::<Address>().is_err());
    }

    #[test]
    fn test_abi_word_is_left_padded() {
        let a = Address::new([0xab; 20]);
        let word = a.to_abi_word();
        assert_eq!(&word[..12], &[0u8; 12]);
        assert_eq!(&word[12..], &[0xab; 20]);
    }

    #[test]
    fn test_bigint_accepts_strings_and_numbers() {
        #[derive(Deserialize)]
        struct Row {
            #[serde(with = "bigint")]
            rate: i128,
            #[serde(with = "bigint")]
            at: u64,
        }
        let row: Row = serde_json::from_str(r#"{"rate": "-385802469135802", "at": 1650000000}"#).unwrap();
        assert_eq!(row.rate, -385_802_469_135_802);
        assert_eq!(row.at, 1_650_000_000);

        let bad: Result<Row, _> = serde_json::from_str(r#"{"rate": true, "at": 1}"#);
        assert!(bad.is_err());
    }
}
