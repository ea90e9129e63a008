//! # Shared Types
//!
//! Account identities and the unit every balance is expressed in.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A quantity of base asset or shares in the smallest unit (wei).
///
/// `u128` leaves room for 1e18-scaled balances well past any realistic
/// supply; products that could overflow go through [`crate::math::mul_div`].
pub type Amount = u128;

/// An account identity: a user, an operator key, or a component of the
/// pool itself (the ledger, the vault and the queue each have one).
///
/// Opaque string on purpose. Signature verification happens before a call
/// ever reaches the accounting core.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Address(String);

impl Address {
    /// Wraps a raw identifier.
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Borrows the raw identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Address {
    fn from(raw: &str) -> Self {
        Self(raw.to_string())
    }
}

impl From<String> for Address {
    fn from(raw: String) -> Self {
        Self(raw)
    }
}

impl AsRef<str> for Address {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Serde adapter that writes an [`Amount`] as a decimal string and reads
/// either a string or a plain integer.
///
/// TOML integers are 64-bit signed, so anything above ~9.2e18 wei (about
/// 9.2 whole units) cannot be written as a bare number.
pub mod decimal {
    use super::Amount;
    use serde::de::{self, Visitor};
    use serde::{Deserializer, Serializer};
    use std::fmt;

    /// Serializes as a base-10 string.
    pub fn serialize<S: Serializer>(value: &Amount, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    /// Accepts `"123"`, `123`, or a 128-bit integer.
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Amount, D::Error> {
        deserializer.deserialize_any(DecimalVisitor)
    }

    struct DecimalVisitor;

    impl<'de> Visitor<'de> for DecimalVisitor {
        type Value = Amount;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a non-negative integer or a decimal string")
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<Amount, E> {
            Ok(Amount::from(v))
        }

        fn visit_u128<E: de::Error>(self, v: u128) -> Result<Amount, E> {
            Ok(v)
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<Amount, E> {
            Amount::try_from(v).map_err(|_| E::custom(format!("negative amount: {v}")))
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<Amount, E> {
            v.trim()
                .replace('_', "")
                .parse::<Amount>()
                .map_err(|e| E::custom(format!("invalid amount {v:?}: {e}")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_display_matches_raw() {
        let a = Address::new("alice");
        assert_eq!(a.to_string(), "alice");
        assert_eq!(a.as_str(), "alice");
        assert_eq!(Address::from("alice"), a);
    }

    #[test]
    fn address_serializes_as_plain_string() {
        let json = serde_json::to_string(&Address::from("bob")).unwrap();
        assert_eq!(json, "\"bob\"");
    }

    #[derive(Serialize, Deserialize, PartialEq, Debug)]
    struct Wrapped {
        #[serde(with = "decimal")]
        amount: Amount,
    }

    #[test]
    fn decimal_reads_numbers_and_strings() {
        let from_number: Wrapped = serde_json::from_str(r#"{"amount": 42}"#).unwrap();
        let from_string: Wrapped =
            serde_json::from_str(r#"{"amount": "1_000_000_000_000_000_000_000"}"#).unwrap();
        assert_eq!(from_number.amount, 42);
        assert_eq!(from_string.amount, 1_000_000_000_000_000_000_000);
        assert!(serde_json::from_str::<Wrapped>(r#"{"amount": -1}"#).is_err());
    }

    #[test]
    fn decimal_writes_strings() {
        let json = serde_json::to_string(&Wrapped { amount: u128::MAX }).unwrap();
        assert_eq!(json, format!(r#"{{"amount":"{}"}}"#, u128::MAX));
    }
}
