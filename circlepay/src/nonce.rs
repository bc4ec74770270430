//! Authorization nonces.
//!
//! An EIP-3009 nonce is a one-time 32-byte value, unrelated to the account
//! transaction counter. Clients have historically sent it either as a
//! `0x`-prefixed hex string or as a decimal integer; both are accepted here
//! and normalized to the fixed 32-byte big-endian form the contract ABI takes.

use std::fmt;
use std::str::FromStr;

use alloy_primitives::{B256, U256, hex};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A 32-byte authorization nonce.
///
/// Serialized as the decimal string of its big-endian integer value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct AuthorizationNonce(pub B256);

/// Error returned for a malformed nonce string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid nonce {0:?}: expected 0x-prefixed hex of at most 32 bytes or a decimal integer")]
pub struct NonceFormatError(String);

impl AuthorizationNonce {
    /// Returns the ABI-ready 32-byte form.
    #[must_use]
    pub const fn as_b256(&self) -> B256 {
        self.0
    }

    /// Returns the nonce as a `0x`-prefixed, zero-padded hex string.
    #[must_use]
    pub fn to_hex(&self) -> String {
        self.0.to_string()
    }
}

impl From<B256> for AuthorizationNonce {
    fn from(value: B256) -> Self {
        Self(value)
    }
}

impl From<AuthorizationNonce> for B256 {
    fn from(value: AuthorizationNonce) -> Self {
        value.0
    }
}

impl FromStr for AuthorizationNonce {
    type Err = NonceFormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let err = || NonceFormatError(s.to_owned());
        if let Some(digits) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
            if digits.is_empty() || digits.len() > 64 {
                return Err(err());
            }
            // Odd-length hex is left-padded with a single zero nibble.
            let even = if digits.len() % 2 == 1 {
                format!("0{digits}")
            } else {
                digits.to_owned()
            };
            let bytes = hex::decode(even).map_err(|_| err())?;
            let mut padded = [0u8; 32];
            padded[32 - bytes.len()..].copy_from_slice(&bytes);
            Ok(Self(B256::from(padded)))
        } else {
            if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
                return Err(err());
            }
            let value = U256::from_str_radix(s, 10).map_err(|_| err())?;
            Ok(Self(B256::from(value)))
        }
    }
}

impl fmt::Display for AuthorizationNonce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", U256::from_be_bytes(self.0.0))
    }
}

impl Serialize for AuthorizationNonce {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for AuthorizationNonce {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
