use std::{fmt, str::FromStr};

use ed25519_dalek::VerifyingKey;
use serde::{de::Error as _, Deserialize, Deserializer, Serialize, Serializer};

pub const ACCOUNT_ID_LEN: usize = 32;

/// Opaque 32-byte account identifier.
///
/// The all-zero value is the reserved null account: it is never credited and
/// never granted spending or voting rights.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct AccountId([u8; ACCOUNT_ID_LEN]);

impl AccountId {
    pub const NULL: AccountId = AccountId([0u8; ACCOUNT_ID_LEN]);

    pub const fn from_bytes(bytes: [u8; ACCOUNT_ID_LEN]) -> Self {
        Self(bytes)
    }

    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        let arr: [u8; ACCOUNT_ID_LEN] = bytes.try_into().ok()?;
        Some(Self(arr))
    }

    /// Accounts held by ed25519 keys are addressed by the verifying key bytes.
    pub fn from_verifying_key(key: &VerifyingKey) -> Self {
        Self(key.to_bytes())
    }

    pub fn as_bytes(&self) -> &[u8; ACCOUNT_ID_LEN] {
        &self.0
    }

    pub fn is_null(&self) -> bool {
        self.0.iter().all(|&b| b == 0)
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AccountId({})", hex::encode(&self.0[..4]))
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AccountIdParseError {
    #[error("invalid hex: {0}")]
    Hex(#[from] hex::FromHexError),
    #[error("account id must be 32 bytes, got {0}")]
    Length(usize),
}

impl FromStr for AccountId {
    type Err = AccountIdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let s = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(s)?;
        Self::from_slice(&bytes).ok_or(AccountIdParseError::Length(bytes.len()))
    }
}

impl Serialize for AccountId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&hex::encode(self.0))
    }
}

impl<'de> Deserialize<'de> for AccountId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let encoded = String::deserialize(deserializer)?;
        encoded.parse().map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use ed25519_dalek::SigningKey;

    #[test]
    fn null_account_is_all_zero() {
        assert!(AccountId::NULL.is_null());
        assert!(AccountId::default().is_null());
        assert!(!AccountId::from_bytes([7u8; 32]).is_null());
    }

    #[test]
    fn parses_hex_with_and_without_prefix() {
        let id = AccountId::from_bytes([0xab; 32]);
        let text = id.to_string();
        assert_eq!(text.len(), 64);
        assert_eq!(text.parse::<AccountId>().unwrap(), id);
        assert_eq!(format!("0x{text}").parse::<AccountId>().unwrap(), id);
    }

    #[test]
    fn rejects_wrong_length_and_bad_hex() {
        assert_eq!(
            "abcd".parse::<AccountId>().unwrap_err(),
            AccountIdParseError::Length(2)
        );
        assert!(matches!(
            "zz".parse::<AccountId>().unwrap_err(),
            AccountIdParseError::Hex(_)
        ));
    }

    #[test]
    fn derives_from_verifying_key() {
        let sk = SigningKey::from_bytes(&[9u8; 32]);
        let pk = sk.verifying_key();
        let id = AccountId::from_verifying_key(&pk);
        assert_eq!(id.as_bytes(), pk.as_bytes());
    }

    #[test]
    fn serde_uses_hex_strings() {
        let id = AccountId::from_bytes([1u8; 32]);
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", "01".repeat(32)));
        let back: AccountId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }
}
