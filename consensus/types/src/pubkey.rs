use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

/// A validator public key as it appears on the hook interface.
///
/// Validator clients are inconsistent about the `0x` prefix and hex case, so keys are normalised
/// to lowercase `0x`-prefixed hex on construction. The bytes themselves are never decompressed.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Pubkey(String);

impl Pubkey {
    pub fn new(raw: &str) -> Self {
        let trimmed = raw.trim();
        let hex = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);
        Self(format!("0x{}", hex.to_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Pubkey {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

impl From<[u8; 48]> for Pubkey {
    fn from(bytes: [u8; 48]) -> Self {
        Self(format!("0x{}", hex::encode(bytes)))
    }
}

impl FromStr for Pubkey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::new(s))
    }
}

impl fmt::Display for Pubkey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl fmt::Debug for Pubkey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Pubkey({})", self.0)
    }
}

impl<'de> Deserialize<'de> for Pubkey {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s: String = Deserialize::deserialize(deserializer)?;
        Ok(Pubkey::new(&s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalises_prefix_and_case() {
        assert_eq!(Pubkey::new("ABcd").as_str(), "0xabcd");
        assert_eq!(Pubkey::new("0xABcd"), Pubkey::new("abcd"));
        assert_eq!(Pubkey::new(" 0Xabcd "), Pubkey::new("0xabcd"));
    }

    #[test]
    fn deserialize_normalises() {
        let key: Pubkey = serde_json::from_str("\"AB01\"").unwrap();
        assert_eq!(key.to_string(), "0xab01");
    }
}
