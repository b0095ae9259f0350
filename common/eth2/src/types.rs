//! This module exposes a superset of the `types` crate. It adds additional types that are only
//! required for the beacon node and execution node HTTP APIs consumed by the attacker service.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
pub use types::*;

/// An API error serializable to JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorMessage {
    pub code: u16,
    pub message: String,
    #[serde(default)]
    pub stacktraces: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenesisData {
    #[serde(with = "serde_utils::quoted_u64")]
    pub genesis_time: u64,
    pub genesis_validators_root: Hash256,
    #[serde(with = "serde_utils::bytes_4_hex")]
    pub genesis_fork_version: [u8; 4],
}

/// The chain parameters the attacker service reads from `config/spec`.
///
/// The beacon node serves many more keys; everything else is ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct ConfigSpecData {
    #[serde(with = "serde_utils::quoted_u64")]
    pub seconds_per_slot: u64,
    #[serde(with = "serde_utils::quoted_u64")]
    pub slots_per_epoch: u64,
    #[serde(default, with = "quoted_u64_opt")]
    pub max_attestations: Option<u64>,
}

impl ConfigSpecData {
    pub fn to_chain_spec(&self) -> ChainSpec {
        let default = ChainSpec::mainnet();
        ChainSpec {
            slots_per_epoch: self.slots_per_epoch,
            seconds_per_slot: self.seconds_per_slot,
            max_attestations: self.max_attestations.unwrap_or(default.max_attestations),
        }
    }
}

mod quoted_u64_opt {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &Option<u64>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(v) => serializer.serialize_str(&v.to_string()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let opt: Option<String> = Option::deserialize(deserializer)?;
        opt.map(|s| s.parse::<u64>().map_err(serde::de::Error::custom))
            .transpose()
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub enum BlockId {
    Head,
    Genesis,
    Finalized,
    Justified,
    Slot(Slot),
    Root(Hash256),
}

impl FromStr for BlockId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "head" => Ok(BlockId::Head),
            "genesis" => Ok(BlockId::Genesis),
            "finalized" => Ok(BlockId::Finalized),
            "justified" => Ok(BlockId::Justified),
            other => {
                if let Some(hex) = other.strip_prefix("0x") {
                    Hash256::from_str(hex)
                        .map(BlockId::Root)
                        .map_err(|e| format!("{} cannot be parsed as a root", e))
                } else {
                    u64::from_str(other)
                        .map(Slot::new)
                        .map(BlockId::Slot)
                        .map_err(|_| format!("{} cannot be parsed as a block id", other))
                }
            }
        }
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockId::Head => write!(f, "head"),
            BlockId::Genesis => write!(f, "genesis"),
            BlockId::Finalized => write!(f, "finalized"),
            BlockId::Justified => write!(f, "justified"),
            BlockId::Slot(slot) => write!(f, "{}", slot),
            BlockId::Root(root) => write!(f, "{:?}", root),
        }
    }
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(bound = "T: Serialize + serde::de::DeserializeOwned")]
pub struct DutiesResponse<T: Serialize + serde::de::DeserializeOwned> {
    pub dependent_root: Hash256,
    pub data: T,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(bound = "T: Serialize + serde::de::DeserializeOwned")]
pub struct GenericResponse<T: Serialize + serde::de::DeserializeOwned> {
    pub data: T,
}

impl<T: Serialize + serde::de::DeserializeOwned> From<T> for GenericResponse<T> {
    fn from(data: T) -> Self {
        Self { data }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RootData {
    pub root: Hash256,
}

impl From<Hash256> for RootData {
    fn from(root: Hash256) -> Self {
        Self { root }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProposerData {
    pub pubkey: Pubkey,
    #[serde(with = "serde_utils::quoted_u64")]
    pub validator_index: u64,
    pub slot: Slot,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttesterData {
    pub pubkey: Pubkey,
    #[serde(with = "serde_utils::quoted_u64")]
    pub validator_index: u64,
    #[serde(with = "serde_utils::quoted_u64")]
    pub committees_at_slot: u64,
    #[serde(with = "serde_utils::quoted_u64")]
    pub committee_index: CommitteeIndex,
    #[serde(with = "serde_utils::quoted_u64")]
    pub committee_length: u64,
    #[serde(with = "serde_utils::quoted_u64")]
    pub validator_committee_index: u64,
    pub slot: Slot,
}

/// Borrowed list of validator indices, serialized as quoted integers.
#[derive(Debug, Clone, Copy)]
pub struct ValidatorIndexDataRef<'a>(pub &'a [u64]);

impl<'a> Serialize for ValidatorIndexDataRef<'a> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeSeq;

        let mut seq = serializer.serialize_seq(Some(self.0.len()))?;
        for index in self.0 {
            seq.serialize_element(&index.to_string())?;
        }
        seq.end()
    }
}

/// A JSON-RPC 2.0 request, as consumed by an execution node.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JsonRequestBody<'a> {
    pub jsonrpc: &'a str,
    pub method: &'a str,
    pub params: serde_json::Value,
    pub id: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct JsonError {
    pub code: i64,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct JsonResponseBody {
    #[serde(default)]
    pub error: Option<JsonError>,
    #[serde(default)]
    pub result: serde_json::Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_id_parses_slots_and_roots() {
        assert_eq!(BlockId::from_str("head").unwrap(), BlockId::Head);
        assert_eq!(
            BlockId::from_str("42").unwrap(),
            BlockId::Slot(Slot::new(42))
        );
        let root = format!("0x{}", "ab".repeat(32));
        assert_eq!(
            BlockId::from_str(&root).unwrap(),
            BlockId::Root(Hash256::repeat_byte(0xab))
        );
        assert!(BlockId::from_str("nope").is_err());
    }

    #[test]
    fn config_spec_ignores_unknown_keys() {
        let json = r#"{
            "CONFIG_NAME": "mainnet",
            "SECONDS_PER_SLOT": "12",
            "SLOTS_PER_EPOCH": "32",
            "MAX_ATTESTATIONS": "128"
        }"#;
        let config: ConfigSpecData = serde_json::from_str(json).unwrap();
        assert_eq!(config.to_chain_spec(), ChainSpec::mainnet());
    }

    #[test]
    fn config_spec_without_max_attestations() {
        let json = r#"{"SECONDS_PER_SLOT": "6", "SLOTS_PER_EPOCH": "8"}"#;
        let config: ConfigSpecData = serde_json::from_str(json).unwrap();
        let spec = config.to_chain_spec();
        assert_eq!(spec.slots_per_epoch, 8);
        assert_eq!(spec.max_attestations, 128);
    }

    #[test]
    fn proposer_duties_decode() {
        let json = format!(
            r#"{{
                "dependent_root": "0x{}",
                "data": [{{"pubkey": "0x{}", "validator_index": "7", "slot": "33"}}]
            }}"#,
            "00".repeat(32),
            "AA".repeat(48)
        );
        let duties: DutiesResponse<Vec<ProposerData>> = serde_json::from_str(&json).unwrap();
        assert_eq!(duties.data[0].validator_index, 7);
        assert_eq!(duties.data[0].slot, Slot::new(33));
        assert_eq!(
            duties.data[0].pubkey.to_string(),
            format!("0x{}", "aa".repeat(48))
        );
    }

    #[test]
    fn indices_are_quoted() {
        let indices = [1u64, 2, 3];
        let json = serde_json::to_string(&ValidatorIndexDataRef(&indices)).unwrap();
        assert_eq!(json, r#"["1","2","3"]"#);
    }
}
