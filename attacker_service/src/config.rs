use sensitive_url::SensitiveUrl;
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;

pub const DEFAULT_HTTP_PORT: u16 = 10000;
pub const DEFAULT_MAX_VALIDATOR_INDEX: u64 = 63;
/// Seconds between feedback polls.
pub const DEFAULT_FEEDBACK_INTERVAL: u64 = 10;

/// Stores the core configuration for the attacker service.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub http_address: IpAddr,
    pub http_port: u16,
    /// Required to start the service; a config file or the CLI must provide it.
    pub beacon_node: Option<SensitiveUrl>,
    /// Only read by the attestation-modify endpoint.
    pub execution_node: Option<SensitiveUrl>,
    /// A strategy document installed before the HTTP server starts.
    pub strategy_file: Option<PathBuf>,
    pub max_validator_index: u64,
    /// `None` retains cached blocks, attestations and duties forever.
    pub cache_retention_epochs: Option<u64>,
    /// Seconds.
    pub feedback_interval: u64,
    pub allow_origin: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http_address: IpAddr::V4(Ipv4Addr::LOCALHOST),
            http_port: DEFAULT_HTTP_PORT,
            beacon_node: None,
            execution_node: None,
            strategy_file: None,
            max_validator_index: DEFAULT_MAX_VALIDATOR_INDEX,
            cache_retention_epochs: None,
            feedback_interval: DEFAULT_FEEDBACK_INTERVAL,
            allow_origin: None,
        }
    }
}
