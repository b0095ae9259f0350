//! The fixed set of lifecycle points at which a validator client defers to the attacker service.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The protocol object carried by a hook call, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadKind {
    None,
    BeaconBlock,
    SignedBeaconBlock,
    AttestationData,
    Attestation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum HookName {
    BlockDelayForBroadCast,
    BlockDelayForReceiveBlock,
    BlockBeforeBroadCast,
    BlockAfterBroadCast,
    BlockBeforeSign,
    BlockAfterSign,
    BlockBeforePropose,
    BlockAfterPropose,
    AttestBeforeBroadCast,
    AttestAfterBroadCast,
    AttestBeforeSign,
    AttestAfterSign,
    AttestBeforePropose,
    AttestAfterPropose,
}

impl HookName {
    pub const ALL: [HookName; 14] = [
        HookName::BlockDelayForBroadCast,
        HookName::BlockDelayForReceiveBlock,
        HookName::BlockBeforeBroadCast,
        HookName::BlockAfterBroadCast,
        HookName::BlockBeforeSign,
        HookName::BlockAfterSign,
        HookName::BlockBeforePropose,
        HookName::BlockAfterPropose,
        HookName::AttestBeforeBroadCast,
        HookName::AttestAfterBroadCast,
        HookName::AttestBeforeSign,
        HookName::AttestAfterSign,
        HookName::AttestBeforePropose,
        HookName::AttestAfterPropose,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            HookName::BlockDelayForBroadCast => "BlockDelayForBroadCast",
            HookName::BlockDelayForReceiveBlock => "BlockDelayForReceiveBlock",
            HookName::BlockBeforeBroadCast => "BlockBeforeBroadCast",
            HookName::BlockAfterBroadCast => "BlockAfterBroadCast",
            HookName::BlockBeforeSign => "BlockBeforeSign",
            HookName::BlockAfterSign => "BlockAfterSign",
            HookName::BlockBeforePropose => "BlockBeforePropose",
            HookName::BlockAfterPropose => "BlockAfterPropose",
            HookName::AttestBeforeBroadCast => "AttestBeforeBroadCast",
            HookName::AttestAfterBroadCast => "AttestAfterBroadCast",
            HookName::AttestBeforeSign => "AttestBeforeSign",
            HookName::AttestAfterSign => "AttestAfterSign",
            HookName::AttestBeforePropose => "AttestBeforePropose",
            HookName::AttestAfterPropose => "AttestAfterPropose",
        }
    }

    /// The type of payload a validator client sends with this hook.
    pub fn payload_kind(&self) -> PayloadKind {
        match self {
            HookName::BlockDelayForBroadCast
            | HookName::BlockDelayForReceiveBlock
            | HookName::BlockBeforeBroadCast
            | HookName::BlockAfterBroadCast
            | HookName::AttestBeforeBroadCast
            | HookName::AttestAfterBroadCast => PayloadKind::None,
            HookName::BlockBeforeSign => PayloadKind::BeaconBlock,
            HookName::BlockAfterSign
            | HookName::BlockBeforePropose
            | HookName::BlockAfterPropose => PayloadKind::SignedBeaconBlock,
            HookName::AttestBeforeSign => PayloadKind::AttestationData,
            HookName::AttestAfterSign
            | HookName::AttestBeforePropose
            | HookName::AttestAfterPropose => PayloadKind::Attestation,
        }
    }
}

impl FromStr for HookName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        HookName::ALL
            .iter()
            .copied()
            .find(|hook| hook.as_str() == s)
            .ok_or_else(|| format!("unknown hook name: {}", s))
    }
}

impl fmt::Display for HookName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
