use crate::{Epoch, MaxAttestations, Slot, Unsigned};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// The subset of chain parameters the attacker service reasons about.
///
/// Slot arithmetic across the service is derived from `slots_per_epoch` so that the same engine
/// can drive both mainnet-style and short-epoch test networks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainSpec {
    #[serde(with = "serde_utils::quoted_u64")]
    pub slots_per_epoch: u64,
    #[serde(with = "serde_utils::quoted_u64")]
    pub seconds_per_slot: u64,
    #[serde(with = "serde_utils::quoted_u64")]
    pub max_attestations: u64,
}

impl ChainSpec {
    pub fn mainnet() -> Self {
        Self {
            slots_per_epoch: 32,
            seconds_per_slot: 12,
            max_attestations: MaxAttestations::to_u64(),
        }
    }

    pub fn minimal() -> Self {
        Self {
            slots_per_epoch: 8,
            seconds_per_slot: 6,
            ..Self::mainnet()
        }
    }

    pub fn slot_duration(&self) -> Duration {
        Duration::from_secs(self.seconds_per_slot)
    }

    pub fn epoch_of(&self, slot: Slot) -> Epoch {
        slot.epoch(self.slots_per_epoch)
    }

    pub fn epoch_start(&self, epoch: Epoch) -> Slot {
        epoch.start_slot(self.slots_per_epoch)
    }

    pub fn epoch_end(&self, epoch: Epoch) -> Slot {
        epoch.end_slot(self.slots_per_epoch)
    }

    /// The maximum number of attestations a block may carry under this spec, bounded by the
    /// SSZ list limit of the block body.
    pub fn max_attestations_per_block(&self) -> usize {
        std::cmp::min(self.max_attestations, MaxAttestations::to_u64()) as usize
    }
}

impl Default for ChainSpec {
    fn default() -> Self {
        Self::mainnet()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn epoch_boundaries() {
        let spec = ChainSpec::mainnet();
        assert_eq!(spec.epoch_of(Slot::new(50)), Epoch::new(1));
        assert_eq!(spec.epoch_start(Epoch::new(1)), Slot::new(32));
        assert_eq!(spec.epoch_end(Epoch::new(1)), Slot::new(63));
    }

    #[test]
    fn max_attestations_is_capped_by_list_limit() {
        let spec = ChainSpec {
            max_attestations: 4096,
            ..ChainSpec::mainnet()
        };
        assert_eq!(spec.max_attestations_per_block(), 128);
    }
}
