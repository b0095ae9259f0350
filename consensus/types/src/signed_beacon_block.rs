use crate::{BeaconBlock, Hash256, SignatureBytes, Slot};
use serde::{Deserialize, Serialize};
use ssz_derive::{Decode, Encode};
use tree_hash_derive::TreeHash;

/// A `BeaconBlock` and a signature from its proposer.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, Encode, Decode, TreeHash)]
pub struct SignedBeaconBlock {
    pub message: BeaconBlock,
    pub signature: SignatureBytes,
}

impl SignedBeaconBlock {
    pub fn slot(&self) -> Slot {
        self.message.slot
    }

    pub fn parent_root(&self) -> Hash256 {
        self.message.parent_root
    }

    /// Returns the root of the inner block, which is what the proposer signs over.
    pub fn canonical_root(&self) -> Hash256 {
        self.message.canonical_root()
    }
}
