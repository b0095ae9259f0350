//! Ethereum consensus types used by the attacker service.
//!
//! Only the containers that cross the hook boundary are modelled here: blocks, attestations and
//! the few primitives they are built from. All containers are SSZ-encodable and
//! tree-hashable so that payloads received from validator clients can be decoded, inspected,
//! mutated and re-encoded without loss.

// Required for big type-level numbers
#![recursion_limit = "128"]

pub mod attestation;
pub mod attestation_data;
pub mod beacon_block;
pub mod beacon_block_body;
pub mod chain_spec;
pub mod checkpoint;
pub mod eth1_data;
pub mod pubkey;
pub mod signature_bytes;
pub mod signed_beacon_block;
pub mod slot_epoch;
pub mod test_utils;

pub use crate::attestation::{Attestation, Error as AttestationError};
pub use crate::attestation_data::AttestationData;
pub use crate::beacon_block::BeaconBlock;
pub use crate::beacon_block_body::BeaconBlockBody;
pub use crate::chain_spec::ChainSpec;
pub use crate::checkpoint::Checkpoint;
pub use crate::eth1_data::Eth1Data;
pub use crate::pubkey::Pubkey;
pub use crate::signature_bytes::{SignatureBytes, SIGNATURE_BYTES_LEN};
pub use crate::signed_beacon_block::SignedBeaconBlock;
pub use crate::slot_epoch::{Epoch, Slot};

pub use ssz_types::{typenum, typenum::Unsigned, BitList, VariableList};

pub type Hash256 = ethereum_types::H256;
pub type Graffiti = Hash256;
pub type CommitteeIndex = u64;

/// Maximum number of validators in a single committee, bounding `aggregation_bits`.
pub type MaxValidatorsPerCommittee = typenum::U2048;
/// Maximum number of attestations carried by a single block body.
pub type MaxAttestations = typenum::U128;
