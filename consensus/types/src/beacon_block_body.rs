use crate::{Attestation, Eth1Data, Graffiti, MaxAttestations, SignatureBytes, VariableList};
use serde::{Deserialize, Serialize};
use ssz_derive::{Decode, Encode};
use tree_hash_derive::TreeHash;

/// The body of a `BeaconBlock`, restricted to the fields the attacker service reads or rewrites.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, Encode, Decode, TreeHash)]
pub struct BeaconBlockBody {
    pub randao_reveal: SignatureBytes,
    pub eth1_data: Eth1Data,
    pub graffiti: Graffiti,
    pub attestations: VariableList<Attestation, MaxAttestations>,
}
