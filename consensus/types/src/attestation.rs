use crate::signature_bytes::{self, SignatureBytes};
use crate::{AttestationData, BitList, MaxValidatorsPerCommittee, Slot};
use serde::{Deserialize, Serialize};
use ssz_derive::{Decode, Encode};
use tree_hash_derive::TreeHash;

#[derive(Debug, PartialEq)]
pub enum Error {
    SszTypesError(ssz_types::Error),
    Signature(signature_bytes::Error),
    /// The two attestations have overlapping signers and cannot be combined.
    SignersNotDisjoint,
    /// The two attestations vote for different data.
    DataMismatch,
}

/// An attestation as broadcast by a validator or included in a block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Encode, Decode, TreeHash)]
pub struct Attestation {
    pub aggregation_bits: BitList<MaxValidatorsPerCommittee>,
    pub data: AttestationData,
    pub signature: SignatureBytes,
}

impl Attestation {
    pub fn slot(&self) -> Slot {
        self.data.slot
    }

    pub fn num_set_bits(&self) -> usize {
        self.aggregation_bits.num_set_bits()
    }

    /// Are the aggregation bitfields of these attestations disjoint?
    pub fn signers_disjoint_from(&self, other: &Self) -> bool {
        self.aggregation_bits
            .intersection(&other.aggregation_bits)
            .is_zero()
    }

    /// Is every signer of `self` also a signer of `other`?
    pub fn signers_subset_of(&self, other: &Self) -> bool {
        self.aggregation_bits.is_subset(&other.aggregation_bits)
    }

    /// Aggregate another attestation into this one.
    ///
    /// The aggregation bitfields must be disjoint and the data must be the same. `self` is left
    /// untouched on error.
    pub fn aggregate(&mut self, other: &Self) -> Result<(), Error> {
        if self.data != other.data {
            return Err(Error::DataMismatch);
        }
        if !self.signers_disjoint_from(other) {
            return Err(Error::SignersNotDisjoint);
        }

        let signature = SignatureBytes::aggregate([&self.signature, &other.signature])
            .map_err(Error::Signature)?;

        self.aggregation_bits = self.aggregation_bits.union(&other.aggregation_bits);
        self.signature = signature;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{attestation_data, signed_attestation};
    use crate::Hash256;

    #[test]
    fn aggregate_disjoint() {
        let data = attestation_data(10, 0, Hash256::repeat_byte(1));
        let mut a = signed_attestation(data.clone(), 8, 0);
        let b = signed_attestation(data, 8, 3);

        a.aggregate(&b).unwrap();

        assert_eq!(a.num_set_bits(), 2);
        assert!(a.aggregation_bits.get(0).unwrap());
        assert!(a.aggregation_bits.get(3).unwrap());
        assert!(b.signers_subset_of(&a));
    }

    #[test]
    fn aggregate_overlapping_fails() {
        let data = attestation_data(10, 0, Hash256::repeat_byte(1));
        let mut a = signed_attestation(data.clone(), 8, 1);
        let b = signed_attestation(data, 8, 1);
        let before = a.clone();

        assert_eq!(a.aggregate(&b), Err(Error::SignersNotDisjoint));
        assert_eq!(a, before);
    }

    #[test]
    fn aggregate_different_data_fails() {
        let mut a = signed_attestation(attestation_data(10, 0, Hash256::repeat_byte(1)), 8, 0);
        let b = signed_attestation(attestation_data(10, 0, Hash256::repeat_byte(2)), 8, 1);

        assert_eq!(a.aggregate(&b), Err(Error::DataMismatch));
    }
}
