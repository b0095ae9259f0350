//! Helpers for producing real BLS signatures in tests.

use crate::{
    Attestation, AttestationData, BitList, Checkpoint, Epoch, Hash256, SignatureBytes, Slot,
};
use blst::min_pk::SecretKey;
use tree_hash::TreeHash;

pub const DST: &[u8] = b"BLS_SIG_BLS12381G2_XMD:SHA-256_SSWU_RO_POP_";

/// Deterministic secret key for validator `index`.
pub fn secret_key(index: u64) -> SecretKey {
    let mut ikm = [0u8; 32];
    ikm[..8].copy_from_slice(&index.to_le_bytes());
    ikm[31] = 1;
    SecretKey::key_gen(&ikm, &[]).expect("ikm is 32 bytes")
}

pub fn sign(secret_key: &SecretKey, message: Hash256) -> SignatureBytes {
    SignatureBytes::from(secret_key.sign(message.as_bytes(), DST, &[]).compress())
}

pub fn attestation_data(slot: u64, index: u64, block_root: Hash256) -> AttestationData {
    AttestationData {
        slot: Slot::new(slot),
        index,
        beacon_block_root: block_root,
        source: Checkpoint {
            epoch: Epoch::new(0),
            root: Hash256::zero(),
        },
        target: Checkpoint {
            epoch: Epoch::new(slot / 32),
            root: block_root,
        },
    }
}

/// An unaggregated attestation signed by the committee member at `position`.
pub fn signed_attestation(
    data: AttestationData,
    committee_len: usize,
    position: usize,
) -> Attestation {
    let mut aggregation_bits =
        BitList::with_capacity(committee_len).expect("committee_len within bounds");
    aggregation_bits
        .set(position, true)
        .expect("position within committee");
    let signature = sign(&secret_key(position as u64), data.tree_hash_root());

    Attestation {
        aggregation_bits,
        data,
        signature,
    }
}
