use blst::min_pk::{AggregateSignature, Signature};
use blst::BLST_ERROR;
use serde::de::{Deserialize, Deserializer, Error as _};
use serde::ser::{Serialize, Serializer};
use ssz::{Decode, DecodeError, Encode};
use std::fmt;
use tree_hash::{PackedEncoding, TreeHash, TreeHashType};

pub const SIGNATURE_BYTES_LEN: usize = 96;

/// The compressed point at infinity, which is the signature of an empty set of signers.
pub const INFINITY_SIGNATURE: [u8; SIGNATURE_BYTES_LEN] = {
    let mut bytes = [0; SIGNATURE_BYTES_LEN];
    bytes[0] = 0xc0;
    bytes
};

#[derive(Debug, PartialEq)]
pub enum Error {
    /// The bytes could not be decompressed into a BLS point.
    InvalidSignature(BLST_ERROR),
    /// Aggregation of the decompressed points failed.
    AggregationFailed(BLST_ERROR),
    /// Aggregation was requested over an empty set.
    NoSignatures,
}

/// A compressed BLS signature.
///
/// The bytes are not validated on decode; a signature is only decompressed when it takes part in
/// aggregation. This lets the service pass through (and re-encode) signatures it has no reason to
/// inspect.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct SignatureBytes([u8; SIGNATURE_BYTES_LEN]);

impl SignatureBytes {
    pub fn empty() -> Self {
        Self(INFINITY_SIGNATURE)
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Self, DecodeError> {
        if bytes.len() != SIGNATURE_BYTES_LEN {
            return Err(DecodeError::InvalidByteLength {
                len: bytes.len(),
                expected: SIGNATURE_BYTES_LEN,
            });
        }

        let mut array = [0; SIGNATURE_BYTES_LEN];
        array.copy_from_slice(bytes);
        Ok(Self(array))
    }

    pub fn serialize(&self) -> [u8; SIGNATURE_BYTES_LEN] {
        self.0
    }

    pub fn is_infinity(&self) -> bool {
        self.0 == INFINITY_SIGNATURE
    }

    fn decompress(&self) -> Result<Signature, Error> {
        Signature::from_bytes(&self.0).map_err(Error::InvalidSignature)
    }

    /// Aggregates `signatures` into a single compressed signature.
    pub fn aggregate<'a>(
        signatures: impl IntoIterator<Item = &'a SignatureBytes>,
    ) -> Result<SignatureBytes, Error> {
        let points = signatures
            .into_iter()
            .map(SignatureBytes::decompress)
            .collect::<Result<Vec<_>, _>>()?;

        if points.is_empty() {
            return Err(Error::NoSignatures);
        }

        let refs = points.iter().collect::<Vec<_>>();
        let aggregate =
            AggregateSignature::aggregate(&refs, false).map_err(Error::AggregationFailed)?;

        Ok(Self(aggregate.to_signature().compress()))
    }
}

impl Default for SignatureBytes {
    fn default() -> Self {
        Self::empty()
    }
}

impl From<[u8; SIGNATURE_BYTES_LEN]> for SignatureBytes {
    fn from(bytes: [u8; SIGNATURE_BYTES_LEN]) -> Self {
        Self(bytes)
    }
}

impl fmt::Display for SignatureBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", serde_utils::hex::encode(self.0))
    }
}

impl fmt::Debug for SignatureBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SignatureBytes({})", self)
    }
}

impl Serialize for SignatureBytes {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for SignatureBytes {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s: String = Deserialize::deserialize(deserializer)?;
        let bytes = serde_utils::hex::decode(&s).map_err(D::Error::custom)?;
        SignatureBytes::deserialize(&bytes)
            .map_err(|e| D::Error::custom(format!("invalid signature bytes: {:?}", e)))
    }
}

impl Encode for SignatureBytes {
    fn is_ssz_fixed_len() -> bool {
        true
    }

    fn ssz_fixed_len() -> usize {
        SIGNATURE_BYTES_LEN
    }

    fn ssz_bytes_len(&self) -> usize {
        SIGNATURE_BYTES_LEN
    }

    fn ssz_append(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&self.0)
    }
}

impl Decode for SignatureBytes {
    fn is_ssz_fixed_len() -> bool {
        true
    }

    fn ssz_fixed_len() -> usize {
        SIGNATURE_BYTES_LEN
    }

    fn from_ssz_bytes(bytes: &[u8]) -> Result<Self, DecodeError> {
        SignatureBytes::deserialize(bytes)
    }
}

impl TreeHash for SignatureBytes {
    fn tree_hash_type() -> TreeHashType {
        TreeHashType::Vector
    }

    fn tree_hash_packed_encoding(&self) -> PackedEncoding {
        unreachable!("Vector should never be packed.")
    }

    fn tree_hash_packing_factor() -> usize {
        unreachable!("Vector should never be packed.")
    }

    fn tree_hash_root(&self) -> tree_hash::Hash256 {
        tree_hash::merkle_root(&self.0, 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{secret_key, sign};
    use crate::Hash256;

    #[test]
    fn ssz_rejects_short_input() {
        assert_eq!(
            SignatureBytes::from_ssz_bytes(&[0; 95]),
            Err(DecodeError::InvalidByteLength {
                len: 95,
                expected: SIGNATURE_BYTES_LEN
            })
        );
    }

    #[test]
    fn aggregate_matches_blst() {
        let message = Hash256::repeat_byte(7);
        let a = sign(&secret_key(1), message);
        let b = sign(&secret_key(2), message);

        let aggregate = SignatureBytes::aggregate([&a, &b]).unwrap();
        let reversed = SignatureBytes::aggregate([&b, &a]).unwrap();

        assert_eq!(aggregate, reversed);
        assert_ne!(aggregate, a);
        assert_ne!(aggregate, b);
    }

    #[test]
    fn aggregate_rejects_garbage() {
        let garbage = SignatureBytes::from([0xff; SIGNATURE_BYTES_LEN]);
        assert!(matches!(
            SignatureBytes::aggregate([&garbage]),
            Err(Error::InvalidSignature(_))
        ));
        assert_eq!(
            SignatureBytes::aggregate(std::iter::empty()),
            Err(Error::NoSignatures)
        );
    }

    #[test]
    fn serde_hex() {
        let signature = SignatureBytes::empty();
        let json = serde_json::to_string(&signature).unwrap();
        assert!(json.starts_with("\"0xc000"));
        assert_eq!(
            serde_json::from_str::<SignatureBytes>(&json).unwrap(),
            signature
        );
    }
}
