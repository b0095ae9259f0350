//! The `Slot` and `Epoch` types are defined as new types over u64 to enforce type-safety between
//! the two types.
//!
//! `Slot` and `Epoch` have implementations which permit conversion, comparison and math operations
//! between each and `u64`, however specifically not between each other.
//!
//! All math operations on `Slot` and `Epoch` are saturating, they never wrap.
//!
//! It would be easy to define `PartialOrd` and other traits generically across all types which
//! implement `Into<u64>`, however this would allow operations between `Slots` and `Epochs` which
//! may lead to programming errors which are not detected by the compiler.

use serde::{Deserialize, Serialize};
use ssz::{Decode, DecodeError, Encode};
use std::fmt;
use std::iter::Iterator;
use std::ops::{Add, AddAssign, Sub, SubAssign};
use std::str::FromStr;
use tree_hash::{PackedEncoding, TreeHash, TreeHashType};

#[derive(Clone, Copy, Default, Eq, Hash, PartialEq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Slot(#[serde(with = "serde_utils::quoted_u64")] u64);

#[derive(Clone, Copy, Default, Eq, Hash, PartialEq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Epoch(#[serde(with = "serde_utils::quoted_u64")] u64);

macro_rules! impl_common {
    ($type: ident) => {
        impl $type {
            pub const fn new(value: u64) -> $type {
                $type(value)
            }

            pub fn max_value() -> $type {
                $type(u64::MAX)
            }

            pub fn as_u64(&self) -> u64 {
                self.0
            }

            pub fn as_usize(&self) -> usize {
                self.0 as usize
            }

            pub fn saturating_add<T: Into<u64>>(&self, other: T) -> $type {
                $type(self.0.saturating_add(other.into()))
            }

            pub fn saturating_sub<T: Into<u64>>(&self, other: T) -> $type {
                $type(self.0.saturating_sub(other.into()))
            }
        }

        impl From<u64> for $type {
            fn from(value: u64) -> $type {
                $type(value)
            }
        }

        impl From<$type> for u64 {
            fn from(value: $type) -> u64 {
                value.0
            }
        }

        impl Add<u64> for $type {
            type Output = $type;

            fn add(self, other: u64) -> $type {
                self.saturating_add(other)
            }
        }

        impl AddAssign<u64> for $type {
            fn add_assign(&mut self, other: u64) {
                *self = self.saturating_add(other);
            }
        }

        impl Sub<u64> for $type {
            type Output = $type;

            fn sub(self, other: u64) -> $type {
                self.saturating_sub(other)
            }
        }

        impl SubAssign<u64> for $type {
            fn sub_assign(&mut self, other: u64) {
                *self = self.saturating_sub(other);
            }
        }

        impl PartialEq<u64> for $type {
            fn eq(&self, other: &u64) -> bool {
                self.0 == *other
            }
        }

        impl PartialOrd<u64> for $type {
            fn partial_cmp(&self, other: &u64) -> Option<std::cmp::Ordering> {
                self.0.partial_cmp(other)
            }
        }

        impl fmt::Display for $type {
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl fmt::Debug for $type {
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                write!(f, "{}({})", stringify!($type), self.0)
            }
        }

        impl FromStr for $type {
            type Err = std::num::ParseIntError;

            fn from_str(s: &str) -> Result<$type, Self::Err> {
                u64::from_str(s).map($type)
            }
        }

        impl Encode for $type {
            fn is_ssz_fixed_len() -> bool {
                <u64 as Encode>::is_ssz_fixed_len()
            }

            fn ssz_fixed_len() -> usize {
                <u64 as Encode>::ssz_fixed_len()
            }

            fn ssz_bytes_len(&self) -> usize {
                self.0.ssz_bytes_len()
            }

            fn ssz_append(&self, buf: &mut Vec<u8>) {
                self.0.ssz_append(buf)
            }
        }

        impl Decode for $type {
            fn is_ssz_fixed_len() -> bool {
                <u64 as Decode>::is_ssz_fixed_len()
            }

            fn ssz_fixed_len() -> usize {
                <u64 as Decode>::ssz_fixed_len()
            }

            fn from_ssz_bytes(bytes: &[u8]) -> Result<Self, DecodeError> {
                u64::from_ssz_bytes(bytes).map($type)
            }
        }

        impl TreeHash for $type {
            fn tree_hash_type() -> TreeHashType {
                u64::tree_hash_type()
            }

            fn tree_hash_packed_encoding(&self) -> PackedEncoding {
                self.0.tree_hash_packed_encoding()
            }

            fn tree_hash_packing_factor() -> usize {
                u64::tree_hash_packing_factor()
            }

            fn tree_hash_root(&self) -> tree_hash::Hash256 {
                self.0.tree_hash_root()
            }
        }
    };
}

impl_common!(Slot);
impl_common!(Epoch);

impl Slot {
    pub fn epoch(self, slots_per_epoch: u64) -> Epoch {
        Epoch::new(self.0 / slots_per_epoch.max(1))
    }
}

impl Epoch {
    /// The first slot in the epoch.
    pub fn start_slot(self, slots_per_epoch: u64) -> Slot {
        Slot::new(self.0.saturating_mul(slots_per_epoch))
    }

    /// The last slot in the epoch.
    pub fn end_slot(self, slots_per_epoch: u64) -> Slot {
        Slot::new(
            self.0
                .saturating_add(1)
                .saturating_mul(slots_per_epoch)
                .saturating_sub(1),
        )
    }

    /// Position of some slot inside an epoch, if any.
    pub fn position(self, slot: Slot, slots_per_epoch: u64) -> Option<usize> {
        let start = self.start_slot(slots_per_epoch);
        let end = self.end_slot(slots_per_epoch);

        if slot >= start && slot <= end {
            slot.as_usize().checked_sub(start.as_usize())
        } else {
            None
        }
    }

    pub fn slot_iter(&self, slots_per_epoch: u64) -> SlotIter {
        SlotIter {
            current_iteration: 0,
            epoch: self,
            slots_per_epoch,
        }
    }
}

pub struct SlotIter<'a> {
    current_iteration: u64,
    epoch: &'a Epoch,
    slots_per_epoch: u64,
}

impl<'a> Iterator for SlotIter<'a> {
    type Item = Slot;

    fn next(&mut self) -> Option<Slot> {
        if self.current_iteration >= self.slots_per_epoch {
            None
        } else {
            let start_slot = self.epoch.start_slot(self.slots_per_epoch);
            let previous = self.current_iteration;
            self.current_iteration = self.current_iteration.checked_add(1)?;
            start_slot.as_u64().checked_add(previous).map(Slot::new)
        }
    }
}
