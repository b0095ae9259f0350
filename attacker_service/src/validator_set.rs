//! Concurrent store of known validators, their roles and the signed artifacts they produce.
//!
//! Every hook call may read or write this store, so it is built from sharded maps (`DashMap`)
//! rather than a single lock. Unrelated slots never contend with each other.

use dashmap::DashMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::ops::RangeInclusive;
use std::sync::Arc;
use types::{Attestation, Pubkey, SignedBeaconBlock, Slot};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    Normal,
    Attacker,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidatorRecord {
    pub index: u64,
    pub pubkey: Pubkey,
    pub role: Role,
}

/// An inclusive range of slots during which a validator behaves as an attacker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttackerWindow {
    pub start: Slot,
    pub end: Slot,
}

impl AttackerWindow {
    pub fn contains(&self, slot: Slot) -> bool {
        self.start <= slot && slot <= self.end
    }
}

/// Declared attacker windows by validator index.
pub type Windows = HashMap<u64, Vec<AttackerWindow>>;

pub fn collect_windows(windows: impl IntoIterator<Item = (u64, AttackerWindow)>) -> Windows {
    let mut map = Windows::new();
    for (index, window) in windows {
        map.entry(index).or_default().push(window);
    }
    map
}

#[derive(Default)]
pub struct ValidatorSet {
    validators: DashMap<u64, ValidatorRecord>,
    indices: DashMap<Pubkey, u64>,
    /// Replaced wholesale whenever a strategy is installed.
    windows: RwLock<Arc<Windows>>,
    attestations: DashMap<Slot, HashMap<Pubkey, Attestation>>,
    blocks: DashMap<Slot, HashMap<Pubkey, SignedBeaconBlock>>,
    pool: DashMap<Slot, Vec<Attestation>>,
}

impl ValidatorSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a validator, or refreshes its pubkey if already known.
    ///
    /// An existing role is kept unless `role` is provided.
    pub fn register_validator(&self, index: u64, pubkey: Pubkey, role: Option<Role>) {
        let mut entry = self
            .validators
            .entry(index)
            .or_insert_with(|| ValidatorRecord {
                index,
                pubkey: pubkey.clone(),
                role: Role::Normal,
            });

        if entry.pubkey != pubkey {
            self.indices.remove(&entry.pubkey);
            entry.pubkey = pubkey.clone();
        }
        if let Some(role) = role {
            entry.role = role;
        }
        drop(entry);

        self.indices.insert(pubkey, index);
    }

    /// Returns `false` if the validator is unknown.
    pub fn set_role(&self, index: u64, role: Role) -> bool {
        match self.validators.get_mut(&index) {
            Some(mut record) => {
                record.role = role;
                true
            }
            None => false,
        }
    }

    pub fn get_by_index(&self, index: u64) -> Option<ValidatorRecord> {
        self.validators.get(&index).map(|r| r.value().clone())
    }

    pub fn get_by_pubkey(&self, pubkey: &Pubkey) -> Option<ValidatorRecord> {
        let index = *self.indices.get(pubkey)?;
        self.get_by_index(index)
    }

    pub fn index_of(&self, pubkey: &Pubkey) -> Option<u64> {
        self.indices.get(pubkey).map(|i| *i)
    }

    pub fn num_validators(&self) -> usize {
        self.validators.len()
    }

    /// Replaces every declared attacker window.
    pub fn set_windows(&self, windows: impl IntoIterator<Item = (u64, AttackerWindow)>) {
        self.install_windows(Arc::new(collect_windows(windows)));
    }

    pub fn install_windows(&self, windows: Arc<Windows>) {
        *self.windows.write() = windows;
    }

    /// The windows currently in force.
    pub fn windows(&self) -> Arc<Windows> {
        self.windows.read().clone()
    }

    /// Resolves the role of validator `index` at `slot` against the windows in force.
    pub fn role_of(&self, slot: Slot, index: u64) -> Role {
        self.role_within(&self.windows(), slot, index)
    }

    /// Resolves the role of validator `index` at `slot` against `windows`.
    ///
    /// A validator with declared attacker windows is an attacker only inside one of them. Any
    /// other validator takes the role stored in its record, and unknown validators are normal.
    pub fn role_within(&self, windows: &Windows, slot: Slot, index: u64) -> Role {
        if let Some(windows) = windows.get(&index) {
            return if windows.iter().any(|w| w.contains(slot)) {
                Role::Attacker
            } else {
                Role::Normal
            };
        }

        self.validators
            .get(&index)
            .map(|r| r.role)
            .unwrap_or(Role::Normal)
    }

    /// As `role_of`, returning `None` for a pubkey that has never been registered.
    pub fn role_of_pubkey(&self, slot: Slot, pubkey: &Pubkey) -> Option<Role> {
        self.index_of(pubkey).map(|index| self.role_of(slot, index))
    }

    /// Writes the window-derived role of every windowed validator into its record.
    ///
    /// Returns the number of records whose role changed.
    pub fn update_roles(&self, slot: Slot) -> usize {
        let windows = self.windows();
        let mut changed = 0;
        for index in windows.keys() {
            let role = self.role_within(&windows, slot, *index);
            if let Some(mut record) = self.validators.get_mut(index) {
                if record.role != role {
                    record.role = role;
                    changed += 1;
                }
            }
        }
        changed
    }

    pub fn record_attestation(&self, slot: Slot, pubkey: Pubkey, attestation: Attestation) {
        self.attestations
            .entry(slot)
            .or_default()
            .insert(pubkey, attestation);
    }

    pub fn record_block(&self, slot: Slot, pubkey: Pubkey, block: SignedBeaconBlock) {
        self.blocks.entry(slot).or_default().insert(pubkey, block);
    }

    pub fn attestations_at(&self, slot: Slot) -> HashMap<Pubkey, Attestation> {
        self.attestations
            .get(&slot)
            .map(|set| set.value().clone())
            .unwrap_or_default()
    }

    pub fn blocks_at(&self, slot: Slot) -> HashMap<Pubkey, SignedBeaconBlock> {
        self.blocks
            .get(&slot)
            .map(|set| set.value().clone())
            .unwrap_or_default()
    }

    pub fn add_to_pool(&self, slot: Slot, attestation: Attestation) {
        self.pool.entry(slot).or_default().push(attestation);
    }

    pub fn pool_len(&self) -> usize {
        self.pool.iter().map(|entry| entry.value().len()).sum()
    }

    /// Empties the whole pool, returning the attestations staged at slots within `range`.
    ///
    /// Attestations outside `range` are discarded.
    pub fn drain_pool(&self, range: RangeInclusive<Slot>) -> Vec<Attestation> {
        let slots: Vec<Slot> = self.pool.iter().map(|entry| *entry.key()).collect();

        let mut drained = vec![];
        for slot in slots {
            if let Some((slot, attestations)) = self.pool.remove(&slot) {
                if range.contains(&slot) {
                    drained.extend(attestations);
                }
            }
        }
        drained
    }

    /// Drops cached attestations, blocks and pooled attestations from slots before `slot`.
    pub fn prune(&self, slot: Slot) {
        self.attestations.retain(|s, _| *s >= slot);
        self.blocks.retain(|s, _| *s >= slot);
        self.pool.retain(|s, _| *s >= slot);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use types::test_utils::{attestation_data, signed_attestation};
    use types::Hash256;

    fn pubkey(byte: u8) -> Pubkey {
        Pubkey::from([byte; 48])
    }

    #[test]
    fn windowed_role_resolution() {
        let set = ValidatorSet::new();
        set.register_validator(7, pubkey(7), None);
        set.set_windows([(
            7,
            AttackerWindow {
                start: Slot::new(100),
                end: Slot::new(200),
            },
        )]);

        assert_eq!(set.role_of(Slot::new(99), 7), Role::Normal);
        assert_eq!(set.role_of(Slot::new(100), 7), Role::Attacker);
        assert_eq!(set.role_of(Slot::new(150), 7), Role::Attacker);
        assert_eq!(set.role_of(Slot::new(200), 7), Role::Attacker);
        assert_eq!(set.role_of(Slot::new(201), 7), Role::Normal);
    }

    #[test]
    fn window_overrides_stored_role() {
        let set = ValidatorSet::new();
        set.register_validator(1, pubkey(1), Some(Role::Attacker));
        assert_eq!(set.role_of(Slot::new(5), 1), Role::Attacker);

        set.set_windows([(
            1,
            AttackerWindow {
                start: Slot::new(10),
                end: Slot::new(20),
            },
        )]);
        assert_eq!(set.role_of(Slot::new(5), 1), Role::Normal);
    }

    #[test]
    fn update_roles_is_idempotent() {
        let set = ValidatorSet::new();
        set.register_validator(3, pubkey(3), None);
        set.set_windows([(
            3,
            AttackerWindow {
                start: Slot::new(0),
                end: Slot::new(10),
            },
        )]);

        assert_eq!(set.update_roles(Slot::new(4)), 1);
        assert_eq!(set.update_roles(Slot::new(4)), 0);
        assert_eq!(set.get_by_index(3).unwrap().role, Role::Attacker);

        assert_eq!(set.update_roles(Slot::new(11)), 1);
        assert_eq!(set.get_by_index(3).unwrap().role, Role::Normal);
    }

    #[test]
    fn pubkey_change_updates_index() {
        let set = ValidatorSet::new();
        set.register_validator(2, pubkey(2), None);
        set.register_validator(2, pubkey(9), None);
        assert_eq!(set.index_of(&pubkey(2)), None);
        assert_eq!(set.index_of(&pubkey(9)), Some(2));
        assert_eq!(set.role_of_pubkey(Slot::new(0), &pubkey(4)), None);
    }

    #[test]
    fn attestation_cache_is_last_write_wins() {
        let set = ValidatorSet::new();
        let first = signed_attestation(attestation_data(10, 0, Hash256::repeat_byte(1)), 4, 0);
        let second = signed_attestation(attestation_data(10, 0, Hash256::repeat_byte(2)), 4, 0);

        set.record_attestation(Slot::new(10), pubkey(1), first);
        set.record_attestation(Slot::new(10), pubkey(1), second.clone());

        let at_slot = set.attestations_at(Slot::new(10));
        assert_eq!(at_slot.len(), 1);
        assert_eq!(at_slot[&pubkey(1)], second);
        assert!(set.attestations_at(Slot::new(11)).is_empty());
    }

    #[test]
    fn drain_pool_empties_everything() {
        let set = ValidatorSet::new();
        let att = signed_attestation(attestation_data(5, 0, Hash256::zero()), 4, 1);
        set.add_to_pool(Slot::new(5), att.clone());
        set.add_to_pool(Slot::new(6), att.clone());
        set.add_to_pool(Slot::new(100), att);

        let drained = set.drain_pool(Slot::new(0)..=Slot::new(10));
        assert_eq!(drained.len(), 2);
        assert_eq!(set.pool_len(), 0);
    }

    #[test]
    fn concurrent_records_and_pool_drains() {
        const THREADS: u64 = 8;
        const SLOTS: u64 = 16;

        let set = ValidatorSet::new();
        let attestation = |slot: u64, thread: u64| {
            signed_attestation(attestation_data(slot, thread, Hash256::zero()), 8, 0)
        };
        let full_range = Slot::new(0)..=Slot::new(SLOTS);

        let drained_while_running = std::thread::scope(|scope| {
            for thread in 0..THREADS {
                let set = &set;
                scope.spawn(move || {
                    for slot in 0..SLOTS {
                        let att = attestation(slot, thread);
                        set.record_attestation(
                            Slot::new(slot),
                            pubkey(thread as u8),
                            att.clone(),
                        );
                        set.add_to_pool(Slot::new(slot), att);
                    }
                });
            }

            let drainer = scope.spawn(|| {
                let mut drained = vec![];
                for _ in 0..64 {
                    drained.extend(set.drain_pool(full_range.clone()));
                    std::thread::yield_now();
                }
                drained
            });
            drainer.join().unwrap()
        });

        let mut drained = drained_while_running;
        drained.extend(set.drain_pool(full_range));
        assert_eq!(set.pool_len(), 0);

        let unique: std::collections::HashSet<(Slot, u64)> = drained
            .iter()
            .map(|att| (att.data.slot, att.data.index))
            .collect();
        assert_eq!(drained.len() as u64, THREADS * SLOTS);
        assert_eq!(unique.len() as u64, THREADS * SLOTS);

        for slot in 0..SLOTS {
            let at_slot = set.attestations_at(Slot::new(slot));
            assert_eq!(at_slot.len() as u64, THREADS);
            for thread in 0..THREADS {
                assert_eq!(at_slot[&pubkey(thread as u8)], attestation(slot, thread));
            }
        }
    }

    #[test]
    fn prune_drops_old_slots() {
        let set = ValidatorSet::new();
        let att = signed_attestation(attestation_data(5, 0, Hash256::zero()), 4, 1);
        set.record_attestation(Slot::new(5), pubkey(1), att.clone());
        set.record_attestation(Slot::new(50), pubkey(1), att);
        set.prune(Slot::new(32));
        assert!(set.attestations_at(Slot::new(5)).is_empty());
        assert_eq!(set.attestations_at(Slot::new(50)).len(), 1);
    }
}
