//! An in-memory beacon backend and a ready-made context for exercising strategies without a
//! beacon node.

use crate::backend::{BeaconBackend, Error};
use crate::strategy::Context;
use crate::validator_set::ValidatorSet;
use crate::AttackerService;
use eth2::types::{ErrorMessage, ProposerData};
use parking_lot::RwLock;
use slog::Logger;
use slot_clock::{ManualSlotClock, SlotClock};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use types::{ChainSpec, Epoch, Hash256, Pubkey, Slot};

pub type TestService = AttackerService<ManualSlotClock, MockBeaconBackend>;

/// The pubkey the mock backend reports for `validator_index`.
pub fn test_pubkey(validator_index: u64) -> Pubkey {
    Pubkey::from([validator_index as u8; 48])
}

pub struct MockBeaconBackend {
    proposers: RwLock<HashMap<Slot, u64>>,
    block_roots: RwLock<HashMap<Slot, Hash256>>,
    block_number: RwLock<Option<u64>>,
    fail_duties: AtomicBool,
    slots_per_epoch: u64,
}

impl MockBeaconBackend {
    pub fn new(slots_per_epoch: u64) -> Self {
        Self {
            proposers: RwLock::new(HashMap::new()),
            block_roots: RwLock::new(HashMap::new()),
            block_number: RwLock::new(None),
            fail_duties: AtomicBool::new(false),
            slots_per_epoch,
        }
    }

    /// Makes `validator_index` the proposer at `slot`.
    pub fn set_proposer(&self, slot: Slot, validator_index: u64) {
        self.proposers.write().insert(slot, validator_index);
    }

    /// While set, every proposer duties request fails.
    pub fn fail_duties(&self, fail: bool) {
        self.fail_duties.store(fail, Ordering::Relaxed);
    }

    pub fn set_block_root(&self, slot: Slot, root: Hash256) {
        self.block_roots.write().insert(slot, root);
    }

    /// `None` makes the execution node unreachable.
    pub fn set_block_number(&self, block_number: Option<u64>) {
        *self.block_number.write() = block_number;
    }
}

fn unavailable(message: &str) -> eth2::Error {
    eth2::Error::ServerMessage(ErrorMessage {
        code: 503,
        message: message.to_string(),
        stacktraces: vec![],
    })
}

impl BeaconBackend for MockBeaconBackend {
    fn proposer_duties(&self, epoch: Epoch) -> Result<Vec<ProposerData>, Error> {
        if self.fail_duties.load(Ordering::Relaxed) {
            return Err(Error::BeaconNode(unavailable("duties unavailable")));
        }

        let proposers = self.proposers.read();
        Ok(epoch
            .slot_iter(self.slots_per_epoch)
            .filter_map(|slot| {
                proposers.get(&slot).map(|index| ProposerData {
                    pubkey: test_pubkey(*index),
                    validator_index: *index,
                    slot,
                })
            })
            .collect())
    }

    fn block_root_at_slot(&self, slot: Slot) -> Result<Hash256, Error> {
        self.block_roots
            .read()
            .get(&slot)
            .copied()
            .ok_or(Error::RootNotFound(slot))
    }

    fn execution_block_number(&self) -> Result<u64, Error> {
        (*self.block_number.read())
            .ok_or_else(|| Error::ExecutionNode(unavailable("execution node offline")))
    }
}

/// Everything a `Context` borrows, owned in one place.
pub struct TestContext {
    pub spec: ChainSpec,
    pub slot_clock: ManualSlotClock,
    pub backend: MockBeaconBackend,
    pub validators: ValidatorSet,
    pub log: Logger,
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}

impl TestContext {
    /// Mainnet timings with the clock at genesis.
    pub fn new() -> Self {
        Self::with_spec(ChainSpec::mainnet())
    }

    pub fn with_seconds_per_slot(seconds_per_slot: u64) -> Self {
        Self::with_spec(ChainSpec {
            seconds_per_slot,
            ..ChainSpec::mainnet()
        })
    }

    pub fn with_spec(spec: ChainSpec) -> Self {
        Self {
            slot_clock: ManualSlotClock::new(Slot::new(0), Duration::ZERO, spec.slot_duration()),
            backend: MockBeaconBackend::new(spec.slots_per_epoch),
            validators: ValidatorSet::new(),
            log: logging::test_logger(),
            spec,
        }
    }

    pub fn context(&self) -> Context<'_, ManualSlotClock, MockBeaconBackend> {
        Context {
            spec: &self.spec,
            slot_clock: &self.slot_clock,
            backend: &self.backend,
            validators: &self.validators,
            windows: self.validators.windows(),
            log: &self.log,
        }
    }

    pub fn into_service(self) -> TestService {
        AttackerService::new(
            self.spec,
            self.slot_clock,
            Arc::new(self.backend),
            Arc::new(self.validators),
            self.log,
        )
    }
}
