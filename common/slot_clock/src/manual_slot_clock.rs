use super::SlotClock;
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;
use types::Slot;

/// A clock that only moves when told to. Clones share the same time.
#[derive(Clone)]
pub struct ManualSlotClock {
    genesis_slot: Slot,
    genesis_duration: Duration,
    slot_duration: Duration,
    current_time: Arc<RwLock<Duration>>,
}

impl ManualSlotClock {
    /// Moves the clock to the start of `slot`. Slots before genesis leave the clock unchanged.
    pub fn set_slot(&self, slot: u64) {
        if let Some(start) = self.start_of(Slot::new(slot)) {
            *self.current_time.write() = start;
        }
    }

    pub fn set_current_time(&self, duration: Duration) {
        *self.current_time.write() = duration;
    }

    pub fn advance_time(&self, duration: Duration) {
        let mut current_time = self.current_time.write();
        *current_time = current_time.saturating_add(duration);
    }
}

impl SlotClock for ManualSlotClock {
    fn new(genesis_slot: Slot, genesis_duration: Duration, slot_duration: Duration) -> Self {
        Self {
            genesis_slot,
            genesis_duration,
            slot_duration,
            current_time: Arc::new(RwLock::new(genesis_duration)),
        }
    }

    fn now_duration(&self) -> Option<Duration> {
        Some(*self.current_time.read())
    }

    fn genesis_slot(&self) -> Slot {
        self.genesis_slot
    }

    fn genesis_duration(&self) -> Duration {
        self.genesis_duration
    }

    fn slot_duration(&self) -> Duration {
        self.slot_duration
    }
}
