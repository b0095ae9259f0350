//! Slot arithmetic over wall-clock time.
//!
//! The attacker service only ever asks two questions of a clock: which slot is it now, and how
//! long until some point inside a future slot. Delay actions answer the second by blocking the
//! hook call, so both clocks here are cheap to clone and safe to read from any thread.

mod manual_slot_clock;
mod system_time_slot_clock;

use std::time::Duration;

pub use crate::manual_slot_clock::ManualSlotClock;
pub use crate::system_time_slot_clock::SystemTimeSlotClock;
pub use types::Slot;

pub trait SlotClock: Send + Sync + Sized + Clone {
    /// Creates a clock whose slot `genesis_slot` starts `genesis_duration` after the UNIX epoch,
    /// with slots `slot_duration` long.
    fn new(genesis_slot: Slot, genesis_duration: Duration, slot_duration: Duration) -> Self;

    /// The present time as a duration since the UNIX epoch.
    fn now_duration(&self) -> Option<Duration>;

    fn genesis_slot(&self) -> Slot;

    fn genesis_duration(&self) -> Duration;

    fn slot_duration(&self) -> Duration;

    /// The slot in progress at `now`, or `None` before genesis.
    fn slot_of(&self, now: Duration) -> Option<Slot> {
        let since_genesis = now.checked_sub(self.genesis_duration())?;
        let slots = since_genesis
            .as_millis()
            .checked_div(self.slot_duration().as_millis())?;
        let slots = u64::try_from(slots).ok()?;
        Some(self.genesis_slot() + slots)
    }

    /// The slot in progress right now.
    fn now(&self) -> Option<Slot> {
        self.slot_of(self.now_duration()?)
    }

    /// When `slot` starts, as a duration since the UNIX epoch.
    fn start_of(&self, slot: Slot) -> Option<Duration> {
        let slots = slot.as_u64().checked_sub(self.genesis_slot().as_u64())?;
        let offset = self
            .slot_duration()
            .checked_mul(u32::try_from(slots).ok()?)?;
        self.genesis_duration().checked_add(offset)
    }

    /// Time left until `offset` past the start of `slot`. Zero once that moment has passed, or if
    /// either end cannot be computed.
    fn duration_until(&self, slot: Slot, offset: Duration) -> Duration {
        self.start_of(slot)
            .and_then(|start| start.checked_add(offset))
            .zip(self.now_duration())
            .and_then(|(target, now)| target.checked_sub(now))
            .unwrap_or(Duration::ZERO)
    }
}
