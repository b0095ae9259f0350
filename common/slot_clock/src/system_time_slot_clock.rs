use super::SlotClock;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use types::Slot;

/// Reads the present slot from the system clock.
#[derive(Clone)]
pub struct SystemTimeSlotClock {
    genesis_slot: Slot,
    genesis_duration: Duration,
    slot_duration: Duration,
}

impl SlotClock for SystemTimeSlotClock {
    fn new(genesis_slot: Slot, genesis_duration: Duration, slot_duration: Duration) -> Self {
        Self {
            genesis_slot,
            genesis_duration,
            slot_duration,
        }
    }

    fn now_duration(&self) -> Option<Duration> {
        SystemTime::now().duration_since(UNIX_EPOCH).ok()
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

#[cfg(test)]
mod tests {
    use super::*;

    fn genesis_ago(millis: u64) -> Duration {
        SystemTime::now().duration_since(UNIX_EPOCH).unwrap() - Duration::from_millis(millis)
    }

    #[test]
    fn slot_now() {
        let second = Duration::from_secs(1);

        let clock = SystemTimeSlotClock::new(Slot::new(0), genesis_ago(500), second);
        assert_eq!(clock.now(), Some(Slot::new(0)));

        let clock = SystemTimeSlotClock::new(Slot::new(0), genesis_ago(5_000), second);
        assert_eq!(clock.now(), Some(Slot::new(5)));
        assert!(clock.duration_until(Slot::new(6), Duration::ZERO) <= second);
    }

    #[test]
    fn future_genesis() {
        let clock = SystemTimeSlotClock::new(
            Slot::new(0),
            genesis_ago(0) + Duration::from_secs(60),
            Duration::from_secs(12),
        );
        assert_eq!(clock.now(), None);
    }
}
