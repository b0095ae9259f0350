use super::{Context, Error};
use crate::backend::BeaconBackend;
use crate::validator_set::Role;
use slog::debug;
use slot_clock::SlotClock;
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use types::{Epoch, Slot};

/// A named slot computed from the slot being matched against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotFunction {
    FirstSlotInCurrentEpoch,
    LastSlotInCurrentEpoch,
    FirstSlotInNextEpoch,
    LastSlotInNextEpoch,
    /// The slot itself, if its proposer is an attacker.
    AttackerSlot,
    LastAttackerSlotInCurrentEpoch,
    LastAttackerSlotInNextEpoch,
}

impl SlotFunction {
    pub fn as_str(&self) -> &'static str {
        match self {
            SlotFunction::FirstSlotInCurrentEpoch => "firstSlotInCurrentEpoch",
            SlotFunction::LastSlotInCurrentEpoch => "lastSlotInCurrentEpoch",
            SlotFunction::FirstSlotInNextEpoch => "firstSlotInNextEpoch",
            SlotFunction::LastSlotInNextEpoch => "lastSlotInNextEpoch",
            SlotFunction::AttackerSlot => "attackerSlot",
            SlotFunction::LastAttackerSlotInCurrentEpoch => "lastAttackerSlotInCurrentEpoch",
            SlotFunction::LastAttackerSlotInNextEpoch => "lastAttackerSlotInNextEpoch",
        }
    }
}

impl FromStr for SlotFunction {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "firstSlotInCurrentEpoch" => Ok(SlotFunction::FirstSlotInCurrentEpoch),
            "lastSlotInCurrentEpoch" => Ok(SlotFunction::LastSlotInCurrentEpoch),
            "firstSlotInNextEpoch" => Ok(SlotFunction::FirstSlotInNextEpoch),
            "lastSlotInNextEpoch" => Ok(SlotFunction::LastSlotInNextEpoch),
            "attackerSlot" => Ok(SlotFunction::AttackerSlot),
            "lastAttackerSlotInCurrentEpoch" => Ok(SlotFunction::LastAttackerSlotInCurrentEpoch),
            "lastAttackerSlotInNextEpoch" => Ok(SlotFunction::LastAttackerSlotInNextEpoch),
            other => Err(Error::UnknownSlotFunction(other.to_string())),
        }
    }
}

impl fmt::Display for SlotFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decides whether a rule applies at a given slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotMatcher {
    Literal(Slot),
    /// Re-evaluated on every call, never cached.
    Computed(SlotFunction),
}

impl SlotMatcher {
    pub fn parse(s: &str) -> Result<Self, Error> {
        let s = s.trim();
        if let Ok(n) = s.parse::<i64>() {
            return u64::try_from(n)
                .map(|n| SlotMatcher::Literal(Slot::new(n)))
                .map_err(|_| Error::InvalidSlot(s.to_string()));
        }
        SlotFunction::from_str(s).map(SlotMatcher::Computed)
    }

    pub fn is_computed(&self) -> bool {
        matches!(self, SlotMatcher::Computed(_))
    }

    /// Returns the slot this matcher designates when evaluated at `slot`.
    ///
    /// `None` means there is no such slot, e.g. the epoch has no attacker proposer or the duties
    /// could not be fetched.
    pub fn resolve<T: SlotClock, B: BeaconBackend>(
        &self,
        slot: Slot,
        ctx: &Context<T, B>,
    ) -> Option<Slot> {
        let spe = ctx.spec.slots_per_epoch;
        let epoch = slot.epoch(spe);

        match self {
            SlotMatcher::Literal(n) => Some(*n),
            SlotMatcher::Computed(function) => match function {
                SlotFunction::FirstSlotInCurrentEpoch => Some(epoch.start_slot(spe)),
                SlotFunction::LastSlotInCurrentEpoch => Some(epoch.end_slot(spe)),
                SlotFunction::FirstSlotInNextEpoch => Some((epoch + 1).start_slot(spe)),
                SlotFunction::LastSlotInNextEpoch => Some((epoch + 1).end_slot(spe)),
                SlotFunction::AttackerSlot => {
                    let attacker = attacker_proposal_slots(epoch, slot, ctx)?
                        .into_iter()
                        .any(|s| s == slot);
                    attacker.then_some(slot)
                }
                SlotFunction::LastAttackerSlotInCurrentEpoch => {
                    attacker_proposal_slots(epoch, slot, ctx)?.into_iter().max()
                }
                SlotFunction::LastAttackerSlotInNextEpoch => {
                    attacker_proposal_slots(epoch + 1, slot, ctx)?
                        .into_iter()
                        .max()
                }
            },
        }
    }

    /// Compares the designated slot against `slot`. A computed matcher that designates no slot
    /// compares as `Less`.
    pub fn compare<T: SlotClock, B: BeaconBackend>(
        &self,
        slot: Slot,
        ctx: &Context<T, B>,
    ) -> Ordering {
        match self.resolve(slot, ctx) {
            Some(target) => target.cmp(&slot),
            None => Ordering::Less,
        }
    }

    pub fn matches<T: SlotClock, B: BeaconBackend>(&self, slot: Slot, ctx: &Context<T, B>) -> bool {
        self.compare(slot, ctx) == Ordering::Equal
    }
}

impl fmt::Display for SlotMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SlotMatcher::Literal(slot) => write!(f, "{}", slot),
            SlotMatcher::Computed(function) => function.fmt(f),
        }
    }
}

/// Proposal slots in `epoch` whose proposer resolves to `Attacker` at `current_slot`.
fn attacker_proposal_slots<T: SlotClock, B: BeaconBackend>(
    epoch: Epoch,
    current_slot: Slot,
    ctx: &Context<T, B>,
) -> Option<Vec<Slot>> {
    let duties = match ctx.backend.proposer_duties(epoch) {
        Ok(duties) => duties,
        Err(e) => {
            debug!(
                ctx.log,
                "Unable to read proposer duties";
                "epoch" => %epoch,
                "error" => ?e,
            );
            return None;
        }
    };

    Some(
        duties
            .into_iter()
            .filter(|duty| ctx.role_of(current_slot, duty.validator_index) == Role::Attacker)
            .map(|duty| duty.slot)
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::TestContext;
    use crate::validator_set::AttackerWindow;
    use types::Pubkey;

    #[test]
    fn parse_literals_and_functions() {
        assert_eq!(
            SlotMatcher::parse("64").unwrap(),
            SlotMatcher::Literal(Slot::new(64))
        );
        assert_eq!(
            SlotMatcher::parse(" attackerSlot ").unwrap(),
            SlotMatcher::Computed(SlotFunction::AttackerSlot)
        );
        assert!(matches!(
            SlotMatcher::parse("-1"),
            Err(Error::InvalidSlot(_))
        ));
        assert!(matches!(
            SlotMatcher::parse("firstSlotInEpoch"),
            Err(Error::UnknownSlotFunction(_))
        ));
    }

    #[test]
    fn literal_compare_is_exact() {
        let tester = TestContext::new();
        let ctx = tester.context();
        let matcher = SlotMatcher::Literal(Slot::new(64));

        assert_eq!(matcher.compare(Slot::new(63), &ctx), Ordering::Greater);
        assert_eq!(matcher.compare(Slot::new(64), &ctx), Ordering::Equal);
        assert_eq!(matcher.compare(Slot::new(65), &ctx), Ordering::Less);
        assert!(!matcher.matches(Slot::new(0), &ctx));
    }

    #[test]
    fn epoch_boundaries() {
        let tester = TestContext::new();
        let ctx = tester.context();

        let first = SlotMatcher::Computed(SlotFunction::FirstSlotInCurrentEpoch);
        let last = SlotMatcher::Computed(SlotFunction::LastSlotInCurrentEpoch);
        let next_first = SlotMatcher::Computed(SlotFunction::FirstSlotInNextEpoch);
        let next_last = SlotMatcher::Computed(SlotFunction::LastSlotInNextEpoch);

        assert!(first.matches(Slot::new(32), &ctx));
        assert!(!first.matches(Slot::new(33), &ctx));
        assert!(last.matches(Slot::new(63), &ctx));
        assert_eq!(next_first.resolve(Slot::new(40), &ctx), Some(Slot::new(64)));
        assert_eq!(next_last.resolve(Slot::new(40), &ctx), Some(Slot::new(95)));
        assert!(!next_first.matches(Slot::new(64), &ctx));
    }

    #[test]
    fn attacker_slots_follow_roles() {
        let tester = TestContext::new();
        tester.backend.set_proposer(Slot::new(34), 4);
        tester.backend.set_proposer(Slot::new(40), 5);
        tester.backend.set_proposer(Slot::new(70), 5);
        tester.validators.register_validator(4, Pubkey::from([4; 48]), None);
        tester.validators.register_validator(5, Pubkey::from([5; 48]), None);
        tester.validators.set_windows([(
            5,
            AttackerWindow {
                start: Slot::new(0),
                end: Slot::new(1000),
            },
        )]);
        let ctx = tester.context();

        let attacker = SlotMatcher::Computed(SlotFunction::AttackerSlot);
        assert!(attacker.matches(Slot::new(40), &ctx));
        assert!(!attacker.matches(Slot::new(34), &ctx));
        assert!(!attacker.matches(Slot::new(41), &ctx));

        let last_current = SlotMatcher::Computed(SlotFunction::LastAttackerSlotInCurrentEpoch);
        assert_eq!(last_current.resolve(Slot::new(33), &ctx), Some(Slot::new(40)));

        let last_next = SlotMatcher::Computed(SlotFunction::LastAttackerSlotInNextEpoch);
        assert_eq!(last_next.resolve(Slot::new(33), &ctx), Some(Slot::new(70)));
    }

    #[test]
    fn duty_failure_never_matches() {
        let tester = TestContext::new();
        tester.backend.fail_duties(true);
        let ctx = tester.context();

        let attacker = SlotMatcher::Computed(SlotFunction::AttackerSlot);
        assert_eq!(attacker.resolve(Slot::new(40), &ctx), None);
        assert_eq!(attacker.compare(Slot::new(40), &ctx), Ordering::Less);
    }
}
