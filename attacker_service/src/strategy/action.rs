use super::packing::pack_attestations;
use super::{Context, Error};
use crate::backend::BeaconBackend;
use crate::validator_set::Role;
use rand::Rng;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use slog::{debug, info, warn};
use slot_clock::SlotClock;
use std::fmt;
use std::time::Duration;
use types::{
    Attestation, AttestationData, BeaconBlock, ChainSpec, Epoch, Hash256, Pubkey,
    SignedBeaconBlock, Slot, VariableList,
};

/// Upper bound (exclusive) of the random delay used when a delay action omits its parameter.
pub const DEFAULT_RANDOM_DELAY_BOUND: u64 = 10;

/// The instruction returned to the validator client with every hook response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    /// Carry on as normal.
    Null,
    Continue,
    Return,
    Abort,
    Skip,
    Exit,
}

impl Command {
    pub fn as_u8(&self) -> u8 {
        match self {
            Command::Null => 0,
            Command::Continue => 1,
            Command::Return => 2,
            Command::Abort => 3,
            Command::Skip => 4,
            Command::Exit => 7,
        }
    }

    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Command::Null),
            1 => Some(Command::Continue),
            2 => Some(Command::Return),
            3 => Some(Command::Abort),
            4 => Some(Command::Skip),
            7 => Some(Command::Exit),
            _ => None,
        }
    }
}

impl Serialize for Command {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.as_u8())
    }
}

impl<'de> Deserialize<'de> for Command {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = u8::deserialize(deserializer)?;
        Command::from_u8(value)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown command {}", value)))
    }
}

/// A decoded hook payload, or the value an action hands back in its place.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    BeaconBlock(Box<BeaconBlock>),
    SignedBeaconBlock(Box<SignedBeaconBlock>),
    AttestationData(AttestationData),
    Attestation(Attestation),
    Root(Hash256),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ActionResult {
    pub command: Command,
    /// `None` leaves the caller's payload as it was.
    pub payload: Option<Payload>,
}

impl ActionResult {
    pub fn null(payload: Option<Payload>) -> Self {
        Self {
            command: Command::Null,
            payload,
        }
    }
}

/// The wait performed by a delay action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delay {
    For(Duration),
    /// Until `offset` past the start of `slot`.
    Until { slot: Slot, offset: Duration },
}

/// An executable behaviour, resolved once when a strategy is compiled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Control(Command),
    AddAttestToPool,
    StoreSignedAttest,
    StoreSignedBlock,
    DelayWithSecond(u64),
    DelayToNextSlot,
    DelayToAfterNextSlot(u64),
    DelayToNextNEpochStart(u64),
    DelayToNextNEpochEnd(u64),
    DelayToNextNEpochHalf(u64),
    DelayToEpochEnd,
    DelayHalfEpoch,
    PackPooledAttest,
    RePackAttestation,
    ModifyParentRoot(Slot),
}

/// Splits `name:1:2` into its name and the parameters that parse as integers.
pub fn parse_action_name(spec: &str) -> (&str, Vec<i64>) {
    let mut parts = spec.trim().split(':');
    let name = parts.next().unwrap_or_default();
    let params = parts.filter_map(|p| p.trim().parse::<i64>().ok()).collect();
    (name, params)
}

impl Action {
    /// Resolves an action specification such as `delayWithSecond:3`.
    ///
    /// Delays whose parameter is omitted pick a random value in `[0, 10)` here, once, so every
    /// execution of the compiled action waits the same time.
    pub fn parse<R: Rng>(spec: &str, rng: &mut R) -> Result<Self, Error> {
        let (name, params) = parse_action_name(spec);
        let first = params.first().map(|p| u64::try_from(*p).unwrap_or(0));
        let mut random = || rng.gen_range(0..DEFAULT_RANDOM_DELAY_BOUND);

        let action = match name {
            "null" => Action::Control(Command::Null),
            "return" => Action::Control(Command::Return),
            "continue" => Action::Control(Command::Continue),
            "abort" => Action::Control(Command::Abort),
            "skip" => Action::Control(Command::Skip),
            "exit" => Action::Control(Command::Exit),
            "addAttestToPool" => Action::AddAttestToPool,
            "storeSignedAttest" => Action::StoreSignedAttest,
            "storeSignedBlock" => Action::StoreSignedBlock,
            "delayWithSecond" => Action::DelayWithSecond(first.unwrap_or_else(&mut random)),
            "delayToNextSlot" => Action::DelayToNextSlot,
            "delayToAfterNextSlot" => {
                Action::DelayToAfterNextSlot(first.unwrap_or_else(&mut random))
            }
            "delayToNextNEpochStart" => Action::DelayToNextNEpochStart(first.unwrap_or(1)),
            "delayToNextNEpochEnd" => Action::DelayToNextNEpochEnd(first.unwrap_or(0)),
            "delayToNextNEpochHalf" => Action::DelayToNextNEpochHalf(first.unwrap_or(1)),
            "delayToEpochEnd" => Action::DelayToEpochEnd,
            "delayHalfEpoch" => Action::DelayHalfEpoch,
            "packPooledAttest" => Action::PackPooledAttest,
            "rePackAttestation" => Action::RePackAttestation,
            "modifyParentRoot" => {
                let slot = params.first().ok_or_else(|| Error::MissingParameter {
                    action: name.to_string(),
                })?;
                let slot = u64::try_from(*slot).map_err(|_| Error::InvalidParameter {
                    action: name.to_string(),
                    value: *slot,
                })?;
                Action::ModifyParentRoot(Slot::new(slot))
            }
            other => return Err(Error::UnknownAction(other.to_string())),
        };

        Ok(action)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Action::Control(Command::Null) => "null",
            Action::Control(Command::Continue) => "continue",
            Action::Control(Command::Return) => "return",
            Action::Control(Command::Abort) => "abort",
            Action::Control(Command::Skip) => "skip",
            Action::Control(Command::Exit) => "exit",
            Action::AddAttestToPool => "addAttestToPool",
            Action::StoreSignedAttest => "storeSignedAttest",
            Action::StoreSignedBlock => "storeSignedBlock",
            Action::DelayWithSecond(_) => "delayWithSecond",
            Action::DelayToNextSlot => "delayToNextSlot",
            Action::DelayToAfterNextSlot(_) => "delayToAfterNextSlot",
            Action::DelayToNextNEpochStart(_) => "delayToNextNEpochStart",
            Action::DelayToNextNEpochEnd(_) => "delayToNextNEpochEnd",
            Action::DelayToNextNEpochHalf(_) => "delayToNextNEpochHalf",
            Action::DelayToEpochEnd => "delayToEpochEnd",
            Action::DelayHalfEpoch => "delayHalfEpoch",
            Action::PackPooledAttest => "packPooledAttest",
            Action::RePackAttestation => "rePackAttestation",
            Action::ModifyParentRoot(_) => "modifyParentRoot",
        }
    }

    /// How long a delay action called at `slot` waits. `None` for every other action.
    pub fn delay(&self, slot: Slot, spec: &ChainSpec) -> Option<Delay> {
        let spe = spec.slots_per_epoch;
        let epoch = slot.epoch(spe);
        let until = |slot| Delay::Until {
            slot,
            offset: Duration::ZERO,
        };

        let delay = match self {
            Action::DelayWithSecond(seconds) => Delay::For(Duration::from_secs(*seconds)),
            Action::DelayToNextSlot => until(slot + 1),
            Action::DelayToAfterNextSlot(seconds) => Delay::Until {
                slot: slot + 1,
                offset: Duration::from_secs(*seconds),
            },
            Action::DelayToNextNEpochStart(n) => until((epoch + *n).start_slot(spe)),
            Action::DelayToNextNEpochEnd(n) => until((epoch + *n).end_slot(spe)),
            Action::DelayToNextNEpochHalf(n) => until((epoch + *n).start_slot(spe) + spe / 2),
            Action::DelayToEpochEnd => until(epoch.end_slot(spe)),
            Action::DelayHalfEpoch => Delay::For(Duration::from_secs(
                spec.seconds_per_slot.saturating_mul(spe / 2),
            )),
            _ => return None,
        };
        Some(delay)
    }

    /// Runs the action for a hook call at `slot` made by `pubkey`.
    ///
    /// Delay actions block the calling thread. They must only be run from a blocking thread.
    pub fn execute<T: SlotClock, B: BeaconBackend>(
        &self,
        ctx: &Context<T, B>,
        slot: Slot,
        pubkey: &Pubkey,
        payload: Option<Payload>,
    ) -> ActionResult {
        let spe = ctx.spec.slots_per_epoch;
        let epoch = slot.epoch(spe);

        info!(
            ctx.log,
            "Executing action";
            "action" => self.name(),
            "slot" => %slot,
        );

        match self {
            Action::Control(command) => ActionResult {
                command: *command,
                payload,
            },
            Action::AddAttestToPool => {
                if let Some(Payload::Attestation(attestation)) = &payload {
                    ctx.validators.add_to_pool(slot, attestation.clone());
                } else {
                    debug!(ctx.log, "No attestation to pool"; "slot" => %slot);
                }
                ActionResult::null(payload)
            }
            Action::StoreSignedAttest => {
                if let Some(Payload::Attestation(attestation)) = &payload {
                    ctx.validators
                        .record_attestation(slot, pubkey.clone(), attestation.clone());
                } else {
                    debug!(ctx.log, "No attestation to store"; "slot" => %slot);
                }
                ActionResult::null(payload)
            }
            Action::StoreSignedBlock => {
                if let Some(Payload::SignedBeaconBlock(block)) = &payload {
                    ctx.validators
                        .record_block(slot, pubkey.clone(), block.as_ref().clone());
                } else {
                    debug!(ctx.log, "No block to store"; "slot" => %slot);
                }
                ActionResult::null(payload)
            }
            Action::DelayWithSecond(_)
            | Action::DelayToNextSlot
            | Action::DelayToAfterNextSlot(_)
            | Action::DelayToNextNEpochStart(_)
            | Action::DelayToNextNEpochEnd(_)
            | Action::DelayToNextNEpochHalf(_)
            | Action::DelayToEpochEnd
            | Action::DelayHalfEpoch => {
                match self.delay(slot, ctx.spec) {
                    Some(Delay::For(duration)) => sleep_for(ctx, duration),
                    Some(Delay::Until { slot, offset }) => sleep_until(ctx, slot, offset),
                    None => (),
                }
                ActionResult::null(payload)
            }
            Action::PackPooledAttest => {
                if !is_block(&payload) {
                    debug!(ctx.log, "No block to pack"; "slot" => %slot);
                    return ActionResult::null(payload);
                }
                let first = epoch.saturating_sub(1u64).start_slot(spe);
                let last = epoch.end_slot(spe);
                let pooled = ctx.validators.drain_pool(first..=last);
                ActionResult::null(payload.map(|p| repack_block(ctx, p, pooled)))
            }
            Action::RePackAttestation => {
                if !is_block(&payload) {
                    debug!(ctx.log, "No block to repack"; "slot" => %slot);
                    return ActionResult::null(payload);
                }
                let attacker_attestations = attacker_attestations(ctx, epoch);
                ActionResult::null(payload.map(|p| repack_block(ctx, p, attacker_attestations)))
            }
            Action::ModifyParentRoot(target) => match ctx.backend.block_root_at_slot(*target) {
                Ok(root) => ActionResult::null(Some(Payload::Root(root))),
                Err(e) => {
                    warn!(
                        ctx.log,
                        "Unable to read block root";
                        "target_slot" => %target,
                        "error" => ?e,
                    );
                    ActionResult::null(None)
                }
            },
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::DelayWithSecond(n)
            | Action::DelayToAfterNextSlot(n)
            | Action::DelayToNextNEpochStart(n)
            | Action::DelayToNextNEpochEnd(n)
            | Action::DelayToNextNEpochHalf(n) => write!(f, "{}:{}", self.name(), n),
            Action::ModifyParentRoot(slot) => write!(f, "{}:{}", self.name(), slot),
            _ => f.write_str(self.name()),
        }
    }
}

fn is_block(payload: &Option<Payload>) -> bool {
    matches!(
        payload,
        Some(Payload::BeaconBlock(_)) | Some(Payload::SignedBeaconBlock(_))
    )
}

fn sleep_for<T: SlotClock, B: BeaconBackend>(ctx: &Context<T, B>, duration: Duration) {
    debug!(ctx.log, "Delaying hook"; "seconds" => duration.as_secs());
    std::thread::sleep(duration);
}

/// Blocks until `extra` after the start of `target`. Returns immediately if that time has passed
/// or the clock cannot be read.
fn sleep_until<T: SlotClock, B: BeaconBackend>(ctx: &Context<T, B>, target: Slot, extra: Duration) {
    let remaining = ctx.slot_clock.duration_until(target, extra);

    debug!(
        ctx.log,
        "Delaying hook";
        "target_slot" => %target,
        "millis" => remaining.as_millis() as u64,
    );
    std::thread::sleep(remaining);
}

/// Signed attestations cached during `epoch` whose signer is an attacker at that slot.
fn attacker_attestations<T: SlotClock, B: BeaconBackend>(
    ctx: &Context<T, B>,
    epoch: Epoch,
) -> Vec<Attestation> {
    let spe = ctx.spec.slots_per_epoch;
    let mut attestations = vec![];

    for slot in epoch.slot_iter(spe) {
        for (pubkey, attestation) in ctx.validators.attestations_at(slot) {
            match ctx.role_of_pubkey(slot, &pubkey) {
                Some(Role::Attacker) => attestations.push(attestation),
                Some(Role::Normal) => (),
                None => debug!(ctx.log, "Validator not found"; "pubkey" => %pubkey),
            }
        }
    }

    attestations
}

/// Mixes `extra` into the attestations of a block payload and repacks them.
fn repack_block<T: SlotClock, B: BeaconBackend>(
    ctx: &Context<T, B>,
    payload: Payload,
    extra: Vec<Attestation>,
) -> Payload {
    let max = ctx.spec.max_attestations_per_block();
    let repack = |block: &mut BeaconBlock| {
        let mut all: Vec<Attestation> = block.body.attestations.iter().cloned().collect();
        all.extend(extra);
        let num_candidates = all.len();

        match VariableList::new(pack_attestations(all, max)) {
            Ok(packed) => {
                debug!(
                    ctx.log,
                    "Repacked block attestations";
                    "candidates" => num_candidates,
                    "included" => packed.len(),
                );
                block.body.attestations = packed;
            }
            Err(e) => warn!(ctx.log, "Unable to repack attestations"; "error" => ?e),
        }
    };

    match payload {
        Payload::BeaconBlock(mut block) => {
            repack(block.as_mut());
            Payload::BeaconBlock(block)
        }
        Payload::SignedBeaconBlock(mut block) => {
            repack(&mut block.message);
            Payload::SignedBeaconBlock(block)
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::TestContext;
    use crate::validator_set::AttackerWindow;
    use rand::rngs::mock::StepRng;
    use std::time::Instant;
    use types::test_utils::{attestation_data, signed_attestation};

    fn parse(spec: &str) -> Result<Action, Error> {
        Action::parse(spec, &mut StepRng::new(3, 0))
    }

    #[test]
    fn action_names_and_params() {
        assert_eq!(parse_action_name("delayWithSecond:5"), ("delayWithSecond", vec![5]));
        assert_eq!(parse_action_name("foo:x:2:y"), ("foo", vec![2]));
        assert_eq!(parse_action_name("null"), ("null", vec![]));
    }

    #[test]
    fn parses_every_action() {
        assert_eq!(parse("return").unwrap(), Action::Control(Command::Return));
        assert_eq!(parse("delayWithSecond:4").unwrap(), Action::DelayWithSecond(4));
        assert_eq!(parse("delayWithSecond:-4").unwrap(), Action::DelayWithSecond(0));
        assert_eq!(
            parse("delayToNextNEpochStart").unwrap(),
            Action::DelayToNextNEpochStart(1)
        );
        assert_eq!(
            parse("delayToNextNEpochEnd").unwrap(),
            Action::DelayToNextNEpochEnd(0)
        );
        assert_eq!(
            parse("modifyParentRoot:12").unwrap(),
            Action::ModifyParentRoot(Slot::new(12))
        );
        assert_eq!(parse("storeSignedBlock").unwrap(), Action::StoreSignedBlock);
    }

    #[test]
    fn omitted_delay_is_bounded_and_fixed() {
        let mut rng = rand::thread_rng();
        for _ in 0..32 {
            match Action::parse("delayToAfterNextSlot", &mut rng).unwrap() {
                Action::DelayToAfterNextSlot(n) => assert!(n < DEFAULT_RANDOM_DELAY_BOUND),
                other => panic!("unexpected action {:?}", other),
            }
        }
        assert_eq!(parse("delayWithSecond").unwrap(), parse("delayWithSecond").unwrap());
    }

    #[test]
    fn parse_errors() {
        assert!(matches!(parse("sleep:3"), Err(Error::UnknownAction(_))));
        assert!(matches!(
            parse("modifyParentRoot"),
            Err(Error::MissingParameter { .. })
        ));
        assert!(matches!(
            parse("modifyParentRoot:-2"),
            Err(Error::InvalidParameter { .. })
        ));
    }

    #[test]
    fn commands_serialize_as_integers() {
        assert_eq!(serde_json::to_string(&Command::Exit).unwrap(), "7");
        assert_eq!(serde_json::from_str::<Command>("2").unwrap(), Command::Return);
        assert!(serde_json::from_str::<Command>("5").is_err());
    }

    #[test]
    fn control_echoes_payload() {
        let tester = TestContext::new();
        let ctx = tester.context();
        let payload = Some(Payload::Root(Hash256::repeat_byte(3)));

        let result = Action::Control(Command::Skip).execute(
            &ctx,
            Slot::new(1),
            &Pubkey::from([1; 48]),
            payload.clone(),
        );

        assert_eq!(result.command, Command::Skip);
        assert_eq!(result.payload, payload);
    }

    #[test]
    fn delay_with_zero_seconds_is_immediate() {
        let tester = TestContext::new();
        let ctx = tester.context();
        let start = Instant::now();

        let result =
            Action::DelayWithSecond(0).execute(&ctx, Slot::new(1), &Pubkey::from([1; 48]), None);

        assert_eq!(result, ActionResult::null(None));
        assert!(start.elapsed() < Duration::from_millis(500));
    }

    #[test]
    fn delay_to_past_slot_is_immediate() {
        let tester = TestContext::new();
        tester.slot_clock.set_slot(100);
        let ctx = tester.context();
        let start = Instant::now();

        Action::DelayToNextSlot.execute(&ctx, Slot::new(10), &Pubkey::from([1; 48]), None);
        Action::DelayToEpochEnd.execute(&ctx, Slot::new(10), &Pubkey::from([1; 48]), None);

        assert!(start.elapsed() < Duration::from_millis(500));
    }

    #[test]
    fn delay_to_next_slot_waits_for_slot_start() {
        let tester = TestContext::with_seconds_per_slot(1);
        tester.slot_clock.set_slot(10);
        let ctx = tester.context();
        let start = Instant::now();

        Action::DelayToNextSlot.execute(&ctx, Slot::new(10), &Pubkey::from([1; 48]), None);

        assert!(start.elapsed() >= Duration::from_millis(900));
    }

    #[test]
    fn delay_targets() {
        let spec = ChainSpec::mainnet();
        let slot = Slot::new(40);
        let until = |target: u64, offset: u64| {
            Some(Delay::Until {
                slot: Slot::new(target),
                offset: Duration::from_secs(offset),
            })
        };

        let cases = [
            ("delayWithSecond:3", Some(Delay::For(Duration::from_secs(3)))),
            ("delayToNextSlot", until(41, 0)),
            ("delayToAfterNextSlot:4", until(41, 4)),
            ("delayToNextNEpochStart", until(64, 0)),
            ("delayToNextNEpochStart:3", until(128, 0)),
            ("delayToNextNEpochEnd", until(63, 0)),
            ("delayToNextNEpochEnd:2", until(127, 0)),
            ("delayToNextNEpochHalf", until(80, 0)),
            ("delayToNextNEpochHalf:0", until(48, 0)),
            ("delayToEpochEnd", until(63, 0)),
            ("delayHalfEpoch", Some(Delay::For(Duration::from_secs(16 * 12)))),
            ("return", None),
            ("packPooledAttest", None),
        ];

        for (action, expected) in cases {
            assert_eq!(parse(action).unwrap().delay(slot, &spec), expected, "{}", action);
        }
    }

    #[test]
    fn delay_until_is_measured_from_slot_start() {
        let tester = TestContext::new();
        tester.slot_clock.set_slot(40);

        let Some(Delay::Until { slot, offset }) =
            Action::DelayToAfterNextSlot(4).delay(Slot::new(40), &tester.spec)
        else {
            panic!("expected a slot-relative delay");
        };
        assert_eq!(
            tester.slot_clock.duration_until(slot, offset),
            Duration::from_secs(16)
        );

        let Some(Delay::Until { slot, offset }) =
            Action::DelayToNextNEpochStart(1).delay(Slot::new(40), &tester.spec)
        else {
            panic!("expected a slot-relative delay");
        };
        assert_eq!(
            tester.slot_clock.duration_until(slot, offset),
            Duration::from_secs(24 * 12)
        );
    }

    #[test]
    fn store_signed_block_is_last_write_wins() {
        let tester = TestContext::new();
        let ctx = tester.context();
        let pubkey = Pubkey::from([6; 48]);
        let block = |proposer_index| {
            let mut block = SignedBeaconBlock::default();
            block.message.slot = Slot::new(12);
            block.message.proposer_index = proposer_index;
            block
        };

        let result = Action::StoreSignedBlock.execute(
            &ctx,
            Slot::new(12),
            &pubkey,
            Some(Payload::SignedBeaconBlock(Box::new(block(1)))),
        );
        assert_eq!(result.command, Command::Null);
        assert_eq!(tester.validators.blocks_at(Slot::new(12))[&pubkey], block(1));

        Action::StoreSignedBlock.execute(
            &ctx,
            Slot::new(12),
            &pubkey,
            Some(Payload::SignedBeaconBlock(Box::new(block(2)))),
        );
        Action::StoreSignedBlock.execute(&ctx, Slot::new(12), &Pubkey::from([7; 48]), None);

        let stored = tester.validators.blocks_at(Slot::new(12));
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[&pubkey], block(2));
        assert!(tester.validators.blocks_at(Slot::new(13)).is_empty());
    }

    #[test]
    fn store_and_pool_attestations() {
        let tester = TestContext::new();
        let ctx = tester.context();
        let pubkey = Pubkey::from([9; 48]);
        let att = signed_attestation(attestation_data(5, 0, Hash256::zero()), 8, 0);
        let payload = Some(Payload::Attestation(att.clone()));

        Action::StoreSignedAttest.execute(&ctx, Slot::new(5), &pubkey, payload.clone());
        Action::AddAttestToPool.execute(&ctx, Slot::new(5), &pubkey, payload);

        assert_eq!(tester.validators.attestations_at(Slot::new(5))[&pubkey], att);
        assert_eq!(tester.validators.pool_len(), 1);
    }

    #[test]
    fn pack_pooled_attestations_into_block() {
        let tester = TestContext::new();
        let ctx = tester.context();
        let data = attestation_data(40, 0, Hash256::repeat_byte(7));
        tester
            .validators
            .add_to_pool(Slot::new(40), signed_attestation(data.clone(), 8, 0));
        tester
            .validators
            .add_to_pool(Slot::new(41), signed_attestation(data.clone(), 8, 1));
        tester
            .validators
            .add_to_pool(Slot::new(200), signed_attestation(data, 8, 2));

        let mut block = BeaconBlock::empty();
        block.slot = Slot::new(64);
        let result = Action::PackPooledAttest.execute(
            &ctx,
            Slot::new(64),
            &Pubkey::from([1; 48]),
            Some(Payload::BeaconBlock(Box::new(block))),
        );

        match result.payload {
            Some(Payload::BeaconBlock(block)) => {
                assert_eq!(block.body.attestations.len(), 1);
                assert_eq!(block.body.attestations[0].num_set_bits(), 2);
            }
            other => panic!("unexpected payload {:?}", other),
        }
        assert_eq!(tester.validators.pool_len(), 0);
    }

    #[test]
    fn repack_only_uses_attacker_attestations() {
        let tester = TestContext::new();
        let attacker = Pubkey::from([1; 48]);
        let honest = Pubkey::from([2; 48]);
        tester.validators.register_validator(1, attacker.clone(), None);
        tester.validators.register_validator(2, honest.clone(), None);
        tester.validators.set_windows([(
            1,
            AttackerWindow {
                start: Slot::new(0),
                end: Slot::new(100),
            },
        )]);
        let ctx = tester.context();

        let data = attestation_data(33, 0, Hash256::repeat_byte(1));
        tester.validators.record_attestation(
            Slot::new(33),
            attacker,
            signed_attestation(data.clone(), 8, 1),
        );
        tester
            .validators
            .record_attestation(Slot::new(33), honest, signed_attestation(data, 8, 2));

        let result = Action::RePackAttestation.execute(
            &ctx,
            Slot::new(40),
            &Pubkey::from([3; 48]),
            Some(Payload::SignedBeaconBlock(Box::default())),
        );

        match result.payload {
            Some(Payload::SignedBeaconBlock(block)) => {
                let attestations = &block.message.body.attestations;
                assert_eq!(attestations.len(), 1);
                assert_eq!(attestations[0].aggregation_bits.get(1), Ok(true));
                assert_eq!(attestations[0].aggregation_bits.get(2), Ok(false));
            }
            other => panic!("unexpected payload {:?}", other),
        }
    }

    #[test]
    fn modify_parent_root() {
        let tester = TestContext::new();
        tester
            .backend
            .set_block_root(Slot::new(30), Hash256::repeat_byte(0x30));
        let ctx = tester.context();
        let pubkey = Pubkey::from([1; 48]);

        let found =
            Action::ModifyParentRoot(Slot::new(30)).execute(&ctx, Slot::new(31), &pubkey, None);
        assert_eq!(
            found.payload,
            Some(Payload::Root(Hash256::repeat_byte(0x30)))
        );

        let missing =
            Action::ModifyParentRoot(Slot::new(29)).execute(&ctx, Slot::new(31), &pubkey, None);
        assert_eq!(missing, ActionResult::null(None));
    }
}
