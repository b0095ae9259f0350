//! Declarative attack strategies and the rule sets compiled from them.
//!
//! A `Strategy` is the JSON document an operator installs. Compiling it produces an immutable
//! `RuleSet`: each slot entry becomes a `StrategyRule` with a parsed `SlotMatcher` and one resolved
//! `Action` per hook. The `StrategyStore` swaps whole rule sets atomically, so a hook call that
//! is already running keeps the rule set it started with.

pub mod action;
pub mod packing;
pub mod slot_matcher;

pub use action::{Action, ActionResult, Command, Payload};
pub use slot_matcher::{SlotFunction, SlotMatcher};

use crate::backend::BeaconBackend;
use crate::hook::HookName;
use crate::validator_set::{collect_windows, AttackerWindow, Role, ValidatorSet, Windows};
use parking_lot::RwLock;
use rand::Rng;
use serde::{Deserialize, Deserializer, Serialize};
use slog::Logger;
use slot_clock::SlotClock;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use types::{ChainSpec, Slot};

#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    InvalidJson(String),
    UnknownSlotFunction(String),
    /// A literal slot that is not a valid slot number, e.g. `-1`.
    InvalidSlot(String),
    UnknownAction(String),
    UnknownHook(String),
    MissingParameter {
        action: String,
    },
    InvalidParameter {
        action: String,
        value: i64,
    },
    InvalidWindow {
        validator_index: u64,
        start: u64,
        end: u64,
    },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidJson(e) => write!(f, "invalid strategy json: {}", e),
            Error::UnknownSlotFunction(name) => write!(f, "unknown slot function: {}", name),
            Error::InvalidSlot(slot) => write!(f, "invalid slot: {}", slot),
            Error::UnknownAction(name) => write!(f, "unknown action: {}", name),
            Error::UnknownHook(name) => write!(f, "unknown hook: {}", name),
            Error::MissingParameter { action } => {
                write!(f, "action {} requires a parameter", action)
            }
            Error::InvalidParameter { action, value } => {
                write!(f, "invalid parameter {} for action {}", value, action)
            }
            Error::InvalidWindow {
                validator_index,
                start,
                end,
            } => write!(
                f,
                "attacker window [{}, {}] of validator {} is empty",
                start, end, validator_index
            ),
        }
    }
}

/// The strategy document accepted by `update-strategy`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Strategy {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
    #[serde(default)]
    pub slots: Vec<SlotStrategy>,
    #[serde(default, rename = "validator")]
    pub validators: Vec<ValidatorStrategy>,
    #[serde(default)]
    pub block: BroadcastStrategy,
    #[serde(default)]
    pub attest: BroadcastStrategy,
}

impl Strategy {
    pub fn from_json(json: &str) -> Result<Self, Error> {
        serde_json::from_str(json).map_err(|e| Error::InvalidJson(e.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotStrategy {
    /// A slot number or the name of a slot function.
    #[serde(deserialize_with = "string_or_number")]
    pub slot: String,
    #[serde(default)]
    pub level: i64,
    /// Hook name to action specification.
    #[serde(default)]
    pub actions: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidatorStrategy {
    pub validator_index: u64,
    pub attacker_start_slot: u64,
    pub attacker_end_slot: u64,
}

/// Settings for the legacy broadcast-delay and modify endpoints.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BroadcastStrategy {
    #[serde(default)]
    pub delay_enable: bool,
    /// Milliseconds.
    #[serde(default)]
    pub broad_cast_delay: u64,
    #[serde(default)]
    pub modify_enable: bool,
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrNumber {
        String(String),
        Number(i64),
    }

    Ok(match StringOrNumber::deserialize(deserializer)? {
        StringOrNumber::String(s) => s,
        StringOrNumber::Number(n) => n.to_string(),
    })
}

/// Everything an action or slot matcher may consult while a hook call is in flight.
pub struct Context<'a, T: SlotClock, B: BeaconBackend> {
    pub spec: &'a ChainSpec,
    pub slot_clock: &'a T,
    pub backend: &'a B,
    pub validators: &'a ValidatorSet,
    /// The attacker windows of the rule set being dispatched.
    pub windows: Arc<Windows>,
    pub log: &'a Logger,
}

impl<'a, T: SlotClock, B: BeaconBackend> Context<'a, T, B> {
    pub fn role_of(&self, slot: Slot, index: u64) -> Role {
        self.validators.role_within(&self.windows, slot, index)
    }

    /// `None` for a pubkey that has never been registered.
    pub fn role_of_pubkey(&self, slot: Slot, pubkey: &types::Pubkey) -> Option<Role> {
        self.validators
            .index_of(pubkey)
            .map(|index| self.role_of(slot, index))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StrategyRule {
    pub slot: SlotMatcher,
    pub level: i64,
    pub actions: HashMap<HookName, Action>,
}

impl StrategyRule {
    pub fn compile<R: Rng>(slot_strategy: &SlotStrategy, rng: &mut R) -> Result<Self, Error> {
        let slot = SlotMatcher::parse(&slot_strategy.slot)?;
        let actions = slot_strategy
            .actions
            .iter()
            .map(|(hook, action)| {
                let hook =
                    HookName::from_str(hook).map_err(|_| Error::UnknownHook(hook.clone()))?;
                Ok((hook, Action::parse(action, rng)?))
            })
            .collect::<Result<_, Error>>()?;

        Ok(Self {
            slot,
            level: slot_strategy.level,
            actions,
        })
    }
}

/// One compiled, immutable generation of a strategy.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleSet {
    pub uid: String,
    pub strategy: Strategy,
    pub rules: Vec<StrategyRule>,
    /// Installed into the `ValidatorSet` together with the rules.
    pub attacker_windows: Arc<Windows>,
}

impl RuleSet {
    pub fn empty() -> Self {
        Self {
            uid: String::new(),
            strategy: Strategy::default(),
            rules: vec![],
            attacker_windows: Arc::new(Windows::new()),
        }
    }

    pub fn compile<R: Rng>(strategy: Strategy, uid: String, rng: &mut R) -> Result<Self, Error> {
        for validator in &strategy.validators {
            if validator.attacker_start_slot > validator.attacker_end_slot {
                return Err(Error::InvalidWindow {
                    validator_index: validator.validator_index,
                    start: validator.attacker_start_slot,
                    end: validator.attacker_end_slot,
                });
            }
        }

        let rules = strategy
            .slots
            .iter()
            .map(|slot_strategy| StrategyRule::compile(slot_strategy, rng))
            .collect::<Result<_, _>>()?;

        let attacker_windows = Arc::new(collect_windows(windows_of(&strategy)));

        Ok(Self {
            uid,
            strategy,
            rules,
            attacker_windows,
        })
    }

    /// The highest-level rule matching `slot`. Among equal levels the last declared rule wins.
    pub fn select<T: SlotClock, B: BeaconBackend>(
        &self,
        slot: Slot,
        ctx: &Context<T, B>,
    ) -> Option<&StrategyRule> {
        self.rules
            .iter()
            .filter(|rule| rule.slot.matches(slot, ctx))
            .max_by_key(|rule| rule.level)
    }

    pub fn windows(&self) -> Vec<(u64, AttackerWindow)> {
        windows_of(&self.strategy)
    }
}

fn windows_of(strategy: &Strategy) -> Vec<(u64, AttackerWindow)> {
    strategy
        .validators
        .iter()
        .map(|v| {
            (
                v.validator_index,
                AttackerWindow {
                    start: Slot::new(v.attacker_start_slot),
                    end: Slot::new(v.attacker_end_slot),
                },
            )
        })
        .collect()
}

/// Holds the active `RuleSet`, replaced wholesale on every install.
pub struct StrategyStore {
    current: RwLock<Arc<RuleSet>>,
}

impl Default for StrategyStore {
    fn default() -> Self {
        Self {
            current: RwLock::new(Arc::new(RuleSet::empty())),
        }
    }
}

impl StrategyStore {
    pub fn current(&self) -> Arc<RuleSet> {
        self.current.read().clone()
    }

    /// Swaps in `rule_set`, returning the one it replaced.
    pub fn install(&self, rule_set: Arc<RuleSet>) -> Arc<RuleSet> {
        std::mem::replace(&mut *self.current.write(), rule_set)
    }
}
