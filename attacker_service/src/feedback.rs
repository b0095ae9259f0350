//! Tracks installed strategies and announces when the chain has moved past all of their slots.

use crate::metrics;
use crate::strategy::{RuleSet, SlotMatcher, StrategyRule};
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use slog::{debug, info, Logger};
use slot_clock::SlotClock;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use task_executor::TaskExecutor;
use tokio::sync::broadcast;
use tokio::time::sleep;
use types::{Epoch, Slot};

/// A strategy containing a computed slot never ends.
pub const FOREVER: Epoch = Epoch::new(u64::MAX);

/// Number of epochs past a strategy's last epoch before it is considered complete.
pub const COMPLETION_EPOCH_DELAY: u64 = 2;

const EVENT_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyEndEvent {
    pub uid: String,
    pub min_epoch: Epoch,
    pub max_epoch: Epoch,
}

struct PendingStrategy {
    rule_set: Arc<RuleSet>,
    /// Computed on the first poll after installation.
    epochs: Option<(Epoch, Epoch)>,
}

/// The first and last epoch targeted by `rules`.
///
/// Any computed slot makes the last epoch `FOREVER`. Without a literal slot there is nothing to
/// wait for, so a rule-less strategy (for example one declaring only attacker windows) spans
/// `(FOREVER, FOREVER)` and never completes.
pub fn epoch_bounds(rules: &[StrategyRule], slots_per_epoch: u64) -> (Epoch, Epoch) {
    let literal_epochs = rules.iter().filter_map(|rule| match rule.slot {
        SlotMatcher::Literal(slot) => Some(slot.epoch(slots_per_epoch)),
        SlotMatcher::Computed(_) => None,
    });
    let min = literal_epochs.clone().min().unwrap_or(FOREVER);
    let max = literal_epochs.max().unwrap_or(FOREVER);

    if rules.iter().any(|rule| rule.slot.is_computed()) {
        (min, FOREVER)
    } else {
        (min, max)
    }
}

pub struct Feedback {
    /// Keyed by installation time in milliseconds.
    pending: Mutex<BTreeMap<u64, PendingStrategy>>,
    /// One entry per finished uid; a reinstalled uid overwrites its entry. Dropped by
    /// `prune_completed` under the same retention as the per-slot caches.
    completed: DashMap<String, StrategyEndEvent>,
    sender: broadcast::Sender<StrategyEndEvent>,
    slots_per_epoch: u64,
}

impl Feedback {
    pub fn new(slots_per_epoch: u64) -> Self {
        let (sender, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            pending: Mutex::new(BTreeMap::new()),
            completed: DashMap::new(),
            sender,
            slots_per_epoch,
        }
    }

    /// Starts tracking `rule_set`, installed at `installed_at_millis`.
    pub fn add_strategy(&self, installed_at_millis: u64, rule_set: Arc<RuleSet>) {
        let mut pending = self.pending.lock();
        let mut key = installed_at_millis;
        while pending.contains_key(&key) {
            key += 1;
        }
        pending.insert(
            key,
            PendingStrategy {
                rule_set,
                epochs: None,
            },
        );
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StrategyEndEvent> {
        self.sender.subscribe()
    }

    /// Completes every pending strategy whose last epoch is at least two epochs behind
    /// `current_slot`, returning the emitted events in installation order.
    pub fn poll(&self, current_slot: Slot) -> Vec<StrategyEndEvent> {
        let current_epoch = current_slot.epoch(self.slots_per_epoch);
        let mut pending = self.pending.lock();
        let mut ended = vec![];

        for (key, strategy) in pending.iter_mut() {
            let rule_set = &strategy.rule_set;
            let (min_epoch, max_epoch) = *strategy
                .epochs
                .get_or_insert_with(|| epoch_bounds(&rule_set.rules, self.slots_per_epoch));

            if current_epoch >= max_epoch.saturating_add(COMPLETION_EPOCH_DELAY) {
                ended.push((
                    *key,
                    StrategyEndEvent {
                        uid: strategy.rule_set.uid.clone(),
                        min_epoch,
                        max_epoch,
                    },
                ));
            }
        }

        ended
            .into_iter()
            .map(|(key, event)| {
                pending.remove(&key);
                self.completed.insert(event.uid.clone(), event.clone());
                metrics::inc_counter(&metrics::STRATEGIES_COMPLETED);
                // No receivers is not an error.
                let _ = self.sender.send(event.clone());
                event
            })
            .collect()
    }

    /// The completion event of a finished strategy.
    pub fn completed(&self, uid: &str) -> Option<StrategyEndEvent> {
        self.completed.get(uid).map(|event| event.value().clone())
    }

    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    /// Forgets completion events of strategies whose last epoch is before `epoch`.
    pub fn prune_completed(&self, epoch: Epoch) {
        self.completed.retain(|_, event| event.max_epoch >= epoch);
    }

    pub fn completed_count(&self) -> usize {
        self.completed.len()
    }
}

/// Spawns the task polling `feedback` every `interval`.
///
/// With `retention_epochs` set, completion events older than that are forgotten.
pub fn spawn_feedback_service<T: SlotClock + 'static>(
    feedback: Arc<Feedback>,
    slot_clock: T,
    interval: Duration,
    retention_epochs: Option<u64>,
    executor: &TaskExecutor,
    log: Logger,
) {
    executor.spawn(
        async move {
            loop {
                sleep(interval).await;

                let Some(slot) = slot_clock.now() else {
                    debug!(log, "Slot clock unavailable, skipping feedback poll");
                    continue;
                };

                for event in feedback.poll(slot) {
                    info!(
                        log,
                        "Strategy completed";
                        "uid" => &event.uid,
                        "min_epoch" => %event.min_epoch,
                        "max_epoch" => %event.max_epoch,
                    );
                }

                if let Some(retention) = retention_epochs {
                    let epoch = slot.epoch(feedback.slots_per_epoch);
                    feedback.prune_completed(epoch.saturating_sub(retention));
                }
            }
        },
        "attacker_feedback",
    );
}
