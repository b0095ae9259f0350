//! Background tasks keeping the service's view of the validator set current.
//!
//! - Proposer duties for the current and next epoch are cached for the slot matchers.
//! - Attester duties for a configured range of validator indices populate the `ValidatorSet`.
//! - Once per second, validator roles are recomputed from the installed attacker windows.

use crate::validator_set::{Role, ValidatorSet};
use dashmap::DashMap;
use eth2::types::{AttesterData, Epoch, ProposerData};
use eth2::BeaconNodeHttpClient;
use slog::{debug, error, Logger};
use slot_clock::SlotClock;
use std::sync::Arc;
use std::time::Duration;
use task_executor::TaskExecutor;
use tokio::time::sleep;
use types::ChainSpec;

/// Delay before the first duties poll after startup.
pub const INITIAL_POLL_DELAY: Duration = Duration::from_millis(100);
pub const DUTIES_POLL_INTERVAL: Duration = Duration::from_secs(2);
pub const ROLE_UPDATE_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Default)]
pub struct DutyCache {
    proposers: DashMap<Epoch, Vec<ProposerData>>,
    attesters: DashMap<Epoch, Vec<AttesterData>>,
}

impl DutyCache {
    pub fn proposers(&self, epoch: Epoch) -> Option<Vec<ProposerData>> {
        self.proposers.get(&epoch).map(|d| d.value().clone())
    }

    pub fn insert_proposers(&self, epoch: Epoch, duties: Vec<ProposerData>) {
        self.proposers.insert(epoch, duties);
    }

    pub fn attesters(&self, epoch: Epoch) -> Option<Vec<AttesterData>> {
        self.attesters.get(&epoch).map(|d| d.value().clone())
    }

    pub fn insert_attesters(&self, epoch: Epoch, duties: Vec<AttesterData>) {
        self.attesters.insert(epoch, duties);
    }

    /// Drops duties for epochs before `epoch`.
    pub fn prune(&self, epoch: Epoch) {
        self.proposers.retain(|e, _| *e >= epoch);
        self.attesters.retain(|e, _| *e >= epoch);
    }
}

pub struct DutiesService<T> {
    pub duties: Arc<DutyCache>,
    pub validators: Arc<ValidatorSet>,
    pub slot_clock: T,
    pub beacon_node: BeaconNodeHttpClient,
    pub spec: ChainSpec,
    /// Attester duties are requested for indices `0..=max_validator_index`.
    pub max_validator_index: u64,
    /// Keep cached artifacts for this many epochs. `None` keeps them forever.
    pub cache_retention_epochs: Option<u64>,
    pub log: Logger,
}

pub fn start_update_service<T: SlotClock + 'static>(
    core_duties_service: Arc<DutiesService<T>>,
    executor: &TaskExecutor,
) {
    /*
     * Spawn the task which fetches proposer and attester duties.
     */
    let duties_service = core_duties_service.clone();
    executor.spawn(
        async move {
            sleep(INITIAL_POLL_DELAY).await;
            loop {
                if let Err(e) = poll_beacon_proposers(&duties_service).await {
                    error!(
                        duties_service.log,
                        "Failed to poll beacon proposers";
                        "error" => %e,
                    );
                }
                if let Err(e) = poll_beacon_attesters(&duties_service).await {
                    error!(
                        duties_service.log,
                        "Failed to poll beacon attesters";
                        "error" => %e,
                    );
                }
                sleep(DUTIES_POLL_INTERVAL).await;
            }
        },
        "attacker_duties",
    );

    /*
     * Spawn the task which keeps validator roles in line with the attacker windows.
     */
    let duties_service = core_duties_service;
    executor.spawn(
        async move {
            loop {
                sleep(ROLE_UPDATE_INTERVAL).await;
                update_roles(&duties_service);
            }
        },
        "attacker_roles",
    );
}

async fn poll_beacon_proposers<T: SlotClock>(
    duties_service: &DutiesService<T>,
) -> Result<(), eth2::Error> {
    let Some(current_slot) = duties_service.slot_clock.now() else {
        return Ok(());
    };
    let current_epoch = current_slot.epoch(duties_service.spec.slots_per_epoch);

    for epoch in [current_epoch, current_epoch + 1] {
        let response = duties_service
            .beacon_node
            .get_validator_duties_proposer(epoch)
            .await?;

        for duty in &response.data {
            duties_service
                .validators
                .register_validator(duty.validator_index, duty.pubkey.clone(), None);
        }

        debug!(
            duties_service.log,
            "Downloaded proposer duties";
            "epoch" => %epoch,
            "count" => response.data.len(),
        );
        duties_service.duties.insert_proposers(epoch, response.data);
    }

    Ok(())
}

async fn poll_beacon_attesters<T: SlotClock>(
    duties_service: &DutiesService<T>,
) -> Result<(), eth2::Error> {
    let Some(current_slot) = duties_service.slot_clock.now() else {
        return Ok(());
    };
    let epoch = current_slot.epoch(duties_service.spec.slots_per_epoch);
    let indices: Vec<u64> = (0..=duties_service.max_validator_index).collect();

    let response = duties_service
        .beacon_node
        .post_validator_duties_attester(epoch, &indices)
        .await?;

    for duty in &response.data {
        duties_service
            .validators
            .register_validator(duty.validator_index, duty.pubkey.clone(), None);
    }

    debug!(
        duties_service.log,
        "Downloaded attester duties";
        "epoch" => %epoch,
        "count" => response.data.len(),
    );
    duties_service.duties.insert_attesters(epoch, response.data);

    Ok(())
}

/// Applies the attacker windows at the current slot and prunes expired cache entries.
pub fn update_roles<T: SlotClock>(duties_service: &DutiesService<T>) {
    let Some(slot) = duties_service.slot_clock.now() else {
        return;
    };

    let changed = duties_service.validators.update_roles(slot);
    if changed > 0 {
        let attackers = (0..=duties_service.max_validator_index)
            .filter(|index| duties_service.validators.role_of(slot, *index) == Role::Attacker)
            .count();
        debug!(
            duties_service.log,
            "Validator roles updated";
            "slot" => %slot,
            "changed" => changed,
            "attackers" => attackers,
        );
    }

    if let Some(retention) = duties_service.cache_retention_epochs {
        let spe = duties_service.spec.slots_per_epoch;
        let oldest_epoch = slot.epoch(spe).saturating_sub(retention);
        duties_service.validators.prune(oldest_epoch.start_slot(spe));
        duties_service.duties.prune(oldest_epoch);
    }
}
