//! Access to the beacon and execution nodes from inside a hook call.
//!
//! Hook calls run on blocking threads, so the `BeaconBackend` trait is synchronous. The production
//! implementation drives the async HTTP clients with `TaskExecutor::block_on_dangerous`.

use crate::duties_service::DutyCache;
use eth2::types::{BlockId, Epoch, Hash256, ProposerData, Slot};
use eth2::{BeaconNodeHttpClient, ExecutionHttpClient};
use std::sync::Arc;
use task_executor::TaskExecutor;

#[derive(Debug)]
pub enum Error {
    BeaconNode(eth2::Error),
    ExecutionNode(eth2::Error),
    /// No execution node was configured.
    NoExecutionNode,
    /// The executor is shutting down.
    Shutdown,
    /// The beacon node has no block at the requested slot.
    RootNotFound(Slot),
}

/// The chain data actions and slot matchers consult while a hook call is in flight.
pub trait BeaconBackend: Send + Sync + 'static {
    /// Proposer duties for every slot of `epoch`.
    fn proposer_duties(&self, epoch: Epoch) -> Result<Vec<ProposerData>, Error>;

    /// The canonical block root at `slot`.
    fn block_root_at_slot(&self, slot: Slot) -> Result<Hash256, Error>;

    /// The height of the execution chain head.
    fn execution_block_number(&self) -> Result<u64, Error>;
}

pub struct BeaconNodeBackend {
    beacon_node: BeaconNodeHttpClient,
    execution_node: Option<ExecutionHttpClient>,
    duties: Arc<DutyCache>,
    executor: TaskExecutor,
}

impl BeaconNodeBackend {
    pub fn new(
        beacon_node: BeaconNodeHttpClient,
        execution_node: Option<ExecutionHttpClient>,
        duties: Arc<DutyCache>,
        executor: TaskExecutor,
    ) -> Self {
        Self {
            beacon_node,
            execution_node,
            duties,
            executor,
        }
    }

    pub fn beacon_node(&self) -> &BeaconNodeHttpClient {
        &self.beacon_node
    }
}

impl BeaconBackend for BeaconNodeBackend {
    fn proposer_duties(&self, epoch: Epoch) -> Result<Vec<ProposerData>, Error> {
        if let Some(duties) = self.duties.proposers(epoch) {
            return Ok(duties);
        }

        let response = self
            .executor
            .block_on_dangerous(
                self.beacon_node.get_validator_duties_proposer(epoch),
                "attacker_proposer_duties",
            )
            .ok_or(Error::Shutdown)?
            .map_err(Error::BeaconNode)?;

        self.duties.insert_proposers(epoch, response.data.clone());
        Ok(response.data)
    }

    fn block_root_at_slot(&self, slot: Slot) -> Result<Hash256, Error> {
        self.executor
            .block_on_dangerous(
                self.beacon_node.get_beacon_blocks_root(BlockId::Slot(slot)),
                "attacker_block_root",
            )
            .ok_or(Error::Shutdown)?
            .map_err(Error::BeaconNode)?
            .map(|response| response.data.root)
            .ok_or(Error::RootNotFound(slot))
    }

    fn execution_block_number(&self) -> Result<u64, Error> {
        let execution_node = self
            .execution_node
            .as_ref()
            .ok_or(Error::NoExecutionNode)?;

        self.executor
            .block_on_dangerous(execution_node.block_number(), "attacker_block_number")
            .ok_or(Error::Shutdown)?
            .map_err(Error::ExecutionNode)
    }
}
