pub mod backend;
mod config;
pub mod dispatcher;
pub mod duties_service;
pub mod feedback;
pub mod hook;
pub mod http_api;
mod legacy;
mod metrics;
pub mod strategy;
pub mod test_utils;
pub mod validator_set;

pub use config::Config;

use backend::{BeaconBackend, BeaconNodeBackend};
use duties_service::{DutiesService, DutyCache};
use environment::RuntimeContext;
use eth2::{BeaconNodeHttpClient, ExecutionHttpClient, Timeouts};
use feedback::Feedback;
use parking_lot::Mutex;
use slog::{error, info, warn, Logger};
use slot_clock::{SlotClock, SystemTimeSlotClock};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use strategy::{Context, RuleSet, Strategy, StrategyStore};
use tokio::time::sleep;
use types::{ChainSpec, Slot};
use validator_set::ValidatorSet;

/// The interval between attempts to contact the beacon node during startup.
const RETRY_DELAY: Duration = Duration::from_secs(2);

/// The global timeout for HTTP requests to the beacon and execution nodes.
const HTTP_TIMEOUT: Duration = Duration::from_secs(12);

/// Used when the beacon node does not serve its configuration.
pub const FALLBACK_SLOTS_PER_EPOCH: u64 = 6;
pub const FALLBACK_SECONDS_PER_SLOT: u64 = 12;

pub fn fallback_spec() -> ChainSpec {
    ChainSpec {
        slots_per_epoch: FALLBACK_SLOTS_PER_EPOCH,
        seconds_per_slot: FALLBACK_SECONDS_PER_SLOT,
        ..ChainSpec::mainnet()
    }
}

/// The engine behind every endpoint: the installed strategy, the validator set and the chain
/// access used to answer hook calls.
pub struct AttackerService<T: SlotClock, B: BeaconBackend> {
    spec: ChainSpec,
    slot_clock: T,
    backend: Arc<B>,
    validators: Arc<ValidatorSet>,
    strategies: StrategyStore,
    /// Held while a new rule set and its windows are put in place.
    install_lock: Mutex<()>,
    feedback: Arc<Feedback>,
    log: Logger,
}

impl<T: SlotClock + 'static, B: BeaconBackend> AttackerService<T, B> {
    pub fn new(
        spec: ChainSpec,
        slot_clock: T,
        backend: Arc<B>,
        validators: Arc<ValidatorSet>,
        log: Logger,
    ) -> Self {
        Self {
            feedback: Arc::new(Feedback::new(spec.slots_per_epoch)),
            spec,
            slot_clock,
            backend,
            validators,
            strategies: StrategyStore::default(),
            install_lock: Mutex::new(()),
            log,
        }
    }

    pub fn spec(&self) -> &ChainSpec {
        &self.spec
    }

    pub fn slot_clock(&self) -> &T {
        &self.slot_clock
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn validators(&self) -> &Arc<ValidatorSet> {
        &self.validators
    }

    pub fn feedback(&self) -> &Arc<Feedback> {
        &self.feedback
    }

    pub fn log(&self) -> &Logger {
        &self.log
    }

    /// The rule set in force right now.
    pub fn strategy(&self) -> Arc<RuleSet> {
        self.strategies.current()
    }

    /// Compiles and installs `strategy`, replacing the current one.
    ///
    /// On error nothing changes: the previous strategy stays in force. A strategy without a `uid`
    /// is named after its installation time in milliseconds.
    pub fn install_strategy(&self, strategy: Strategy) -> Result<Arc<RuleSet>, strategy::Error> {
        let installed_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or_default();
        let uid = strategy
            .uid
            .clone()
            .unwrap_or_else(|| installed_at.to_string());

        let rule_set = match RuleSet::compile(strategy, uid, &mut rand::thread_rng()) {
            Ok(rule_set) => Arc::new(rule_set),
            Err(e) => {
                metrics::inc_counter_vec(&metrics::STRATEGY_INSTALLS, &[metrics::REJECTED]);
                warn!(self.log, "Rejected strategy"; "error" => %e);
                return Err(e);
            }
        };

        {
            let _guard = self.install_lock.lock();
            self.validators.install_windows(rule_set.attacker_windows.clone());
            if let Some(slot) = self.slot_clock.now() {
                self.validators.update_roles(slot);
            }
            self.strategies.install(rule_set.clone());
            self.feedback.add_strategy(installed_at, rule_set.clone());
        }
        metrics::inc_counter_vec(&metrics::STRATEGY_INSTALLS, &[metrics::OK]);

        info!(
            self.log,
            "Installed strategy";
            "uid" => &rule_set.uid,
            "rules" => rule_set.rules.len(),
            "attacker_windows" => rule_set.strategy.validators.len(),
        );

        Ok(rule_set)
    }

    /// A context resolving roles against the windows of `rule_set`.
    pub(crate) fn context(&self, rule_set: &RuleSet) -> Context<'_, T, B> {
        Context {
            spec: &self.spec,
            slot_clock: &self.slot_clock,
            backend: self.backend.as_ref(),
            validators: &self.validators,
            windows: rule_set.attacker_windows.clone(),
            log: &self.log,
        }
    }
}

pub struct ProductionAttackerService {
    context: RuntimeContext,
    service: Arc<AttackerService<SystemTimeSlotClock, BeaconNodeBackend>>,
    duties_service: Arc<DutiesService<SystemTimeSlotClock>>,
    config: Config,
    http_api_listen_addr: Option<SocketAddr>,
}

impl ProductionAttackerService {
    /// Connects to the beacon node and installs the startup strategy, _without_ spawning any
    /// background task or the HTTP server.
    pub async fn new(context: RuntimeContext, config: Config) -> Result<Self, String> {
        let log = context.log().clone();

        let beacon_node_url = config
            .beacon_node
            .clone()
            .ok_or_else(|| "No beacon node URL configured".to_string())?;

        info!(
            log,
            "Starting attacker service";
            "beacon_node" => %beacon_node_url,
            "execution_node" => ?config.execution_node,
        );

        let beacon_node =
            BeaconNodeHttpClient::new(beacon_node_url, Timeouts::set_all(HTTP_TIMEOUT));
        let genesis_time = wait_for_genesis(&beacon_node, &log).await;

        let spec = match beacon_node.get_config_spec().await {
            Ok(response) => response.data.to_chain_spec(),
            Err(e) => {
                let spec = fallback_spec();
                warn!(
                    log,
                    "Unable to read beacon node config, using fallback";
                    "error" => %e,
                    "slots_per_epoch" => spec.slots_per_epoch,
                    "seconds_per_slot" => spec.seconds_per_slot,
                );
                spec
            }
        };

        let slot_clock = SystemTimeSlotClock::new(
            Slot::new(0),
            Duration::from_secs(genesis_time),
            spec.slot_duration(),
        );

        let execution_node = config
            .execution_node
            .clone()
            .map(|url| ExecutionHttpClient::new(url, HTTP_TIMEOUT));
        let duties = Arc::new(DutyCache::default());
        let validators = Arc::new(ValidatorSet::new());
        let backend = Arc::new(BeaconNodeBackend::new(
            beacon_node.clone(),
            execution_node,
            duties.clone(),
            context.executor.clone(),
        ));

        let service = Arc::new(AttackerService::new(
            spec.clone(),
            slot_clock.clone(),
            backend,
            validators.clone(),
            context.service_context("strategy".into()).log().clone(),
        ));

        if let Some(path) = &config.strategy_file {
            let json = std::fs::read_to_string(path)
                .map_err(|e| format!("Unable to read strategy file {:?}: {}", path, e))?;
            let strategy = Strategy::from_json(&json)
                .map_err(|e| format!("Unable to parse strategy file {:?}: {}", path, e))?;
            service
                .install_strategy(strategy)
                .map_err(|e| format!("Unable to install strategy file {:?}: {}", path, e))?;
        }

        let duties_service = Arc::new(DutiesService {
            duties,
            validators,
            slot_clock,
            beacon_node,
            spec,
            max_validator_index: config.max_validator_index,
            cache_retention_epochs: config.cache_retention_epochs,
            log: context.service_context("duties".into()).log().clone(),
        });

        Ok(Self {
            context,
            service,
            duties_service,
            config,
            http_api_listen_addr: None,
        })
    }

    pub fn start_service(&mut self) -> Result<(), String> {
        duties_service::start_update_service(self.duties_service.clone(), &self.context.executor);

        feedback::spawn_feedback_service(
            self.service.feedback().clone(),
            self.service.slot_clock().clone(),
            Duration::from_secs(self.config.feedback_interval),
            self.config.cache_retention_epochs,
            &self.context.executor,
            self.context.service_context("feedback".into()).log().clone(),
        );

        let ctx = Arc::new(http_api::Context {
            service: self.service.clone(),
            config: http_api::Config {
                listen_addr: self.config.http_address,
                listen_port: self.config.http_port,
                allow_origin: self.config.allow_origin.clone(),
            },
            log: self.context.service_context("http_api".into()).log().clone(),
        });
        let exit = self.context.executor.exit();
        let (listen_addr, server) = http_api::serve(ctx, exit)
            .map_err(|e| format!("Unable to start HTTP API server: {:?}", e))?;

        self.context
            .clone()
            .executor
            .spawn_without_exit(server, "http_api");
        self.http_api_listen_addr = Some(listen_addr);

        Ok(())
    }

    pub fn listen_addr(&self) -> Option<SocketAddr> {
        self.http_api_listen_addr
    }
}

/// Requests the genesis time from the beacon node, trying again until it answers.
async fn wait_for_genesis(beacon_node: &BeaconNodeHttpClient, log: &Logger) -> u64 {
    loop {
        match beacon_node.get_beacon_genesis().await {
            Ok(genesis) => {
                info!(
                    log,
                    "Connected to beacon node";
                    "genesis_time" => genesis.data.genesis_time,
                );
                return genesis.data.genesis_time;
            }
            Err(e) => {
                error!(
                    log,
                    "Unable to read genesis from beacon node";
                    "error" => %e,
                );
                sleep(RETRY_DELAY).await;
            }
        }
    }
}
