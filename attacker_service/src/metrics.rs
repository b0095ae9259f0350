use lazy_static::lazy_static;
pub use ::metrics::*;

pub const OK: &str = "ok";
pub const REJECTED: &str = "rejected";

lazy_static! {
    /*
     * Hooks
     */
    pub static ref HOOK_CALLS: Result<IntCounterVec> = try_create_int_counter_vec(
        "attacker_hook_calls_total",
        "Total count of hook calls received, by hook",
        &["hook"]
    );
    pub static ref HOOK_DISPATCH_TIMES: Result<HistogramVec> = try_create_histogram_vec(
        "attacker_hook_dispatch_seconds",
        "Time taken to answer a hook call, including any delay",
        &["hook"]
    );
    pub static ref ACTIONS_EXECUTED: Result<IntCounterVec> = try_create_int_counter_vec(
        "attacker_actions_executed_total",
        "Total count of strategy actions executed, by action",
        &["action"]
    );
    pub static ref PAYLOAD_DECODE_FAILURES: Result<IntCounterVec> = try_create_int_counter_vec(
        "attacker_payload_decode_failures_total",
        "Total count of hook payloads which could not be decoded, by hook",
        &["hook"]
    );

    /*
     * Strategies
     */
    pub static ref STRATEGY_INSTALLS: Result<IntCounterVec> = try_create_int_counter_vec(
        "attacker_strategy_installs_total",
        "Total count of strategy installs, by result",
        &["result"]
    );
    pub static ref STRATEGIES_COMPLETED: Result<IntCounter> = try_create_int_counter(
        "attacker_strategies_completed_total",
        "Total count of strategies whose slots have all passed"
    );
    pub static ref STRATEGIES_PENDING: Result<IntGauge> = try_create_int_gauge(
        "attacker_strategies_pending",
        "Number of installed strategies not yet completed"
    );

    /*
     * Validators
     */
    pub static ref KNOWN_VALIDATORS: Result<IntGauge> = try_create_int_gauge(
        "attacker_known_validators",
        "Number of validators seen in beacon node duties"
    );
    pub static ref POOLED_ATTESTATIONS: Result<IntGauge> = try_create_int_gauge(
        "attacker_pooled_attestations",
        "Number of attestations waiting in the pool"
    );
}
