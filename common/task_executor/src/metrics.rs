//! Task counts and durations, labelled by task name.

use lazy_static::lazy_static;
pub use metrics::*;

lazy_static! {
    pub static ref RUNNING_TASKS: Result<IntGaugeVec> = try_create_int_gauge_vec(
        "executor_running_tasks",
        "Number of spawned futures that have not yet finished",
        &["task"]
    );
    pub static ref BLOCKED_CALLERS: Result<IntGaugeVec> = try_create_int_gauge_vec(
        "executor_blocked_callers",
        "Number of threads currently parked in block_on_dangerous",
        &["task"]
    );
    pub static ref BLOCKED_CALLER_SECONDS: Result<HistogramVec> = try_create_histogram_vec(
        "executor_blocked_caller_seconds",
        "Time a thread spent parked in block_on_dangerous",
        &["task"]
    );
}
