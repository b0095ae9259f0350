#[macro_use]
extern crate lazy_static;

use metrics::{inc_counter, try_create_int_counter, IntCounter, Result as MetricsResult};
use slog::{Drain, Level, Logger, OwnedKVList, Record};

lazy_static! {
    pub static ref INFOS_TOTAL: MetricsResult<IntCounter> =
        try_create_int_counter("info_total", "Count of infos logged");
    pub static ref WARNS_TOTAL: MetricsResult<IntCounter> =
        try_create_int_counter("warn_total", "Count of warns logged");
    pub static ref ERRORS_TOTAL: MetricsResult<IntCounter> =
        try_create_int_counter("error_total", "Count of errors logged");
    pub static ref CRITS_TOTAL: MetricsResult<IntCounter> =
        try_create_int_counter("crit_total", "Count of crits logged");
}

/// A drain which counts the records passing through it, by level, before handing them on.
///
/// Wrap it inside the level filter so that only records which are actually emitted are counted,
/// regardless of whether they end up formatted for a terminal or as JSON.
pub struct CountingDrain<D> {
    wrapped: D,
}

impl<D> CountingDrain<D> {
    pub fn new(wrapped: D) -> Self {
        Self { wrapped }
    }
}

impl<D: Drain> Drain for CountingDrain<D> {
    type Ok = D::Ok;
    type Err = D::Err;

    fn log(&self, record: &Record, values: &OwnedKVList) -> Result<Self::Ok, Self::Err> {
        match record.level() {
            Level::Info => inc_counter(&INFOS_TOTAL),
            Level::Warning => inc_counter(&WARNS_TOTAL),
            Level::Error => inc_counter(&ERRORS_TOTAL),
            Level::Critical => inc_counter(&CRITS_TOTAL),
            _ => (),
        }

        self.wrapped.log(record, values)
    }
}

/// Parses a `--debug-level` value.
pub fn parse_level(debug_level: &str) -> Result<Level, String> {
    match debug_level {
        "info" => Ok(Level::Info),
        "debug" => Ok(Level::Debug),
        "trace" => Ok(Level::Trace),
        "warn" => Ok(Level::Warning),
        "error" => Ok(Level::Error),
        "crit" => Ok(Level::Critical),
        unknown => Err(format!("Unknown debug-level: {}", unknown)),
    }
}

/// Return a logger suitable for test usage.
///
/// By default no logs will be printed, but they can be enabled via the `test_logger` feature:
///
/// ```bash
/// $ cargo test -p attacker_service --features 'logging/test_logger'
/// ```
///
/// Without the feature `test_logger()` returns a `NullLogger` and no log information is
/// displayed.
pub fn test_logger() -> Logger {
    use sloggers::Build;

    if cfg!(feature = "test_logger") {
        sloggers::terminal::TerminalLoggerBuilder::new()
            .level(sloggers::types::Severity::Debug)
            .build()
            .expect("Should build test_logger")
    } else {
        sloggers::null::NullLoggerBuilder
            .build()
            .expect("Should build null_logger")
    }
}

/// A logger that drops everything. Used where a service is constructed before logging is set up.
pub fn null_logger() -> Result<Logger, String> {
    use sloggers::Build;

    sloggers::null::NullLoggerBuilder
        .build()
        .map_err(|e| format!("Failed to start null logger: {:?}", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use slog::{info, warn};

    #[test]
    fn counts_emitted_levels() {
        let before_info = INFOS_TOTAL.as_ref().map(|c| c.get()).unwrap_or(0);
        let before_warn = WARNS_TOTAL.as_ref().map(|c| c.get()).unwrap_or(0);

        let drain = CountingDrain::new(slog::Discard)
            .filter_level(Level::Info)
            .fuse();
        let log = Logger::root(drain, slog::o!());
        info!(log, "Counted"; "n" => 1);
        warn!(log, "Counted"; "n" => 2);
        slog::debug!(log, "Filtered out");

        assert!(INFOS_TOTAL.as_ref().map(|c| c.get()).unwrap_or(0) > before_info);
        assert!(WARNS_TOTAL.as_ref().map(|c| c.get()).unwrap_or(0) > before_warn);
    }

    #[test]
    fn parses_levels() {
        assert_eq!(parse_level("warn"), Ok(Level::Warning));
        assert!(parse_level("loud").is_err());
    }
}
