//! CLI flags shared by the attacker binaries.

pub const CONFIG_FILE_FLAG: &str = "config-file";
pub const LOG_FORMAT_FLAG: &str = "log-format";
pub const DEBUG_LEVEL_FLAG: &str = "debug-level";
