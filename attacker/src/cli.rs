use clap::{crate_version, Arg, ArgAction, Command};
use clap_utils::flags::{CONFIG_FILE_FLAG, DEBUG_LEVEL_FLAG, LOG_FORMAT_FLAG};

pub const HTTP_ADDRESS_FLAG: &str = "http-address";
pub const HTTP_PORT_FLAG: &str = "http-port";
pub const HTTP_ALLOW_ORIGIN_FLAG: &str = "http-allow-origin";
pub const BEACON_NODE_FLAG: &str = "beacon-node";
pub const EXECUTION_NODE_FLAG: &str = "execution-node";
pub const STRATEGY_FILE_FLAG: &str = "strategy-file";
pub const MAX_VALIDATOR_INDEX_FLAG: &str = "max-validator-index";
pub const CACHE_RETENTION_EPOCHS_FLAG: &str = "cache-retention-epochs";
pub const FEEDBACK_INTERVAL_FLAG: &str = "feedback-interval";

pub fn cli_app() -> Command {
    Command::new("attacker")
        .version(crate_version!())
        .author("Sigma Prime <contact@sigmaprime.io>")
        .about(
            "Serves attack strategies to instrumented validator clients. Each client calls a \
            hook before and after signing or broadcasting and is told whether to continue, \
            delay, drop or rewrite the message.",
        )
        .arg(
            Arg::new(CONFIG_FILE_FLAG)
                .long(CONFIG_FILE_FLAG)
                .visible_alias("config")
                .value_name("FILE")
                .help(
                    "A TOML file providing any of the options below. Flags given on the \
                    command line take precedence over the file.",
                )
                .action(ArgAction::Set)
                .display_order(0),
        )
        .arg(
            Arg::new(DEBUG_LEVEL_FLAG)
                .long(DEBUG_LEVEL_FLAG)
                .value_name("LEVEL")
                .help("Specifies the verbosity level used when emitting logs to the terminal.")
                .action(ArgAction::Set)
                .value_parser(["info", "debug", "trace", "warn", "error", "crit"])
                .default_value("info")
                .display_order(0),
        )
        .arg(
            Arg::new(LOG_FORMAT_FLAG)
                .long(LOG_FORMAT_FLAG)
                .value_name("FORMAT")
                .help("Specifies the log format used when emitting logs to the terminal.")
                .action(ArgAction::Set)
                .value_parser(["JSON"])
                .display_order(0),
        )
        .arg(
            Arg::new(HTTP_ADDRESS_FLAG)
                .long(HTTP_ADDRESS_FLAG)
                .value_name("ADDRESS")
                .help("Set the address for the HTTP server. [default: 127.0.0.1]")
                .action(ArgAction::Set)
                .display_order(0),
        )
        .arg(
            Arg::new(HTTP_PORT_FLAG)
                .long(HTTP_PORT_FLAG)
                .value_name("PORT")
                .help("Set the listen TCP port for the HTTP server. [default: 10000]")
                .action(ArgAction::Set)
                .display_order(0),
        )
        .arg(
            Arg::new(HTTP_ALLOW_ORIGIN_FLAG)
                .long(HTTP_ALLOW_ORIGIN_FLAG)
                .value_name("ORIGIN")
                .help(
                    "Set the value of the Access-Control-Allow-Origin response HTTP header. \
                    Use * to allow any origin (not recommended in production). If no value \
                    is supplied, the CORS allowed origin is set to the listen address of \
                    this server.",
                )
                .action(ArgAction::Set)
                .display_order(0),
        )
        .arg(
            Arg::new(BEACON_NODE_FLAG)
                .long(BEACON_NODE_FLAG)
                .value_name("NETWORK_ADDRESS")
                .help(
                    "HTTP API endpoint of the beacon node used for genesis, chain timings, \
                    proposer and attester duties and block roots. [default: \
                    http://localhost:5052]",
                )
                .action(ArgAction::Set)
                .display_order(0),
        )
        .arg(
            Arg::new(EXECUTION_NODE_FLAG)
                .long(EXECUTION_NODE_FLAG)
                .value_name("NETWORK_ADDRESS")
                .help(
                    "JSON-RPC endpoint of an execution node. Only required by the \
                    attestation modification endpoint.",
                )
                .action(ArgAction::Set)
                .display_order(0),
        )
        .arg(
            Arg::new(STRATEGY_FILE_FLAG)
                .long(STRATEGY_FILE_FLAG)
                .value_name("FILE")
                .help("A JSON strategy document to install before the HTTP server starts.")
                .action(ArgAction::Set)
                .display_order(0),
        )
        .arg(
            Arg::new(MAX_VALIDATOR_INDEX_FLAG)
                .long(MAX_VALIDATOR_INDEX_FLAG)
                .value_name("INDEX")
                .help(
                    "Attester duties are polled for validators 0 up to and including this \
                    index. [default: 63]",
                )
                .action(ArgAction::Set)
                .display_order(0),
        )
        .arg(
            Arg::new(CACHE_RETENTION_EPOCHS_FLAG)
                .long(CACHE_RETENTION_EPOCHS_FLAG)
                .value_name("EPOCHS")
                .help(
                    "Prune cached blocks, attestations, duties and pooled attestations older \
                    than this many epochs. By default nothing is pruned.",
                )
                .action(ArgAction::Set)
                .display_order(0),
        )
        .arg(
            Arg::new(FEEDBACK_INTERVAL_FLAG)
                .long(FEEDBACK_INTERVAL_FLAG)
                .value_name("SECONDS")
                .help("Seconds between checks for completed strategies. [default: 10]")
                .action(ArgAction::Set)
                .display_order(0),
        )
}
