mod cli;
mod config;

use attacker_service::ProductionAttackerService;
use clap::ArgMatches;
use clap_utils::flags::{DEBUG_LEVEL_FLAG, LOG_FORMAT_FLAG};
use environment::EnvironmentBuilder;
use slog::{crit, info};
use std::process::exit;

fn main() {
    // Enable backtraces unless a RUST_BACKTRACE value has already been explicitly provided.
    if std::env::var("RUST_BACKTRACE").is_err() {
        std::env::set_var("RUST_BACKTRACE", "1");
    }

    let cli_matches = cli::cli_app().get_matches();

    let result = run(&cli_matches);

    // `std::process::exit` does not run destructors so we drop manually.
    drop(cli_matches);

    match result {
        Ok(()) => exit(0),
        Err(e) => {
            eprintln!("{}", e);
            exit(1)
        }
    }
}

fn run(matches: &ArgMatches) -> Result<(), String> {
    let debug_level = matches
        .get_one::<String>(DEBUG_LEVEL_FLAG)
        .map(String::as_str)
        .unwrap_or("info");
    let log_format = matches.get_one::<String>(LOG_FORMAT_FLAG).map(String::as_str);

    let mut environment = EnvironmentBuilder::new()
        .multi_threaded_tokio_runtime()?
        .async_logger(debug_level, log_format)?
        .build()?;

    let log = environment.log().clone();

    let config = config::get_config(matches).map_err(|e| {
        crit!(log, "Failed to load attacker config"; "error" => &e);
        format!("Failed to load attacker config: {}", e)
    })?;

    info!(
        log,
        "Attacker service starting";
        "http_address" => %config.http_address,
        "http_port" => config.http_port,
        "strategy_file" => ?config.strategy_file,
    );

    let context = environment.service_context("attacker".into());

    // The HTTP server binds its socket while starting, which needs the runtime's reactor.
    let service = environment.runtime().block_on(async move {
        let mut service = ProductionAttackerService::new(context, config).await?;
        service.start_service()?;
        Ok::<_, String>(service)
    });

    let service = match service {
        Ok(service) => service,
        Err(e) => {
            crit!(log, "Failed to start attacker service"; "reason" => &e);
            environment.fire_signal();
            return Err(e);
        }
    };

    if let Some(listen_addr) = service.listen_addr() {
        info!(log, "Accepting hook calls"; "listen_address" => %listen_addr);
    }

    environment.block_until_shutdown_requested()?;
    info!(log, "Shutting down");

    environment.fire_signal();
    drop(service);

    Ok(())
}
