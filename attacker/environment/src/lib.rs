//! This crate provides a common set of tools used to create an "environment" to run the attacker
//! service. It unifies the creation of tokio runtimes and loggers in production and in testing.
//!
//! The main thread creates an `Environment`, which is then used to spawn a `RuntimeContext` which
//! can be handed to any service that wishes to start async tasks or perform logging.

use logging::CountingDrain;
use slog::{info, o, Drain, Logger};
use sloggers::{null::NullLoggerBuilder, Build};
use std::sync::Arc;
use task_executor::TaskExecutor;
use tokio::runtime::{Builder as RuntimeBuilder, Runtime};

/// Builds an `Environment`.
pub struct EnvironmentBuilder {
    runtime: Option<Arc<Runtime>>,
    log: Option<Logger>,
}

impl Default for EnvironmentBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl EnvironmentBuilder {
    pub fn new() -> Self {
        Self {
            runtime: None,
            log: None,
        }
    }

    /// Specifies that a multi-threaded tokio runtime should be used. Ideal for production uses.
    pub fn multi_threaded_tokio_runtime(mut self) -> Result<Self, String> {
        self.runtime = Some(Arc::new(
            RuntimeBuilder::new_multi_thread()
                .enable_all()
                .build()
                .map_err(|e| format!("Failed to start runtime: {:?}", e))?,
        ));
        Ok(self)
    }

    /// Specifies that all logs should be sent to `null` (i.e., ignored).
    pub fn null_logger(mut self) -> Result<Self, String> {
        self.log = Some(null_logger()?);
        Ok(self)
    }

    /// Specifies that the `slog` asynchronous logger should be used. Ideal for production.
    ///
    /// The logger is "async" because it has a dedicated thread that accepts logs and then
    /// asynchronously flushes them to stdout. This means the thread that raised the log does not
    /// have to wait for the logs to be flushed.
    pub fn async_logger(
        mut self,
        debug_level: &str,
        log_format: Option<&str>,
    ) -> Result<Self, String> {
        let level = logging::parse_level(debug_level)?;

        let drain = if let Some(format) = log_format {
            match format.to_uppercase().as_str() {
                "JSON" => {
                    let drain = slog_json::Json::default(std::io::stdout()).fuse();
                    slog_async::Async::new(drain).build()
                }
                _ => return Err("Logging format provided is not supported".to_string()),
            }
        } else {
            let decorator = slog_term::TermDecorator::new().build();
            let drain = slog_term::FullFormat::new(decorator).build().fuse();
            slog_async::Async::new(drain).build()
        };

        let drain = CountingDrain::new(drain.fuse()).filter_level(level);

        self.log = Some(Logger::root(drain.fuse(), o!()));
        Ok(self)
    }

    /// Consumes the builder, returning an `Environment`.
    pub fn build(self) -> Result<Environment, String> {
        let (signal, exit) = exit_future::signal();

        Ok(Environment {
            runtime: self
                .runtime
                .ok_or_else(|| "Cannot build environment without runtime".to_string())?,
            log: self
                .log
                .ok_or_else(|| "Cannot build environment without log".to_string())?,
            signal: Some(signal),
            exit,
        })
    }
}

/// An execution context that can be used by a service.
///
/// Distinct from an `Environment` because a `RuntimeContext` is not able to shut down the
/// runtime, it only has access to a `TaskExecutor`.
#[derive(Clone)]
pub struct RuntimeContext {
    pub executor: TaskExecutor,
    pub log: Logger,
}

impl RuntimeContext {
    /// Returns a sub-context of this context.
    ///
    /// The generated service will have the `service_name` in all its logs.
    pub fn service_context(&self, service_name: String) -> Self {
        Self {
            executor: self.executor.clone_with_name(service_name.clone()),
            log: self.log.new(o!("service" => service_name)),
        }
    }

    /// Returns a reference to the logger for this service.
    pub fn log(&self) -> &Logger {
        &self.log
    }
}

/// An environment where the attacker service can run, either in production or in tests that
/// involve logging and async task execution.
pub struct Environment {
    runtime: Arc<Runtime>,
    log: Logger,
    signal: Option<exit_future::Signal>,
    exit: exit_future::Exit,
}

impl Environment {
    /// Returns a reference to the `tokio` runtime.
    ///
    /// Useful in the rare scenarios where it's necessary to block the current thread until a task
    /// is finished (e.g., during testing).
    pub fn runtime(&self) -> &Arc<Runtime> {
        &self.runtime
    }

    /// Returns a `RuntimeContext` where no "service" has been added to the logger output.
    pub fn core_context(&self) -> RuntimeContext {
        RuntimeContext {
            executor: TaskExecutor::new(
                self.runtime.handle().clone(),
                self.exit.clone(),
                self.log.clone(),
            ),
            log: self.log.clone(),
        }
    }

    /// Returns a `RuntimeContext` where the `service_name` is added to the logger output.
    pub fn service_context(&self, service_name: String) -> RuntimeContext {
        self.core_context().service_context(service_name)
    }

    /// Block the current thread until Ctrl+C (or SIGTERM on unix) is received.
    pub fn block_until_shutdown_requested(&self) -> Result<(), String> {
        let log = self.log.clone();

        self.runtime.block_on(async move {
            #[cfg(unix)]
            {
                use tokio::signal::unix::{signal, SignalKind};

                let mut sigterm = signal(SignalKind::terminate())
                    .map_err(|e| format!("Could not register SIGTERM handler: {}", e))?;

                tokio::select! {
                    result = tokio::signal::ctrl_c() => {
                        result.map_err(|e| format!("Ctrl-C handler failed: {}", e))?;
                        info!(log, "Internal shutdown received"; "reason" => "SIGINT");
                    }
                    _ = sigterm.recv() => {
                        info!(log, "Internal shutdown received"; "reason" => "SIGTERM");
                    }
                }
            }

            #[cfg(not(unix))]
            {
                tokio::signal::ctrl_c()
                    .await
                    .map_err(|e| format!("Ctrl-C handler failed: {}", e))?;
                info!(log, "Internal shutdown received"; "reason" => "SIGINT");
            }

            Ok::<(), String>(())
        })
    }

    /// Fire the exit signal, cancelling every task spawned through a `TaskExecutor`.
    pub fn fire_signal(&mut self) {
        if let Some(signal) = self.signal.take() {
            let _ = signal.fire();
        }
    }

    /// Returns the root logger.
    pub fn log(&self) -> &Logger {
        &self.log
    }
}

pub fn null_logger() -> Result<Logger, String> {
    let log_builder = NullLoggerBuilder;
    log_builder
        .build()
        .map_err(|e| format!("Failed to start null logger: {:?}", e))
}
