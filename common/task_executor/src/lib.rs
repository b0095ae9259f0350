mod metrics;

use futures::prelude::*;
use slog::{debug, info};
use std::future::Future;
use tokio::runtime::Handle;

/// A wrapper over a runtime handle which can spawn async and blocking tasks.
///
/// Spawned futures are wrapped in an exit_future which cancels the task when the corresponding
/// exit_future `Signal` is fired/dropped.
#[derive(Clone)]
pub struct TaskExecutor {
    /// The handle to the runtime on which tasks are spawned
    handle: Handle,
    /// The receiver exit future which on receiving shuts down the task
    exit: exit_future::Exit,
    log: slog::Logger,
}

impl TaskExecutor {
    /// Create a new task executor.
    ///
    /// Note: this is mainly useful in testing.
    pub fn new(handle: Handle, exit: exit_future::Exit, log: slog::Logger) -> Self {
        Self { handle, exit, log }
    }

    /// Clones the task executor adding a service name.
    pub fn clone_with_name(&self, service_name: String) -> Self {
        TaskExecutor {
            handle: self.handle.clone(),
            exit: self.exit.clone(),
            log: self.log.new(slog::o!("service" => service_name)),
        }
    }

    /// Spawn a future on the tokio runtime wrapped in an exit_future `Exit`. The task is canceled
    /// when the corresponding exit_future `Signal` is fired/dropped.
    ///
    /// This function generates prometheus metrics on number of tasks and task duration.
    pub fn spawn(&self, task: impl Future<Output = ()> + Send + 'static, name: &'static str) {
        let exit = self.exit.clone();
        let log = self.log.clone();

        if let Some(int_gauge) = metrics::get_int_gauge(&metrics::RUNNING_TASKS, &[name]) {
            // Task is shutdown before it completes if `exit` receives
            let int_gauge_1 = int_gauge.clone();
            let future = future::select(Box::pin(task), exit).then(move |either| {
                match either {
                    future::Either::Left(_) => debug!(log, "Async task completed"; "task" => name),
                    future::Either::Right(_) => info!(log, "Async task shutdown"; "task" => name),
                }
                int_gauge_1.dec();
                futures::future::ready(())
            });

            int_gauge.inc();
            self.handle.spawn(future);
        }
    }

    /// Spawn a future on the tokio runtime. This function does not wrap the task in an `Exit`
    /// future like `spawn`, so the task runs to completion even if the exit signal fires.
    pub fn spawn_without_exit(
        &self,
        task: impl Future<Output = ()> + Send + 'static,
        name: &'static str,
    ) {
        if let Some(int_gauge) = metrics::get_int_gauge(&metrics::RUNNING_TASKS, &[name]) {
            let int_gauge_1 = int_gauge.clone();
            let future = task.then(move |_| {
                int_gauge_1.dec();
                futures::future::ready(())
            });

            int_gauge.inc();
            self.handle.spawn(future);
        }
    }

    /// Block the current (non-async) thread on the completion of some future.
    ///
    /// ## Warning
    ///
    /// This method is "dangerous" since calling it from an async thread will result in a panic!
    /// Only call it from a thread spawned with `spawn_blocking` or a thread outside the runtime.
    ///
    /// Returns `None` if the exit signal fires before the future completes.
    pub fn block_on_dangerous<F: Future>(
        &self,
        future: F,
        name: &'static str,
    ) -> Option<F::Output> {
        let timer = metrics::start_timer_vec(&metrics::BLOCKED_CALLER_SECONDS, &[name]);
        metrics::inc_gauge_vec(&metrics::BLOCKED_CALLERS, &[name]);
        let log = self.log.clone();
        let exit = self.exit.clone();
        debug!(log, "Starting block_on task"; "name" => name);

        let output = self.handle.block_on(async {
            tokio::select! {
                output = future => Some(output),
                _ = exit => {
                    debug!(log, "Cancelled block_on task"; "name" => name);
                    None
                }
            }
        });

        metrics::dec_gauge_vec(&metrics::BLOCKED_CALLERS, &[name]);
        metrics::stop_timer(timer);
        debug!(self.log, "Completed block_on task"; "name" => name);

        output
    }

    /// Returns the underlying runtime handle.
    pub fn handle(&self) -> &Handle {
        &self.handle
    }

    /// Returns a copy of the `exit_future::Exit`.
    pub fn exit(&self) -> exit_future::Exit {
        self.exit.clone()
    }

    /// Returns a reference to the logger.
    pub fn log(&self) -> &slog::Logger {
        &self.log
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use logging::test_logger;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn block_on_from_blocking_thread() {
        let (_signal, exit) = exit_future::signal();
        let executor = TaskExecutor::new(Handle::current(), exit, test_logger());

        let output = tokio::task::spawn_blocking(move || {
            executor.block_on_dangerous(async { 40 + 2 }, "test_block_on")
        })
        .await
        .unwrap();

        assert_eq!(output, Some(42));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn spawned_task_stops_on_exit() {
        let (signal, exit) = exit_future::signal();
        let executor = TaskExecutor::new(Handle::current(), exit, test_logger());
        let finished = Arc::new(AtomicBool::new(false));

        let finished_1 = finished.clone();
        executor.spawn(
            async move {
                tokio::time::sleep(Duration::from_secs(60)).await;
                finished_1.store(true, Ordering::SeqCst);
            },
            "test_long_task",
        );

        signal.fire().unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!finished.load(Ordering::SeqCst));
    }
}
