//! Process-wide shutdown and bounded task draining.
//!
//! One [`ShutdownCoordinator`] per server. Its token stops the listener and is
//! handed to the [`Dispatcher`](crate::Dispatcher), so cancelling it also ends
//! every live session with [`CloseReason::ServerShutdown`](crate::websocket::connection::CloseReason).

use std::time::Duration;

use tokio::task::{AbortHandle, JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// How long [`ShutdownCoordinator::shutdown_and_wait`] waits when no timeout is given.
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

/// Owns the server's root cancellation token.
#[derive(Debug, Default)]
pub struct ShutdownCoordinator {
    token: CancellationToken,
}

impl ShutdownCoordinator {
    /// A coordinator that has not fired.
    pub fn new() -> Self {
        Self::default()
    }

    /// A handle observing this coordinator.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Fire. Idempotent.
    pub fn shutdown(&self) {
        if !self.token.is_cancelled() {
            info!("shutdown requested");
        }
        self.token.cancel();
    }

    /// Whether [`shutdown`](Self::shutdown) has been called.
    pub fn is_shutting_down(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Fire, then give `tasks` up to `timeout` to finish.
    ///
    /// Returns how many tasks had to be aborted.
    pub async fn shutdown_and_wait(&self, tasks: Vec<JoinHandle<()>>, timeout: Option<Duration>) -> usize {
        self.shutdown();
        drain_tasks(tasks, timeout.unwrap_or(DEFAULT_SHUTDOWN_TIMEOUT)).await
    }
}

/// Join `tasks` for at most `timeout`, aborting whatever is still running.
///
/// Returns the number of aborted tasks. Panicked tasks count as finished.
pub async fn drain_tasks(tasks: Vec<JoinHandle<()>>, timeout: Duration) -> usize {
    if tasks.is_empty() {
        return 0;
    }
    let aborts: Vec<AbortHandle> = tasks.iter().map(JoinHandle::abort_handle).collect();

    if tokio::time::timeout(timeout, futures::future::join_all(tasks))
        .await
        .is_ok()
    {
        return 0;
    }

    let stragglers: Vec<_> = aborts.into_iter().filter(|h| !h.is_finished()).collect();
    for task in &stragglers {
        task.abort();
    }
    let timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
    warn!(aborted = stragglers.len(), timeout_ms, "drain timed out");
    stragglers.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fires_once_and_stays_fired() {
        let coord = ShutdownCoordinator::new();
        let observer = coord.token();
        assert!(!coord.is_shutting_down());

        coord.shutdown();
        coord.shutdown();
        assert!(coord.is_shutting_down());
        assert!(observer.is_cancelled());
    }

    #[tokio::test]
    async fn cooperative_tasks_finish_without_aborts() {
        let coord = ShutdownCoordinator::new();
        let tasks = (0..3)
            .map(|_| {
                let token = coord.token();
                tokio::spawn(async move { token.cancelled().await })
            })
            .collect();

        assert_eq!(coord.shutdown_and_wait(tasks, None).await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn uncooperative_task_is_aborted() {
        let coord = ShutdownCoordinator::new();
        let stuck = tokio::spawn(std::future::pending::<()>());

        let aborted = coord
            .shutdown_and_wait(vec![stuck], Some(Duration::from_millis(100)))
            .await;
        assert_eq!(aborted, 1);
    }

    #[tokio::test]
    async fn only_stragglers_are_counted() {
        let quick = tokio::spawn(async {});
        let stuck = tokio::spawn(std::future::pending::<()>());
        assert_eq!(drain_tasks(vec![quick, stuck], Duration::from_millis(50)).await, 1);
    }

    #[tokio::test]
    async fn panicked_task_is_not_a_straggler() {
        let boom = tokio::spawn(async { panic!("boom") });
        assert_eq!(drain_tasks(vec![boom], Duration::from_secs(1)).await, 0);
    }

    #[tokio::test]
    async fn nothing_to_drain() {
        assert_eq!(drain_tasks(Vec::new(), Duration::ZERO).await, 0);
    }
}
