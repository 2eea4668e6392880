use std::future::Future;

use tokio_util::sync::{CancellationToken, DropGuard, WaitForCancellationFuture};

use crate::error::{Error, ErrorKind, Result};

/// Lifecycle phase of a server instance. Transitions are strictly
/// forward: NotStarted → Running → Stopping → Stopped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunState {
    NotStarted,
    Running,
    Stopping,
    Stopped,
}

/// Shutdown coordination shared by a server and its serve task.
///
/// Two separate signals back the lifecycle: a level-triggered `stop`
/// token set by [`request_stop`](Self::request_stop) (safe to set before
/// the serve task starts polling), and an `exited` token cancelled
/// exactly once by the serve task itself on exit. `wait` blocks only on
/// the latter, so it cannot return while the serve task can still
/// produce connections.
pub(crate) struct Lifecycle {
    state: tokio::sync::Mutex<RunState>,
    stop: CancellationToken,
    exited: CancellationToken,
    fault: tokio::sync::Mutex<Option<Error>>,
}

impl Lifecycle {
    pub fn new() -> Self {
        Self {
            state: tokio::sync::Mutex::new(RunState::NotStarted),
            stop: CancellationToken::new(),
            exited: CancellationToken::new(),
            fault: tokio::sync::Mutex::new(None),
        }
    }

    pub async fn state(&self) -> RunState {
        *self.state.lock().await
    }

    /// Runs `bind` and transitions to Running on success. A bind failure
    /// leaves the instance NotStarted; a second start is rejected.
    pub async fn start<F, Fut, T>(&self, bind: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut state = self.state.lock().await;
        if *state != RunState::NotStarted {
            return Err(Error::new(
                ErrorKind::AlreadyRunning,
                format!("start rejected in state {:?}", *state),
            ));
        }
        let value = bind().await?;
        *state = RunState::Running;
        Ok(value)
    }

    /// Requests shutdown and transitions to Stopping. Does not wait for
    /// the serve task to exit.
    pub async fn request_stop(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        if *state != RunState::Running {
            return Err(Error::new(
                ErrorKind::NotRunning,
                format!("stop rejected in state {:?}", *state),
            ));
        }
        *state = RunState::Stopping;
        self.stop.cancel();
        Ok(())
    }

    pub fn shutdown_requested(&self) -> WaitForCancellationFuture<'_> {
        self.stop.cancelled()
    }

    pub fn shutdown_token(&self) -> CancellationToken {
        self.stop.clone()
    }

    /// Dropping the guard requests shutdown, so an abandoned server does
    /// not leave its serve task running.
    pub fn drop_guard(&self) -> DropGuard {
        self.stop.clone().drop_guard()
    }

    /// Called by the serve task itself, exactly once, on exit. Releases
    /// every pending and future `wait`.
    pub async fn mark_exited(&self) {
        let mut state = self.state.lock().await;
        *state = RunState::Stopped;
        drop(state);
        self.exited.cancel();
    }

    /// Blocks until the serve task has exited. Idempotent; returns
    /// immediately if the instance was never started.
    pub async fn wait(&self) {
        if *self.state.lock().await == RunState::NotStarted {
            return;
        }
        self.exited.cancelled().await;
    }

    /// Records an unexpected serve-loop failure for later retrieval.
    pub async fn record_fault(&self, err: Error) {
        *self.fault.lock().await = Some(err);
    }

    pub async fn take_fault(&self) -> Option<Error> {
        self.fault.lock().await.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_state_machine() {
        let lifecycle = Lifecycle::new();
        assert_eq!(lifecycle.state().await, RunState::NotStarted);

        // stop before start is a reported error
        let err = lifecycle.request_stop().await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotRunning);

        // wait before start returns immediately
        lifecycle.wait().await;

        lifecycle.start(|| async { Ok(()) }).await.unwrap();
        assert_eq!(lifecycle.state().await, RunState::Running);

        let err = lifecycle.start(|| async { Ok(()) }).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::AlreadyRunning);

        lifecycle.request_stop().await.unwrap();
        assert_eq!(lifecycle.state().await, RunState::Stopping);
        assert!(lifecycle.shutdown_token().is_cancelled());

        lifecycle.mark_exited().await;
        assert_eq!(lifecycle.state().await, RunState::Stopped);
        lifecycle.wait().await;
        lifecycle.wait().await; // idempotent

        let err = lifecycle.request_stop().await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotRunning);
    }

    #[tokio::test]
    async fn test_bind_failure_leaves_not_started() {
        let lifecycle = Lifecycle::new();
        let err = lifecycle
            .start(|| async { Err::<(), _>(Error::kind(ErrorKind::BindFailed)) })
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::BindFailed);
        assert_eq!(lifecycle.state().await, RunState::NotStarted);

        // a failed start may be retried
        lifecycle.start(|| async { Ok(()) }).await.unwrap();
        assert_eq!(lifecycle.state().await, RunState::Running);
    }
}
