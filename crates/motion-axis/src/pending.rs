//! Asynchronous, cancellable command handles.

use motion_core::{MotionError, MotionResult, MoveStatus};
use std::sync::Arc;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

enum Inner {
    /// Decided at dispatch time (soft-limit rejection); no task was
    /// spawned and no hardware command was issued.
    Settled(MotionResult<MoveStatus>),
    Running {
        handle: JoinHandle<MotionResult<MoveStatus>>,
        cancel: Arc<Notify>,
    },
}

/// One motion or calibration operation in flight.
///
/// Resolves to exactly one of three terminal outcomes: success with a
/// [`MoveStatus`], failure with a [`MotionError`], or
/// [`MotionError::Cancelled`] if the issuer cancelled it first.
pub struct PendingCommand {
    inner: Inner,
}

impl PendingCommand {
    pub(crate) fn settled(status: MoveStatus) -> Self {
        Self {
            inner: Inner::Settled(Ok(status)),
        }
    }

    pub(crate) fn running(
        handle: JoinHandle<MotionResult<MoveStatus>>,
        cancel: Arc<Notify>,
    ) -> Self {
        Self {
            inner: Inner::Running { handle, cancel },
        }
    }

    /// Request cancellation. Sticky: cancelling before the command task
    /// reaches its first await point still takes effect.
    pub fn cancel(&self) {
        if let Inner::Running { cancel, .. } = &self.inner {
            cancel.notify_one();
        }
    }

    pub fn is_finished(&self) -> bool {
        match &self.inner {
            Inner::Settled(_) => true,
            Inner::Running { handle, .. } => handle.is_finished(),
        }
    }

    /// Wait for the terminal outcome, consuming the handle.
    pub async fn wait(self) -> MotionResult<MoveStatus> {
        match self.inner {
            Inner::Settled(result) => result,
            Inner::Running { handle, .. } => handle.await.map_err(|e| {
                MotionError::Communication(format!("command task failed: {e}"))
            })?,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_settled_command_resolves_immediately() {
        let cmd = PendingCommand::settled(MoveStatus::DestAboveUpperLimit);
        assert!(cmd.is_finished());
        assert_eq!(cmd.wait().await.unwrap(), MoveStatus::DestAboveUpperLimit);
    }

    #[tokio::test]
    async fn test_running_command_resolves_to_task_result() {
        let cancel = Arc::new(Notify::new());
        let handle = tokio::spawn(async { Ok(MoveStatus::Ok) });
        let cmd = PendingCommand::running(handle, cancel);
        assert_eq!(cmd.wait().await.unwrap(), MoveStatus::Ok);
    }

    #[tokio::test]
    async fn test_cancel_before_task_waits_is_sticky() {
        let cancel = Arc::new(Notify::new());
        let observer = cancel.clone();
        let handle = tokio::spawn(async move {
            observer.notified().await;
            Err(MotionError::Cancelled)
        });
        let cmd = PendingCommand::running(handle, cancel);
        cmd.cancel();
        assert!(matches!(cmd.wait().await, Err(MotionError::Cancelled)));
    }
}
