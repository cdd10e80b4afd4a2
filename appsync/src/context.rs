//! Cancellation and deadline context for one reconciliation event.
//!
//! Every store and collaborator call made while handling an event runs
//! through [`SyncContext::run`], which races it against cancellation and
//! the event deadline.

use std::future::Future;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;

use crate::error::{Result, SyncError};

/// Triggers cancellation of every context derived from it.
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    /// Cancel outstanding and future calls.
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }
}

/// Context carried through one `add_or_update` or `delete_app` call.
#[derive(Debug, Clone, Default)]
pub struct SyncContext {
    cancel: Option<watch::Receiver<bool>>,
    deadline: Option<Instant>,
}

impl SyncContext {
    /// A context that is never cancelled and has no deadline.
    pub fn background() -> Self {
        Self::default()
    }

    /// A cancellable context and the handle that cancels it.
    pub fn cancellable() -> (Self, CancelHandle) {
        let (tx, rx) = watch::channel(false);
        let ctx = Self {
            cancel: Some(rx),
            deadline: None,
        };
        (ctx, CancelHandle { tx })
    }

    /// Builder: expire after `timeout` from now.
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Builder: expire at `deadline`. An earlier existing deadline wins.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(match self.deadline {
            Some(existing) if existing < deadline => existing,
            _ => deadline,
        });
        self
    }

    /// The deadline, if any.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().map(|rx| *rx.borrow()).unwrap_or(false)
    }

    /// Fail if the context is already cancelled or expired.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            return Err(SyncError::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Err(SyncError::DeadlineExceeded),
            _ => Ok(()),
        }
    }

    /// Run a fallible call, aborting it on cancellation or deadline.
    pub async fn run<T, E, F>(&self, fut: F) -> Result<T>
    where
        F: Future<Output = std::result::Result<T, E>>,
        E: Into<SyncError>,
    {
        self.check()?;
        let work = async { fut.await.map_err(|err| -> SyncError { err.into() }) };

        match self.deadline {
            Some(deadline) => tokio::select! {
                biased;
                _ = self.cancelled() => Err(SyncError::Cancelled),
                res = tokio::time::timeout_at(deadline, work) => {
                    res.unwrap_or(Err(SyncError::DeadlineExceeded))
                }
            },
            None => tokio::select! {
                biased;
                _ = self.cancelled() => Err(SyncError::Cancelled),
                res = work => res,
            },
        }
    }

    /// Resolves once cancellation is requested. Never resolves for
    /// uncancellable contexts or once the handle is dropped uncancelled.
    async fn cancelled(&self) {
        let Some(rx) = &self.cancel else {
            return std::future::pending().await;
        };
        let mut rx = rx.clone();
        loop {
            if *rx.borrow_and_update() {
                return;
            }
            if rx.changed().await.is_err() {
                return std::future::pending().await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn slow_ok() -> std::result::Result<u32, SyncError> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(1)
    }

    #[tokio::test]
    async fn test_background_runs_to_completion() {
        let ctx = SyncContext::background();
        let value = ctx
            .run(async { Ok::<_, SyncError>(7) })
            .await
            .unwrap();
        assert_eq!(value, 7);
    }

    #[tokio::test]
    async fn test_cancel_aborts_outstanding_call() {
        let (ctx, handle) = SyncContext::cancellable();
        let task = tokio::spawn(async move { ctx.run(slow_ok()).await });
        tokio::task::yield_now().await;
        handle.cancel();
        assert_eq!(task.await.unwrap(), Err(SyncError::Cancelled));
    }

    #[tokio::test]
    async fn test_cancelled_context_refuses_new_calls() {
        let (ctx, handle) = SyncContext::cancellable();
        handle.cancel();
        assert!(ctx.is_cancelled());
        let res = ctx.run(async { Ok::<_, SyncError>(()) }).await;
        assert_eq!(res, Err(SyncError::Cancelled));
    }

    #[tokio::test]
    async fn test_deadline_exceeded() {
        let ctx = SyncContext::background().with_timeout(Duration::from_millis(50));
        let res = ctx.run(slow_ok()).await;
        assert_eq!(res, Err(SyncError::DeadlineExceeded));
    }

    #[tokio::test]
    async fn test_earlier_deadline_wins() {
        let now = Instant::now();
        let ctx = SyncContext::background()
            .with_deadline(now + Duration::from_secs(5))
            .with_deadline(now + Duration::from_secs(60));
        assert_eq!(ctx.deadline(), Some(now + Duration::from_secs(5)));
    }

    #[tokio::test]
    async fn test_dropped_handle_does_not_cancel() {
        let (ctx, handle) = SyncContext::cancellable();
        drop(handle);
        let res = ctx.run(async { Ok::<_, SyncError>(3) }).await;
        assert_eq!(res, Ok(3));
    }
}
