//! Timer scheduling for reconnect backoff delays
//!
//! At most one timer is armed per machine instance. An explicit disconnect
//! during the backoff wait must be able to cancel it before it fires, so
//! scheduled callbacks hand back a cancellation handle.

use std::time::Duration;

use tracing::debug;

/// Handle to a scheduled callback that can be cancelled before it fires
pub trait Cancellable: Send {
    /// Attempt to cancel the scheduled callback.
    /// Returns `true` if the callback had not fired yet.
    fn cancel(&mut self) -> bool;
}

/// Delayed-execution facility used to arm the single pending reconnect timer
///
/// This trait exists to enable dependency injection and testing - tests
/// substitute a manual scheduler and fire timers deterministically.
pub trait Scheduler: Send + Sync {
    /// Run `callback` after `delay`
    fn schedule(
        &self,
        delay: Duration,
        callback: Box<dyn FnOnce() + Send>,
    ) -> Box<dyn Cancellable>;
}

/// Default scheduler backed by `tokio::time`
///
/// Each scheduled callback runs on its own spawned task; cancellation aborts
/// that task.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioScheduler;

impl Scheduler for TokioScheduler {
    fn schedule(
        &self,
        delay: Duration,
        callback: Box<dyn FnOnce() + Send>,
    ) -> Box<dyn Cancellable> {
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            callback();
        });

        Box::new(AbortOnCancel { handle })
    }
}

struct AbortOnCancel {
    handle: tokio::task::JoinHandle<()>,
}

impl Cancellable for AbortOnCancel {
    fn cancel(&mut self) -> bool {
        let was_pending = !self.handle.is_finished();
        self.handle.abort();
        debug!("Scheduled callback cancelled (was_pending: {})", was_pending);
        was_pending
    }
}
