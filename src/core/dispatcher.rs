//! # Background dispatcher: lifecycle of one queue's consumption loop.
//!
//! ## Lifecycle
//! ```text
//! new(queue) ──► start() ──► tokio::spawn(queue.dequeue(token))
//!                               │
//! stop(grace) ──► token.cancel()┘──► await join (≤ grace)
//!                                       ├─ joined        → Ok
//!                                       └─ grace elapsed → abort, GraceExceeded
//! ```
//!
//! ## Rules
//! - One dispatcher per (handler, event type) queue; each owns its own token.
//! - Cancellation is terminal: `start()` after `stop()` does nothing.
//! - Dropping a dispatcher cancels its loop.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::core::queue::Queue;
use crate::error::BusError;
use crate::subscriptions::Subscription;

/// Owns the background task draining one [`Queue`].
pub struct Dispatcher {
    queue: Arc<dyn Queue>,
    token: CancellationToken,
    join: Option<JoinHandle<()>>,
}

impl Dispatcher {
    /// Creates a stopped dispatcher for `queue`.
    pub fn new(queue: Arc<dyn Queue>) -> Self {
        Self {
            queue,
            token: CancellationToken::new(),
            join: None,
        }
    }

    /// Spawns the consumption loop. Returns `false` if it is already running
    /// or the dispatcher was cancelled.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&mut self) -> bool {
        if self.token.is_cancelled() || self.join.is_some() {
            return false;
        }
        let fut = Arc::clone(&self.queue).dequeue(self.token.clone());
        self.join = Some(tokio::spawn(fut));
        true
    }

    /// True while the loop task is alive.
    pub fn is_running(&self) -> bool {
        self.join.as_ref().is_some_and(|j| !j.is_finished())
    }

    /// True once cancellation was signalled.
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// The queue this dispatcher drains.
    pub fn queue(&self) -> &Arc<dyn Queue> {
        &self.queue
    }

    /// The (event, handler) pair served.
    pub fn subscription(&self) -> Subscription {
        self.queue.subscription()
    }

    /// Signals cancellation without waiting.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Cancels the loop and waits up to `grace` for the in-flight handler.
    ///
    /// Past `grace` the task is aborted and [`BusError::GraceExceeded`] names
    /// the subscription. Items still queued are left in the queue.
    pub async fn stop(&mut self, grace: Duration) -> Result<(), BusError> {
        self.token.cancel();
        let Some(mut join) = self.join.take() else {
            return Ok(());
        };

        match time::timeout(grace, &mut join).await {
            Ok(Ok(())) => {
                debug!(subscription = %self.subscription(), "dispatcher stopped");
                Ok(())
            }
            Ok(Err(e)) => {
                warn!(subscription = %self.subscription(), error = %e, "dispatch loop died");
                Ok(())
            }
            Err(_elapsed) => {
                join.abort();
                warn!(subscription = %self.subscription(), ?grace, "dispatcher aborted after grace");
                Err(BusError::GraceExceeded {
                    grace,
                    stuck: vec![self.subscription().to_string()],
                })
            }
        }
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        self.token.cancel();
    }
}
