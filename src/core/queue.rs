//! # Per-handler dispatch queue.
//!
//! A [`DispatchQueue`] is the unbounded FIFO between publishers and one handler
//! instance for one event type. Producers `enqueue` from any context; exactly one
//! consumption loop ([`DispatchQueue::run`]) drains it.
//!
//! ## Architecture
//! ```text
//! publish ──► enqueue(e) ──► Mutex<VecDeque<Arc<E>>> ──► notify_one
//!                                      │
//!                   run(token) ◄───────┘  (waits on Notify, never spins)
//!                     ├─► pop head
//!                     ├─► run_once(handler.handle(e, child_token))
//!                     │       ├─ Ok / Canceled → handled += 1
//!                     │       └─ Err / Timeout / Panicked → failed += 1, warn!
//!                     └─► loop until token cancelled
//! ```
//!
//! ## Rules
//! - FIFO per queue; one handler invocation at a time, awaited before the next pop.
//! - Empty events (nil id) and events of another type are rejected with
//!   `InvalidArgument`; the queue length is unchanged.
//! - A failing or panicking handler never ends the loop.
//! - Cancellation is checked before every pop: once it fires, queued items stay
//!   queued (and are dropped with the queue).
//! - `notify_one` stores a permit when the consumer is not waiting yet, so an
//!   enqueue racing the consumer's empty check is never lost.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures::future::BoxFuture;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::core::config::Config;
use crate::core::runner::run_once;
use crate::error::{BusError, HandlerError};
use crate::events::{Envelope, Event};
use crate::handlers::EventHandler;
use crate::policies::DuplicatePolicy;
use crate::subscriptions::Subscription;

/// Counters of one queue, for tests and monitoring.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueStats {
    /// Invocations that completed (including graceful `Canceled`).
    pub handled: u64,
    /// Invocations that failed, timed out or panicked.
    pub failed: u64,
    /// Events skipped by [`DuplicatePolicy::SuppressQueued`].
    pub suppressed: u64,
}

/// Type-erased view of a dispatch queue.
///
/// This is the capability set the bus and the dispatcher need, independent of
/// the concrete event and handler types.
pub trait Queue: Send + Sync + 'static {
    /// The (event, handler) pair this queue serves.
    fn subscription(&self) -> Subscription;

    /// Appends the envelope's event to the tail.
    fn enqueue(&self, envelope: &Envelope) -> Result<(), BusError>;

    /// Number of events waiting.
    fn count(&self) -> usize;

    /// True if at least one event is waiting.
    fn any(&self) -> bool {
        self.count() > 0
    }

    /// Snapshot of the counters.
    fn stats(&self) -> QueueStats;

    /// The consumption loop; completes when `token` is cancelled.
    fn dequeue(self: Arc<Self>, token: CancellationToken) -> BoxFuture<'static, ()>;
}

/// FIFO of `E` events awaiting one handler instance.
pub struct DispatchQueue<E: Event> {
    subscription: Subscription,
    handler: Arc<dyn EventHandler<E>>,
    items: Mutex<VecDeque<Arc<E>>>,
    ready: Notify,
    duplicates: DuplicatePolicy,
    timeout: Option<Duration>,
    handled: AtomicU64,
    failed: AtomicU64,
    suppressed: AtomicU64,
}

impl<E: Event> DispatchQueue<E> {
    /// Creates an empty queue bound to `handler`.
    pub fn new<H: EventHandler<E>>(handler: Arc<H>, cfg: &Config) -> Self {
        Self {
            subscription: Subscription::of::<E, H>(),
            handler,
            items: Mutex::new(VecDeque::new()),
            ready: Notify::new(),
            duplicates: cfg.duplicates,
            timeout: cfg.handler_timeout(),
            handled: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            suppressed: AtomicU64::new(0),
        }
    }

    /// Typed enqueue.
    ///
    /// Fails with [`BusError::InvalidArgument`] if the event is empty (nil id).
    pub fn push(&self, event: Arc<E>) -> Result<(), BusError> {
        let id = event.meta().id;
        if id.is_nil() {
            return Err(BusError::invalid(format!(
                "empty '{}' event (nil id)",
                self.subscription.event_name()
            )));
        }

        {
            let mut items = self.lock();
            if self.duplicates == DuplicatePolicy::SuppressQueued
                && items.iter().any(|queued| queued.meta().id == id)
            {
                self.suppressed.fetch_add(1, Ordering::Relaxed);
                debug!(subscription = %self.subscription, %id, "duplicate event suppressed");
                return Ok(());
            }
            items.push_back(event);
        }

        self.ready.notify_one();
        Ok(())
    }

    /// Runs the consumption loop until `token` is cancelled.
    ///
    /// The handler receives a child of `token` per invocation, so stopping the
    /// dispatcher also signals the in-flight handler.
    pub async fn run(self: Arc<Self>, token: CancellationToken) {
        debug!(subscription = %self.subscription, "dispatch loop started");

        loop {
            if token.is_cancelled() {
                break;
            }
            let event = match self.pop() {
                Some(event) => event,
                None => {
                    tokio::select! {
                        biased;
                        _ = token.cancelled() => break,
                        _ = self.ready.notified() => {}
                    }
                    continue;
                }
            };

            let res = run_once(&token, self.timeout, |ctx| self.handler.handle(event, ctx)).await;
            self.record(res);
        }

        debug!(
            subscription = %self.subscription,
            remaining = self.count(),
            "dispatch loop stopped"
        );
    }

    fn pop(&self) -> Option<Arc<E>> {
        self.lock().pop_front()
    }

    fn record(&self, res: Result<(), HandlerError>) {
        match res {
            Ok(()) => {
                self.handled.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) if !e.is_failure() => {
                self.handled.fetch_add(1, Ordering::Relaxed);
                debug!(subscription = %self.subscription, "handler observed cancellation");
            }
            Err(e) => {
                self.failed.fetch_add(1, Ordering::Relaxed);
                warn!(
                    event = self.subscription.event_name(),
                    handler = self.handler.name(),
                    label = e.as_label(),
                    error = %e,
                    "handler failed"
                );
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<Arc<E>>> {
        self.items.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<E: Event> Queue for DispatchQueue<E> {
    fn subscription(&self) -> Subscription {
        self.subscription
    }

    fn enqueue(&self, envelope: &Envelope) -> Result<(), BusError> {
        let event = envelope.downcast::<E>().ok_or_else(|| {
            BusError::invalid(format!(
                "queue {} cannot accept '{}'",
                self.subscription,
                envelope.name()
            ))
        })?;
        self.push(event)
    }

    fn count(&self) -> usize {
        self.lock().len()
    }

    fn stats(&self) -> QueueStats {
        QueueStats {
            handled: self.handled.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            suppressed: self.suppressed.load(Ordering::Relaxed),
        }
    }

    fn dequeue(self: Arc<Self>, token: CancellationToken) -> BoxFuture<'static, ()> {
        Box::pin(self.run(token))
    }
}
