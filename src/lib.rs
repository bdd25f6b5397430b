//! # dispatchbus
//!
//! **Dispatchbus** is an in-process event bus for Rust.
//!
//! Publishers hand events to the bus; every handler subscribed to the event's
//! type gets its own FIFO queue, drained by its own background loop. Publishing
//! never waits on handlers, and a slow or failing handler stalls only its own
//! queue.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!   publisher A      publisher B      publisher C
//!        │                │                │
//!        ▼                ▼                ▼
//! ┌───────────────────────────────────────────────────────────┐
//! │  EventBus (InProcessBus)                                  │
//! │  - SubscriptionManager (event name → subscriptions)       │
//! │  - one Dispatcher per (event, handler) pair               │
//! │  - responders per (event, output type)                    │
//! └──────┬──────────────────┬──────────────────┬──────────────┘
//!        ▼                  ▼                  ▼
//!  ┌─────────────┐   ┌─────────────┐   ┌─────────────┐
//!  │DispatchQueue│   │DispatchQueue│   │DispatchQueue│
//!  │ UserCreated │   │ UserCreated │   │ OrderPlaced │
//!  │  → Audit    │   │  → Mailer   │   │  → Billing  │
//!  └──────┬──────┘   └──────┬──────┘   └──────┬──────┘
//!         ▼                 ▼                 ▼
//!     Dispatcher        Dispatcher        Dispatcher
//!   (tokio task,      (tokio task,      (tokio task,
//!    own token)        own token)        own token)
//!         ▼                 ▼                 ▼
//!   Audit.handle()   Mailer.handle()   Billing.handle()
//! ```
//!
//! ### Lifecycle
//! ```text
//! subscribe::<E, H>(h) ──► registry.add ──► DispatchQueue<E> ──► Dispatcher::start
//!
//! loop (per dispatcher) {
//!   ├─► token cancelled? ─► exit (queued items stay queued)
//!   ├─► pop head, or wait for enqueue / cancellation
//!   └─► run_once(handler.handle(e, child_token), timeout)
//!           ├─ Ok / Canceled            ─► handled += 1
//!           └─ Err / Timeout / Panicked ─► failed += 1, warn!, continue
//! }
//!
//! unsubscribe::<E, H>() ──► registry.remove ──► EventRemoved hooks ──► Dispatcher::stop(grace)
//! shutdown()            ──► stop every dispatcher (≤ grace each) ──► clear registry
//! ```
//!
//! ## Features
//! | Area              | Description                                               | Key types / traits                          |
//! |-------------------|-----------------------------------------------------------|---------------------------------------------|
//! | **Events**        | Identity, timestamps, registry key, erased carrier.       | [`Event`], [`EventMeta`], [`Envelope`]      |
//! | **Handlers**      | Async cancelable handlers and single-result responders.   | [`EventHandler`], [`HandlerFn`], [`Respond`]|
//! | **Registry**      | Subscriptions per event, with removal notifications.      | [`SubscriptionManager`], [`Subscription`]   |
//! | **Dispatch**      | Per-pair FIFO queues and their background loops.         | [`DispatchQueue`], [`Dispatcher`]           |
//! | **Bus**           | Publish, request/response, subscribe, unsubscribe.        | [`EventBus`], [`EventBusExt`], [`InProcessBus`] |
//! | **Errors**        | Typed errors for the runtime and handler invocations.     | [`BusError`], [`HandlerError`]              |
//! | **Configuration** | Grace period, handler timeout, duplicate policy.          | [`Config`], [`DuplicatePolicy`]             |
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use async_trait::async_trait;
//! use tokio_util::sync::CancellationToken;
//! use dispatchbus::{Config, Event, EventBus, EventBusBuilder, EventBusExt, EventHandler, EventMeta, HandlerError};
//!
//! struct UserCreated {
//!     meta: EventMeta,
//!     email: String,
//! }
//!
//! impl Event for UserCreated {
//!     fn meta(&self) -> &EventMeta { &self.meta }
//! }
//!
//! struct Welcome;
//!
//! #[async_trait]
//! impl EventHandler<UserCreated> for Welcome {
//!     async fn handle(&self, ev: Arc<UserCreated>, _ctx: CancellationToken) -> Result<(), HandlerError> {
//!         println!("welcome {}", ev.email);
//!         Ok(())
//!     }
//! }
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let bus = EventBusBuilder::new(Config::default())
//!         .in_process()
//!         .with_handler::<UserCreated, _>(Arc::new(Welcome))
//!         .build()?;
//!
//!     let token = CancellationToken::new();
//!     let delivered = bus
//!         .publish(UserCreated { meta: EventMeta::new(), email: "ada@example.com".into() }, &token)
//!         .await?;
//!     assert_eq!(delivered, 1);
//!
//!     bus.shutdown().await?;
//!     Ok(())
//! }
//! ```

mod core;
mod error;
mod events;
mod handlers;
mod policies;
mod subscriptions;

// ---- Public re-exports ----

pub use core::{
    Binding, Config, DispatchQueue, Dispatcher, EventBus, EventBusBuilder, EventBusExt,
    InProcessBus, Queue, QueueStats, ResponderBinding, run_until_shutdown,
    wait_for_shutdown_signal,
};
pub use error::{BusError, HandlerError};
pub use events::{Envelope, Event, EventMeta, event_key};
pub use handlers::{EventHandler, HandlerFn, Respond};
pub use policies::DuplicatePolicy;
pub use subscriptions::{RemovedHook, Subscription, SubscriptionManager};
