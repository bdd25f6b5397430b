//! # Function-backed handler (`HandlerFn`)
//!
//! [`HandlerFn`] wraps a closure `F: Fn(Arc<E>, CancellationToken) -> Fut`,
//! producing a fresh future per event. Shared state goes in an explicit
//! `Arc<...>` captured by the closure.
//!
//! Every closure has its own type, so two `HandlerFn`s built from different
//! closures are different handler types for the registry.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//! use dispatchbus::{Event, EventMeta, HandlerError, HandlerFn};
//!
//! struct Tick { meta: EventMeta }
//! impl Event for Tick {
//!     fn meta(&self) -> &EventMeta { &self.meta }
//! }
//!
//! let h = HandlerFn::arc("tick-logger", |ev: Arc<Tick>, _ctx: CancellationToken| async move {
//!     let _ = ev.meta().id;
//!     Ok::<_, HandlerError>(())
//! });
//! assert_eq!(h.label(), "tick-logger");
//! ```

use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::HandlerError;
use crate::events::Event;
use crate::handlers::handler::EventHandler;

/// Closure-backed [`EventHandler`].
pub struct HandlerFn<E, F> {
    name: &'static str,
    f: F,
    _event: PhantomData<fn(E)>,
}

impl<E, F> HandlerFn<E, F> {
    /// Creates a new function-backed handler.
    ///
    /// The event type is inferred from the closure's first argument.
    pub fn new<Fut>(name: &'static str, f: F) -> Self
    where
        F: Fn(Arc<E>, CancellationToken) -> Fut,
    {
        Self {
            name,
            f,
            _event: PhantomData,
        }
    }

    /// Creates the handler as a shared handle, ready for `subscribe`.
    pub fn arc<Fut>(name: &'static str, f: F) -> Arc<Self>
    where
        F: Fn(Arc<E>, CancellationToken) -> Fut,
    {
        Arc::new(Self::new(name, f))
    }

    /// The label given at construction (logs use it in place of the type name).
    pub fn label(&self) -> &'static str {
        self.name
    }
}

#[async_trait]
impl<E, F, Fut> EventHandler<E> for HandlerFn<E, F>
where
    E: Event,
    F: Fn(Arc<E>, CancellationToken) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
{
    async fn handle(&self, event: Arc<E>, ctx: CancellationToken) -> Result<(), HandlerError> {
        (self.f)(event, ctx).await
    }

    fn name(&self) -> &'static str {
        self.name
    }
}
