//! # Event bus façade.
//!
//! [`EventBus`] is the object-safe contract of a bus implementation: it moves
//! type-erased [`Envelope`]s and [`Binding`]s. [`EventBusExt`] layers the typed
//! operations on top and is implemented for every bus, including
//! `dyn EventBus`.
//!
//! ```text
//! bus.publish(UserCreated{..}) ──► publish_envelope(Envelope) ──► N queues
//! bus.request::<_, Price>(q)   ──► request_envelope(.., TypeId::of::<Price>()) ──► Box<dyn Any> ──► Price
//! bus.subscribe::<E, _>(h)     ──► bind(Binding::new::<E, H>(h))
//! ```

use std::any::{Any, TypeId, type_name};
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::core::binding::{Binding, ResponderBinding};
use crate::core::queue::Queue;
use crate::error::BusError;
use crate::events::{Envelope, Event, short_type_name};
use crate::handlers::{EventHandler, Respond};
use crate::subscriptions::{Subscription, SubscriptionManager};

/// Object-safe bus contract.
///
/// `bind` spawns a consumption loop and must be called from within a tokio runtime.
#[async_trait]
pub trait EventBus: Send + Sync + 'static {
    /// Appends the event to the queue of every handler subscribed to its type.
    ///
    /// Returns the number of queues reached. Completes once every append is
    /// done, never waits for handlers.
    async fn publish_envelope(
        &self,
        envelope: Envelope,
        token: &CancellationToken,
    ) -> Result<usize, BusError>;

    /// Publishes the event, then awaits the responder registered for
    /// `(event type, output)` and returns its boxed result.
    async fn request_envelope(
        &self,
        envelope: Envelope,
        output: TypeId,
        output_name: &'static str,
        token: &CancellationToken,
    ) -> Result<Box<dyn Any + Send>, BusError>;

    /// Registers the pair and starts its dispatcher.
    fn bind(&self, binding: Binding) -> Result<Subscription, BusError>;

    /// Registers the single producer of an output type for an event type.
    fn bind_responder(&self, responder: ResponderBinding) -> Result<(), BusError>;

    /// Unregisters the pair and stops its dispatcher.
    ///
    /// Returns `Ok(false)` if the pair was not registered.
    async fn unbind(&self, subscription: &Subscription) -> Result<bool, BusError>;

    /// The registry backing this bus.
    fn subscriptions(&self) -> &SubscriptionManager;

    /// The queue serving a pair, if bound.
    fn queue_for(&self, subscription: &Subscription) -> Option<Arc<dyn Queue>>;

    /// Stops every dispatcher and forgets every registration.
    async fn shutdown(&self) -> Result<(), BusError>;
}

/// Typed operations available on every [`EventBus`].
#[async_trait]
pub trait EventBusExt: EventBus {
    /// Publishes `event` to every subscribed handler.
    async fn publish<E: Event>(&self, event: E, token: &CancellationToken) -> Result<usize, BusError> {
        self.publish_envelope(Envelope::new(event), token).await
    }

    /// Publishes `event` and returns the `R` produced by its responder.
    async fn request<E, R>(&self, event: E, token: &CancellationToken) -> Result<R, BusError>
    where
        E: Event,
        R: Send + 'static,
    {
        let output_name = short_type_name(type_name::<R>());
        let out = self
            .request_envelope(Envelope::new(event), TypeId::of::<R>(), output_name, token)
            .await?;
        out.downcast::<R>()
            .map(|r| *r)
            .map_err(|_| BusError::invalid(format!("responder did not produce '{output_name}'")))
    }

    /// Subscribes `handler` to `E`.
    fn subscribe<E, H>(&self, handler: Arc<H>) -> Result<Subscription, BusError>
    where
        E: Event,
        H: EventHandler<E>,
    {
        self.bind(Binding::new::<E, H>(handler))
    }

    /// Registers `responder` as the producer of `R::Output` for `E`.
    fn respond<E, R>(&self, responder: Arc<R>) -> Result<(), BusError>
    where
        E: Event,
        R: Respond<E>,
    {
        self.bind_responder(ResponderBinding::new::<E, R>(responder))
    }

    /// Unsubscribes `H` from `E`.
    async fn unsubscribe<E, H>(&self) -> Result<bool, BusError>
    where
        E: Event,
        H: EventHandler<E>,
    {
        self.unbind(&Subscription::of::<E, H>()).await
    }
}

impl<B: EventBus + ?Sized> EventBusExt for B {}
