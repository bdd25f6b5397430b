//! # Registration units handed to a bus.
//!
//! A [`Binding`] describes one `(event, handler)` pair together with the recipe
//! that builds its typed queue; the bus only ever sees the erased result.
//! A [`ResponderBinding`] does the same for the single producer of a typed
//! result in request/response publishes.
//!
//! ```text
//! Binding::new::<E, H>(handler) ──► bus.bind() ──► into_queue(&cfg) ──► Arc<dyn Queue>
//! ResponderBinding::new::<E, R>(responder) ──► bus.bind_responder() ──► invoke(envelope)
//! ```

use std::any::{Any, TypeId, type_name};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use tokio_util::sync::CancellationToken;

use crate::core::config::Config;
use crate::core::queue::{DispatchQueue, Queue};
use crate::core::runner::run_once;
use crate::error::HandlerError;
use crate::events::{Envelope, Event, short_type_name};
use crate::handlers::{EventHandler, Respond};
use crate::subscriptions::Subscription;

type MakeQueue = Box<dyn FnOnce(&Config) -> Arc<dyn Queue> + Send>;

/// One `(event, handler)` pair ready to be bound to a bus.
pub struct Binding {
    subscription: Subscription,
    make_queue: MakeQueue,
}

impl Binding {
    /// Captures `handler` as the consumer of `E`.
    pub fn new<E, H>(handler: Arc<H>) -> Self
    where
        E: Event,
        H: EventHandler<E>,
    {
        Self {
            subscription: Subscription::of::<E, H>(),
            make_queue: Box::new(move |cfg: &Config| -> Arc<dyn Queue> {
                Arc::new(DispatchQueue::<E>::new(handler, cfg))
            }),
        }
    }

    /// The pair this binding registers.
    pub fn subscription(&self) -> Subscription {
        self.subscription
    }

    /// Builds the pair's queue with the bus configuration.
    pub fn into_queue(self, cfg: &Config) -> Arc<dyn Queue> {
        (self.make_queue)(cfg)
    }
}

impl fmt::Debug for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binding")
            .field("subscription", &self.subscription)
            .finish_non_exhaustive()
    }
}

trait ErasedResponder: Send + Sync + 'static {
    fn call(
        &self,
        envelope: &Envelope,
        ctx: CancellationToken,
    ) -> BoxFuture<'static, Result<Box<dyn Any + Send>, HandlerError>>;
}

struct TypedResponder<E, R> {
    inner: Arc<R>,
    _event: std::marker::PhantomData<fn(E)>,
}

impl<E, R> ErasedResponder for TypedResponder<E, R>
where
    E: Event,
    R: Respond<E>,
{
    fn call(
        &self,
        envelope: &Envelope,
        ctx: CancellationToken,
    ) -> BoxFuture<'static, Result<Box<dyn Any + Send>, HandlerError>> {
        let responder = Arc::clone(&self.inner);
        let event = envelope.downcast::<E>();
        let carried = envelope.name();
        Box::pin(async move {
            let event = event.ok_or_else(|| {
                HandlerError::fail(format!("responder for '{}' got '{carried}'", E::event_name()))
            })?;
            let out = responder.respond(event, ctx).await?;
            Ok(Box::new(out) as Box<dyn Any + Send>)
        })
    }
}

/// The designated producer of one output type for one event type.
#[derive(Clone)]
pub struct ResponderBinding {
    event_type: TypeId,
    output_type: TypeId,
    event_name: &'static str,
    output_name: &'static str,
    responder_name: &'static str,
    responder: Arc<dyn ErasedResponder>,
}

impl ResponderBinding {
    /// Captures `responder` as the producer of `R::Output` for `E`.
    pub fn new<E, R>(responder: Arc<R>) -> Self
    where
        E: Event,
        R: Respond<E>,
    {
        Self {
            event_type: TypeId::of::<E>(),
            output_type: TypeId::of::<R::Output>(),
            event_name: E::event_name(),
            output_name: short_type_name(type_name::<R::Output>()),
            responder_name: responder.name(),
            responder: Arc::new(TypedResponder::<E, R> {
                inner: responder,
                _event: std::marker::PhantomData,
            }),
        }
    }

    /// `(event type, output type)`: at most one responder per key.
    pub fn key(&self) -> (TypeId, TypeId) {
        (self.event_type, self.output_type)
    }

    /// Registry key of the event.
    pub fn event_name(&self) -> &'static str {
        self.event_name
    }

    /// Short name of the output type.
    pub fn output_name(&self) -> &'static str {
        self.output_name
    }

    /// Name reported by the responder.
    pub fn responder_name(&self) -> &'static str {
        self.responder_name
    }

    /// Runs the responder once on the caller's path, with panic isolation and
    /// the optional timeout.
    pub(crate) async fn invoke(
        &self,
        envelope: &Envelope,
        parent: &CancellationToken,
        timeout: Option<Duration>,
    ) -> Result<Box<dyn Any + Send>, HandlerError> {
        run_once(parent, timeout, |ctx| self.responder.call(envelope, ctx)).await
    }
}

impl fmt::Debug for ResponderBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponderBinding")
            .field("event", &self.event_name)
            .field("output", &self.output_name)
            .field("responder", &self.responder_name)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::events::EventMeta;

    struct Quote {
        meta: EventMeta,
        qty: u32,
    }

    impl Event for Quote {
        fn meta(&self) -> &EventMeta {
            &self.meta
        }
    }

    struct Other {
        meta: EventMeta,
    }

    impl Event for Other {
        fn meta(&self) -> &EventMeta {
            &self.meta
        }
    }

    struct Pricer;

    #[async_trait]
    impl Respond<Quote> for Pricer {
        type Output = u64;

        async fn respond(&self, ev: Arc<Quote>, _ctx: CancellationToken) -> Result<u64, HandlerError> {
            Ok(u64::from(ev.qty) * 10)
        }
    }

    struct Sink;

    #[async_trait]
    impl EventHandler<Quote> for Sink {
        async fn handle(&self, _: Arc<Quote>, _: CancellationToken) -> Result<(), HandlerError> {
            Ok(())
        }
    }

    #[test]
    fn test_binding_builds_queue_for_its_pair() {
        let binding = Binding::new::<Quote, Sink>(Arc::new(Sink));
        let sub = binding.subscription();
        assert_eq!(sub.to_string(), "Quote->Sink");

        let queue = binding.into_queue(&Config::default());
        assert_eq!(queue.subscription(), sub);
        assert_eq!(queue.count(), 0);
    }

    #[test]
    fn test_responder_binding_names() {
        let rb = ResponderBinding::new::<Quote, Pricer>(Arc::new(Pricer));
        assert_eq!(rb.event_name(), "Quote");
        assert_eq!(rb.output_name(), "u64");
        assert_eq!(rb.responder_name(), "Pricer");
        assert_eq!(rb.key(), (TypeId::of::<Quote>(), TypeId::of::<u64>()));
    }

    #[tokio::test]
    async fn test_invoke_returns_boxed_output() {
        let rb = ResponderBinding::new::<Quote, Pricer>(Arc::new(Pricer));
        let env = Envelope::new(Quote {
            meta: EventMeta::new(),
            qty: 4,
        });
        let out = rb.invoke(&env, &CancellationToken::new(), None).await.unwrap();
        assert_eq!(*out.downcast::<u64>().unwrap(), 40);
    }

    #[tokio::test]
    async fn test_invoke_rejects_foreign_event() {
        let rb = ResponderBinding::new::<Quote, Pricer>(Arc::new(Pricer));
        let env = Envelope::new(Other { meta: EventMeta::new() });
        let err = rb.invoke(&env, &CancellationToken::new(), None).await.unwrap_err();
        assert_eq!(err.as_label(), "handler_failed");
    }
}
