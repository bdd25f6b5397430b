use std::sync::Arc;

use tracing::debug;

use crate::core::binding::{Binding, ResponderBinding};
use crate::core::bus::EventBus;
use crate::core::config::Config;
use crate::core::in_process::InProcessBus;
use crate::error::BusError;
use crate::events::Event;
use crate::handlers::{EventHandler, Respond};

/// Builder collecting the `(event, handler)` registration table of a bus.
///
/// Host bootstrapping decides which pairs exist; the builder only needs the
/// final list and a concrete bus to bind them to.
pub struct EventBusBuilder {
    cfg: Config,
    bus: Option<Arc<dyn EventBus>>,
    bindings: Vec<Binding>,
    responders: Vec<ResponderBinding>,
}

impl EventBusBuilder {
    /// Creates a new builder with the given configuration.
    pub fn new(cfg: Config) -> Self {
        Self {
            cfg,
            bus: None,
            bindings: Vec::new(),
            responders: Vec::new(),
        }
    }

    /// Binds an [`InProcessBus`] built from the builder's configuration.
    pub fn in_process(mut self) -> Self {
        self.bus = Some(Arc::new(InProcessBus::new(self.cfg.clone())));
        self
    }

    /// Binds a custom bus implementation.
    ///
    /// The builder's configuration is not applied to it.
    pub fn with_bus(mut self, bus: Arc<dyn EventBus>) -> Self {
        self.bus = Some(bus);
        self
    }

    /// Adds a subscription of `handler` to `E`.
    pub fn with_handler<E, H>(self, handler: Arc<H>) -> Self
    where
        E: Event,
        H: EventHandler<E>,
    {
        self.with_binding(Binding::new::<E, H>(handler))
    }

    /// Adds a prepared binding.
    pub fn with_binding(mut self, binding: Binding) -> Self {
        self.bindings.push(binding);
        self
    }

    /// Adds the responder producing `R::Output` for `E`.
    pub fn with_responder<E, R>(mut self, responder: Arc<R>) -> Self
    where
        E: Event,
        R: Respond<E>,
    {
        self.responders.push(ResponderBinding::new::<E, R>(responder));
        self
    }

    /// Builds the bus and binds every registration, in the order added.
    ///
    /// Fails with [`BusError::EventNotImplemented`] if no bus was bound, or with
    /// the first registration error. Must be called from within a tokio runtime.
    pub fn build(self) -> Result<Arc<dyn EventBus>, BusError> {
        let bus = self.bus.ok_or(BusError::EventNotImplemented)?;

        let handlers = self.bindings.len();
        for binding in self.bindings {
            bus.bind(binding)?;
        }
        let responders = self.responders.len();
        for responder in self.responders {
            bus.bind_responder(responder)?;
        }

        debug!(handlers, responders, "event bus built");
        Ok(bus)
    }
}

impl Default for EventBusBuilder {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;
    use tokio::sync::mpsc;
    use tokio::time::timeout;
    use tokio_util::sync::CancellationToken;

    use super::*;
    use crate::core::bus::EventBusExt;
    use crate::error::HandlerError;
    use crate::events::EventMeta;
    use crate::handlers::HandlerFn;

    struct OrderPlaced {
        meta: EventMeta,
        total: u64,
    }

    impl Event for OrderPlaced {
        fn meta(&self) -> &EventMeta {
            &self.meta
        }
    }

    struct Billing {
        seen: mpsc::UnboundedSender<u64>,
    }

    #[async_trait]
    impl EventHandler<OrderPlaced> for Billing {
        async fn handle(&self, ev: Arc<OrderPlaced>, _: CancellationToken) -> Result<(), HandlerError> {
            let _ = self.seen.send(ev.total);
            Ok(())
        }
    }

    struct Tax;

    #[async_trait]
    impl Respond<OrderPlaced> for Tax {
        type Output = u64;

        async fn respond(&self, ev: Arc<OrderPlaced>, _: CancellationToken) -> Result<u64, HandlerError> {
            Ok(ev.total / 5)
        }
    }

    fn order(total: u64) -> OrderPlaced {
        OrderPlaced {
            meta: EventMeta::new(),
            total,
        }
    }

    #[test]
    fn test_build_without_bus_fails() {
        let err = EventBusBuilder::default().build().err().unwrap();
        assert!(matches!(err, BusError::EventNotImplemented));
    }

    #[tokio::test]
    async fn test_build_binds_handlers_and_responders() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let bus = EventBusBuilder::default()
            .in_process()
            .with_handler::<OrderPlaced, _>(Arc::new(Billing { seen: tx }))
            .with_responder::<OrderPlaced, _>(Arc::new(Tax))
            .build()
            .unwrap();

        assert!(bus.subscriptions().has_subscriptions_for_event::<OrderPlaced>());

        let tax: u64 = bus.request(order(250), &CancellationToken::new()).await.unwrap();
        assert_eq!(tax, 50);

        let billed = timeout(Duration::from_secs(5), rx.recv()).await.unwrap();
        assert_eq!(billed, Some(250));
    }

    #[tokio::test]
    async fn test_build_accepts_closure_handlers() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let logger = HandlerFn::arc("order-logger", move |ev: Arc<OrderPlaced>, _ctx: CancellationToken| {
            let tx = tx.clone();
            async move {
                let _ = tx.send(ev.total);
                Ok::<_, HandlerError>(())
            }
        });

        let bus = EventBusBuilder::default()
            .in_process()
            .with_handler::<OrderPlaced, _>(logger)
            .build()
            .unwrap();

        bus.publish(order(9), &CancellationToken::new()).await.unwrap();
        let seen = timeout(Duration::from_secs(5), rx.recv()).await.unwrap();
        assert_eq!(seen, Some(9));
    }

    #[tokio::test]
    async fn test_duplicate_registration_fails_build() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let err = EventBusBuilder::default()
            .in_process()
            .with_handler::<OrderPlaced, _>(Arc::new(Billing { seen: tx.clone() }))
            .with_handler::<OrderPlaced, _>(Arc::new(Billing { seen: tx }))
            .build()
            .err()
            .unwrap();
        assert_eq!(err.as_label(), "handler_already_registered");
    }

    #[tokio::test]
    async fn test_with_bus_uses_given_implementation() {
        let custom: Arc<dyn EventBus> = Arc::new(InProcessBus::default());
        let bus = EventBusBuilder::default()
            .with_bus(Arc::clone(&custom))
            .with_responder::<OrderPlaced, _>(Arc::new(Tax))
            .build()
            .unwrap();

        assert!(Arc::ptr_eq(&bus, &custom));
        let tax: u64 = custom.request(order(10), &CancellationToken::new()).await.unwrap();
        assert_eq!(tax, 2);
    }
}
