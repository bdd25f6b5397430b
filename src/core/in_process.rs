//! # In-process bus.
//!
//! [`InProcessBus`] is the concrete [`EventBus`]: one registry, one queue and
//! one dispatcher per bound `(event, handler)` pair, and a table of responders.
//!
//! ## Architecture
//! ```text
//! publish(env) ──► registry snapshot for env.name()
//!                    └─► for each pair of env's type: dispatchers[pair].queue().enqueue(env)
//!
//! bind(b)      ──► [dispatchers lock] registry.add ─► into_queue(cfg) ─► Dispatcher::start
//! unbind(sub)  ──► [dispatchers lock] take dispatcher ─► (unlocked) registry.remove (hooks) ─► stop(grace)
//! request(env) ──► responder lookup ─► publish(env) ─► responder.invoke(env) on caller's path
//! shutdown()   ──► drain dispatchers ─► cancel all ─► clear registry/responders ─► join (≤ grace each)
//! ```
//!
//! ## Rules
//! - Lock order is dispatchers → registry; the registry lock is never held
//!   while taking the dispatchers lock.
//! - Removal hooks run with no bus lock held.
//! - A publish never waits on a handler.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use async_trait::async_trait;
use futures::future::join_all;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::core::binding::{Binding, ResponderBinding};
use crate::core::bus::EventBus;
use crate::core::config::Config;
use crate::core::dispatcher::Dispatcher;
use crate::core::queue::Queue;
use crate::error::BusError;
use crate::events::Envelope;
use crate::subscriptions::{Subscription, SubscriptionManager};

/// Bus whose handlers run as tokio tasks of the current process.
pub struct InProcessBus {
    cfg: Config,
    subscriptions: SubscriptionManager,
    dispatchers: Mutex<HashMap<Subscription, Dispatcher>>,
    responders: RwLock<HashMap<(TypeId, TypeId), ResponderBinding>>,
}

impl InProcessBus {
    /// Creates an empty bus.
    pub fn new(cfg: Config) -> Self {
        Self {
            cfg,
            subscriptions: SubscriptionManager::new(),
            dispatchers: Mutex::new(HashMap::new()),
            responders: RwLock::new(HashMap::new()),
        }
    }

    /// Configuration shared by every queue of this bus.
    pub fn config(&self) -> &Config {
        &self.cfg
    }

    /// Number of dispatchers currently owned by the bus.
    pub fn dispatcher_count(&self) -> usize {
        self.lock_dispatchers().len()
    }

    fn fan_out(&self, envelope: &Envelope, subs: &[Subscription]) -> Result<usize, BusError> {
        let dispatchers = self.lock_dispatchers();
        let mut delivered = 0;
        for sub in subs.iter().filter(|s| s.event_type() == envelope.event_type()) {
            // A pair being unbound concurrently may still be listed.
            if let Some(dispatcher) = dispatchers.get(sub) {
                dispatcher.queue().enqueue(envelope)?;
                delivered += 1;
            }
        }
        Ok(delivered)
    }

    fn responder_for(&self, key: (TypeId, TypeId)) -> Option<ResponderBinding> {
        self.responders
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
            .cloned()
    }

    fn lock_dispatchers(&self) -> MutexGuard<'_, HashMap<Subscription, Dispatcher>> {
        self.dispatchers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for InProcessBus {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

#[async_trait]
impl EventBus for InProcessBus {
    async fn publish_envelope(
        &self,
        envelope: Envelope,
        token: &CancellationToken,
    ) -> Result<usize, BusError> {
        if token.is_cancelled() {
            return Err(BusError::Canceled);
        }
        if envelope.meta().is_empty() {
            return Err(BusError::invalid(format!(
                "empty '{}' event (nil id)",
                envelope.name()
            )));
        }

        let subs = match self.subscriptions.subscriptions_for_key(envelope.name()) {
            Ok(subs) => subs,
            Err(BusError::EventNotRegistered { .. }) => {
                debug!(event = envelope.name(), "published event has no subscribers");
                return Ok(0);
            }
            Err(e) => return Err(e),
        };

        let delivered = self.fan_out(&envelope, &subs)?;
        debug!(event = envelope.name(), id = %envelope.meta().id, delivered, "event published");
        Ok(delivered)
    }

    async fn request_envelope(
        &self,
        envelope: Envelope,
        output: TypeId,
        output_name: &'static str,
        token: &CancellationToken,
    ) -> Result<Box<dyn Any + Send>, BusError> {
        if token.is_cancelled() {
            return Err(BusError::Canceled);
        }
        let responder = self
            .responder_for((envelope.event_type(), output))
            .ok_or(BusError::NoResponder {
                event: envelope.name(),
                output: output_name,
            })?;

        self.publish_envelope(envelope.clone(), token).await?;

        responder
            .invoke(&envelope, token, self.cfg.handler_timeout())
            .await
            .map_err(|e| {
                warn!(
                    event = envelope.name(),
                    responder = responder.responder_name(),
                    label = e.as_label(),
                    error = %e,
                    "responder failed"
                );
                BusError::from(e)
            })
    }

    fn bind(&self, binding: Binding) -> Result<Subscription, BusError> {
        let mut dispatchers = self.lock_dispatchers();
        let sub = self.subscriptions.add(binding.subscription())?;

        let mut dispatcher = Dispatcher::new(binding.into_queue(&self.cfg));
        dispatcher.start();
        dispatchers.insert(sub, dispatcher);

        debug!(subscription = %sub, "dispatcher started");
        Ok(sub)
    }

    fn bind_responder(&self, responder: ResponderBinding) -> Result<(), BusError> {
        let mut responders = self.responders.write().unwrap_or_else(PoisonError::into_inner);
        match responders.entry(responder.key()) {
            Entry::Occupied(existing) => Err(BusError::ResponderAlreadyRegistered {
                event: responder.event_name(),
                output: responder.output_name(),
                existing: existing.get().responder_name(),
            }),
            Entry::Vacant(slot) => {
                debug!(
                    event = responder.event_name(),
                    output = responder.output_name(),
                    responder = responder.responder_name(),
                    "responder registered"
                );
                slot.insert(responder);
                Ok(())
            }
        }
    }

    async fn unbind(&self, subscription: &Subscription) -> Result<bool, BusError> {
        let dispatcher = self.lock_dispatchers().remove(subscription);
        if self.subscriptions.remove(subscription).is_none() {
            return Ok(false);
        }

        match dispatcher {
            Some(mut dispatcher) => dispatcher.stop(self.cfg.grace).await.map(|()| true),
            None => Ok(true),
        }
    }

    fn subscriptions(&self) -> &SubscriptionManager {
        &self.subscriptions
    }

    fn queue_for(&self, subscription: &Subscription) -> Option<Arc<dyn Queue>> {
        self.lock_dispatchers()
            .get(subscription)
            .map(|d| Arc::clone(d.queue()))
    }

    async fn shutdown(&self) -> Result<(), BusError> {
        let drained: Vec<Dispatcher> = self.lock_dispatchers().drain().map(|(_, d)| d).collect();
        for dispatcher in &drained {
            dispatcher.cancel();
        }
        self.subscriptions.clear();
        self.responders
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();

        let grace = self.cfg.grace;
        let total = drained.len();
        let results = join_all(
            drained
                .into_iter()
                .map(|mut d| async move { d.stop(grace).await }),
        )
        .await;

        let mut stuck = Vec::new();
        for res in results {
            match res {
                Ok(()) => {}
                Err(BusError::GraceExceeded { stuck: names, .. }) => stuck.extend(names),
                Err(e) => warn!(error = %e, "dispatcher stop failed"),
            }
        }

        debug!(dispatchers = total, stuck = stuck.len(), "bus shut down");
        if stuck.is_empty() {
            Ok(())
        } else {
            Err(BusError::GraceExceeded { grace, stuck })
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use tokio::sync::mpsc;
    use tokio::time::timeout;

    use super::*;
    use crate::core::bus::EventBusExt;
    use crate::error::HandlerError;
    use crate::events::{Event, EventMeta};
    use crate::handlers::{EventHandler, Respond};

    struct UserCreated {
        meta: EventMeta,
        n: u32,
    }

    impl Event for UserCreated {
        fn meta(&self) -> &EventMeta {
            &self.meta
        }
    }

    fn user(n: u32) -> UserCreated {
        UserCreated {
            meta: EventMeta::new(),
            n,
        }
    }

    struct Audit {
        seen: mpsc::UnboundedSender<u32>,
    }

    #[async_trait]
    impl EventHandler<UserCreated> for Audit {
        async fn handle(&self, ev: Arc<UserCreated>, _: CancellationToken) -> Result<(), HandlerError> {
            let _ = self.seen.send(ev.n);
            Ok(())
        }
    }

    struct Mailer {
        seen: mpsc::UnboundedSender<u32>,
    }

    #[async_trait]
    impl EventHandler<UserCreated> for Mailer {
        async fn handle(&self, ev: Arc<UserCreated>, _: CancellationToken) -> Result<(), HandlerError> {
            let _ = self.seen.send(ev.n + 100);
            Ok(())
        }
    }

    /// Never finishes, ignores cancellation.
    struct Stall {
        started: mpsc::UnboundedSender<u32>,
    }

    #[async_trait]
    impl EventHandler<UserCreated> for Stall {
        async fn handle(&self, ev: Arc<UserCreated>, _: CancellationToken) -> Result<(), HandlerError> {
            let _ = self.started.send(ev.n);
            std::future::pending::<()>().await;
            Ok(())
        }
    }

    struct Greeting;

    #[async_trait]
    impl Respond<UserCreated> for Greeting {
        type Output = String;

        async fn respond(&self, ev: Arc<UserCreated>, _: CancellationToken) -> Result<String, HandlerError> {
            if ev.n == 0 {
                return Err(HandlerError::fail("user 0 is reserved"));
            }
            Ok(format!("welcome #{}", ev.n))
        }
    }

    struct OtherGreeting;

    #[async_trait]
    impl Respond<UserCreated> for OtherGreeting {
        type Output = String;

        async fn respond(&self, _: Arc<UserCreated>, _: CancellationToken) -> Result<String, HandlerError> {
            Ok("hi".into())
        }
    }

    async fn take(rx: &mut mpsc::UnboundedReceiver<u32>) -> u32 {
        timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("handler was not invoked in time")
            .expect("handler channel closed")
    }

    fn audit(bus: &InProcessBus) -> mpsc::UnboundedReceiver<u32> {
        let (tx, rx) = mpsc::unbounded_channel();
        bus.subscribe::<UserCreated, _>(Arc::new(Audit { seen: tx })).unwrap();
        rx
    }

    #[tokio::test]
    async fn test_subscribe_registers_and_starts_dispatcher() {
        let bus = InProcessBus::default();
        let _rx = audit(&bus);

        assert!(bus.subscriptions().has_subscriptions_for_event::<UserCreated>());
        let subs = bus.subscriptions().get_handlers::<UserCreated>().unwrap();
        assert_eq!(subs.len(), 1);
        assert_eq!(subs[0].event_name(), "UserCreated");
        assert_eq!(bus.dispatcher_count(), 1);
        assert!(bus.queue_for(&subs[0]).is_some());
    }

    #[tokio::test]
    async fn test_duplicate_subscribe_keeps_one_dispatcher() {
        let bus = InProcessBus::default();
        let _rx = audit(&bus);

        let (tx, _rx2) = mpsc::unbounded_channel();
        let err = bus
            .subscribe::<UserCreated, _>(Arc::new(Audit { seen: tx }))
            .unwrap_err();
        assert!(matches!(err, BusError::HandlerAlreadyRegistered { .. }));
        assert_eq!(bus.dispatcher_count(), 1);
        assert_eq!(bus.subscriptions().get_handlers::<UserCreated>().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_publish_fans_out_in_order() {
        let bus = InProcessBus::default();
        let mut audit_rx = audit(&bus);
        let (tx, mut mail_rx) = mpsc::unbounded_channel();
        bus.subscribe::<UserCreated, _>(Arc::new(Mailer { seen: tx })).unwrap();

        let token = CancellationToken::new();
        for n in 1..=3 {
            assert_eq!(bus.publish(user(n), &token).await.unwrap(), 2);
        }

        for n in 1..=3 {
            assert_eq!(take(&mut audit_rx).await, n);
            assert_eq!(take(&mut mail_rx).await, n + 100);
        }
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_reaches_nobody() {
        let bus = InProcessBus::default();
        let delivered = bus.publish(user(1), &CancellationToken::new()).await.unwrap();
        assert_eq!(delivered, 0);
    }

    #[tokio::test]
    async fn test_publish_with_cancelled_token_is_rejected() {
        let bus = InProcessBus::default();
        let _rx = audit(&bus);
        let token = CancellationToken::new();
        token.cancel();

        let err = bus.publish(user(1), &token).await.unwrap_err();
        assert!(matches!(err, BusError::Canceled));
    }

    #[tokio::test]
    async fn test_publish_empty_event_is_rejected() {
        let bus = InProcessBus::default();
        let _rx = audit(&bus);
        let empty = UserCreated {
            meta: EventMeta::empty(),
            n: 1,
        };

        let err = bus.publish(empty, &CancellationToken::new()).await.unwrap_err();
        assert_eq!(err.as_label(), "invalid_argument");
    }

    #[tokio::test]
    async fn test_stalled_handler_does_not_block_others() {
        let bus = InProcessBus::default();
        let (tx, mut started) = mpsc::unbounded_channel();
        bus.subscribe::<UserCreated, _>(Arc::new(Stall { started: tx })).unwrap();
        let mut audit_rx = audit(&bus);

        let token = CancellationToken::new();
        bus.publish(user(1), &token).await.unwrap();
        bus.publish(user(2), &token).await.unwrap();

        assert_eq!(take(&mut started).await, 1);
        assert_eq!(take(&mut audit_rx).await, 1);
        assert_eq!(take(&mut audit_rx).await, 2);
    }

    #[tokio::test]
    async fn test_unsubscribe_tears_down_dispatcher() {
        let bus = InProcessBus::default();
        let _rx = audit(&bus);

        let removed = Arc::new(AtomicUsize::new(0));
        let r = removed.clone();
        bus.subscriptions().on_event_removed(move |sub| {
            assert_eq!(sub.event_name(), "UserCreated");
            r.fetch_add(1, Ordering::SeqCst);
        });

        assert!(bus.unsubscribe::<UserCreated, Audit>().await.unwrap());
        assert_eq!(removed.load(Ordering::SeqCst), 1);
        assert_eq!(bus.dispatcher_count(), 0);
        assert!(!bus.subscriptions().any());

        let delivered = bus.publish(user(1), &CancellationToken::new()).await.unwrap();
        assert_eq!(delivered, 0);
    }

    #[tokio::test]
    async fn test_unsubscribe_unknown_pair_is_noop() {
        let bus = InProcessBus::default();
        assert!(!bus.unsubscribe::<UserCreated, Audit>().await.unwrap());
    }

    #[tokio::test]
    async fn test_request_returns_responder_output() {
        let bus = InProcessBus::default();
        let mut audit_rx = audit(&bus);
        bus.respond::<UserCreated, _>(Arc::new(Greeting)).unwrap();

        let reply: String = bus.request(user(7), &CancellationToken::new()).await.unwrap();
        assert_eq!(reply, "welcome #7");
        // Subscribed handlers still receive the event.
        assert_eq!(take(&mut audit_rx).await, 7);
    }

    #[tokio::test]
    async fn test_request_without_responder_publishes_nothing() {
        let bus = InProcessBus::default();
        let _rx = audit(&bus);

        let err = bus
            .request::<_, String>(user(1), &CancellationToken::new())
            .await
            .unwrap_err();
        match err {
            BusError::NoResponder { event, output } => {
                assert_eq!(event, "UserCreated");
                assert_eq!(output, "String");
            }
            other => panic!("unexpected error: {other:?}"),
        }

        let sub = Subscription::of::<UserCreated, Audit>();
        let queue = bus.queue_for(&sub).unwrap();
        tokio::task::yield_now().await;
        assert_eq!(queue.count(), 0);
        assert_eq!(queue.stats().handled, 0);
    }

    #[tokio::test]
    async fn test_second_responder_for_same_output_is_rejected() {
        let bus = InProcessBus::default();
        bus.respond::<UserCreated, _>(Arc::new(Greeting)).unwrap();

        let err = bus.respond::<UserCreated, _>(Arc::new(OtherGreeting)).unwrap_err();
        match err {
            BusError::ResponderAlreadyRegistered { existing, output, .. } => {
                assert_eq!(existing, "Greeting");
                assert_eq!(output, "String");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_responder_error_reaches_requester() {
        let bus = InProcessBus::default();
        bus.respond::<UserCreated, _>(Arc::new(Greeting)).unwrap();

        let err = bus
            .request::<_, String>(user(0), &CancellationToken::new())
            .await
            .unwrap_err();
        match err {
            BusError::Handler(HandlerError::Fail { error }) => assert_eq!(error, "user 0 is reserved"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_shutdown_clears_everything() {
        let bus = InProcessBus::default();
        let _rx = audit(&bus);
        bus.respond::<UserCreated, _>(Arc::new(Greeting)).unwrap();

        bus.shutdown().await.unwrap();
        assert_eq!(bus.dispatcher_count(), 0);
        assert!(!bus.subscriptions().any());

        let err = bus
            .request::<_, String>(user(1), &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.as_label(), "no_responder");
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_reports_stuck_dispatchers() {
        let bus = InProcessBus::new(Config {
            grace: Duration::from_millis(50),
            ..Config::default()
        });
        let (tx, mut started) = mpsc::unbounded_channel();
        bus.subscribe::<UserCreated, _>(Arc::new(Stall { started: tx })).unwrap();
        let _rx = audit(&bus);

        bus.publish(user(1), &CancellationToken::new()).await.unwrap();
        assert_eq!(take(&mut started).await, 1);

        match bus.shutdown().await.unwrap_err() {
            BusError::GraceExceeded { grace, stuck } => {
                assert_eq!(grace, Duration::from_millis(50));
                assert_eq!(stuck, vec!["UserCreated->Stall".to_string()]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(bus.dispatcher_count(), 0);
    }
}
