//! # Example: user_events
//!
//! Publishes user lifecycle events to several handlers and tears one down.
//!
//! Demonstrates how to:
//! - Register handlers (struct and closure) through `EventBusBuilder`.
//! - Publish from several tasks at once.
//! - Watch a failing handler being logged while its queue keeps going.
//! - Unsubscribe a handler and observe the `EventRemoved` hook.
//!
//! ## Flow
//! ```text
//! main()
//!   ├─► EventBusBuilder::in_process()
//!   │     ├─► with_handler::<UserCreated, Audit>
//!   │     ├─► with_handler::<UserCreated, Flaky>
//!   │     └─► with_handler::<UserDeleted, HandlerFn>
//!   ├─► 2 publisher tasks × 3 UserCreated
//!   ├─► publish UserDeleted
//!   ├─► unbind every UserDeleted pair   → EventRemoved hook fires
//!   └─► shutdown()
//! ```
//!
//! ## Run
//! ```bash
//! RUST_LOG=dispatchbus=debug cargo run --example user_events
//! ```

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dispatchbus::{
    Config, DuplicatePolicy, Event, EventBus, EventBusBuilder, EventBusExt, EventHandler, EventMeta,
    HandlerError, HandlerFn, Subscription,
};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

struct UserCreated {
    meta: EventMeta,
    email: String,
}

impl Event for UserCreated {
    fn meta(&self) -> &EventMeta {
        &self.meta
    }
}

struct UserDeleted {
    meta: EventMeta,
    email: String,
}

impl Event for UserDeleted {
    fn meta(&self) -> &EventMeta {
        &self.meta
    }
}

struct Audit;

#[async_trait]
impl EventHandler<UserCreated> for Audit {
    async fn handle(&self, ev: Arc<UserCreated>, _ctx: CancellationToken) -> Result<(), HandlerError> {
        println!("[audit] created {} ({})", ev.email, ev.meta().id);
        Ok(())
    }
}

/// Rejects addresses outside example.com.
struct Flaky;

#[async_trait]
impl EventHandler<UserCreated> for Flaky {
    async fn handle(&self, ev: Arc<UserCreated>, ctx: CancellationToken) -> Result<(), HandlerError> {
        tokio::select! {
            _ = tokio::time::sleep(Duration::from_millis(20)) => {}
            _ = ctx.cancelled() => return Err(HandlerError::Canceled),
        }
        if !ev.email.ends_with("@example.com") {
            return Err(HandlerError::fail(format!("foreign domain: {}", ev.email)));
        }
        println!("[flaky] provisioned {}", ev.email);
        Ok(())
    }
}

#[tokio::main(flavor = "multi_thread", worker_threads = 2)]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // 1) Configure queues
    let mut cfg = Config::default();
    cfg.grace = Duration::from_secs(2);
    cfg.handler_timeout = Duration::from_secs(1);
    cfg.duplicates = DuplicatePolicy::SuppressQueued;

    // 2) Registration table
    let farewell = HandlerFn::arc("farewell", |ev: Arc<UserDeleted>, _ctx: CancellationToken| async move {
        println!("[farewell] bye {}", ev.email);
        Ok::<_, HandlerError>(())
    });

    let bus = EventBusBuilder::new(cfg)
        .in_process()
        .with_handler::<UserCreated, _>(Arc::new(Audit))
        .with_handler::<UserCreated, _>(Arc::new(Flaky))
        .with_handler::<UserDeleted, _>(farewell)
        .build()?;

    bus.subscriptions().on_event_removed(|sub: &Subscription| {
        println!("[registry] last handler of {} removed ({sub})", sub.event_name());
    });

    // 3) Concurrent publishers
    let token = CancellationToken::new();
    let mut publishers = Vec::new();
    for (p, domain) in [(1, "example.com"), (2, "elsewhere.org")] {
        let bus = Arc::clone(&bus);
        let token = token.clone();
        publishers.push(tokio::spawn(async move {
            for i in 0..3 {
                let ev = UserCreated {
                    meta: EventMeta::new(),
                    email: format!("user{p}.{i}@{domain}"),
                };
                bus.publish(ev, &token).await?;
            }
            Ok::<_, dispatchbus::BusError>(())
        }));
    }
    for publisher in publishers {
        publisher.await??;
    }

    let delivered = bus
        .publish(
            UserDeleted {
                meta: EventMeta::new(),
                email: "user1.0@example.com".into(),
            },
            &token,
        )
        .await?;
    println!("[main] UserDeleted reached {delivered} queue(s)");

    tokio::time::sleep(Duration::from_millis(300)).await;

    // 4) Per-queue counters
    for sub in bus.subscriptions().get_handlers::<UserCreated>()? {
        if let Some(queue) = bus.queue_for(&sub) {
            println!("[main] {sub}: {:?}", queue.stats());
        }
    }

    // 5) Tear down one pair, then everything
    for sub in bus.subscriptions().get_handlers::<UserDeleted>()? {
        bus.unbind(&sub).await?;
    }
    println!(
        "[main] UserDeleted still subscribed: {}",
        bus.subscriptions().has_subscriptions_for_event::<UserDeleted>()
    );
    bus.shutdown().await?;
    Ok(())
}
