//! # Example: request_reply
//!
//! Request/response publishing: one responder per (event, output type).
//!
//! ## Flow
//! ```text
//! main()
//!   ├─► respond::<PriceQuote, Pricer>      (Output = Price)
//!   ├─► subscribe::<PriceQuote, QuoteLog>  (plain handler, still notified)
//!   ├─► request::<_, Price>(quote)         → Price
//!   ├─► request::<_, String>(quote)        → NoResponder (nothing published)
//!   └─► run_until_shutdown(bus)            (Ctrl-C, or 2s timer)
//! ```
//!
//! ## Run
//! ```bash
//! RUST_LOG=debug cargo run --example request_reply
//! ```

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dispatchbus::{
    BusError, Config, Event, EventBus, EventBusExt, EventHandler, EventMeta, HandlerError,
    InProcessBus, Respond, run_until_shutdown,
};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

struct PriceQuote {
    meta: EventMeta,
    sku: &'static str,
    qty: u32,
}

impl Event for PriceQuote {
    fn meta(&self) -> &EventMeta {
        &self.meta
    }
}

#[derive(Debug)]
struct Price {
    cents: u64,
}

struct Pricer;

#[async_trait]
impl Respond<PriceQuote> for Pricer {
    type Output = Price;

    async fn respond(&self, ev: Arc<PriceQuote>, _ctx: CancellationToken) -> Result<Price, HandlerError> {
        let unit = match ev.sku {
            "apple" => 45,
            "pear" => 60,
            other => return Err(HandlerError::fail(format!("unknown sku {other}"))),
        };
        Ok(Price {
            cents: unit * u64::from(ev.qty),
        })
    }
}

struct QuoteLog;

#[async_trait]
impl EventHandler<PriceQuote> for QuoteLog {
    async fn handle(&self, ev: Arc<PriceQuote>, _ctx: CancellationToken) -> Result<(), HandlerError> {
        println!("[log] quote requested: {} x{}", ev.sku, ev.qty);
        Ok(())
    }
}

fn quote(sku: &'static str, qty: u32) -> PriceQuote {
    PriceQuote {
        meta: EventMeta::new(),
        sku,
        qty,
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let bus = InProcessBus::new(Config::default());
    bus.respond::<PriceQuote, _>(Arc::new(Pricer))?;
    bus.subscribe::<PriceQuote, _>(Arc::new(QuoteLog))?;

    let token = CancellationToken::new();

    let price: Price = bus.request(quote("apple", 3), &token).await?;
    println!("[main] 3 apples: {price:?}");

    match bus.request::<_, Price>(quote("durian", 1), &token).await {
        Err(BusError::Handler(e)) => println!("[main] responder failed: {e}"),
        other => println!("[main] unexpected: {other:?}"),
    }

    match bus.request::<_, String>(quote("pear", 1), &token).await {
        Err(e @ BusError::NoResponder { .. }) => println!("[main] {e}"),
        other => println!("[main] unexpected: {other:?}"),
    }

    tokio::select! {
        res = run_until_shutdown(&bus) => res?,
        _ = tokio::time::sleep(Duration::from_secs(2)) => bus.shutdown().await?,
    }
    Ok(())
}
