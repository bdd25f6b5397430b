//! # Subscriptions and their registry.
//!
//! - [`Subscription`] one (event type, handler type) binding
//! - [`SubscriptionManager`] event name → ordered subscriptions, with removal hooks

mod manager;
mod subscription;

pub use manager::{RemovedHook, SubscriptionManager};
pub use subscription::Subscription;
