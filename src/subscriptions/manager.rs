//! # Subscription registry.
//!
//! [`SubscriptionManager`] maps an event name to the ordered set of
//! [`Subscription`]s bound to it.
//!
//! ## Architecture
//! ```text
//! add(E, H) ──► Mutex<HashMap<&str, Vec<Subscription>>>
//!                    "UserCreated" → [UserCreated->Audit, UserCreated->Mailer]
//!                    "OrderPlaced" → [OrderPlaced->Billing]
//!
//! remove(E, H) ─► last one for "UserCreated"? ─► key dropped ─► on_event_removed hooks
//! ```
//!
//! ## Rules
//! - A key exists iff its set is non-empty (emptied sets are removed at once).
//! - Handler types are unique per event; a duplicate add fails and mutates nothing.
//! - A key belongs to one event type. Adding a different type whose name maps to
//!   the same key fails with `EventKeyConflict`; typed reads ignore a key owned
//!   by another type.
//! - Reads on an event with no key fail with `EventNotRegistered`; a missing
//!   handler inside an existing event is `Ok(None)`.
//! - Removing a pair that is not registered is a no-op.
//! - One lock serializes every read and write.
//! - Removal hooks fire synchronously, after the registry lock is released,
//!   only on the non-empty → empty transition. `clear()` fires none.

use std::any::TypeId;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError, RwLock};

use tracing::debug;

use crate::error::BusError;
use crate::events::Event;
use crate::handlers::EventHandler;

use super::subscription::Subscription;

/// Callback invoked with the last subscription of an event when its key is removed.
pub type RemovedHook = Box<dyn Fn(&Subscription) + Send + Sync>;

/// Thread-safe registry of subscriptions keyed by event name.
#[derive(Default)]
pub struct SubscriptionManager {
    handlers: Mutex<HashMap<&'static str, Vec<Subscription>>>,
    removed_hooks: RwLock<Vec<RemovedHook>>,
}

impl SubscriptionManager {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry key of `E`.
    #[inline]
    pub fn event_key<E: Event>(&self) -> &'static str {
        E::event_name()
    }

    /// Registers the pair `(E, H)`.
    ///
    /// Fails with [`BusError::HandlerAlreadyRegistered`] if `H` already handles `E`.
    pub fn add_subscription<E, H>(&self) -> Result<Subscription, BusError>
    where
        E: Event,
        H: EventHandler<E>,
    {
        self.add(Subscription::of::<E, H>())
    }

    /// Unregisters the pair `(E, H)`; returns the removed subscription, if any.
    pub fn remove_subscription<E, H>(&self) -> Option<Subscription>
    where
        E: Event,
        H: EventHandler<E>,
    {
        self.remove(&Subscription::of::<E, H>())
    }

    /// True iff `E` has at least one subscription.
    pub fn has_subscriptions_for_event<E: Event>(&self) -> bool {
        owned_by::<E>(&self.lock()).is_some()
    }

    /// Subscriptions of `E` in insertion order.
    ///
    /// Fails with [`BusError::EventNotRegistered`] if `E` has no entry.
    pub fn get_handlers<E: Event>(&self) -> Result<Vec<Subscription>, BusError> {
        owned_by::<E>(&self.lock())
            .cloned()
            .ok_or_else(|| not_registered(E::event_name()))
    }

    /// Same contract as [`get_handlers`](Self::get_handlers).
    pub fn find_subscriptions<E: Event>(&self) -> Result<Vec<Subscription>, BusError> {
        self.get_handlers::<E>()
    }

    /// Looks up the pair `(E, H)`.
    ///
    /// - `Err(EventNotRegistered)`: nobody subscribed to `E` at all.
    /// - `Ok(None)`: `E` has subscriptions, but not from `H`.
    pub fn find_subscription<E, H>(&self) -> Result<Option<Subscription>, BusError>
    where
        E: Event,
        H: EventHandler<E>,
    {
        let wanted = Subscription::of::<E, H>();
        let handlers = self.lock();
        let list = owned_by::<E>(&handlers).ok_or_else(|| not_registered(wanted.event_name()))?;
        Ok(list.iter().find(|s| **s == wanted).copied())
    }

    /// True iff the registry holds at least one key.
    pub fn any(&self) -> bool {
        !self.lock().is_empty()
    }

    /// Number of event keys.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// True iff the registry is empty.
    pub fn is_empty(&self) -> bool {
        !self.any()
    }

    /// Removes every entry. Does not fire removal hooks.
    pub fn clear(&self) {
        let mut handlers = self.lock();
        let keys = handlers.len();
        handlers.clear();
        debug!(keys, "subscription registry cleared");
    }

    /// Registers a removal hook, scoped to this registry.
    ///
    /// Hooks must not register further hooks from inside the callback.
    pub fn on_event_removed<F>(&self, hook: F)
    where
        F: Fn(&Subscription) + Send + Sync + 'static,
    {
        self.removed_hooks
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Box::new(hook));
    }

    // ---------------------------
    // Erased API (used by the bus)
    // ---------------------------

    /// Registers an already described pair.
    pub fn add(&self, sub: Subscription) -> Result<Subscription, BusError> {
        let mut handlers = self.lock();
        let list = handlers.entry(sub.event_name()).or_default();
        if let Some(owner) = list.first().filter(|s| s.event_type() != sub.event_type()) {
            return Err(BusError::EventKeyConflict {
                event: sub.event_name(),
                owner: owner.handler_name(),
            });
        }
        if list.iter().any(|s| *s == sub) {
            return Err(BusError::HandlerAlreadyRegistered {
                event: sub.event_name(),
                handler: sub.handler_name(),
            });
        }
        list.push(sub);
        debug!(event = sub.event_name(), handler = sub.handler_name(), "subscription added");
        Ok(sub)
    }

    /// Unregisters a pair; no-op when absent.
    pub fn remove(&self, sub: &Subscription) -> Option<Subscription> {
        let (removed, emptied) = {
            let mut handlers = self.lock();
            let list = handlers.get_mut(sub.event_name())?;
            let pos = list.iter().position(|s| s == sub)?;
            let removed = list.remove(pos);
            let emptied = list.is_empty();
            if emptied {
                handlers.remove(sub.event_name());
            }
            (removed, emptied)
        };

        debug!(event = removed.event_name(), handler = removed.handler_name(), emptied, "subscription removed");
        if emptied {
            self.fire_removed(&removed);
        }
        Some(removed)
    }

    /// True iff the key has at least one subscription.
    pub fn has_subscriptions_for(&self, event_name: &str) -> bool {
        self.lock().contains_key(event_name)
    }

    /// True iff exactly this pair is registered.
    pub fn contains(&self, sub: &Subscription) -> bool {
        self.lock()
            .get(sub.event_name())
            .is_some_and(|list| list.contains(sub))
    }

    /// Snapshot of the subscriptions under a key.
    pub fn subscriptions_for_key(&self, event_name: &str) -> Result<Vec<Subscription>, BusError> {
        self.lock()
            .get(event_name)
            .cloned()
            .ok_or_else(|| not_registered(event_name))
    }

    // ---------------------------
    // Helpers
    // ---------------------------

    /// Every mutation is a single step, so a poisoned map is still consistent.
    fn lock(&self) -> MutexGuard<'_, HashMap<&'static str, Vec<Subscription>>> {
        self.handlers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn fire_removed(&self, sub: &Subscription) {
        let hooks = self.removed_hooks.read().unwrap_or_else(PoisonError::into_inner);
        for hook in hooks.iter() {
            hook(sub);
        }
    }
}

/// The list under `E`'s key, if that key belongs to `E`.
fn owned_by<'a, E: Event>(
    handlers: &'a HashMap<&'static str, Vec<Subscription>>,
) -> Option<&'a Vec<Subscription>> {
    handlers
        .get(E::event_name())
        .filter(|list| list.first().is_some_and(|s| s.event_type() == TypeId::of::<E>()))
}

fn not_registered(event_name: &str) -> BusError {
    BusError::EventNotRegistered {
        event: event_name.to_string(),
    }
}
