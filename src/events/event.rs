//! # Integration events carried through the bus.
//!
//! The [`Event`] trait is implemented by user payload structs. Every event embeds
//! an [`EventMeta`] (identity + occurrence timestamp); the payload fields are the
//! implementor's own.
//!
//! The registry key of an event type is [`Event::event_name`], which defaults to
//! the unqualified type name (see [`event_key`]).
//!
//! ## Example
//! ```rust
//! use dispatchbus::{Event, EventMeta};
//!
//! #[derive(Debug, Clone)]
//! struct UserCreated {
//!     meta: EventMeta,
//!     name: String,
//! }
//!
//! impl Event for UserCreated {
//!     fn meta(&self) -> &EventMeta {
//!         &self.meta
//!     }
//! }
//!
//! let ev = UserCreated { meta: EventMeta::new(), name: "ada".into() };
//! assert_eq!(UserCreated::event_name(), "UserCreated");
//! assert!(!ev.meta().is_empty());
//! ```

use std::time::SystemTime;

use uuid::Uuid;

/// Identity and occurrence time of an event.
///
/// A meta with the nil id is **empty**; queues reject empty events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventMeta {
    /// Unique event id.
    pub id: Uuid,
    /// Wall-clock time the event occurred.
    pub occurred_at: SystemTime,
}

impl EventMeta {
    /// Fresh identity (random v4 id) stamped with the current time.
    #[must_use]
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            occurred_at: SystemTime::now(),
        }
    }

    /// Meta with an explicit id and timestamp.
    #[must_use]
    pub fn with(id: Uuid, occurred_at: SystemTime) -> Self {
        Self { id, occurred_at }
    }

    /// Empty meta (nil id).
    #[must_use]
    pub fn empty() -> Self {
        Self {
            id: Uuid::nil(),
            occurred_at: SystemTime::UNIX_EPOCH,
        }
    }

    /// True if the id is nil.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.id.is_nil()
    }
}

impl Default for EventMeta {
    fn default() -> Self {
        Self::new()
    }
}

/// An immutable integration event.
///
/// Events are shared as `Arc<E>` between queues and never mutated after publish.
pub trait Event: Send + Sync + 'static {
    /// Identity and timestamp of this event.
    fn meta(&self) -> &EventMeta;

    /// Stable registry key for this event type.
    ///
    /// Overriding it changes the key everywhere (registry, logs, errors).
    fn event_name() -> &'static str
    where
        Self: Sized,
    {
        event_key::<Self>()
    }
}

/// Derives the default registry key of a type: its name without module path
/// and generic arguments.
///
/// ```rust
/// mod users {
///     pub struct UserCreated;
/// }
/// assert_eq!(dispatchbus::event_key::<users::UserCreated>(), "UserCreated");
/// assert_eq!(dispatchbus::event_key::<Vec<u8>>(), "Vec");
/// ```
pub fn event_key<T: ?Sized + 'static>() -> &'static str {
    short_type_name(std::any::type_name::<T>())
}

pub(crate) fn short_type_name(full: &'static str) -> &'static str {
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

#[cfg(test)]
mod tests {
    use super::*;

    mod nested {
        pub struct Deep;
    }

    struct Wrapper<T>(T);

    #[test]
    fn test_event_key_strips_module_path() {
        assert_eq!(event_key::<nested::Deep>(), "Deep");
    }

    #[test]
    fn test_event_key_strips_generic_arguments() {
        assert_eq!(event_key::<Wrapper<nested::Deep>>(), "Wrapper");
    }

    #[test]
    fn test_event_key_is_deterministic() {
        assert_eq!(event_key::<nested::Deep>(), event_key::<nested::Deep>());
    }

    #[test]
    fn test_meta_empty_and_fresh() {
        assert!(EventMeta::empty().is_empty());
        let a = EventMeta::new();
        let b = EventMeta::new();
        assert!(!a.is_empty());
        assert_ne!(a.id, b.id);
    }
}
