//! # Subscription: one event type bound to one handler type.
//!
//! A [`Subscription`] is an immutable record created by the registry when a
//! pair is added. Equality and hashing look only at the two `TypeId`s; the
//! names are derived data kept for keys, logs and errors.

use std::any::TypeId;
use std::fmt;
use std::hash::{Hash, Hasher};

use crate::events::{Event, short_type_name};
use crate::handlers::EventHandler;

/// Binding between one event type and one handler type.
#[derive(Clone, Copy)]
pub struct Subscription {
    event_type: TypeId,
    handler_type: TypeId,
    event_name: &'static str,
    handler_name: &'static str,
}

impl Subscription {
    /// Describes the pair `(E, H)`.
    ///
    /// ```rust
    /// use std::sync::Arc;
    /// use dispatchbus::{Event, EventHandler, EventMeta, HandlerError, Subscription};
    /// use tokio_util::sync::CancellationToken;
    ///
    /// struct UserCreated { meta: EventMeta }
    /// impl Event for UserCreated { fn meta(&self) -> &EventMeta { &self.meta } }
    ///
    /// struct Audit;
    /// #[async_trait::async_trait]
    /// impl EventHandler<UserCreated> for Audit {
    ///     async fn handle(&self, _: Arc<UserCreated>, _: CancellationToken) -> Result<(), HandlerError> {
    ///         Ok(())
    ///     }
    /// }
    ///
    /// let sub = Subscription::of::<UserCreated, Audit>();
    /// assert_eq!(sub.event_name(), "UserCreated");
    /// assert_eq!(sub.handler_name(), "Audit");
    /// ```
    pub fn of<E, H>() -> Self
    where
        E: Event,
        H: EventHandler<E>,
    {
        Self {
            event_type: TypeId::of::<E>(),
            handler_type: TypeId::of::<H>(),
            event_name: E::event_name(),
            handler_name: short_type_name(std::any::type_name::<H>()),
        }
    }

    /// `TypeId` of the event.
    #[inline]
    pub fn event_type(&self) -> TypeId {
        self.event_type
    }

    /// `TypeId` of the handler.
    #[inline]
    pub fn handler_type(&self) -> TypeId {
        self.handler_type
    }

    /// Registry key (derived from the event type).
    #[inline]
    pub fn event_name(&self) -> &'static str {
        self.event_name
    }

    /// Unqualified handler type name.
    #[inline]
    pub fn handler_name(&self) -> &'static str {
        self.handler_name
    }
}

impl PartialEq for Subscription {
    fn eq(&self, other: &Self) -> bool {
        self.event_type == other.event_type && self.handler_type == other.handler_type
    }
}

impl Eq for Subscription {}

impl Hash for Subscription {
    fn hash<S: Hasher>(&self, state: &mut S) {
        self.event_type.hash(state);
        self.handler_type.hash(state);
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("event", &self.event_name)
            .field("handler", &self.handler_name)
            .finish()
    }
}

impl fmt::Display for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}->{}", self.event_name, self.handler_name)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use tokio_util::sync::CancellationToken;

    use super::*;
    use crate::error::HandlerError;
    use crate::events::EventMeta;

    struct UserCreated {
        meta: EventMeta,
    }

    impl Event for UserCreated {
        fn meta(&self) -> &EventMeta {
            &self.meta
        }
    }

    struct UserEventHandler;
    struct OtherHandler;

    #[async_trait]
    impl EventHandler<UserCreated> for UserEventHandler {
        async fn handle(&self, _: Arc<UserCreated>, _: CancellationToken) -> Result<(), HandlerError> {
            Ok(())
        }
    }

    #[async_trait]
    impl EventHandler<UserCreated> for OtherHandler {
        async fn handle(&self, _: Arc<UserCreated>, _: CancellationToken) -> Result<(), HandlerError> {
            Ok(())
        }
    }

    #[test]
    fn test_of_fills_types_and_names() {
        let sub = Subscription::of::<UserCreated, UserEventHandler>();
        assert_eq!(sub.event_type(), TypeId::of::<UserCreated>());
        assert_eq!(sub.handler_type(), TypeId::of::<UserEventHandler>());
        assert_eq!(sub.event_name(), "UserCreated");
        assert_eq!(sub.handler_name(), "UserEventHandler");
        assert_eq!(sub.to_string(), "UserCreated->UserEventHandler");
    }

    #[test]
    fn test_equality_is_by_type_pair() {
        let a = Subscription::of::<UserCreated, UserEventHandler>();
        let b = Subscription::of::<UserCreated, UserEventHandler>();
        let c = Subscription::of::<UserCreated, OtherHandler>();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
