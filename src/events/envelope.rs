//! # Type-erased event carrier.
//!
//! [`Envelope`] lets object-safe seams (the [`EventBus`](crate::EventBus) trait,
//! type-erased queues) move events of any type. The payload is shared
//! (`Arc`), so fanning one envelope out to N queues never copies the event.

use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

use super::event::{Event, EventMeta};

/// Shared, type-erased event with its routing data.
#[derive(Clone)]
pub struct Envelope {
    name: &'static str,
    event_type: TypeId,
    meta: EventMeta,
    payload: Arc<dyn Any + Send + Sync>,
}

impl Envelope {
    /// Wraps an event.
    pub fn new<E: Event>(event: E) -> Self {
        Self::from_arc(Arc::new(event))
    }

    /// Wraps an already shared event.
    pub fn from_arc<E: Event>(event: Arc<E>) -> Self {
        Self {
            name: E::event_name(),
            event_type: TypeId::of::<E>(),
            meta: *event.meta(),
            payload: event,
        }
    }

    /// Registry key of the carried event type.
    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// `TypeId` of the carried event type.
    #[inline]
    pub fn event_type(&self) -> TypeId {
        self.event_type
    }

    /// Identity and timestamp of the carried event.
    #[inline]
    pub fn meta(&self) -> &EventMeta {
        &self.meta
    }

    /// Recovers the typed event, or `None` if `E` is not the carried type.
    pub fn downcast<E: Event>(&self) -> Option<Arc<E>> {
        Arc::clone(&self.payload).downcast::<E>().ok()
    }
}

impl fmt::Debug for Envelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Envelope")
            .field("name", &self.name)
            .field("id", &self.meta.id)
            .finish_non_exhaustive()
    }
}
