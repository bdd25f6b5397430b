//! Integration events: the trait user payloads implement and the erased carrier.
//!
//! ## Contents
//! - [`Event`], [`EventMeta`] event identity and registry key
//! - [`Envelope`] type-erased shared event used at object-safe seams
//! - [`event_key`] default key derivation (unqualified type name)

mod envelope;
mod event;

pub use envelope::Envelope;
pub use event::{Event, EventMeta, event_key};
pub(crate) use event::short_type_name;
