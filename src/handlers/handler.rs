//! # Handler contracts.
//!
//! [`EventHandler`] is the invocation contract every subscribed handler type
//! satisfies. [`Respond`] is the contract of the single handler designated to
//! produce a typed result for a request/response publish.
//!
//! A handler receives a [`CancellationToken`] that fires when its dispatcher is
//! stopped (or its invocation times out) and should return promptly once it does.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::HandlerError;
use crate::events::{Event, short_type_name};

/// # Asynchronous, cancelable event handler.
///
/// Invoked from the dedicated consumption loop of its queue, never from the
/// publisher's call path. Events arrive in FIFO order per (handler, event type).
///
/// # Example
/// ```
/// use std::sync::Arc;
/// use async_trait::async_trait;
/// use tokio_util::sync::CancellationToken;
/// use dispatchbus::{Event, EventHandler, EventMeta, HandlerError};
///
/// struct UserCreated { meta: EventMeta }
/// impl Event for UserCreated {
///     fn meta(&self) -> &EventMeta { &self.meta }
/// }
///
/// struct SendWelcomeMail;
///
/// #[async_trait]
/// impl EventHandler<UserCreated> for SendWelcomeMail {
///     async fn handle(&self, _ev: Arc<UserCreated>, ctx: CancellationToken) -> Result<(), HandlerError> {
///         if ctx.is_cancelled() {
///             return Err(HandlerError::Canceled);
///         }
///         // send mail...
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait EventHandler<E: Event>: Send + Sync + 'static {
    /// Processes a single event.
    ///
    /// Returning `Err(HandlerError::Canceled)` is treated as a graceful exit.
    async fn handle(&self, event: Arc<E>, ctx: CancellationToken) -> Result<(), HandlerError>;

    /// Name used in logs and errors. Defaults to the unqualified type name.
    fn name(&self) -> &'static str {
        short_type_name(std::any::type_name::<Self>())
    }
}

/// # Single designated producer of a typed result.
///
/// At most one responder per `(event type, Output)` pair may be registered.
#[async_trait]
pub trait Respond<E: Event>: Send + Sync + 'static {
    /// Result type contributed to the requester.
    type Output: Send + 'static;

    /// Produces the result for one event.
    async fn respond(&self, event: Arc<E>, ctx: CancellationToken) -> Result<Self::Output, HandlerError>;

    /// Name used in logs and errors. Defaults to the unqualified type name.
    fn name(&self) -> &'static str {
        short_type_name(std::any::type_name::<Self>())
    }
}
