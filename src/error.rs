//! Error types used by the bus runtime and by event handlers.
//!
//! This module defines two main error enums:
//!
//! - [`BusError`] errors raised by the registry, queues and bus façade.
//! - [`HandlerError`] errors raised by individual handler invocations.
//!
//! Both types provide `as_label` for logging/metrics.

use std::time::Duration;
use thiserror::Error;

/// # Errors produced by the bus runtime.
///
/// Registry invariant violations (`HandlerAlreadyRegistered`, `EventNotRegistered`)
/// are surfaced synchronously to the caller. Handler failures on the queue side
/// never reach the publisher; only [`BusError::Handler`] from a request/response
/// publish carries one back.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum BusError {
    /// The exact (event, handler) pair is already registered.
    #[error("handler type {handler} already registered for '{event}'")]
    HandlerAlreadyRegistered {
        /// Registry key of the event.
        event: &'static str,
        /// Name of the handler type.
        handler: &'static str,
    },

    /// Another event type already owns this registry key (same unqualified name).
    #[error("event key '{event}' is owned by another event type (handled by {owner})")]
    EventKeyConflict {
        /// The contested registry key.
        event: &'static str,
        /// A handler already subscribed under the key.
        owner: &'static str,
    },

    /// The event has no registry entry at all.
    #[error("event '{event}' is not registered")]
    EventNotRegistered {
        /// Registry key of the event.
        event: String,
    },

    /// An empty event, or an event of the wrong type, was handed to a queue.
    #[error("invalid argument: {reason}")]
    InvalidArgument {
        /// What was wrong with the argument.
        reason: String,
    },

    /// No concrete bus implementation was bound at construction time.
    #[error("no event bus implementation bound")]
    EventNotImplemented,

    /// A responder already produces this output type for this event.
    #[error("responder {existing} already produces '{output}' for '{event}'")]
    ResponderAlreadyRegistered {
        /// Registry key of the event.
        event: &'static str,
        /// Name of the output type.
        output: &'static str,
        /// Name of the responder already registered.
        existing: &'static str,
    },

    /// A request was made but no responder produces the expected output.
    #[error("no responder produces '{output}' for '{event}'")]
    NoResponder {
        /// Registry key of the event.
        event: &'static str,
        /// Name of the output type.
        output: &'static str,
    },

    /// The caller's cancellation token fired before the operation started.
    #[error("operation cancelled")]
    Canceled,

    /// Dispatchers did not stop within the grace period and were aborted.
    #[error("stop grace {grace:?} exceeded; stuck: {stuck:?}")]
    GraceExceeded {
        /// The configured grace duration.
        grace: Duration,
        /// Subscriptions whose loops had to be aborted.
        stuck: Vec<String>,
    },

    /// The responder of a request/response publish failed.
    #[error("responder failed: {0}")]
    Handler(#[from] HandlerError),
}

impl BusError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use dispatchbus::BusError;
    ///
    /// let err = BusError::EventNotRegistered { event: "UserCreated".into() };
    /// assert_eq!(err.as_label(), "event_not_registered");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            BusError::HandlerAlreadyRegistered { .. } => "handler_already_registered",
            BusError::EventKeyConflict { .. } => "event_key_conflict",
            BusError::EventNotRegistered { .. } => "event_not_registered",
            BusError::InvalidArgument { .. } => "invalid_argument",
            BusError::EventNotImplemented => "event_not_implemented",
            BusError::ResponderAlreadyRegistered { .. } => "responder_already_registered",
            BusError::NoResponder { .. } => "no_responder",
            BusError::Canceled => "canceled",
            BusError::GraceExceeded { .. } => "grace_exceeded",
            BusError::Handler(_) => "handler_failed",
        }
    }

    pub(crate) fn invalid(reason: impl Into<String>) -> Self {
        BusError::InvalidArgument {
            reason: reason.into(),
        }
    }
}

/// # Errors produced by handler execution.
///
/// `Canceled` is a graceful exit (the handler observed its token); every other
/// variant counts as a failed invocation.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HandlerError {
    /// Handler failed while processing the event.
    #[error("execution failed: {error}")]
    Fail {
        /// The underlying error message.
        error: String,
    },

    /// Handler exceeded the configured invocation timeout.
    #[error("timed out after {timeout:?}")]
    Timeout {
        /// The timeout duration that was exceeded.
        timeout: Duration,
    },

    /// Handler panicked; the panic was caught by the dispatch loop.
    #[error("panicked: {info}")]
    Panicked {
        /// Panic payload rendered as text.
        info: String,
    },

    /// Handler stopped because its cancellation token fired.
    #[error("context cancelled")]
    Canceled,
}

impl HandlerError {
    /// Convenience constructor for [`HandlerError::Fail`].
    pub fn fail(error: impl std::fmt::Display) -> Self {
        HandlerError::Fail {
            error: error.to_string(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use dispatchbus::HandlerError;
    /// use std::time::Duration;
    ///
    /// let err = HandlerError::Timeout { timeout: Duration::from_secs(1) };
    /// assert_eq!(err.as_label(), "handler_timeout");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            HandlerError::Fail { .. } => "handler_failed",
            HandlerError::Timeout { .. } => "handler_timeout",
            HandlerError::Panicked { .. } => "handler_panicked",
            HandlerError::Canceled => "handler_canceled",
        }
    }

    /// True when the invocation counts as a failure (everything except `Canceled`).
    pub fn is_failure(&self) -> bool {
        !matches!(self, HandlerError::Canceled)
    }
}
