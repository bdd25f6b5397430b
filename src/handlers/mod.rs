//! # Handler abstractions.
//!
//! This module provides the handler-side contracts:
//! - [`EventHandler`] - trait every subscribed handler implements
//! - [`HandlerFn`] - closure-backed handler
//! - [`Respond`] - trait of the single producer of a request/response result

mod handler;
mod handler_fn;

pub use handler::{EventHandler, Respond};
pub use handler_fn::HandlerFn;
