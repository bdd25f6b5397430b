//! Queue policies.
//!
//! ## Contents
//! - [`DuplicatePolicy`] what `enqueue` does with an id that is already queued
//!
//! ## Defaults
//! - `DuplicatePolicy::Append`: every non-empty event is appended in FIFO order.

mod duplicate;

pub use duplicate::DuplicatePolicy;
