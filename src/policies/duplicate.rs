//! # Duplicate handling for dispatch queues.
//!
//! [`DuplicatePolicy`] decides what `enqueue` does with an event whose id
//! matches an event still waiting in the same queue.
//!
//! - [`DuplicatePolicy::Append`] every non-empty event is appended (default).
//! - [`DuplicatePolicy::SuppressQueued`] an event is skipped while another event
//!   with the same id is still queued; once that one is dequeued, the id may be
//!   enqueued again.
//!
//! ```text
//! Append:          [e1, e2] + e1 → [e1, e2, e1]
//! SuppressQueued:  [e1, e2] + e1 → [e1, e2]        (suppressed += 1)
//!                  [e2]     + e1 → [e2, e1]        (e1 already handled)
//! ```
//!
//! Suppression compares ids only, never payloads.

/// Policy for re-enqueueing an event id that is already waiting.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DuplicatePolicy {
    /// Unconditional FIFO append (default).
    #[default]
    Append,
    /// Skip events whose id is already queued.
    SuppressQueued,
}
