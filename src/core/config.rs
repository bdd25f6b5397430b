//! # Bus configuration.
//!
//! Provides [`Config`] centralized settings for queues, dispatchers and the bus.
//!
//! ## Sentinel values
//! - `handler_timeout = 0s` → no per-invocation timeout
//! - `grace = 0s` → stop aborts the consumption loop immediately
//!
//! # Example
//! ```
//! use std::time::Duration;
//! use dispatchbus::{Config, DuplicatePolicy};
//!
//! let mut cfg = Config::default();
//! cfg.grace = Duration::from_secs(2);
//! cfg.handler_timeout = Duration::from_millis(500);
//! cfg.duplicates = DuplicatePolicy::SuppressQueued;
//!
//! assert_eq!(cfg.handler_timeout(), Some(Duration::from_millis(500)));
//! ```

use std::time::Duration;

use crate::policies::DuplicatePolicy;

/// Configuration shared by every queue and dispatcher of a bus.
///
/// ## Field semantics
/// - `grace`: Maximum wait for an in-flight handler when a dispatcher stops
/// - `handler_timeout`: Per-invocation handler timeout (`0s` = none)
/// - `duplicates`: What `enqueue` does with an id already waiting in the queue
///
/// ## Notes
/// All fields are public. Prefer the accessors over sprinkling sentinel
/// checks (`0`) across the codebase.
#[derive(Clone, Debug)]
pub struct Config {
    /// Maximum time to wait for a dispatcher to stop before aborting its loop.
    ///
    /// When a dispatcher stops:
    /// - its `CancellationToken` is cancelled (the in-flight handler observes it)
    /// - the bus waits up to `grace` for the loop to exit
    /// - past `grace` the loop is aborted and `BusError::GraceExceeded` is returned
    pub grace: Duration,

    /// Per-invocation handler timeout.
    ///
    /// - `Duration::ZERO` = no timeout
    /// - `> 0` = the handler's token is cancelled and the item counts as failed
    pub handler_timeout: Duration,

    /// Duplicate handling for every queue of the bus.
    pub duplicates: DuplicatePolicy,
}

impl Config {
    /// Returns the handler timeout as an `Option`.
    ///
    /// - `None` → no timeout
    /// - `Some(d)` → timeout applied per invocation
    #[inline]
    pub fn handler_timeout(&self) -> Option<Duration> {
        if self.handler_timeout == Duration::ZERO {
            None
        } else {
            Some(self.handler_timeout)
        }
    }
}

impl Default for Config {
    /// Default configuration:
    ///
    /// - `grace = 5s`
    /// - `handler_timeout = 0s` (no timeout)
    /// - `duplicates = DuplicatePolicy::Append`
    fn default() -> Self {
        Self {
            grace: Duration::from_secs(5),
            handler_timeout: Duration::ZERO,
            duplicates: DuplicatePolicy::default(),
        }
    }
}
