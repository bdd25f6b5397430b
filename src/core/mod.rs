//! Runtime core: queues, dispatchers and the bus.
//!
//! Internal modules:
//! - `runner`: executes one handler invocation with timeout and panic isolation;
//! - `queue`: per-(handler, event) FIFO and its consumption loop;
//! - `dispatcher`: owns the background task draining one queue;
//! - `binding`: registration units (handler pairs, responders);
//! - `bus`: object-safe bus contract and typed extension;
//! - `in_process`: the concrete bus;
//! - `builder`: registration table and bus construction;
//! - `shutdown`: OS signal handling and host lifecycle helper.

mod binding;
mod builder;
mod bus;
mod config;
mod dispatcher;
mod in_process;
mod queue;
mod runner;
mod shutdown;

pub use binding::{Binding, ResponderBinding};
pub use builder::EventBusBuilder;
pub use bus::{EventBus, EventBusExt};
pub use config::Config;
pub use dispatcher::Dispatcher;
pub use in_process::InProcessBus;
pub use queue::{DispatchQueue, Queue, QueueStats};
pub use shutdown::{run_until_shutdown, wait_for_shutdown_signal};
