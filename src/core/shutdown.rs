//! # Host lifecycle: OS signals and bus shutdown.
//!
//! Provides [`wait_for_shutdown_signal`] an async helper that completes when the
//! process receives a termination signal, and [`run_until_shutdown`] which parks
//! the caller until then and stops the bus.
//!
//! ## Signals
//! **Unix platforms:**
//! - `SIGINT` (Ctrl-C in terminal)
//! - `SIGTERM` (default kill signal, used by systemd/Kubernetes)
//! - `SIGQUIT` (quit signal)
//!
//! **Windows platforms:**
//! - `Ctrl-C` via [`tokio::signal::ctrl_c`]

use tracing::{info, warn};

use crate::core::bus::EventBus;
use crate::error::BusError;

/// Waits for a termination signal.
///
/// Each call creates independent signal listeners.
///
/// Returns `Ok(())` when any signal is received, or `Err` if signal registration fails.
#[cfg(unix)]
pub async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigquit = signal(SignalKind::quit())?;

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {},
        _ = sigint.recv()  => {},
        _ = sigterm.recv() => {},
        _ = sigquit.recv() => {},
    }
    Ok(())
}

/// Waits for a termination signal.
///
/// Returns `Ok(())` when Ctrl-C is received, or `Err` if registration fails.
#[cfg(not(unix))]
pub async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}

/// Parks until a termination signal arrives, then shuts `bus` down.
///
/// If signal listeners cannot be registered the bus is shut down at once.
pub async fn run_until_shutdown(bus: &dyn EventBus) -> Result<(), BusError> {
    match wait_for_shutdown_signal().await {
        Ok(()) => info!("shutdown signal received"),
        Err(e) => warn!(error = %e, "signal registration failed; shutting down"),
    }
    bus.shutdown().await
}
