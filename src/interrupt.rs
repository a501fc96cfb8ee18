//! Process-wide cancellation flag.
//!
//! Installed once at process start, set asynchronously by SIGINT/SIGTERM,
//! polled only at animation frame boundaries and never reset within a run.
//! A cancelled run therefore always leaves a complete frame visible.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, LazyLock};

use crate::error::{YavError, YavResult};

static INTERRUPTED: LazyLock<Arc<AtomicBool>> = LazyLock::new(|| Arc::new(AtomicBool::new(false)));

/// Register SIGINT and SIGTERM to set the cancellation flag.
pub fn install() -> YavResult<()> {
    for signal in [signal_hook::consts::SIGINT, signal_hook::consts::SIGTERM] {
        signal_hook::flag::register(signal, Arc::clone(&INTERRUPTED))
            .map_err(|e| YavError::hardware("signal handler registration", e))?;
    }
    Ok(())
}

/// Whether cancellation was requested.
pub fn interrupted() -> bool {
    INTERRUPTED.load(Ordering::Relaxed)
}

/// Set the flag as if a signal had been delivered. One-way: the flag is
/// never cleared within a run.
pub fn trigger() {
    INTERRUPTED.store(true, Ordering::Relaxed);
}
