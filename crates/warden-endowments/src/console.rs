//! The attributed console endowment.
//!
//! Snap log output is forwarded through the host's `tracing`
//! infrastructure with the snap id attached as a structured field, so
//! host-side logs remain attributable to the snap that produced them.
//! Only write methods are intercepted; there is no read surface to
//! attenuate.

use serde::{Deserialize, Serialize};

use warden_core::SnapId;

/// Severity of a console write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsoleLevel {
    /// Fine-grained tracing output.
    Trace,
    /// Debug output.
    Debug,
    /// Informational output.
    Info,
    /// Warnings.
    Warn,
    /// Errors.
    Error,
}

/// A logging sink scoped to one snap.
#[derive(Debug)]
pub struct SnapConsole {
    snap_id: SnapId,
}

impl SnapConsole {
    /// Create a console attributed to `snap_id`.
    #[must_use]
    pub fn new(snap_id: SnapId) -> Self {
        Self { snap_id }
    }

    /// Write a message at the given level.
    pub fn write(&self, level: ConsoleLevel, message: &str) {
        match level {
            ConsoleLevel::Trace => tracing::trace!(snap_id = %self.snap_id, "{message}"),
            ConsoleLevel::Debug => tracing::debug!(snap_id = %self.snap_id, "{message}"),
            ConsoleLevel::Info => tracing::info!(snap_id = %self.snap_id, "{message}"),
            ConsoleLevel::Warn => tracing::warn!(snap_id = %self.snap_id, "{message}"),
            ConsoleLevel::Error => tracing::error!(snap_id = %self.snap_id, "{message}"),
        }
    }

    /// Write at info level.
    pub fn log(&self, message: &str) {
        self.write(ConsoleLevel::Info, message);
    }

    /// Write at warn level.
    pub fn warn(&self, message: &str) {
        self.write(ConsoleLevel::Warn, message);
    }

    /// Write at error level.
    pub fn error(&self, message: &str) {
        self.write(ConsoleLevel::Error, message);
    }
}
