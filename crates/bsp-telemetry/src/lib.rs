//! # BSP Telemetry
//!
//! Structured logging setup shared by the bring-up tools.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use bsp_telemetry::{init_telemetry, TelemetryConfig};
//!
//! fn main() {
//!     let _guard = init_telemetry(&TelemetryConfig::from_env())?;
//!     // Logs from every crate now go through the configured subscriber
//! }
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `RUST_LOG` | | Filter directives, wins over `BSP_LOG_LEVEL` |
//! | `BSP_LOG_LEVEL` | `info` | Log level filter |
//! | `BSP_JSON_LOGS` | `false` | JSON lines instead of human-readable output |
//! | `BSP_SERVICE_NAME` | `bsp-bringup` | Service name attached to the startup log |

#![warn(missing_docs)]

mod config;
mod logging;

pub use config::TelemetryConfig;

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    /// The filter directives did not parse.
    #[error("Invalid log filter `{directives}`: {reason}")]
    Filter {
        /// Directives as given.
        directives: String,
        /// Parser message.
        reason: String,
    },

    /// A global subscriber was already installed.
    #[error("Failed to install log subscriber: {0}")]
    SubscriberInit(String),
}

/// Install the global log subscriber.
///
/// Returns a guard to hold for the lifetime of the process. A second call
/// fails with [`TelemetryError::SubscriberInit`] instead of panicking.
pub fn init_telemetry(config: &TelemetryConfig) -> Result<TelemetryGuard, TelemetryError> {
    logging::init_logging(config)?;
    tracing::info!(
        service = %config.service_name,
        json_logs = config.json_logs,
        "Telemetry initialized"
    );
    Ok(TelemetryGuard {
        service_name: config.service_name.clone(),
    })
}

/// Guard that keeps telemetry active.
pub struct TelemetryGuard {
    service_name: String,
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        tracing::debug!(service = %self.service_name, "Shutting down telemetry");
    }
}
