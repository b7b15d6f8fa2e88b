//! # Domain Errors
//!
//! Error types for topology instantiation and verification.
//!
//! Infrastructure errors abort the current topology. Presence and
//! verification failures are collected so a run reports every mismatch.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use super::hex::format_hex_u8;
use super::value_objects::{BusNumber, ByteRange, CycleState, CycleStep, DeviceLocation};

/// Coarse classification of an [`I2cError`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Tool, filesystem or controller failure unrelated to device behavior.
    Infrastructure,
    /// New-bus count or layout differs from the declared channels.
    Topology,
    /// Expected device did not acknowledge, or could not be bound.
    Presence,
    /// Transaction result differs from golden data.
    Verification,
    /// Resources survived a reload cycle.
    Leak,
    /// Platform description is malformed.
    Config,
}

impl ErrorKind {
    /// Whether this kind aborts the remaining steps of a topology.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ErrorKind::Infrastructure | ErrorKind::Topology | ErrorKind::Config
        )
    }
}

/// What a transaction returned versus what was expected.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Mismatch {
    /// `i2cdump` over a range.
    Dump {
        /// Requested range.
        range: ByteRange,
        /// Golden bytes.
        expected: Vec<u8>,
        /// Parsed bytes.
        actual: Vec<u8>,
    },
    /// `i2cget` of a single register.
    Get {
        /// Register as written in the test data.
        register: String,
        /// Golden text.
        expected: String,
        /// Trimmed tool output.
        actual: String,
    },
    /// The read transaction itself failed on the device.
    ReadFailed {
        /// Range or register that was read.
        target: String,
        /// Tool exit status.
        status: i32,
        /// Tool diagnostic output.
        stderr: String,
    },
}

fn hex_list(bytes: &[u8]) -> String {
    let items: Vec<String> = bytes.iter().map(|b| format_hex_u8(*b)).collect();
    format!("[{}]", items.join(", "))
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mismatch::Dump {
                range,
                expected,
                actual,
            } => write!(
                f,
                "i2cdump range {} expected {} got {}",
                range,
                hex_list(expected),
                hex_list(actual)
            ),
            Mismatch::Get {
                register,
                expected,
                actual,
            } => write!(
                f,
                "i2cget register {} expected {:?} got {:?}",
                register, expected, actual
            ),
            Mismatch::ReadFailed {
                target,
                status,
                stderr,
            } => write!(
                f,
                "read of {} failed with status {}: {}",
                target,
                status,
                stderr.trim()
            ),
        }
    }
}

/// Errors raised by the bring-up engine.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum I2cError {
    /// External program could not be started.
    #[error("Failed to run `{program}`: {reason}")]
    CommandSpawn {
        /// Program name.
        program: String,
        /// OS error text.
        reason: String,
    },

    /// External program exited non-zero.
    #[error("`{program} {args}` exited with status {status}: {stderr}")]
    CommandFailed {
        /// Program name.
        program: String,
        /// Space-joined arguments.
        args: String,
        /// Exit status (-1 when killed by a signal).
        status: i32,
        /// Trimmed stderr.
        stderr: String,
    },

    /// Filesystem access failed.
    #[error("I/O error on {path}: {reason}")]
    Io {
        /// Path involved.
        path: String,
        /// OS error text.
        reason: String,
    },

    /// Resource controller or module controller failure.
    #[error("Infrastructure failure during {operation}: {reason}")]
    Infrastructure {
        /// What was being attempted.
        operation: String,
        /// Failure detail.
        reason: String,
    },

    /// Tool output did not follow the expected grid format.
    #[error("Unparseable tool output: {0}")]
    OutputParse(String),

    /// Observed new buses do not match the declared channels.
    #[error(
        "Topology mismatch on fpga {fpga} adapter {adapter}: expected {expected} new buses, observed {observed:?}"
    )]
    TopologyMismatch {
        /// FPGA instance name.
        fpga: String,
        /// Adapter label.
        adapter: String,
        /// Declared channel count.
        expected: usize,
        /// Newly appeared bus numbers.
        observed: Vec<BusNumber>,
    },

    /// Expected device did not acknowledge.
    #[error("Device not detected at {location}")]
    PresenceFailure {
        /// Device location.
        location: DeviceLocation,
    },

    /// Binding a device node did not produce the client.
    #[error("Device node not created at {location}")]
    DeviceNodeNotCreated {
        /// Device location.
        location: DeviceLocation,
    },

    /// Transaction result differs from golden data.
    #[error("Verification failed at {location}: {mismatch}")]
    VerificationFailure {
        /// Device location.
        location: DeviceLocation,
        /// What differed.
        mismatch: Mismatch,
    },

    /// A tool or parse failure while operating on one device.
    #[error("Failure at {location}: {cause}")]
    AtDevice {
        /// Device location.
        location: DeviceLocation,
        /// Underlying failure.
        cause: Box<I2cError>,
    },

    /// Resources remained after a reload cycle.
    #[error("Leak detected on fpga {fpga} adapter {adapter} (state {state}): {detail}")]
    LeakDetected {
        /// FPGA instance name.
        fpga: String,
        /// Adapter label.
        adapter: String,
        /// Cycle state when the leak was found.
        state: CycleState,
        /// What is still bound.
        detail: String,
    },

    /// A reload cycle stopped before returning to `Unloaded`.
    #[error("Reload cycle on fpga {fpga} adapter {adapter} aborted at {step}: {cause}")]
    CycleAborted {
        /// FPGA instance name.
        fpga: String,
        /// Adapter label.
        adapter: String,
        /// Step that failed.
        step: CycleStep,
        /// Underlying failure.
        cause: Box<I2cError>,
    },

    /// Illegal reload-cycle transition.
    #[error("Invalid state transition: {from} -> {to}")]
    InvalidTransition {
        /// Current state.
        from: CycleState,
        /// Attempted state.
        to: CycleState,
    },

    /// Platform description violates an invariant.
    #[error("Invalid platform specification: {0}")]
    InvalidSpec(String),
}

impl I2cError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            I2cError::CommandSpawn { .. }
            | I2cError::CommandFailed { .. }
            | I2cError::Io { .. }
            | I2cError::Infrastructure { .. }
            | I2cError::OutputParse(_)
            | I2cError::InvalidTransition { .. } => ErrorKind::Infrastructure,
            I2cError::TopologyMismatch { .. } => ErrorKind::Topology,
            I2cError::PresenceFailure { .. } | I2cError::DeviceNodeNotCreated { .. } => {
                ErrorKind::Presence
            }
            I2cError::VerificationFailure { .. } => ErrorKind::Verification,
            I2cError::LeakDetected { .. } => ErrorKind::Leak,
            I2cError::AtDevice { cause, .. } | I2cError::CycleAborted { cause, .. } => {
                cause.kind()
            }
            I2cError::InvalidSpec(_) => ErrorKind::Config,
        }
    }

    /// Attach the device being operated on to `cause`.
    pub fn at_device(location: &DeviceLocation, cause: I2cError) -> Self {
        I2cError::AtDevice {
            location: location.clone(),
            cause: Box::new(cause),
        }
    }

    pub(crate) fn io(path: impl fmt::Display, err: std::io::Error) -> Self {
        I2cError::Io {
            path: path.to_string(),
            reason: err.to_string(),
        }
    }
}
