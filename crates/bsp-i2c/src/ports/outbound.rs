//! # Outbound Ports
//!
//! Traits for the external collaborators the engine drives: process
//! execution, the auxiliary-device resource controller, the live bus set,
//! device-node binding and kernel module management.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeSet, HashMap};

use crate::domain::{AuxDeviceDescriptor, BusNumber, FpgaSpec, I2cAddress, I2cError};

/// Captured result of an external program.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit status (-1 when terminated by a signal).
    pub status: i32,
    /// Captured stdout.
    pub stdout: Vec<u8>,
    /// Captured stderr.
    pub stderr: Vec<u8>,
}

impl CommandOutput {
    /// Successful output with `stdout`.
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            status: 0,
            stdout: stdout.into().into_bytes(),
            stderr: Vec::new(),
        }
    }

    /// Failed output with `stderr`.
    pub fn failed(status: i32, stderr: impl Into<String>) -> Self {
        Self {
            status,
            stdout: Vec::new(),
            stderr: stderr.into().into_bytes(),
        }
    }

    /// Exit status was zero.
    pub fn success(&self) -> bool {
        self.status == 0
    }

    /// Stdout as text.
    pub fn stdout_text(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    /// Stderr as trimmed text.
    pub fn stderr_text(&self) -> String {
        String::from_utf8_lossy(&self.stderr).trim().to_string()
    }

    /// Error describing this output as a failure of `program args`.
    pub fn to_error(&self, program: &str, args: &[String]) -> I2cError {
        I2cError::CommandFailed {
            program: program.to_string(),
            args: args.join(" "),
            status: self.status,
            stderr: self.stderr_text(),
        }
    }
}

/// Command executor - outbound port.
///
/// Runs a program to completion and captures its output. Bounding execution
/// time is the implementation's concern.
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    /// Run `program` with `args`. Only failure to start is an error.
    async fn run(&self, program: &str, args: &[String]) -> Result<CommandOutput, I2cError>;

    /// Run and treat a non-zero exit as an error.
    async fn run_checked(&self, program: &str, args: &[String]) -> Result<CommandOutput, I2cError> {
        let output = self.run(program, args).await?;
        if output.success() {
            Ok(output)
        } else {
            Err(output.to_error(program, args))
        }
    }
}

/// Result of a destroy request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DestroyOutcome {
    /// The auxiliary device existed and was removed.
    Destroyed,
    /// Nothing to remove.
    AlreadyAbsent,
}

/// Resource controller - outbound port.
///
/// Creates and destroys kernel-driver-backed auxiliary devices on an FPGA.
#[async_trait]
pub trait ResourceController: Send + Sync {
    /// Whether the FPGA's controller endpoint exists.
    async fn is_available(&self, fpga: &FpgaSpec) -> Result<bool, I2cError>;

    /// Create the auxiliary device described by `descriptor`.
    async fn create(&self, fpga: &FpgaSpec, descriptor: &AuxDeviceDescriptor)
        -> Result<(), I2cError>;

    /// Destroy it. Destroying an absent device is not an error.
    async fn destroy(
        &self,
        fpga: &FpgaSpec,
        descriptor: &AuxDeviceDescriptor,
    ) -> Result<DestroyOutcome, I2cError>;
}

/// Live bus set - outbound port.
#[async_trait]
pub trait LiveBusSource: Send + Sync {
    /// Bus numbers currently instantiated.
    async fn live_buses(&self) -> Result<BTreeSet<BusNumber>, I2cError>;
}

/// Device binder - outbound port.
///
/// Instantiates concrete device nodes (kernel I2C clients) on a bus.
#[async_trait]
pub trait DeviceBinder: Send + Sync {
    /// Bind `device_name` at `address`; `Ok(false)` if the node did not appear.
    async fn bind(
        &self,
        bus: BusNumber,
        device_name: &str,
        address: I2cAddress,
    ) -> Result<bool, I2cError>;

    /// Remove the node at `address`. Removing an absent node is not an error.
    async fn unbind(&self, bus: BusNumber, address: I2cAddress) -> Result<(), I2cError>;
}

/// Kernel module controller - outbound port.
#[async_trait]
pub trait KernelModuleController: Send + Sync {
    /// Load the driver substrate.
    async fn load_all(&self) -> Result<(), I2cError>;

    /// Unload the driver substrate.
    async fn unload_all(&self) -> Result<(), I2cError>;
}

// =============================================================================
// Mock Implementations for Testing
// =============================================================================

/// Scripted command executor for testing.
///
/// Responses are keyed by the full command line. Unscripted commands fail to
/// "spawn".
#[derive(Default)]
pub struct MockCommandExecutor {
    responses: Mutex<HashMap<String, CommandOutput>>,
    calls: Mutex<Vec<String>>,
}

impl MockCommandExecutor {
    /// Create an executor with no scripted responses.
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the response for `program args...`.
    pub fn respond(&self, command_line: &str, output: CommandOutput) {
        self.responses
            .lock()
            .insert(command_line.to_string(), output);
    }

    /// Command lines run so far.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }
}

fn command_line(program: &str, args: &[String]) -> String {
    std::iter::once(program.to_string())
        .chain(args.iter().cloned())
        .collect::<Vec<_>>()
        .join(" ")
}

#[async_trait]
impl CommandExecutor for MockCommandExecutor {
    async fn run(&self, program: &str, args: &[String]) -> Result<CommandOutput, I2cError> {
        let line = command_line(program, args);
        self.calls.lock().push(line.clone());

        self.responses
            .lock()
            .get(&line)
            .cloned()
            .ok_or_else(|| I2cError::CommandSpawn {
                program: program.to_string(),
                reason: format!("no scripted response for {:?}", line),
            })
    }
}
