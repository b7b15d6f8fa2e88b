//! # Ports Layer
//!
//! Inbound API and outbound dependency traits.

pub mod inbound;
pub mod outbound;

pub use inbound::I2cBringupApi;
pub use outbound::{
    CommandExecutor, CommandOutput, DestroyOutcome, DeviceBinder, KernelModuleController,
    LiveBusSource, MockCommandExecutor, ResourceController,
};
