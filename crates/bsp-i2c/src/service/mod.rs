//! # Bring-up Services
//!
//! The engine proper, leaf-first:
//! 1. `BusRegistry` observes the live bus set
//! 2. `TopologyInstantiator` creates adapters and maps their buses
//! 3. `DeviceProber` detects and binds devices
//! 4. `TransactionVerifier` compares register reads with golden data
//! 5. `ReloadCycleSupervisor` stresses driver load/unload
//!
//! `I2cBringupSuite` composes them into the checks behind `I2cBringupApi`.

mod instantiator;
mod prober;
mod registry;
mod suite;
mod supervisor;
mod verifier;

pub use instantiator::TopologyInstantiator;
pub use prober::DeviceProber;
pub use registry::BusRegistry;
pub use suite::I2cBringupSuite;
pub use supervisor::{CycleReport, ReloadCycleSupervisor};
pub use verifier::TransactionVerifier;
