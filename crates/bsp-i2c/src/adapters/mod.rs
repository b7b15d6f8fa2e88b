//! # Adapters Layer (Hexagonal Architecture)
//!
//! Implements the outbound port traits against the running system (processes,
//! sysfs, modprobe, the auxiliary-device helper) and in memory.

mod aux_control;
mod modprobe;
mod process;
mod simulated;
mod sysfs;

pub use aux_control::{cdev_path, CommandResourceController, HELPER_STATUS_ABSENT};
pub use modprobe::ModprobeModules;
pub use process::ProcessCommandExecutor;
pub use simulated::SimulatedI2cSubstrate;
pub use sysfs::SysfsI2c;

use std::sync::Arc;

use crate::domain::BringupConfig;
use crate::ports::outbound::{
    CommandExecutor, DeviceBinder, KernelModuleController, LiveBusSource, ResourceController,
};

/// Every outbound dependency of the engine.
#[derive(Clone)]
pub struct OutboundPorts {
    /// Runs i2c-tools.
    pub executor: Arc<dyn CommandExecutor>,
    /// Creates and destroys adapters.
    pub controller: Arc<dyn ResourceController>,
    /// Observes the live bus set.
    pub buses: Arc<dyn LiveBusSource>,
    /// Binds device nodes.
    pub binder: Arc<dyn DeviceBinder>,
    /// Loads and unloads the driver substrate.
    pub modules: Arc<dyn KernelModuleController>,
}

impl OutboundPorts {
    /// Wire every port to the running system.
    pub fn system(config: &BringupConfig, modules: Vec<String>) -> Self {
        let executor: Arc<dyn CommandExecutor> =
            Arc::new(ProcessCommandExecutor::new(config.command_timeout));
        let sysfs = Arc::new(SysfsI2c::new(&config.sysfs_root));

        Self {
            controller: Arc::new(CommandResourceController::new(
                executor.clone(),
                &config.tools.aux_ctl,
                &config.dev_root,
            )),
            modules: Arc::new(ModprobeModules::new(
                executor.clone(),
                &config.tools.modprobe,
                modules,
            )),
            buses: sysfs.clone(),
            binder: sysfs,
            executor,
        }
    }

    /// Wire every port to one simulated substrate.
    pub fn simulated(substrate: Arc<SimulatedI2cSubstrate>) -> Self {
        Self {
            executor: substrate.clone(),
            controller: substrate.clone(),
            buses: substrate.clone(),
            binder: substrate.clone(),
            modules: substrate,
        }
    }
}
