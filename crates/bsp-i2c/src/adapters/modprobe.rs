//! Modprobe Module Controller
//!
//! Implements `KernelModuleController` by running `modprobe`.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

use crate::domain::I2cError;
use crate::ports::outbound::{CommandExecutor, KernelModuleController};

/// Loads modules in order and unloads them in reverse.
pub struct ModprobeModules {
    executor: Arc<dyn CommandExecutor>,
    modprobe: String,
    modules: Vec<String>,
}

impl ModprobeModules {
    /// Manage `modules` with the `modprobe` program.
    pub fn new(executor: Arc<dyn CommandExecutor>, modprobe: &str, modules: Vec<String>) -> Self {
        Self {
            executor,
            modprobe: modprobe.to_string(),
            modules,
        }
    }
}

#[async_trait]
impl KernelModuleController for ModprobeModules {
    async fn load_all(&self) -> Result<(), I2cError> {
        for module in &self.modules {
            self.executor
                .run_checked(&self.modprobe, &[module.clone()])
                .await?;
        }
        info!(modules = ?self.modules, "[bsp-i2c] Kernel modules loaded");
        Ok(())
    }

    async fn unload_all(&self) -> Result<(), I2cError> {
        for module in self.modules.iter().rev() {
            self.executor
                .run_checked(&self.modprobe, &["-r".to_string(), module.clone()])
                .await?;
        }
        info!(modules = ?self.modules, "[bsp-i2c] Kernel modules unloaded");
        Ok(())
    }
}
