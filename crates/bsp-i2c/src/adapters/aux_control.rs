//! Auxiliary Device Controller
//!
//! Implements `ResourceController` through the FPGA's character device and a
//! control helper program:
//!
//! ```text
//! <helper> create  <cdev> <name> <id> [<csr-offset>]
//! <helper> destroy <cdev> <name> <id>
//! ```
//!
//! `destroy` exits with [`HELPER_STATUS_ABSENT`] when there is nothing to
//! remove.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

use crate::domain::{AuxDeviceDescriptor, FpgaSpec, I2cError};
use crate::ports::outbound::{CommandExecutor, DestroyOutcome, ResourceController};

/// Helper exit status for "no such auxiliary device".
pub const HELPER_STATUS_ABSENT: i32 = 2;

/// Character device of an FPGA: `<dev_root>/fbiob_<vendor>.<device>.<subvendor>.<subdevice>`.
pub fn cdev_path(dev_root: &Path, fpga: &FpgaSpec) -> PathBuf {
    let id = |value: &str| {
        value
            .strip_prefix("0x")
            .or_else(|| value.strip_prefix("0X"))
            .unwrap_or(value)
            .to_ascii_lowercase()
    };
    dev_root.join(format!(
        "fbiob_{}.{}.{}.{}",
        id(&fpga.vendor_id),
        id(&fpga.device_id),
        id(&fpga.sub_system_vendor_id),
        id(&fpga.sub_system_device_id)
    ))
}

/// Resource controller driving the auxiliary-device helper.
pub struct CommandResourceController {
    executor: Arc<dyn CommandExecutor>,
    helper: String,
    dev_root: PathBuf,
}

impl CommandResourceController {
    /// Create a controller using `helper` and FPGA nodes under `dev_root`.
    pub fn new(executor: Arc<dyn CommandExecutor>, helper: &str, dev_root: impl AsRef<Path>) -> Self {
        Self {
            executor,
            helper: helper.to_string(),
            dev_root: dev_root.as_ref().to_path_buf(),
        }
    }

    fn base_args(&self, verb: &str, fpga: &FpgaSpec, descriptor: &AuxDeviceDescriptor) -> Vec<String> {
        vec![
            verb.to_string(),
            cdev_path(&self.dev_root, fpga).display().to_string(),
            descriptor.name.clone(),
            descriptor.id.to_string(),
        ]
    }
}

#[async_trait]
impl ResourceController for CommandResourceController {
    async fn is_available(&self, fpga: &FpgaSpec) -> Result<bool, I2cError> {
        let path = cdev_path(&self.dev_root, fpga);
        let available = tokio::fs::try_exists(&path)
            .await
            .map_err(|e| I2cError::io(path.display(), e))?;
        debug!(fpga = %fpga.name, path = %path.display(), available, "[bsp-i2c] Controller probe");
        Ok(available)
    }

    async fn create(
        &self,
        fpga: &FpgaSpec,
        descriptor: &AuxDeviceDescriptor,
    ) -> Result<(), I2cError> {
        let mut args = self.base_args("create", fpga, descriptor);
        if let Some(offset) = &descriptor.csr_offset {
            args.push(offset.clone());
        }
        self.executor.run_checked(&self.helper, &args).await?;
        info!(fpga = %fpga.name, device = %descriptor.label(), "[bsp-i2c] Auxiliary device created");
        Ok(())
    }

    async fn destroy(
        &self,
        fpga: &FpgaSpec,
        descriptor: &AuxDeviceDescriptor,
    ) -> Result<DestroyOutcome, I2cError> {
        let args = self.base_args("destroy", fpga, descriptor);
        let output = self.executor.run(&self.helper, &args).await?;

        match output.status {
            0 => {
                info!(fpga = %fpga.name, device = %descriptor.label(), "[bsp-i2c] Auxiliary device destroyed");
                Ok(DestroyOutcome::Destroyed)
            }
            HELPER_STATUS_ABSENT => Ok(DestroyOutcome::AlreadyAbsent),
            _ => Err(output.to_error(&self.helper, &args)),
        }
    }
}
