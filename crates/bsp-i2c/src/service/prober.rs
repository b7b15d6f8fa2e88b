//! # Device Prober
//!
//! Presence detection with `i2cdetect` and device-node binding.

use std::sync::Arc;
use tracing::debug;

use crate::algorithms::parse_probe;
use crate::domain::{BusNumber, DeviceSpec, I2cAddress, I2cError};
use crate::ports::outbound::{CommandExecutor, DeviceBinder};

/// Probes and binds devices.
pub struct DeviceProber {
    executor: Arc<dyn CommandExecutor>,
    binder: Arc<dyn DeviceBinder>,
    i2cdetect: String,
    row_width: usize,
}

impl DeviceProber {
    /// Create a prober running `i2cdetect` through `executor`.
    pub fn new(
        executor: Arc<dyn CommandExecutor>,
        binder: Arc<dyn DeviceBinder>,
        i2cdetect: &str,
        row_width: usize,
    ) -> Self {
        Self {
            executor,
            binder,
            i2cdetect: i2cdetect.to_string(),
            row_width,
        }
    }

    /// Whether a device acknowledges at `address` on `bus`.
    ///
    /// An absent device is `Ok(false)`. A missing bus or tool, or output that
    /// does not cover the address, is an error.
    pub async fn detect(&self, bus: BusNumber, address: I2cAddress) -> Result<bool, I2cError> {
        let args = vec![
            "-y".to_string(),
            "-r".to_string(),
            bus.to_string(),
            address.to_string(),
            address.to_string(),
        ];
        let output = self.executor.run_checked(&self.i2cdetect, &args).await?;
        let cell = parse_probe(&output.stdout_text(), address, self.row_width)?;

        debug!(bus, address = %address, cell = ?cell, "[bsp-i2c] Probed device");
        Ok(cell.is_present())
    }

    /// Bind `device`'s driver at its address on `bus`.
    pub async fn create_device_node(
        &self,
        device: &DeviceSpec,
        bus: BusNumber,
    ) -> Result<bool, I2cError> {
        self.binder
            .bind(bus, &device.device_name, device.address)
            .await
    }

    /// Remove the node at `address` on `bus`, if any.
    pub async fn remove_device_node(
        &self,
        bus: BusNumber,
        address: I2cAddress,
    ) -> Result<(), I2cError> {
        self.binder.unbind(bus, address).await
    }
}
