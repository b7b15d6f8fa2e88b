//! Sysfs I2C Adapter
//!
//! Implements `LiveBusSource` and `DeviceBinder` against the kernel's I2C
//! sysfs tree (`<root>/bus/i2c/devices`).

use async_trait::async_trait;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::domain::{BusNumber, I2cAddress, I2cError};
use crate::ports::outbound::{DeviceBinder, LiveBusSource};

/// Kernel I2C sysfs interface.
pub struct SysfsI2c {
    devices_dir: PathBuf,
}

impl SysfsI2c {
    /// Use the sysfs tree mounted at `sysfs_root`.
    pub fn new(sysfs_root: impl AsRef<Path>) -> Self {
        Self {
            devices_dir: sysfs_root.as_ref().join("bus").join("i2c").join("devices"),
        }
    }

    /// Directory of bus `bus`.
    pub fn bus_dir(&self, bus: BusNumber) -> PathBuf {
        self.devices_dir.join(format!("i2c-{}", bus))
    }

    /// Directory of the client node at `address` on `bus` (`<bus>-00<aa>`).
    pub fn client_dir(&self, bus: BusNumber, address: I2cAddress) -> PathBuf {
        self.devices_dir
            .join(format!("{}-{}", bus, address.client_suffix()))
    }
}

fn parse_bus_entry(name: &str) -> Option<BusNumber> {
    name.strip_prefix("i2c-")?.parse().ok()
}

async fn exists(path: &Path) -> Result<bool, I2cError> {
    tokio::fs::try_exists(path)
        .await
        .map_err(|e| I2cError::io(path.display(), e))
}

#[async_trait]
impl LiveBusSource for SysfsI2c {
    async fn live_buses(&self) -> Result<BTreeSet<BusNumber>, I2cError> {
        let mut entries = tokio::fs::read_dir(&self.devices_dir)
            .await
            .map_err(|e| I2cError::io(self.devices_dir.display(), e))?;

        let mut buses = BTreeSet::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| I2cError::io(self.devices_dir.display(), e))?
        {
            if let Some(bus) = entry.file_name().to_str().and_then(parse_bus_entry) {
                buses.insert(bus);
            }
        }
        Ok(buses)
    }
}

#[async_trait]
impl DeviceBinder for SysfsI2c {
    async fn bind(
        &self,
        bus: BusNumber,
        device_name: &str,
        address: I2cAddress,
    ) -> Result<bool, I2cError> {
        let new_device = self.bus_dir(bus).join("new_device");
        let request = format!("{} {}\n", device_name, address);
        tokio::fs::write(&new_device, request)
            .await
            .map_err(|e| I2cError::io(new_device.display(), e))?;

        let created = exists(&self.client_dir(bus, address)).await?;
        info!(
            bus,
            address = %address,
            device = device_name,
            created,
            "[bsp-i2c] Requested device node"
        );
        Ok(created)
    }

    async fn unbind(&self, bus: BusNumber, address: I2cAddress) -> Result<(), I2cError> {
        if !exists(&self.client_dir(bus, address)).await? {
            debug!(bus, address = %address, "[bsp-i2c] No device node to remove");
            return Ok(());
        }

        let delete_device = self.bus_dir(bus).join("delete_device");
        tokio::fs::write(&delete_device, format!("{}\n", address))
            .await
            .map_err(|e| I2cError::io(delete_device.display(), e))
    }
}
