//! # Domain Entities
//!
//! The declarative platform description (FPGAs, adapters, channels, devices,
//! golden test data) and the runtime results of instantiating it.

use serde::{Deserialize, Serialize};
use std::path::Path;

use super::errors::I2cError;
use super::hex::{hex_u8, hex_u8_seq};
use super::invariants::validate_platform;
use super::value_objects::{
    BusEntry, BusNumber, ByteRange, CycleState, DeviceLocation, I2cAddress,
};

/// Complete platform description.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformSpec {
    /// Platform name.
    pub platform: String,
    /// Kernel modules that make up the driver substrate, in load order.
    #[serde(default)]
    pub kmods: Vec<String>,
    /// FPGA instances on the platform.
    pub fpgas: Vec<FpgaSpec>,
}

impl PlatformSpec {
    /// Parse and validate a JSON platform description.
    pub fn from_json_str(json: &str) -> Result<Self, I2cError> {
        let spec: PlatformSpec =
            serde_json::from_str(json).map_err(|e| I2cError::InvalidSpec(e.to_string()))?;
        spec.validate()?;
        Ok(spec)
    }

    /// Read, parse and validate a JSON platform description file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, I2cError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| I2cError::io(path.display(), e))?;
        Self::from_json_str(&json)
    }

    /// Check the structural invariants of every FPGA, adapter and device.
    pub fn validate(&self) -> Result<(), I2cError> {
        validate_platform(self)
    }
}

/// One FPGA instance exposing an auxiliary-device controller.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FpgaSpec {
    /// Instance name.
    pub name: String,
    /// PCI vendor id (`"0x1d9b"`).
    pub vendor_id: String,
    /// PCI device id.
    pub device_id: String,
    /// PCI subsystem vendor id.
    pub sub_system_vendor_id: String,
    /// PCI subsystem device id.
    pub sub_system_device_id: String,
    /// I2C adapters hosted on this FPGA.
    #[serde(default)]
    pub i2c_adapters: Vec<AdapterSpec>,
}

/// Descriptor handed to the resource controller to create or destroy an
/// auxiliary device.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuxDeviceDescriptor {
    /// Auxiliary device type name.
    pub name: String,
    /// Instance id, unique per name within an FPGA.
    pub id: u32,
    /// Register block offset inside the FPGA BAR.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub csr_offset: Option<String>,
}

impl AuxDeviceDescriptor {
    /// `<name>.<id>`, the identity the kernel gives the auxiliary device.
    pub fn label(&self) -> String {
        format!("{}.{}", self.name, self.id)
    }
}

/// A logical sub-bus on an adapter.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelSpec {
    /// 0-based channel index.
    pub index: u32,
}

/// An I2C adapter and the devices expected behind it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdapterSpec {
    /// Descriptor for the resource controller.
    pub aux_device: AuxDeviceDescriptor,
    /// Channels, contiguous from 0.
    pub channels: Vec<ChannelSpec>,
    /// Devices expected on the channels.
    #[serde(default)]
    pub i2c_devices: Vec<DeviceSpec>,
}

impl AdapterSpec {
    /// Stable label used in logs, bus names and failures.
    pub fn label(&self) -> String {
        self.aux_device.label()
    }

    /// Number of declared channels.
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Whether any device on this adapter carries golden data.
    pub fn has_test_data(&self) -> bool {
        self.i2c_devices.iter().any(DeviceSpec::has_test_data)
    }

    /// Name given to the bus created for `channel`.
    pub fn bus_name(&self, channel: u32) -> String {
        format!("{}:ch{}", self.label(), channel)
    }
}

/// A device expected on a channel.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceSpec {
    /// Bus address.
    pub address: I2cAddress,
    /// Owning channel index.
    pub channel: u32,
    /// Kernel driver name used when binding a device node.
    pub device_name: String,
    /// Golden transactions, if recorded for this device.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_data: Option<TestData>,
}

impl DeviceSpec {
    /// Whether golden data exists and is non-empty.
    pub fn has_test_data(&self) -> bool {
        self.test_data.as_ref().is_some_and(|data| !data.is_empty())
    }
}

/// Golden transactions for one device.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestData {
    /// Multi-byte dump cases.
    #[serde(default)]
    pub i2c_dump_data: Vec<DumpCase>,
    /// Single-register read cases.
    #[serde(default)]
    pub i2c_get_data: Vec<GetCase>,
}

impl TestData {
    /// No cases recorded.
    pub fn is_empty(&self) -> bool {
        self.i2c_dump_data.is_empty() && self.i2c_get_data.is_empty()
    }
}

/// Expected bytes over an inclusive register range.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DumpCase {
    /// First register.
    #[serde(with = "hex_u8")]
    pub start: u8,
    /// Last register (inclusive).
    #[serde(with = "hex_u8")]
    pub end: u8,
    /// Expected bytes, one per register in order.
    #[serde(with = "hex_u8_seq")]
    pub expected: Vec<u8>,
}

impl DumpCase {
    /// The dumped range; a reversed case is an invalid platform.
    pub fn range(&self) -> Result<ByteRange, I2cError> {
        ByteRange::new(self.start, self.end).map_err(I2cError::InvalidSpec)
    }
}

/// Expected textual output of a single-register read.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetCase {
    /// Register, passed to `i2cget` as written.
    pub reg: String,
    /// Expected output, compared as an exact string.
    pub expected: String,
}

/// Runtime result of instantiating an adapter.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocatedAdapter {
    /// FPGA instance name.
    pub fpga: String,
    /// Adapter label.
    pub adapter: String,
    /// Lowest newly appeared bus number.
    pub base: BusNumber,
    /// One entry per channel, in channel order.
    pub buses: Vec<BusEntry>,
}

impl AllocatedAdapter {
    /// Bus number serving `channel`.
    pub fn bus_for(&self, channel: u32) -> Option<BusNumber> {
        self.buses
            .iter()
            .find(|entry| entry.channel == channel)
            .map(|entry| entry.bus)
    }

    /// All bus numbers owned by this adapter.
    pub fn bus_numbers(&self) -> Vec<BusNumber> {
        self.buses.iter().map(|entry| entry.bus).collect()
    }

    /// Location of `device` on this adapter.
    pub fn locate(&self, device: &DeviceSpec) -> Option<DeviceLocation> {
        self.bus_for(device.channel).map(|bus| DeviceLocation {
            fpga: self.fpga.clone(),
            adapter: self.adapter.clone(),
            channel: device.channel,
            bus,
            address: device.address,
        })
    }
}

/// One adapter's pass through the reload state machine.
#[derive(Clone, Debug)]
pub struct ReloadCycle {
    /// FPGA instance name.
    pub fpga: String,
    /// Adapter label.
    pub adapter: String,
    /// Current state.
    pub state: CycleState,
    /// Buses allocated during the cycle.
    pub allocated: Option<AllocatedAdapter>,
    /// Device nodes bound during the cycle.
    pub bound: Vec<DeviceLocation>,
}

impl ReloadCycle {
    /// Start a cycle in `Unloaded`.
    pub fn new(fpga: &FpgaSpec, adapter: &AdapterSpec) -> Self {
        Self {
            fpga: fpga.name.clone(),
            adapter: adapter.label(),
            state: CycleState::Unloaded,
            allocated: None,
            bound: Vec::new(),
        }
    }

    /// Transition to a new state.
    pub fn transition_to(&mut self, next: CycleState) -> Result<(), I2cError> {
        if !self.state.can_transition_to(next) {
            return Err(I2cError::InvalidTransition {
                from: self.state,
                to: next,
            });
        }
        self.state = next;
        Ok(())
    }

    /// Fail with `LeakDetected` unless the cycle ended in `Unloaded`.
    pub fn finish(&self) -> Result<(), I2cError> {
        if self.state.is_terminal() {
            return Ok(());
        }
        let mut held = Vec::new();
        if let Some(allocated) = &self.allocated {
            held.push(format!("buses {:?}", allocated.bus_numbers()));
        }
        if !self.bound.is_empty() {
            held.push(format!("{} bound device node(s)", self.bound.len()));
        }
        if held.is_empty() {
            held.push("driver substrate still loaded".to_string());
        }
        Err(I2cError::LeakDetected {
            fpga: self.fpga.clone(),
            adapter: self.adapter.clone(),
            state: self.state,
            detail: held.join(", "),
        })
    }
}
