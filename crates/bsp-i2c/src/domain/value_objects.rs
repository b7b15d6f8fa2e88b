//! # Value Objects
//!
//! Small immutable types shared across the engine: addresses, byte ranges,
//! bus entries, device locations and the reload-cycle state machine.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::hex::{format_hex_u8, hex_u8, parse_hex_u8};

/// OS-assigned I2C bus number (`/dev/i2c-N`).
pub type BusNumber = u32;

/// Highest 7-bit I2C address.
pub const MAX_I2C_ADDRESS: u8 = 0x7f;

/// A 7-bit I2C device address.
///
/// Written in configuration as `"0x50"` and rendered the same way when passed
/// to i2c-tools.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct I2cAddress(u8);

impl I2cAddress {
    /// Create an address, rejecting values outside the 7-bit space.
    pub fn new(value: u8) -> Result<Self, String> {
        if value > MAX_I2C_ADDRESS {
            return Err(format!("I2C address 0x{:02x} exceeds 7 bits", value));
        }
        Ok(Self(value))
    }

    /// Raw address value.
    pub fn value(&self) -> u8 {
        self.0
    }

    /// Suffix the kernel uses for bound client directories (`<bus>-00<aa>`).
    pub fn client_suffix(&self) -> String {
        format!("{:04x}", self.0)
    }
}

impl FromStr for I2cAddress {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(parse_hex_u8(s)?)
    }
}

impl TryFrom<String> for I2cAddress {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<I2cAddress> for String {
    fn from(address: I2cAddress) -> Self {
        address.to_string()
    }
}

impl fmt::Display for I2cAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", format_hex_u8(self.0))
    }
}

/// Inclusive register range `[start, end]` for a multi-byte dump.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ByteRange {
    /// First register offset.
    #[serde(with = "hex_u8")]
    pub start: u8,
    /// Last register offset (inclusive).
    #[serde(with = "hex_u8")]
    pub end: u8,
}

impl ByteRange {
    /// Create a range; `start` must not exceed `end`.
    pub fn new(start: u8, end: u8) -> Result<Self, String> {
        if start > end {
            return Err(format!("range start 0x{:02x} > end 0x{:02x}", start, end));
        }
        Ok(Self { start, end })
    }

    /// Number of registers covered.
    pub fn len(&self) -> usize {
        usize::from(self.end) - usize::from(self.start) + 1
    }

    /// Ranges are never empty; present for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Whether `offset` falls inside the range.
    pub fn contains(&self, offset: usize) -> bool {
        offset >= usize::from(self.start) && offset <= usize::from(self.end)
    }

    /// Argument form accepted by `i2cdump -r`.
    pub fn to_tool_arg(&self) -> String {
        format!("{}-{}", format_hex_u8(self.start), format_hex_u8(self.end))
    }
}

impl fmt::Display for ByteRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_tool_arg())
    }
}

/// One bus created by instantiating an adapter.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusEntry {
    /// Channel index on the owning adapter.
    pub channel: u32,
    /// Assigned bus number (`base + channel`).
    pub bus: BusNumber,
    /// Derived name, unique within the adapter.
    pub name: String,
}

/// Where a device lives, for failure reporting.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceLocation {
    /// FPGA instance name.
    pub fpga: String,
    /// Adapter label.
    pub adapter: String,
    /// Channel index.
    pub channel: u32,
    /// Resolved bus number.
    pub bus: BusNumber,
    /// Device address.
    pub address: I2cAddress,
}

impl fmt::Display for DeviceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "fpga {} adapter {} channel {} bus {} address {}",
            self.fpga, self.adapter, self.channel, self.bus, self.address
        )
    }
}

/// Reload-cycle state.
///
/// ```text
/// Unloaded ──load──→ Loaded ──instantiate──→ Instantiated ──bind──→ DevicesBound
///    ↑                  │                          │                      │
///    └──────────────────┴───────── unload ─────────┴──────────────────────┘
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CycleState {
    /// Driver substrate not loaded.
    Unloaded,
    /// Kernel modules loaded, no adapter instantiated.
    Loaded,
    /// Adapter instantiated, buses live.
    Instantiated,
    /// Device nodes bound on the adapter's buses.
    DevicesBound,
}

impl CycleState {
    /// Check whether a transition is allowed.
    pub fn can_transition_to(&self, next: CycleState) -> bool {
        use CycleState::*;
        matches!(
            (self, next),
            (Unloaded, Loaded)
                | (Loaded, Instantiated)
                | (Instantiated, DevicesBound)
                | (Loaded, Unloaded)
                | (Instantiated, Unloaded)
                | (DevicesBound, Unloaded)
        )
    }

    /// Terminal state of a clean cycle.
    pub fn is_terminal(&self) -> bool {
        matches!(self, CycleState::Unloaded)
    }
}

impl fmt::Display for CycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CycleState::Unloaded => "Unloaded",
            CycleState::Loaded => "Loaded",
            CycleState::Instantiated => "Instantiated",
            CycleState::DevicesBound => "DevicesBound",
        };
        f.write_str(name)
    }
}

/// Step of a reload cycle, used to say where a cycle aborted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CycleStep {
    /// Loading kernel modules.
    LoadModules,
    /// Instantiating the adapter.
    Instantiate,
    /// Presence detection of a device.
    Detect,
    /// Binding a device node.
    BindDevice,
    /// Unloading kernel modules.
    UnloadModules,
}

impl fmt::Display for CycleStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CycleStep::LoadModules => "load-modules",
            CycleStep::Instantiate => "instantiate",
            CycleStep::Detect => "detect",
            CycleStep::BindDevice => "bind-device",
            CycleStep::UnloadModules => "unload-modules",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_parse_and_display() {
        let addr: I2cAddress = "0x50".parse().unwrap();
        assert_eq!(addr.value(), 0x50);
        assert_eq!(addr.to_string(), "0x50");
        assert_eq!(addr.client_suffix(), "0050");
    }

    #[test]
    fn test_address_rejects_eight_bit() {
        assert!("0x80".parse::<I2cAddress>().is_err());
        assert!(I2cAddress::new(0x7f).is_ok());
    }

    #[test]
    fn test_address_serde_as_string() {
        let addr: I2cAddress = serde_json::from_str("\"0x1a\"").unwrap();
        assert_eq!(serde_json::to_string(&addr).unwrap(), "\"0x1a\"");
    }

    #[test]
    fn test_byte_range() {
        let range = ByteRange::new(0x02, 0x11).unwrap();
        assert_eq!(range.len(), 16);
        assert!(range.contains(0x02));
        assert!(range.contains(0x11));
        assert!(!range.contains(0x12));
        assert_eq!(range.to_tool_arg(), "0x02-0x11");
        assert!(ByteRange::new(5, 4).is_err());
    }

    #[test]
    fn test_cycle_transitions() {
        use CycleState::*;
        assert!(Unloaded.can_transition_to(Loaded));
        assert!(Loaded.can_transition_to(Instantiated));
        assert!(Instantiated.can_transition_to(DevicesBound));
        assert!(DevicesBound.can_transition_to(Unloaded));
        assert!(!Unloaded.can_transition_to(Instantiated));
        assert!(!DevicesBound.can_transition_to(Loaded));
        assert!(!Loaded.can_transition_to(DevicesBound));
    }

    #[test]
    fn test_device_location_names_everything() {
        let location = DeviceLocation {
            fpga: "iob".to_string(),
            adapter: "i2c_master.1".to_string(),
            channel: 3,
            bus: 17,
            address: I2cAddress::new(0x48).unwrap(),
        };
        let text = location.to_string();
        assert!(text.contains("iob"));
        assert!(text.contains("i2c_master.1"));
        assert!(text.contains("channel 3"));
        assert!(text.contains("bus 17"));
        assert!(text.contains("0x48"));
    }
}
