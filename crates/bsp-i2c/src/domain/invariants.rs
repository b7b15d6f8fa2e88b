//! # Domain Invariants
//!
//! Structural rules the platform description and every instantiated adapter
//! must satisfy.

use std::collections::HashSet;

use super::entities::{AdapterSpec, DumpCase, FpgaSpec, PlatformSpec};
use super::errors::I2cError;
use super::value_objects::{BusEntry, BusNumber};

/// Invariant: channel indices are unique and contiguous from 0.
pub fn invariant_contiguous_channels(adapter: &AdapterSpec) -> Result<(), I2cError> {
    let mut indices: Vec<u32> = adapter.channels.iter().map(|c| c.index).collect();
    indices.sort_unstable();

    for (position, index) in indices.iter().enumerate() {
        if *index as usize != position {
            return Err(I2cError::InvalidSpec(format!(
                "adapter {} channels must be contiguous from 0, got {:?}",
                adapter.label(),
                indices
            )));
        }
    }
    Ok(())
}

/// Invariant: every device sits on a declared channel, and addresses are
/// unique within each channel.
pub fn invariant_unique_addresses(adapter: &AdapterSpec) -> Result<(), I2cError> {
    let channel_count = adapter.channel_count() as u32;
    let mut seen = HashSet::new();

    for device in &adapter.i2c_devices {
        if device.channel >= channel_count {
            return Err(I2cError::InvalidSpec(format!(
                "adapter {} device {} on undeclared channel {}",
                adapter.label(),
                device.address,
                device.channel
            )));
        }
        if !seen.insert((device.channel, device.address)) {
            return Err(I2cError::InvalidSpec(format!(
                "adapter {} channel {} declares address {} twice",
                adapter.label(),
                device.channel,
                device.address
            )));
        }
    }
    Ok(())
}

/// Invariant: a dump case covers a non-empty range and lists one expected
/// byte per register.
pub fn invariant_dump_case(case: &DumpCase) -> Result<(), I2cError> {
    let range = case.range()?;
    if case.expected.len() != range.len() {
        return Err(I2cError::InvalidSpec(format!(
            "dump range {} covers {} registers but {} expected bytes given",
            range,
            range.len(),
            case.expected.len()
        )));
    }
    Ok(())
}

/// Invariant: adapter labels are unique within an FPGA.
pub fn invariant_unique_adapters(fpga: &FpgaSpec) -> Result<(), I2cError> {
    let mut seen = HashSet::new();
    for adapter in &fpga.i2c_adapters {
        if !seen.insert(adapter.label()) {
            return Err(I2cError::InvalidSpec(format!(
                "fpga {} declares adapter {} twice",
                fpga.name,
                adapter.label()
            )));
        }
    }
    Ok(())
}

/// Invariant: an instantiation produced exactly one new bus per channel.
pub fn invariant_new_bus_count(
    fpga: &str,
    adapter: &AdapterSpec,
    new_buses: &[BusNumber],
) -> Result<(), I2cError> {
    if new_buses.len() != adapter.channel_count() {
        return Err(I2cError::TopologyMismatch {
            fpga: fpga.to_string(),
            adapter: adapter.label(),
            expected: adapter.channel_count(),
            observed: new_buses.to_vec(),
        });
    }
    Ok(())
}

/// Invariant: the new buses form the run `base, base+1, ..` so that
/// `base + channel` addresses this adapter's buses only.
pub fn invariant_contiguous_buses(
    fpga: &str,
    adapter: &AdapterSpec,
    new_buses: &[BusNumber],
) -> Result<(), I2cError> {
    let contiguous = new_buses.windows(2).all(|pair| pair[1] == pair[0] + 1);
    if !contiguous {
        return Err(I2cError::TopologyMismatch {
            fpga: fpga.to_string(),
            adapter: adapter.label(),
            expected: adapter.channel_count(),
            observed: new_buses.to_vec(),
        });
    }
    Ok(())
}

/// Invariant: bus names within one adapter are pairwise distinct.
pub fn invariant_distinct_bus_names(adapter: &str, buses: &[BusEntry]) -> Result<(), I2cError> {
    let names: HashSet<&str> = buses.iter().map(|b| b.name.as_str()).collect();
    if names.len() != buses.len() {
        return Err(I2cError::InvalidSpec(format!(
            "adapter {} bus names are not unique",
            adapter
        )));
    }
    Ok(())
}

/// Validate a whole platform description.
pub fn validate_platform(platform: &PlatformSpec) -> Result<(), I2cError> {
    for fpga in &platform.fpgas {
        invariant_unique_adapters(fpga)?;
        for adapter in &fpga.i2c_adapters {
            invariant_contiguous_channels(adapter)?;
            invariant_unique_addresses(adapter)?;
            for device in &adapter.i2c_devices {
                if let Some(data) = &device.test_data {
                    for case in &data.i2c_dump_data {
                        invariant_dump_case(case)?;
                    }
                }
            }
        }
    }
    Ok(())
}
