//! # i2cdetect Output
//!
//! Reads the single cell for one address out of an
//! `i2cdetect -y -r <bus> <addr> <addr>` scan, and renders scans for the
//! simulated substrate.

use std::fmt::Write;

use super::grid::{header, parse_grid};
use crate::domain::{I2cAddress, I2cError};

/// Result of probing one address.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProbeCell {
    /// `--`: nothing acknowledged.
    Absent,
    /// The address itself: a device acknowledged.
    Present,
    /// `UU`: the address is claimed by a bound driver.
    Busy,
}

impl ProbeCell {
    /// Whether a device is there, bound or not.
    pub fn is_present(&self) -> bool {
        !matches!(self, ProbeCell::Absent)
    }
}

/// Extract the probe result for `address` from scan output.
pub fn parse_probe(
    output: &str,
    address: I2cAddress,
    row_width: usize,
) -> Result<ProbeCell, I2cError> {
    let offset = usize::from(address.value());

    let cell = parse_grid(output, row_width)?
        .into_iter()
        .find(|row| offset >= row.offset && offset < row.offset + row_width)
        .and_then(|row| row.cell_at(offset))
        .ok_or_else(|| {
            I2cError::OutputParse(format!("address {} missing from scan", address))
        })?;

    match cell {
        "--" => Ok(ProbeCell::Absent),
        "UU" => Ok(ProbeCell::Busy),
        text if u8::from_str_radix(text, 16) == Ok(address.value()) => Ok(ProbeCell::Present),
        other => Err(I2cError::OutputParse(format!(
            "unexpected scan cell {:?} for address {}",
            other, address
        ))),
    }
}

/// Render a scan of `[first, last]` with `probe` deciding each cell.
pub fn format_scan<F>(first: u8, last: u8, row_width: usize, probe: F) -> String
where
    F: Fn(u8) -> ProbeCell,
{
    let mut out = header(row_width);
    out.push('\n');

    for row in (0..=usize::from(crate::domain::MAX_I2C_ADDRESS)).step_by(row_width) {
        let _ = write!(out, "{:02x}: ", row);
        for offset in row..row + row_width {
            let in_scan = offset >= usize::from(first)
                && offset <= usize::from(last)
                && offset <= usize::from(crate::domain::MAX_I2C_ADDRESS);
            if !in_scan {
                out.push_str("   ");
                continue;
            }
            match probe(offset as u8) {
                ProbeCell::Absent => out.push_str("-- "),
                ProbeCell::Busy => out.push_str("UU "),
                ProbeCell::Present => {
                    let _ = write!(out, "{:02x} ", offset);
                }
            }
        }
        out.push('\n');
    }

    out
}
