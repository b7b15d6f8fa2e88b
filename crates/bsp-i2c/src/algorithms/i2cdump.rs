//! # i2cdump Output
//!
//! Parser for `i2cdump -r <start>-<end>` output and the matching formatter.
//! Formatting a byte sequence and parsing it back yields the same sequence
//! for aligned and unaligned ranges alike.

use std::fmt::Write;

use super::grid::{header, parse_grid};
use crate::domain::{ByteRange, I2cError};

/// Cell text i2cdump prints when a register read fails.
pub const READ_ERROR_CELL: &str = "XX";

/// Parse dump output into the bytes at offsets within `range`, in order.
///
/// Blank cells are skipped; a short result is left for the caller to flag
/// as a length mismatch.
pub fn parse_dump(output: &str, range: ByteRange, row_width: usize) -> Result<Vec<u8>, I2cError> {
    let mut bytes = Vec::with_capacity(range.len());

    for row in parse_grid(output, row_width)? {
        for (offset, text) in row.filled() {
            if !range.contains(offset) {
                continue;
            }
            if text == READ_ERROR_CELL {
                return Err(I2cError::OutputParse(format!(
                    "read error at register 0x{:02x}",
                    offset
                )));
            }
            let value = u8::from_str_radix(text, 16).map_err(|_| {
                I2cError::OutputParse(format!("bad byte {:?} at register 0x{:02x}", text, offset))
            })?;
            bytes.push(value);
        }
    }

    Ok(bytes)
}

/// Render `bytes` over `range` the way i2cdump does. Missing bytes print as
/// read errors.
pub fn format_dump(range: ByteRange, bytes: &[u8], row_width: usize) -> String {
    let start = usize::from(range.start);
    let end = usize::from(range.end);
    let first_row = start - start % row_width;

    let mut out = header(row_width);
    out.push_str("    ");
    for col in 0..row_width {
        let _ = write!(out, "{:x}", col % 16);
    }
    out.push('\n');

    for row in (first_row..=end).step_by(row_width) {
        let _ = write!(out, "{:02x}: ", row);
        let mut ascii = String::with_capacity(row_width);

        for offset in row..row + row_width {
            if range.contains(offset) {
                match bytes.get(offset - start) {
                    Some(byte) => {
                        let _ = write!(out, "{:02x} ", byte);
                        ascii.push(printable(*byte));
                    }
                    None => {
                        out.push_str(READ_ERROR_CELL);
                        out.push(' ');
                        ascii.push('X');
                    }
                }
            } else {
                out.push_str("   ");
                ascii.push(' ');
            }
        }

        out.push_str("   ");
        out.push_str(&ascii);
        out.push('\n');
    }

    out
}

fn printable(byte: u8) -> char {
    if byte.is_ascii_graphic() || byte == b' ' {
        byte as char
    } else {
        '.'
    }
}
