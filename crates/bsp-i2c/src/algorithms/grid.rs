//! # Tool Output Grid
//!
//! `i2cdump` and `i2cdetect` print the same grid: an optional column header,
//! then rows `<offset>: <c0> <c1> ...` where every cell is three characters
//! wide and blank cells lie outside the requested range. Anything after the
//! last cell (the ASCII column of `i2cdump`) is ignored.

use crate::domain::I2cError;

/// Width of one cell including its separator.
const CELL_WIDTH: usize = 3;

/// One parsed grid row.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GridRow<'a> {
    /// Register offset of the first cell.
    pub offset: usize,
    /// Trimmed cell text; `None` for blank cells.
    pub cells: Vec<Option<&'a str>>,
}

impl<'a> GridRow<'a> {
    /// Non-blank cells with their absolute offsets.
    pub fn filled(&self) -> impl Iterator<Item = (usize, &'a str)> + '_ {
        self.cells
            .iter()
            .enumerate()
            .filter_map(move |(col, cell)| cell.map(|text| (self.offset + col, text)))
    }

    /// Cell at an absolute offset, if the row covers it and it is filled.
    pub fn cell_at(&self, offset: usize) -> Option<&'a str> {
        offset
            .checked_sub(self.offset)
            .and_then(|col| self.cells.get(col).copied().flatten())
    }
}

/// Parse every row of a grid. Lines without a `:` (headers) are skipped.
pub fn parse_grid(output: &str, row_width: usize) -> Result<Vec<GridRow<'_>>, I2cError> {
    let mut rows: Vec<GridRow<'_>> = Vec::new();

    for line in output.lines() {
        let Some((prefix, rest)) = line.split_once(':') else {
            continue;
        };

        let prefix = prefix.trim();
        let offset = usize::from_str_radix(prefix, 16)
            .map_err(|_| I2cError::OutputParse(format!("bad row prefix {:?}", line.trim())))?;

        if offset % row_width != 0 {
            return Err(I2cError::OutputParse(format!(
                "row offset 0x{:02x} not aligned to width {}",
                offset, row_width
            )));
        }
        if let Some(previous) = rows.last() {
            if offset <= previous.offset {
                return Err(I2cError::OutputParse(format!(
                    "row offset 0x{:02x} does not follow 0x{:02x}",
                    offset, previous.offset
                )));
            }
        }

        let mut cells = Vec::with_capacity(row_width);
        for col in 0..row_width {
            let start = col * CELL_WIDTH;
            if start >= rest.len() {
                break;
            }
            let end = (start + CELL_WIDTH).min(rest.len());
            let cell = rest
                .get(start..end)
                .ok_or_else(|| I2cError::OutputParse(format!("non-ASCII cell in {:?}", line)))?
                .trim();
            cells.push((!cell.is_empty()).then_some(cell));
        }

        rows.push(GridRow { offset, cells });
    }

    Ok(rows)
}

/// Column header line, as printed by i2c-tools.
pub fn header(row_width: usize) -> String {
    let mut line = String::from("   ");
    for col in 0..row_width {
        line.push_str(&format!("  {:x}", col));
    }
    line
}
