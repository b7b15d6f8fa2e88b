//! # Algorithms
//!
//! Pure functions over bus sets and i2c-tools output.
//!
//! - `bus_diff` - newly appeared buses and the base bus number
//! - `grid` - the row/cell grid shared by `i2cdump` and `i2cdetect`
//! - `i2cdump` - register dump parser and formatter
//! - `i2cdetect` - presence scan parser and formatter

pub mod bus_diff;
pub mod grid;
pub mod i2cdetect;
pub mod i2cdump;

pub use bus_diff::{base_of, diff, vanished};
pub use grid::{parse_grid, GridRow};
pub use i2cdetect::{format_scan, parse_probe, ProbeCell};
pub use i2cdump::{format_dump, parse_dump, READ_ERROR_CELL};
