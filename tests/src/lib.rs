//! # BSP Bring-up Test Suite
//!
//! End-to-end scenarios that drive the bring-up engine against the
//! simulated I2C substrate.
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! └── integration/
//!     ├── fixtures.rs        # Generated platforms and a wired harness
//!     ├── full_suite.rs      # Whole runs, healthy and faulty
//!     ├── topology_races.rs  # Concurrent instantiation, foreign buses
//!     └── reload_cycles.rs   # Driver reload with devices bound
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p bsp-tests
//! cargo test -p bsp-tests integration::reload_cycles::
//! ```

pub mod integration;
