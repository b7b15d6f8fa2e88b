//! # Domain Module
//!
//! Core types for I2C topology bring-up: the platform description, runtime
//! allocation results, errors, invariants, configuration and reports.

pub mod config;
pub mod entities;
pub mod errors;
pub mod hex;
pub mod invariants;
pub mod report;
pub mod value_objects;

pub use config::*;
pub use entities::*;
pub use errors::*;
pub use invariants::*;
pub use report::*;
pub use value_objects::*;
