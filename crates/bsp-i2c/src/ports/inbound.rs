//! # Inbound Ports
//!
//! API trait defining what the bring-up engine can do.

use async_trait::async_trait;

use crate::domain::{CheckKind, CheckReport, PlatformSpec, SuiteReport};

/// I2C bring-up API - inbound port.
#[async_trait]
pub trait I2cBringupApi: Send + Sync {
    /// Run every check against `platform`.
    async fn run_all(&self, platform: &PlatformSpec) -> SuiteReport;

    /// Run one check against `platform`.
    async fn run_check(&self, platform: &PlatformSpec, check: CheckKind) -> CheckReport;
}
