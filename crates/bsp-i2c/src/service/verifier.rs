//! # Transaction Verifier
//!
//! Reads registers with `i2cdump`/`i2cget` and compares them with golden
//! data. Every mismatch is collected; only a failure to run the tool at all
//! ends verification early.

use std::sync::Arc;
use tracing::{debug, warn};

use crate::algorithms::parse_dump;
use crate::domain::{
    DeviceLocation, DeviceSpec, DumpCase, GetCase, I2cError, Mismatch,
};
use crate::ports::outbound::CommandExecutor;

/// Runs golden-data transactions against devices.
pub struct TransactionVerifier {
    executor: Arc<dyn CommandExecutor>,
    i2cdump: String,
    i2cget: String,
    row_width: usize,
}

impl TransactionVerifier {
    /// Create a verifier running the given tools through `executor`.
    pub fn new(
        executor: Arc<dyn CommandExecutor>,
        i2cdump: &str,
        i2cget: &str,
        row_width: usize,
    ) -> Self {
        Self {
            executor,
            i2cdump: i2cdump.to_string(),
            i2cget: i2cget.to_string(),
            row_width,
        }
    }

    /// Dump cases then get cases. Devices without test data yield nothing.
    pub async fn run_all(
        &self,
        device: &DeviceSpec,
        location: &DeviceLocation,
    ) -> Result<Vec<I2cError>, I2cError> {
        let mut findings = self.run_dump(device, location).await?;
        findings.extend(self.run_get(device, location).await?);
        Ok(findings)
    }

    /// Check every dump case of `device`.
    pub async fn run_dump(
        &self,
        device: &DeviceSpec,
        location: &DeviceLocation,
    ) -> Result<Vec<I2cError>, I2cError> {
        let Some(data) = &device.test_data else {
            return Ok(Vec::new());
        };

        let mut findings = Vec::new();
        for case in &data.i2c_dump_data {
            if let Some(mismatch) = self.check_dump(case, location).await? {
                warn!(location = %location, mismatch = %mismatch, "[bsp-i2c] Dump mismatch");
                findings.push(I2cError::VerificationFailure {
                    location: location.clone(),
                    mismatch,
                });
            }
        }
        Ok(findings)
    }

    /// Check every get case of `device`.
    pub async fn run_get(
        &self,
        device: &DeviceSpec,
        location: &DeviceLocation,
    ) -> Result<Vec<I2cError>, I2cError> {
        let Some(data) = &device.test_data else {
            return Ok(Vec::new());
        };

        let mut findings = Vec::new();
        for case in &data.i2c_get_data {
            if let Some(mismatch) = self.check_get(case, location).await? {
                warn!(location = %location, mismatch = %mismatch, "[bsp-i2c] Get mismatch");
                findings.push(I2cError::VerificationFailure {
                    location: location.clone(),
                    mismatch,
                });
            }
        }
        Ok(findings)
    }

    async fn check_dump(
        &self,
        case: &DumpCase,
        location: &DeviceLocation,
    ) -> Result<Option<Mismatch>, I2cError> {
        let range = case.range()?;
        let args = vec![
            "-y".to_string(),
            "-r".to_string(),
            range.to_tool_arg(),
            location.bus.to_string(),
            location.address.to_string(),
        ];
        let output = self.executor.run(&self.i2cdump, &args).await?;
        let target = format!("range {}", range);

        if !output.success() {
            return Ok(Some(Mismatch::ReadFailed {
                target,
                status: output.status,
                stderr: output.stderr_text(),
            }));
        }

        let actual = match parse_dump(&output.stdout_text(), range, self.row_width) {
            Ok(bytes) => bytes,
            Err(e) => {
                return Ok(Some(Mismatch::ReadFailed {
                    target,
                    status: output.status,
                    stderr: e.to_string(),
                }))
            }
        };

        debug!(location = %location, range = %range, "[bsp-i2c] Dump read");
        Ok((actual != case.expected).then(|| Mismatch::Dump {
            range,
            expected: case.expected.clone(),
            actual,
        }))
    }

    async fn check_get(
        &self,
        case: &GetCase,
        location: &DeviceLocation,
    ) -> Result<Option<Mismatch>, I2cError> {
        let args = vec![
            "-y".to_string(),
            location.bus.to_string(),
            location.address.to_string(),
            case.reg.clone(),
        ];
        let output = self.executor.run(&self.i2cget, &args).await?;

        if !output.success() {
            return Ok(Some(Mismatch::ReadFailed {
                target: format!("register {}", case.reg),
                status: output.status,
                stderr: output.stderr_text(),
            }));
        }

        // Exact text: "0x05" and "0x5" differ.
        let actual = output.stdout_text().trim().to_string();
        debug!(location = %location, register = %case.reg, value = %actual, "[bsp-i2c] Register read");
        Ok((actual != case.expected).then(|| Mismatch::Get {
            register: case.reg.clone(),
            expected: case.expected.clone(),
            actual,
        }))
    }
}
