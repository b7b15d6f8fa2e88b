//! # Bring-up Suite
//!
//! Implements `I2cBringupApi`: the five bring-up checks over a platform.

use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::instantiator::TopologyInstantiator;
use super::prober::DeviceProber;
use super::registry::BusRegistry;
use super::supervisor::ReloadCycleSupervisor;
use super::verifier::TransactionVerifier;
use crate::adapters::OutboundPorts;
use crate::domain::{
    AllocatedAdapter, BringupConfig, CheckKind, CheckReport, DeviceLocation, DeviceSpec, I2cError,
    PlatformSpec, SuiteReport,
};
use crate::ports::inbound::I2cBringupApi;

/// The I2C bring-up suite.
pub struct I2cBringupSuite {
    ports: OutboundPorts,
    instantiator: Arc<TopologyInstantiator>,
    prober: Arc<DeviceProber>,
    verifier: TransactionVerifier,
    supervisor: ReloadCycleSupervisor,
}

impl I2cBringupSuite {
    /// Build the services over `ports`.
    pub fn new(config: &BringupConfig, ports: OutboundPorts) -> Self {
        let registry = BusRegistry::new(ports.buses.clone());
        let instantiator = Arc::new(TopologyInstantiator::new(
            registry.clone(),
            ports.controller.clone(),
        ));
        let prober = Arc::new(DeviceProber::new(
            ports.executor.clone(),
            ports.binder.clone(),
            &config.tools.i2cdetect,
            config.dump_row_width,
        ));
        let verifier = TransactionVerifier::new(
            ports.executor.clone(),
            &config.tools.i2cdump,
            &config.tools.i2cget,
            config.dump_row_width,
        );
        let supervisor = ReloadCycleSupervisor::new(
            ports.modules.clone(),
            instantiator.clone(),
            prober.clone(),
            registry,
        );

        Self {
            ports,
            instantiator,
            prober,
            verifier,
            supervisor,
        }
    }

    /// Shared instantiator, for callers that need the snapshot window.
    pub fn instantiator(&self) -> Arc<TopologyInstantiator> {
        self.instantiator.clone()
    }

    /// Run `checks` in order as one report.
    pub async fn run_checks(&self, platform: &PlatformSpec, checks: &[CheckKind]) -> SuiteReport {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        info!(run_id = %run_id, platform = %platform.platform, "[bsp-i2c] Bring-up run started");

        let mut reports = Vec::with_capacity(checks.len());
        for check in checks {
            reports.push(self.run_check(platform, *check).await);
        }

        let report = SuiteReport {
            run_id,
            platform: platform.platform.clone(),
            started_at,
            finished_at: Utc::now(),
            checks: reports,
        };
        info!(
            run_id = %run_id,
            passed = report.passed(),
            failures = report.failure_count(),
            "[bsp-i2c] Bring-up run finished"
        );
        report
    }

    async fn check_controller_present(&self, platform: &PlatformSpec, report: &mut CheckReport) {
        for fpga in &platform.fpgas {
            match self.ports.controller.is_available(fpga).await {
                Ok(true) => debug!(fpga = %fpga.name, "[bsp-i2c] Controller present"),
                Ok(false) => report.record(I2cError::Infrastructure {
                    operation: format!("probing controller of fpga {}", fpga.name),
                    reason: "controller endpoint not found".to_string(),
                }),
                Err(e) => report.record(e),
            }
        }
    }

    async fn check_adapter_creates_buses(&self, platform: &PlatformSpec, report: &mut CheckReport) {
        for fpga in &platform.fpgas {
            for adapter in &fpga.i2c_adapters {
                let result = self
                    .instantiator
                    .with_adapter(fpga, adapter, |allocated| async move {
                        debug!(
                            adapter = %allocated.adapter,
                            buses = ?allocated.bus_numbers(),
                            "[bsp-i2c] Adapter buses created"
                        );
                        Ok::<_, I2cError>(Vec::new())
                    })
                    .await;
                if !absorb(report, result) {
                    break;
                }
            }
        }
    }

    async fn check_adapter_devices_present(
        &self,
        platform: &PlatformSpec,
        report: &mut CheckReport,
    ) {
        let prober = &self.prober;
        for fpga in &platform.fpgas {
            for adapter in &fpga.i2c_adapters {
                let result = self
                    .instantiator
                    .with_adapter(fpga, adapter, |allocated| async move {
                        let mut findings = Vec::new();
                        for device in &adapter.i2c_devices {
                            let location = locate(&allocated, device)?;
                            let present = prober
                                .detect(location.bus, location.address)
                                .await
                                .map_err(|e| I2cError::at_device(&location, e))?;
                            if !present {
                                warn!(location = %location, "[bsp-i2c] Device not detected");
                                findings.push(I2cError::PresenceFailure { location });
                            }
                        }
                        Ok::<_, I2cError>(findings)
                    })
                    .await;
                if !absorb(report, result) {
                    break;
                }
            }
        }
    }

    async fn check_bus_with_devices_unloads(
        &self,
        platform: &PlatformSpec,
        report: &mut CheckReport,
    ) {
        let Some(fpga) = platform.fpgas.first() else {
            return;
        };
        for adapter in fpga.i2c_adapters.iter().rev() {
            let cycle = self.supervisor.run_cycle(fpga, adapter).await;
            let fatal = cycle
                .failure
                .as_ref()
                .is_some_and(|e| e.kind().is_fatal());
            for err in cycle.into_errors() {
                report.record(err);
            }
            if fatal {
                break;
            }
        }
    }

    async fn check_transactions(&self, platform: &PlatformSpec, report: &mut CheckReport) {
        let verifier = &self.verifier;
        for fpga in &platform.fpgas {
            for adapter in fpga.i2c_adapters.iter().filter(|a| a.has_test_data()) {
                let result = self
                    .instantiator
                    .with_adapter(fpga, adapter, |allocated| async move {
                        let mut findings = Vec::new();
                        for device in adapter.i2c_devices.iter().filter(|d| d.has_test_data()) {
                            let location = locate(&allocated, device)?;
                            let device_findings = verifier
                                .run_all(device, &location)
                                .await
                                .map_err(|e| I2cError::at_device(&location, e))?;
                            findings.extend(device_findings);
                        }
                        Ok::<_, I2cError>(findings)
                    })
                    .await;
                if !absorb(report, result) {
                    break;
                }
            }
        }
    }
}

fn locate(allocated: &AllocatedAdapter, device: &DeviceSpec) -> Result<DeviceLocation, I2cError> {
    allocated
        .locate(device)
        .ok_or_else(|| I2cError::Infrastructure {
            operation: format!("locating device {} on {}", device.address, allocated.adapter),
            reason: format!("channel {} has no bus", device.channel),
        })
}

/// Record one adapter's outcome; `false` when the rest of the FPGA must be skipped.
fn absorb(report: &mut CheckReport, result: Result<Vec<I2cError>, I2cError>) -> bool {
    match result {
        Ok(findings) => {
            for finding in findings {
                report.record(finding);
            }
            true
        }
        Err(e) => {
            let fatal = e.kind().is_fatal();
            if fatal {
                warn!(error = %e, "[bsp-i2c] Skipping remaining adapters of this fpga");
            }
            report.record(e);
            !fatal
        }
    }
}

#[async_trait]
impl I2cBringupApi for I2cBringupSuite {
    async fn run_all(&self, platform: &PlatformSpec) -> SuiteReport {
        self.run_checks(platform, &CheckKind::ALL).await
    }

    async fn run_check(&self, platform: &PlatformSpec, check: CheckKind) -> CheckReport {
        info!(check = %check, platform = %platform.platform, "[bsp-i2c] Running check");
        let mut report = CheckReport::new(check);

        if let Err(e) = platform.validate() {
            warn!(check = %check, error = %e, "[bsp-i2c] Platform rejected");
            report.record(e);
            return report;
        }
        if let Err(e) = self.ports.modules.load_all().await {
            report.record(e);
            return report;
        }

        match check {
            CheckKind::ControllerPresent => {
                self.check_controller_present(platform, &mut report).await
            }
            CheckKind::AdapterCreatesBuses => {
                self.check_adapter_creates_buses(platform, &mut report).await
            }
            CheckKind::AdapterDevicesPresent => {
                self.check_adapter_devices_present(platform, &mut report).await
            }
            CheckKind::BusWithDevicesUnloads => {
                self.check_bus_with_devices_unloads(platform, &mut report).await
            }
            CheckKind::Transactions => self.check_transactions(platform, &mut report).await,
        }

        if report.passed() {
            info!(check = %check, "[bsp-i2c] Check passed");
        } else {
            warn!(
                check = %check,
                findings = report.findings.len(),
                aborted = report.aborted.len(),
                "[bsp-i2c] Check failed"
            );
        }
        report
    }
}
