//! # Reload Cycle Supervisor
//!
//! Drives one adapter through `Unloaded -> Loaded -> Instantiated ->
//! DevicesBound -> Unloaded`: load the driver modules, instantiate the
//! adapter, detect and bind every device, unload the modules with the
//! devices still bound.
//!
//! A failed step aborts the cycle. Recovery then unbinds, tears down and
//! unloads on a best-effort basis; whatever is still held afterwards is
//! reported as a leak.

use std::sync::Arc;
use tracing::{error, info, warn};

use super::instantiator::TopologyInstantiator;
use super::prober::DeviceProber;
use super::registry::BusRegistry;
use crate::domain::{
    AdapterSpec, BusNumber, CycleState, CycleStep, DeviceLocation, FpgaSpec, I2cError,
    ReloadCycle,
};
use crate::ports::outbound::KernelModuleController;

/// Outcome of one reload cycle.
#[derive(Clone, Debug)]
pub struct CycleReport {
    /// FPGA name.
    pub fpga: String,
    /// Adapter label.
    pub adapter: String,
    /// State the cycle ended in.
    pub final_state: CycleState,
    /// Base bus of the instantiation, if it got that far.
    pub base: Option<BusNumber>,
    /// Device nodes bound before unload.
    pub bound: Vec<DeviceLocation>,
    /// The step failure, as `CycleAborted`.
    pub failure: Option<I2cError>,
    /// Resources still held at the end, as `LeakDetected`.
    pub leak: Option<I2cError>,
}

impl CycleReport {
    /// Every step succeeded and nothing leaked.
    pub fn passed(&self) -> bool {
        self.failure.is_none() && self.leak.is_none()
    }

    /// Failure and leak, in that order.
    pub fn into_errors(self) -> Vec<I2cError> {
        self.failure.into_iter().chain(self.leak).collect()
    }
}

/// Runs reload cycles.
pub struct ReloadCycleSupervisor {
    modules: Arc<dyn KernelModuleController>,
    instantiator: Arc<TopologyInstantiator>,
    prober: Arc<DeviceProber>,
    registry: BusRegistry,
}

impl ReloadCycleSupervisor {
    /// Create a supervisor over the given services.
    pub fn new(
        modules: Arc<dyn KernelModuleController>,
        instantiator: Arc<TopologyInstantiator>,
        prober: Arc<DeviceProber>,
        registry: BusRegistry,
    ) -> Self {
        Self {
            modules,
            instantiator,
            prober,
            registry,
        }
    }

    /// Run one cycle for `adapter`.
    pub async fn run_cycle(&self, fpga: &FpgaSpec, adapter: &AdapterSpec) -> CycleReport {
        let mut cycle = ReloadCycle::new(fpga, adapter);

        let failure = match self.drive(&mut cycle, fpga, adapter).await {
            Ok(()) => None,
            Err((step, cause)) => {
                error!(
                    fpga = %fpga.name,
                    adapter = %cycle.adapter,
                    step = %step,
                    error = %cause,
                    "[bsp-i2c] Reload cycle aborted"
                );
                self.recover(&mut cycle, fpga, adapter).await;
                Some(I2cError::CycleAborted {
                    fpga: cycle.fpga.clone(),
                    adapter: cycle.adapter.clone(),
                    step,
                    cause: Box::new(cause),
                })
            }
        };

        let leak = cycle.finish().err();
        if let Some(leak) = &leak {
            error!(error = %leak, "[bsp-i2c] Reload cycle leaked resources");
        } else if failure.is_none() {
            info!(
                fpga = %fpga.name,
                adapter = %cycle.adapter,
                devices = cycle.bound.len(),
                "[bsp-i2c] Reload cycle completed"
            );
        }

        CycleReport {
            fpga: cycle.fpga.clone(),
            adapter: cycle.adapter.clone(),
            final_state: cycle.state,
            base: cycle.allocated.as_ref().map(|a| a.base),
            bound: cycle.bound.clone(),
            failure,
            leak,
        }
    }

    async fn drive(
        &self,
        cycle: &mut ReloadCycle,
        fpga: &FpgaSpec,
        adapter: &AdapterSpec,
    ) -> Result<(), (CycleStep, I2cError)> {
        let at = |step: CycleStep| move |e: I2cError| (step, e);

        self.modules
            .load_all()
            .await
            .map_err(at(CycleStep::LoadModules))?;
        cycle
            .transition_to(CycleState::Loaded)
            .map_err(at(CycleStep::LoadModules))?;

        let allocated = self
            .instantiator
            .instantiate(fpga, adapter)
            .await
            .map_err(at(CycleStep::Instantiate))?;
        cycle.allocated = Some(allocated.clone());
        cycle
            .transition_to(CycleState::Instantiated)
            .map_err(at(CycleStep::Instantiate))?;

        for device in &adapter.i2c_devices {
            let location = allocated.locate(device).ok_or_else(|| {
                (
                    CycleStep::Detect,
                    I2cError::Infrastructure {
                        operation: format!("locating device {}", device.address),
                        reason: format!("channel {} has no bus", device.channel),
                    },
                )
            })?;

            let present = self
                .prober
                .detect(location.bus, location.address)
                .await
                .map_err(at(CycleStep::Detect))?;
            if !present {
                return Err((
                    CycleStep::Detect,
                    I2cError::PresenceFailure { location },
                ));
            }

            let created = self
                .prober
                .create_device_node(device, location.bus)
                .await
                .map_err(at(CycleStep::BindDevice))?;
            if !created {
                return Err((
                    CycleStep::BindDevice,
                    I2cError::DeviceNodeNotCreated { location },
                ));
            }
            cycle.bound.push(location);
        }
        cycle
            .transition_to(CycleState::DevicesBound)
            .map_err(at(CycleStep::BindDevice))?;

        self.modules
            .unload_all()
            .await
            .map_err(at(CycleStep::UnloadModules))?;
        self.confirm_released(cycle)
            .await
            .map_err(at(CycleStep::UnloadModules))?;
        cycle
            .transition_to(CycleState::Unloaded)
            .map_err(at(CycleStep::UnloadModules))
    }

    /// Unloading must take the adapter's buses with it.
    async fn confirm_released(&self, cycle: &mut ReloadCycle) -> Result<(), I2cError> {
        let Some(allocated) = &cycle.allocated else {
            return Ok(());
        };
        let remaining = self.registry.still_live(&allocated.bus_numbers()).await?;
        if !remaining.is_empty() {
            return Err(I2cError::LeakDetected {
                fpga: cycle.fpga.clone(),
                adapter: cycle.adapter.clone(),
                state: cycle.state,
                detail: format!("buses {:?} survived module unload", remaining),
            });
        }
        Ok(())
    }

    /// Best-effort return to `Unloaded`.
    async fn recover(&self, cycle: &mut ReloadCycle, fpga: &FpgaSpec, adapter: &AdapterSpec) {
        if cycle.state == CycleState::Unloaded {
            return;
        }

        let mut bound = std::mem::take(&mut cycle.bound);
        let mut still_bound = Vec::new();
        for location in bound.drain(..) {
            if let Err(e) = self
                .prober
                .remove_device_node(location.bus, location.address)
                .await
            {
                warn!(location = %location, error = %e, "[bsp-i2c] Could not remove device node");
                still_bound.push(location);
            }
        }
        cycle.bound = still_bound;

        if let Err(e) = self.instantiator.teardown(fpga, adapter).await {
            warn!(fpga = %fpga.name, adapter = %cycle.adapter, error = %e, "[bsp-i2c] Recovery teardown failed");
        }
        if let Err(e) = self.modules.unload_all().await {
            warn!(fpga = %fpga.name, adapter = %cycle.adapter, error = %e, "[bsp-i2c] Recovery unload failed");
            return;
        }

        let released = match &cycle.allocated {
            Some(allocated) => match self.registry.still_live(&allocated.bus_numbers()).await {
                Ok(remaining) => remaining.is_empty(),
                Err(e) => {
                    warn!(error = %e, "[bsp-i2c] Could not confirm buses released");
                    false
                }
            },
            None => true,
        };

        if released && cycle.bound.is_empty() {
            cycle.allocated = None;
            if let Err(e) = cycle.transition_to(CycleState::Unloaded) {
                warn!(error = %e, "[bsp-i2c] Recovery left cycle in an unexpected state");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::SimulatedI2cSubstrate;
    use crate::domain::{ErrorKind, PlatformSpec};
    use crate::test_utils::sample_platform;

    fn supervisor(sim: &Arc<SimulatedI2cSubstrate>) -> ReloadCycleSupervisor {
        let registry = BusRegistry::new(sim.clone());
        let instantiator = Arc::new(TopologyInstantiator::new(registry.clone(), sim.clone()));
        let prober = Arc::new(DeviceProber::new(sim.clone(), sim.clone(), "i2cdetect", 16));
        ReloadCycleSupervisor::new(sim.clone(), instantiator, prober, registry)
    }

    fn setup() -> (Arc<SimulatedI2cSubstrate>, PlatformSpec) {
        let platform = sample_platform();
        let sim = Arc::new(SimulatedI2cSubstrate::from_platform(&platform));
        (sim, platform)
    }

    #[tokio::test]
    async fn test_clean_cycle_ends_unloaded() {
        let (sim, platform) = setup();
        let iob = &platform.fpgas[0];

        let report = supervisor(&sim).run_cycle(iob, &iob.i2c_adapters[0]).await;
        assert!(report.passed(), "{:?}", report);
        assert_eq!(report.final_state, CycleState::Unloaded);
        assert!(!sim.modules_loaded());
        assert_eq!(sim.live_bus_count(), 0);
    }

    #[tokio::test]
    async fn test_cycles_repeat_without_drift() {
        let (sim, platform) = setup();
        let iob = &platform.fpgas[0];
        let supervisor = supervisor(&sim);

        for adapter in iob.i2c_adapters.iter().rev().chain(iob.i2c_adapters.iter()) {
            let report = supervisor.run_cycle(iob, adapter).await;
            assert!(report.passed(), "{:?}", report);
        }
        assert_eq!(sim.live_bus_count(), 0);
    }

    #[tokio::test]
    async fn test_missing_device_aborts_at_detect_and_recovers() {
        let (sim, platform) = setup();
        let iob = &platform.fpgas[0];
        let device = &iob.i2c_adapters[0].i2c_devices[1];
        sim.remove_device("iob", "i2c_master.1", device.channel, device.address);

        let report = supervisor(&sim).run_cycle(iob, &iob.i2c_adapters[0]).await;
        assert!(matches!(
            report.failure,
            Some(I2cError::CycleAborted { step: CycleStep::Detect, .. })
        ));
        assert_eq!(report.failure.as_ref().map(I2cError::kind), Some(ErrorKind::Presence));
        assert!(report.leak.is_none());
        assert_eq!(report.final_state, CycleState::Unloaded);
        assert!(sim.bound_nodes().is_empty());
        assert_eq!(sim.live_bus_count(), 0);
    }

    #[tokio::test]
    async fn test_buses_surviving_unload_are_a_leak() {
        let (sim, platform) = setup();
        let iob = &platform.fpgas[0];
        sim.leak_on_unload(true);

        let report = supervisor(&sim).run_cycle(iob, &iob.i2c_adapters[0]).await;
        assert!(matches!(
            report.failure,
            Some(I2cError::CycleAborted { step: CycleStep::UnloadModules, .. })
        ));
        assert!(matches!(
            report.leak,
            Some(I2cError::LeakDetected { state: CycleState::DevicesBound, .. })
        ));
        assert_eq!(report.into_errors().len(), 2);
    }

    #[tokio::test]
    async fn test_stuck_unload_is_a_leak() {
        let (sim, platform) = setup();
        let iob = &platform.fpgas[0];
        sim.fail_unload(true);

        let report = supervisor(&sim).run_cycle(iob, &iob.i2c_adapters[1]).await;
        assert!(!report.passed());
        assert!(report.leak.is_some());
        assert_ne!(report.final_state, CycleState::Unloaded);
    }

    #[tokio::test]
    async fn test_topology_mismatch_aborts_at_instantiate() {
        let (sim, platform) = setup();
        let iob = &platform.fpgas[0];
        sim.short_channels("iob", "i2c_master.1", 1);

        let report = supervisor(&sim).run_cycle(iob, &iob.i2c_adapters[0]).await;
        assert!(matches!(
            report.failure,
            Some(I2cError::CycleAborted { step: CycleStep::Instantiate, .. })
        ));
        assert!(report.leak.is_none());
    }
}
