//! Generated platforms and a harness wired to the simulated substrate.

use std::sync::Arc;

use bsp_i2c::{
    BringupConfig, BusRegistry, DeviceProber, I2cBringupSuite, KernelModuleController,
    OutboundPorts, PlatformSpec, ReloadCycleSupervisor, SimulatedI2cSubstrate,
};

/// Golden bytes at 0x00-0x03 of the device on `(fpga, adapter, channel)`.
pub fn golden_bytes(fpga: usize, adapter: usize, channel: usize) -> [u8; 4] {
    [0xb0 | fpga as u8, 0xa0 | adapter as u8, 0xc0 | channel as u8, 0x5a]
}

/// A platform of `fpgas` controllers, each with `adapters` adapters of
/// `channels` channels. Every channel carries one `24c64` at 0x50 with a
/// dump case and a get case.
pub fn generated_platform(fpgas: usize, adapters: usize, channels: usize) -> PlatformSpec {
    let fpga_json: Vec<String> = (0..fpgas)
        .map(|f| {
            let adapter_json: Vec<String> = (0..adapters)
                .map(|a| {
                    let channel_json: Vec<String> =
                        (0..channels).map(|c| format!(r#"{{"index": {}}}"#, c)).collect();
                    let device_json: Vec<String> = (0..channels)
                        .map(|c| {
                            let bytes = golden_bytes(f, a, c);
                            format!(
                                r#"{{"address": "0x50", "channel": {c}, "deviceName": "24c64",
                                    "testData": {{
                                        "i2cDumpData": [{{"start": "0x00", "end": "0x03",
                                                          "expected": [{b0}, {b1}, {b2}, {b3}]}}],
                                        "i2cGetData": [{{"reg": "0x03", "expected": "0x5a"}}]
                                    }}}}"#,
                                c = c,
                                b0 = bytes[0],
                                b1 = bytes[1],
                                b2 = bytes[2],
                                b3 = bytes[3],
                            )
                        })
                        .collect();
                    format!(
                        r#"{{"auxDevice": {{"name": "i2c_master", "id": {}}},
                             "channels": [{}],
                             "i2cDevices": [{}]}}"#,
                        a + 1,
                        channel_json.join(", "),
                        device_json.join(", ")
                    )
                })
                .collect();
            format!(
                r#"{{"name": "fpga{f}",
                     "vendorId": "0x1d9b", "deviceId": "0x00{f:02x}",
                     "subSystemVendorId": "0x10ee", "subSystemDeviceId": "0x0007",
                     "i2cAdapters": [{adapters}]}}"#,
                f = f,
                adapters = adapter_json.join(", ")
            )
        })
        .collect();

    let json = format!(
        r#"{{"platform": "generated", "kmods": ["fbiob_pci", "fbiob_i2c"], "fpgas": [{}]}}"#,
        fpga_json.join(", ")
    );
    PlatformSpec::from_json_str(&json).expect("generated platform is valid")
}

/// Engine wired to one simulated substrate.
pub struct Harness {
    /// Fault injection and inspection.
    pub sim: Arc<SimulatedI2cSubstrate>,
    /// Ports the suite was built over.
    pub ports: OutboundPorts,
    /// The suite under test.
    pub suite: I2cBringupSuite,
    /// Platform the substrate models.
    pub platform: PlatformSpec,
    /// Engine configuration.
    pub config: BringupConfig,
}

impl Harness {
    /// Harness over `platform` with every declared device present.
    pub fn new(platform: PlatformSpec) -> Self {
        let sim = Arc::new(SimulatedI2cSubstrate::from_platform(&platform));
        let ports = OutboundPorts::simulated(sim.clone());
        let config = BringupConfig::for_testing();
        let suite = I2cBringupSuite::new(&config, ports.clone());
        Self {
            sim,
            ports,
            suite,
            platform,
            config,
        }
    }

    /// Load the driver modules, as every check does first.
    pub async fn load_modules(&self) {
        self.ports
            .modules
            .load_all()
            .await
            .expect("simulated modules load");
    }

    /// Supervisor sharing the suite's snapshot window.
    pub fn supervisor(&self) -> ReloadCycleSupervisor {
        let prober = Arc::new(DeviceProber::new(
            self.ports.executor.clone(),
            self.ports.binder.clone(),
            &self.config.tools.i2cdetect,
            self.config.dump_row_width,
        ));
        ReloadCycleSupervisor::new(
            self.ports.modules.clone(),
            self.suite.instantiator(),
            prober,
            BusRegistry::new(self.ports.buses.clone()),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_platform_shape() {
        let platform = generated_platform(2, 3, 4);
        assert_eq!(platform.fpgas.len(), 2);
        assert_eq!(platform.fpgas[1].name, "fpga1");
        assert_eq!(platform.fpgas[0].i2c_adapters.len(), 3);
        assert_eq!(platform.fpgas[0].i2c_adapters[2].label(), "i2c_master.3");
        assert_eq!(platform.fpgas[0].i2c_adapters[0].channel_count(), 4);
        assert!(platform.fpgas[0].i2c_adapters[0].has_test_data());
    }
}
