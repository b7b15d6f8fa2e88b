//! Shared fixtures for unit tests.

use crate::domain::PlatformSpec;

/// Two FPGAs: `iob` with a two-channel and a one-channel adapter, `dom` with
/// a single one-channel adapter.
pub(crate) const PLATFORM_JSON: &str = r#"{
    "platform": "montblanc",
    "kmods": ["fbiob_pci", "fbiob_i2c"],
    "fpgas": [
        {
            "name": "iob",
            "vendorId": "0x1d9b",
            "deviceId": "0x0011",
            "subSystemVendorId": "0x10ee",
            "subSystemDeviceId": "0x0007",
            "i2cAdapters": [
                {
                    "auxDevice": {"name": "i2c_master", "id": 1, "csrOffset": "0x4000"},
                    "channels": [{"index": 0}, {"index": 1}],
                    "i2cDevices": [
                        {"address": "0x50", "channel": 0, "deviceName": "24c64",
                         "testData": {
                            "i2cDumpData": [{"start": "0x00", "end": "0x03",
                                             "expected": ["0x12", "0x34", "0x56", "0x78"]}],
                            "i2cGetData": [{"reg": "0x10", "expected": "0x42"}]
                         }},
                        {"address": "0x48", "channel": 1, "deviceName": "lm75"}
                    ]
                },
                {
                    "auxDevice": {"name": "i2c_master", "id": 2},
                    "channels": [{"index": 0}],
                    "i2cDevices": [
                        {"address": "0x51", "channel": 0, "deviceName": "24c02"}
                    ]
                }
            ]
        },
        {
            "name": "dom",
            "vendorId": "0x1d9b",
            "deviceId": "0x0012",
            "subSystemVendorId": "0x10ee",
            "subSystemDeviceId": "0x0008",
            "i2cAdapters": [
                {
                    "auxDevice": {"name": "i2c_master", "id": 1},
                    "channels": [{"index": 0}],
                    "i2cDevices": [
                        {"address": "0x50", "channel": 0, "deviceName": "24c64",
                         "testData": {
                            "i2cDumpData": [{"start": 14, "end": 17, "expected": [1, 2, 3, 4]}],
                            "i2cGetData": [{"reg": "0x00", "expected": "0xa5"}]
                         }}
                    ]
                }
            ]
        }
    ]
}"#;

pub(crate) fn sample_platform() -> PlatformSpec {
    PlatformSpec::from_json_str(PLATFORM_JSON).expect("fixture platform is valid")
}
