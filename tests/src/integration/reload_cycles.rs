//! # Reload Cycles
//!
//! Driver unload with device nodes bound, repeated and under fault.

use bsp_i2c::{CycleState, CycleStep, ErrorKind, I2cBringupApi, I2cError};

use super::fixtures::{generated_platform, Harness};

#[tokio::test]
async fn test_repeated_cycles_leave_nothing_behind() {
    let harness = Harness::new(generated_platform(1, 2, 3));
    let supervisor = harness.supervisor();
    let fpga = &harness.platform.fpgas[0];

    for round in 0..5 {
        for adapter in fpga.i2c_adapters.iter().rev() {
            let report = supervisor.run_cycle(fpga, adapter).await;
            assert!(report.passed(), "round {}: {:?}", round, report);
            assert_eq!(report.final_state, CycleState::Unloaded);
            assert_eq!(report.bound.len(), 3);
            assert_eq!(report.base, Some(0));
        }
    }
    assert_eq!(harness.sim.live_bus_count(), 0);
    assert!(harness.sim.bound_nodes().is_empty());
    assert!(!harness.sim.modules_loaded());
}

#[tokio::test]
async fn test_cycle_with_foreign_buses_binds_at_offset() {
    let harness = Harness::new(generated_platform(1, 1, 2));
    harness.sim.add_foreign_bus();
    harness.sim.add_foreign_bus();
    let supervisor = harness.supervisor();
    let fpga = &harness.platform.fpgas[0];

    let report = supervisor.run_cycle(fpga, &fpga.i2c_adapters[0]).await;
    assert!(report.passed(), "{:?}", report);
    let buses: Vec<_> = report.bound.iter().map(|l| l.bus).collect();
    assert_eq!(buses, vec![2, 3]);
    // Foreign buses are not the cycle's to release.
    assert_eq!(harness.sim.live_bus_count(), 2);
}

#[tokio::test]
async fn test_surviving_buses_are_reported_as_leak() {
    let harness = Harness::new(generated_platform(1, 1, 2));
    harness.sim.leak_on_unload(true);
    let supervisor = harness.supervisor();
    let fpga = &harness.platform.fpgas[0];

    let report = supervisor.run_cycle(fpga, &fpga.i2c_adapters[0]).await;
    assert!(!report.passed());
    assert!(matches!(
        report.failure,
        Some(I2cError::CycleAborted {
            step: CycleStep::UnloadModules,
            ..
        })
    ));
    match &report.leak {
        Some(I2cError::LeakDetected { fpga, adapter, .. }) => {
            assert_eq!(fpga, "fpga0");
            assert_eq!(adapter, "i2c_master.1");
        }
        other => panic!("expected a leak, got {:?}", other),
    }
    assert_eq!(harness.sim.live_bus_count(), 2);
}

#[tokio::test]
async fn test_stuck_unload_is_recorded_by_suite_check() {
    let harness = Harness::new(generated_platform(2, 2, 1));
    harness.sim.fail_unload(true);

    let report = harness
        .suite
        .run_check(
            &harness.platform,
            bsp_i2c::CheckKind::BusWithDevicesUnloads,
        )
        .await;

    // A stuck unload is infrastructure: the first failing cycle ends the check.
    assert!(!report.passed());
    assert!(report
        .aborted
        .iter()
        .chain(&report.findings)
        .any(|e| e.kind() == ErrorKind::Infrastructure));
    assert!(report
        .aborted
        .iter()
        .chain(&report.findings)
        .all(|e| e.to_string().contains("fpga0")));
}

#[tokio::test]
async fn test_missing_device_aborts_cycle_and_recovers() {
    let harness = Harness::new(generated_platform(1, 1, 3));
    let eeprom = bsp_i2c::I2cAddress::new(0x50).unwrap();
    harness.sim.remove_device("fpga0", "i2c_master.1", 2, eeprom);
    let supervisor = harness.supervisor();
    let fpga = &harness.platform.fpgas[0];

    let report = supervisor.run_cycle(fpga, &fpga.i2c_adapters[0]).await;

    let failure = report.failure.as_ref().unwrap();
    assert_eq!(failure.kind(), ErrorKind::Presence);
    assert!(failure.to_string().contains("aborted at detect"));
    assert!(report.leak.is_none());
    assert_eq!(report.final_state, CycleState::Unloaded);
    assert!(harness.sim.bound_nodes().is_empty());
    assert_eq!(harness.sim.live_bus_count(), 0);
}
