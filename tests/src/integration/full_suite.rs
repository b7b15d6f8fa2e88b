//! # Full Suite Runs
//!
//! Whole bring-up runs over generated platforms, with and without faults.

use bsp_i2c::{CheckKind, ErrorKind, I2cAddress, I2cBringupApi, I2cError};

use super::fixtures::{generated_platform, Harness};

fn eeprom() -> I2cAddress {
    I2cAddress::new(0x50).unwrap()
}

#[tokio::test]
async fn test_healthy_platform_passes() {
    let harness = Harness::new(generated_platform(2, 2, 3));

    let report = harness.suite.run_all(&harness.platform).await;
    assert!(report.passed(), "{}", report.to_json().unwrap());
    assert_eq!(report.failure_count(), 0);
    assert_eq!(harness.sim.live_bus_count(), 0);
    assert!(harness.sim.bound_nodes().is_empty());
}

#[tokio::test]
async fn test_foreign_buses_shift_base_without_failures() {
    let harness = Harness::new(generated_platform(1, 2, 2));
    for _ in 0..5 {
        harness.sim.add_foreign_bus();
    }

    let report = harness.suite.run_all(&harness.platform).await;
    assert!(report.passed(), "{}", report.to_json().unwrap());
    assert_eq!(harness.sim.live_bus_count(), 5);
}

#[tokio::test]
async fn test_fault_on_one_fpga_does_not_hide_the_other() {
    let harness = Harness::new(generated_platform(2, 2, 2));
    harness.sim.fail_create("fpga0", "i2c_master.1");
    harness
        .sim
        .remove_device("fpga1", "i2c_master.2", 1, eeprom());

    let report = harness
        .suite
        .run_check(&harness.platform, CheckKind::AdapterDevicesPresent)
        .await;

    // fpga0 aborts at its first adapter; fpga1 still reports its finding.
    assert_eq!(report.aborted.len(), 1);
    assert_eq!(report.aborted[0].kind(), ErrorKind::Infrastructure);
    assert_eq!(report.findings.len(), 1);
    match &report.findings[0] {
        I2cError::PresenceFailure { location } => {
            assert_eq!(location.fpga, "fpga1");
            assert_eq!(location.adapter, "i2c_master.2");
            assert_eq!(location.channel, 1);
        }
        other => panic!("unexpected finding {:?}", other),
    }
    assert_eq!(harness.sim.live_bus_count(), 0);
}

#[tokio::test]
async fn test_every_mismatch_is_collected() {
    let harness = Harness::new(generated_platform(1, 2, 2));
    harness
        .sim
        .set_register("fpga0", "i2c_master.1", 0, eeprom(), 0x01, 0x00);
    harness
        .sim
        .set_register("fpga0", "i2c_master.2", 1, eeprom(), 0x03, 0x00);
    harness
        .sim
        .set_get_response("fpga0", "i2c_master.2", 0, eeprom(), "0x03", "0x5b");

    let report = harness
        .suite
        .run_check(&harness.platform, CheckKind::Transactions)
        .await;

    assert!(report.aborted.is_empty());
    // Scripted get responses take precedence over the register file.
    assert_eq!(report.findings.len(), 3, "{:?}", report.findings);
    assert!(report
        .findings
        .iter()
        .all(|f| f.kind() == ErrorKind::Verification));
}

#[tokio::test]
async fn test_vanished_device_fails_presence_and_transactions() {
    let harness = Harness::new(generated_platform(1, 1, 2));
    harness
        .sim
        .remove_device("fpga0", "i2c_master.1", 0, eeprom());

    let report = harness.suite.run_all(&harness.platform).await;
    assert!(!report.passed());

    let presence = report.check(CheckKind::AdapterDevicesPresent).unwrap();
    assert_eq!(presence.findings.len(), 1);

    let transactions = report.check(CheckKind::Transactions).unwrap();
    assert!(transactions.aborted.is_empty());
    assert_eq!(transactions.findings.len(), 2);
    assert!(transactions.findings[0].to_string().contains("failed with status"));
}

#[tokio::test]
async fn test_report_json_lists_findings() {
    let harness = Harness::new(generated_platform(1, 1, 1));
    harness.sim.mark_unavailable("fpga0");

    let report = harness
        .suite
        .run_checks(&harness.platform, &[CheckKind::ControllerPresent])
        .await;
    let json: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();

    assert_eq!(json["passed"], false);
    assert_eq!(json["checks"][0]["check"], "controller-present");
    assert_eq!(json["checks"][0]["aborted"][0]["kind"], "Infrastructure");
}
