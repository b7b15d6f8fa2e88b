//! # Topology Races
//!
//! Concurrent instantiation through one snapshot window, and the ways
//! other bus activity can corrupt a base-number inference.

use std::collections::BTreeSet;
use std::sync::Arc;

use bsp_i2c::{AllocatedAdapter, BusNumber, DestroyOutcome, ErrorKind, I2cError};
use rand::seq::SliceRandom;

use super::fixtures::{generated_platform, Harness};

#[tokio::test]
async fn test_concurrent_instantiations_get_disjoint_buses() {
    let harness = Harness::new(generated_platform(2, 3, 4));
    harness.load_modules().await;
    let instantiator = harness.suite.instantiator();

    let mut targets: Vec<(usize, usize)> = (0..2)
        .flat_map(|f| (0..3).map(move |a| (f, a)))
        .collect();
    targets.shuffle(&mut rand::thread_rng());

    let platform = Arc::new(harness.platform.clone());
    let mut handles = Vec::new();
    for (f, a) in targets {
        let instantiator = instantiator.clone();
        let platform = platform.clone();
        handles.push(tokio::spawn(async move {
            let fpga = &platform.fpgas[f];
            instantiator.instantiate(fpga, &fpga.i2c_adapters[a]).await
        }));
    }

    let mut allocations: Vec<AllocatedAdapter> = Vec::new();
    for handle in handles {
        allocations.push(handle.await.unwrap().unwrap());
    }

    let mut seen: BTreeSet<BusNumber> = BTreeSet::new();
    for allocated in &allocations {
        let buses = allocated.bus_numbers();
        assert_eq!(buses.len(), 4);
        assert_eq!(
            buses,
            (allocated.base..allocated.base + 4).collect::<Vec<_>>()
        );
        for bus in buses {
            assert!(seen.insert(bus), "bus {} handed out twice", bus);
        }
        let actual = harness.sim.adapter_buses(&allocated.fpga, &allocated.adapter);
        assert_eq!(actual, allocated.bus_numbers());
    }
    assert_eq!(seen.len(), 24);
}

#[tokio::test]
async fn test_foreign_bus_inside_window_is_rejected() {
    let harness = Harness::new(generated_platform(1, 2, 2));
    harness.load_modules().await;
    harness.sim.foreign_bus_during_create("fpga0", "i2c_master.2");
    let instantiator = harness.suite.instantiator();
    let fpga = &harness.platform.fpgas[0];

    let first = instantiator
        .instantiate(fpga, &fpga.i2c_adapters[0])
        .await
        .unwrap();
    let err = instantiator
        .instantiate(fpga, &fpga.i2c_adapters[1])
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Topology);
    match &err {
        I2cError::TopologyMismatch {
            expected, observed, ..
        } => {
            assert_eq!(*expected, 2);
            assert_eq!(observed, &vec![2, 3, 4]);
        }
        other => panic!("unexpected error {:?}", other),
    }
    // The failed adapter was discarded; the foreign bus and the first adapter remain.
    assert!(harness.sim.adapter_buses("fpga0", "i2c_master.2").is_empty());
    assert_eq!(harness.sim.live_bus_count(), first.buses.len() + 1);
}

#[tokio::test]
async fn test_fragmented_bus_space_is_a_mismatch() {
    let harness = Harness::new(generated_platform(1, 1, 3));
    harness.load_modules().await;
    // Leave a one-bus hole at 1 so three new buses land on 1, 3, 4.
    let hole = {
        harness.sim.add_foreign_bus();
        let hole = harness.sim.add_foreign_bus();
        harness.sim.add_foreign_bus();
        hole
    };
    harness.sim.remove_bus(hole);

    let instantiator = harness.suite.instantiator();
    let fpga = &harness.platform.fpgas[0];
    let err = instantiator
        .instantiate(fpga, &fpga.i2c_adapters[0])
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Topology);
    assert_eq!(harness.sim.live_bus_count(), 2);
}

#[tokio::test]
async fn test_bus_numbers_are_reused_after_teardown() {
    let harness = Harness::new(generated_platform(1, 2, 2));
    harness.load_modules().await;
    let instantiator = harness.suite.instantiator();
    let fpga = &harness.platform.fpgas[0];
    let (first, second) = (&fpga.i2c_adapters[0], &fpga.i2c_adapters[1]);

    let a = instantiator.instantiate(fpga, first).await.unwrap();
    let b = instantiator.instantiate(fpga, second).await.unwrap();
    assert_eq!((a.base, b.base), (0, 2));

    assert_eq!(
        instantiator.teardown(fpga, first).await.unwrap(),
        DestroyOutcome::Destroyed
    );
    assert_eq!(
        instantiator.teardown(fpga, first).await.unwrap(),
        DestroyOutcome::AlreadyAbsent
    );

    let again = instantiator.instantiate(fpga, first).await.unwrap();
    assert_eq!(again.base, 0);
    assert_eq!(again.buses[1].name, "i2c_master.1:ch1");
}

#[tokio::test]
async fn test_scoped_acquisition_cleans_up_on_error() {
    let harness = Harness::new(generated_platform(1, 1, 2));
    harness.load_modules().await;
    let instantiator = harness.suite.instantiator();
    let fpga = &harness.platform.fpgas[0];

    let result: Result<(), I2cError> = instantiator
        .with_adapter(fpga, &fpga.i2c_adapters[0], |allocated| async move {
            Err(I2cError::OutputParse(format!(
                "synthetic failure on {}",
                allocated.adapter
            )))
        })
        .await;

    assert!(matches!(result, Err(I2cError::OutputParse(_))));
    assert_eq!(harness.sim.live_bus_count(), 0);
}
