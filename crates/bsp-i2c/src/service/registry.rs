//! # Bus Registry
//!
//! Snapshot-diff view over the live bus set. The registry never owns the set;
//! it observes it through a [`LiveBusSource`].

use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::trace;

use crate::algorithms::bus_diff;
use crate::domain::{BusNumber, I2cError};
use crate::ports::outbound::LiveBusSource;

/// Observes bus numbers before and after topology changes.
#[derive(Clone)]
pub struct BusRegistry {
    source: Arc<dyn LiveBusSource>,
}

impl BusRegistry {
    /// Observe buses through `source`.
    pub fn new(source: Arc<dyn LiveBusSource>) -> Self {
        Self { source }
    }

    /// Current live bus numbers.
    pub async fn snapshot(&self) -> Result<BTreeSet<BusNumber>, I2cError> {
        let buses = self.source.live_buses().await?;
        trace!(buses = ?buses, "[bsp-i2c] Bus snapshot");
        Ok(buses)
    }

    /// Buses present in `after` but not `before`, ascending.
    pub fn diff(before: &BTreeSet<BusNumber>, after: &BTreeSet<BusNumber>) -> Vec<BusNumber> {
        bus_diff::diff(before, after)
    }

    /// Lowest newly appeared bus number.
    pub fn base_of(new_buses: &[BusNumber]) -> Option<BusNumber> {
        bus_diff::base_of(new_buses)
    }

    /// Which of `buses` are still live.
    pub async fn still_live(&self, buses: &[BusNumber]) -> Result<Vec<BusNumber>, I2cError> {
        let live = self.snapshot().await?;
        Ok(buses.iter().copied().filter(|bus| live.contains(bus)).collect())
    }
}
