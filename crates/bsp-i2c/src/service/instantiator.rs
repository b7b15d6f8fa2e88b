//! # Topology Instantiator
//!
//! Creates an adapter through the resource controller and works out which
//! buses it produced; tears it down again.
//!
//! The snapshot-create-snapshot sequence is a critical section: any other
//! create or destroy inside it would land in the diff. Every instantiator
//! sharing a window lock is serialized against the others.

use std::collections::BTreeSet;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::registry::BusRegistry;
use crate::domain::{
    invariant_contiguous_buses, invariant_distinct_bus_names, invariant_new_bus_count,
    AdapterSpec, AllocatedAdapter, BusEntry, BusNumber, FpgaSpec, I2cError,
};
use crate::ports::outbound::{DestroyOutcome, ResourceController};

/// Instantiates and tears down adapters.
pub struct TopologyInstantiator {
    registry: BusRegistry,
    controller: Arc<dyn ResourceController>,
    window: Arc<Mutex<()>>,
}

impl TopologyInstantiator {
    /// Create an instantiator with its own window lock.
    pub fn new(registry: BusRegistry, controller: Arc<dyn ResourceController>) -> Self {
        Self::with_window(registry, controller, Arc::new(Mutex::new(())))
    }

    /// Create an instantiator serialized with every other holder of `window`.
    pub fn with_window(
        registry: BusRegistry,
        controller: Arc<dyn ResourceController>,
        window: Arc<Mutex<()>>,
    ) -> Self {
        Self {
            registry,
            controller,
            window,
        }
    }

    /// Lock guarding the snapshot window.
    pub fn window(&self) -> Arc<Mutex<()>> {
        self.window.clone()
    }

    /// Create `adapter` on `fpga` and map its channels to the new buses.
    ///
    /// The number of new buses must equal the declared channel count and the
    /// buses must be contiguous; otherwise the adapter is destroyed again and
    /// `TopologyMismatch` is returned. A rejected create is only cleaned up
    /// when it produced buses.
    pub async fn instantiate(
        &self,
        fpga: &FpgaSpec,
        adapter: &AdapterSpec,
    ) -> Result<AllocatedAdapter, I2cError> {
        let _window = self.window.lock().await;
        let label = adapter.label();

        let before = self.registry.snapshot().await?;
        if let Err(e) = self.controller.create(fpga, &adapter.aux_device).await {
            self.discard_if_partial(fpga, adapter, &before).await;
            return Err(e);
        }
        let after = match self.registry.snapshot().await {
            Ok(after) => after,
            Err(e) => {
                self.discard(fpga, adapter).await;
                return Err(e);
            }
        };

        let new_buses = BusRegistry::diff(&before, &after);
        if let Err(e) = invariant_new_bus_count(&fpga.name, adapter, &new_buses)
            .and_then(|_| invariant_contiguous_buses(&fpga.name, adapter, &new_buses))
        {
            warn!(
                fpga = %fpga.name,
                adapter = %label,
                expected = adapter.channel_count(),
                observed = ?new_buses,
                "[bsp-i2c] Adapter produced unexpected buses"
            );
            self.discard(fpga, adapter).await;
            return Err(e);
        }

        // No channels, no buses: the base is never used.
        let base = BusRegistry::base_of(&new_buses).unwrap_or_default();
        let mut channels: Vec<u32> = adapter.channels.iter().map(|c| c.index).collect();
        channels.sort_unstable();

        let buses: Vec<BusEntry> = channels
            .into_iter()
            .map(|channel| BusEntry {
                channel,
                bus: base + channel,
                name: adapter.bus_name(channel),
            })
            .collect();

        if let Err(e) = invariant_distinct_bus_names(&label, &buses) {
            self.discard(fpga, adapter).await;
            return Err(e);
        }

        info!(
            fpga = %fpga.name,
            adapter = %label,
            base,
            channels = buses.len(),
            "[bsp-i2c] Adapter instantiated"
        );

        Ok(AllocatedAdapter {
            fpga: fpga.name.clone(),
            adapter: label,
            base,
            buses,
        })
    }

    /// Destroy `adapter`. Tearing down an absent adapter is a no-op.
    pub async fn teardown(
        &self,
        fpga: &FpgaSpec,
        adapter: &AdapterSpec,
    ) -> Result<DestroyOutcome, I2cError> {
        let _window = self.window.lock().await;
        let outcome = self.controller.destroy(fpga, &adapter.aux_device).await?;
        debug!(
            fpga = %fpga.name,
            adapter = %adapter.label(),
            outcome = ?outcome,
            "[bsp-i2c] Adapter torn down"
        );
        Ok(outcome)
    }

    /// Instantiate `adapter`, run `body`, and tear down on every exit path.
    ///
    /// The body's error wins over a teardown error; a teardown error after a
    /// successful body is returned.
    pub async fn with_adapter<T, F, Fut>(
        &self,
        fpga: &FpgaSpec,
        adapter: &AdapterSpec,
        body: F,
    ) -> Result<T, I2cError>
    where
        F: FnOnce(AllocatedAdapter) -> Fut,
        Fut: Future<Output = Result<T, I2cError>>,
    {
        let allocated = self.instantiate(fpga, adapter).await?;
        let outcome = body(allocated).await;
        let teardown = self.teardown(fpga, adapter).await;

        match (outcome, teardown) {
            (Ok(value), Ok(_)) => Ok(value),
            (Ok(_), Err(e)) => Err(e),
            (Err(e), Ok(_)) => Err(e),
            (Err(e), Err(cleanup)) => {
                warn!(
                    fpga = %fpga.name,
                    adapter = %adapter.label(),
                    error = %cleanup,
                    "[bsp-i2c] Teardown failed after error"
                );
                Err(e)
            }
        }
    }

    /// After a failed create, destroy only if the attempt left buses behind.
    ///
    /// A create can fail because the adapter is already live under another
    /// owner; those buses predate `before` and must survive.
    async fn discard_if_partial(
        &self,
        fpga: &FpgaSpec,
        adapter: &AdapterSpec,
        before: &BTreeSet<BusNumber>,
    ) {
        match self.registry.snapshot().await {
            Ok(after) if BusRegistry::diff(before, &after).is_empty() => {
                debug!(
                    fpga = %fpga.name,
                    adapter = %adapter.label(),
                    "[bsp-i2c] Failed create left no buses"
                );
            }
            Ok(_) => self.discard(fpga, adapter).await,
            Err(e) => warn!(
                fpga = %fpga.name,
                adapter = %adapter.label(),
                error = %e,
                "[bsp-i2c] Cannot tell whether failed create left buses"
            ),
        }
    }

    /// Best-effort destroy inside the window.
    async fn discard(&self, fpga: &FpgaSpec, adapter: &AdapterSpec) {
        if let Err(e) = self.controller.destroy(fpga, &adapter.aux_device).await {
            warn!(
                fpga = %fpga.name,
                adapter = %adapter.label(),
                error = %e,
                "[bsp-i2c] Cleanup of partial adapter failed"
            );
        }
    }
}
