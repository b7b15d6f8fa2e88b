//! Simulated I2C Substrate
//!
//! In-memory stand-in for the kernel driver stack and i2c-tools. Implements
//! every outbound port so the engine runs end to end without hardware.
//!
//! Bus numbers are handed out the way the kernel's dynamic allocator does:
//! lowest free number first, shared with "foreign" buses that tests inject
//! to model other actors. Devices answer `i2cdetect`, `i2cdump` and `i2cget`
//! from per-device register files seeded with the platform's golden data.
//! Unseeded registers read as `0xff`.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::path::Path;
use tracing::{debug, warn};

use crate::algorithms::{format_dump, format_scan, ProbeCell};
use crate::domain::hex::parse_hex_u8;
use crate::domain::{
    AuxDeviceDescriptor, BusNumber, ByteRange, FpgaSpec, I2cAddress, I2cError, PlatformSpec,
    DEFAULT_ROW_WIDTH,
};
use crate::ports::outbound::{
    CommandExecutor, CommandOutput, DestroyOutcome, DeviceBinder, KernelModuleController,
    LiveBusSource, ResourceController,
};

/// `(fpga name, adapter label)`.
type AdapterKey = (String, String);

fn key(fpga: &str, adapter: &str) -> AdapterKey {
    (fpga.to_string(), adapter.to_string())
}

#[derive(Clone, Debug, Default)]
struct SimDevice {
    registers: BTreeMap<u8, u8>,
    get_responses: HashMap<String, String>,
}

impl SimDevice {
    fn read(&self, register: u8) -> u8 {
        self.registers.get(&register).copied().unwrap_or(0xff)
    }
}

#[derive(Debug, Default)]
struct SimAdapter {
    channels: usize,
    devices: HashMap<(u32, I2cAddress), SimDevice>,
    buses: Vec<BusNumber>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum BusOwner {
    Adapter { key: AdapterKey, channel: u32 },
    Foreign,
}

#[derive(Debug, Default)]
struct Faults {
    short_channels: HashMap<AdapterKey, usize>,
    failing_create: HashSet<AdapterKey>,
    foreign_during_create: HashSet<AdapterKey>,
    unavailable: HashSet<String>,
    leak_on_unload: bool,
    failing_unload: bool,
}

#[derive(Debug, Default)]
struct SimState {
    modules_loaded: bool,
    fpgas: HashSet<String>,
    adapters: HashMap<AdapterKey, SimAdapter>,
    live: BTreeMap<BusNumber, BusOwner>,
    bound: BTreeMap<(BusNumber, I2cAddress), String>,
    faults: Faults,
}

impl SimState {
    fn lowest_free_bus(&self) -> BusNumber {
        (0..).find(|n| !self.live.contains_key(n)).unwrap_or_default()
    }

    fn device_at(&self, bus: BusNumber, address: I2cAddress) -> Option<&SimDevice> {
        match self.live.get(&bus)? {
            BusOwner::Adapter { key, channel } => {
                self.adapters.get(key)?.devices.get(&(*channel, address))
            }
            BusOwner::Foreign => None,
        }
    }

    /// Remove an adapter's buses and any nodes bound on them.
    fn release_adapter(&mut self, key: &AdapterKey) -> bool {
        let Some(adapter) = self.adapters.get_mut(key) else {
            return false;
        };
        let buses = std::mem::take(&mut adapter.buses);
        if buses.is_empty() {
            return false;
        }
        for bus in buses {
            self.live.remove(&bus);
            self.bound.retain(|(node_bus, _), _| *node_bus != bus);
        }
        true
    }

    fn is_available(&self, fpga: &str) -> bool {
        self.fpgas.contains(fpga) && !self.faults.unavailable.contains(fpga)
    }
}

/// In-memory I2C driver substrate with fault injection.
pub struct SimulatedI2cSubstrate {
    state: Mutex<SimState>,
    row_width: usize,
}

impl SimulatedI2cSubstrate {
    /// Model the hardware `platform` describes, every declared device present.
    pub fn from_platform(platform: &PlatformSpec) -> Self {
        let mut state = SimState::default();

        for fpga in &platform.fpgas {
            state.fpgas.insert(fpga.name.clone());

            for adapter in &fpga.i2c_adapters {
                let mut sim = SimAdapter {
                    channels: adapter.channel_count(),
                    ..SimAdapter::default()
                };

                for device in &adapter.i2c_devices {
                    let mut sim_device = SimDevice::default();
                    if let Some(data) = &device.test_data {
                        for case in &data.i2c_dump_data {
                            for (register, value) in (case.start..=case.end).zip(&case.expected) {
                                sim_device.registers.insert(register, *value);
                            }
                        }
                        for case in &data.i2c_get_data {
                            sim_device
                                .get_responses
                                .insert(case.reg.clone(), case.expected.clone());
                        }
                    }
                    sim.devices.insert((device.channel, device.address), sim_device);
                }

                state.adapters.insert(key(&fpga.name, &adapter.label()), sim);
            }
        }

        Self {
            state: Mutex::new(state),
            row_width: DEFAULT_ROW_WIDTH,
        }
    }

    // -------------------------------------------------------------------------
    // Fault injection
    // -------------------------------------------------------------------------

    /// Instantiate a bus owned by some other actor; returns its number.
    pub fn add_foreign_bus(&self) -> BusNumber {
        let mut state = self.state.lock();
        let bus = state.lowest_free_bus();
        state.live.insert(bus, BusOwner::Foreign);
        bus
    }

    /// Remove a bus regardless of owner.
    pub fn remove_bus(&self, bus: BusNumber) {
        let mut state = self.state.lock();
        state.live.remove(&bus);
        state.bound.retain(|(node_bus, _), _| *node_bus != bus);
    }

    /// Make the adapter come up with `missing` fewer buses than channels.
    pub fn short_channels(&self, fpga: &str, adapter: &str, missing: usize) {
        self.state
            .lock()
            .faults
            .short_channels
            .insert(key(fpga, adapter), missing);
    }

    /// Make creating the adapter fail.
    pub fn fail_create(&self, fpga: &str, adapter: &str) {
        self.state
            .lock()
            .faults
            .failing_create
            .insert(key(fpga, adapter));
    }

    /// Have a foreign bus appear while the adapter is being created.
    pub fn foreign_bus_during_create(&self, fpga: &str, adapter: &str) {
        self.state
            .lock()
            .faults
            .foreign_during_create
            .insert(key(fpga, adapter));
    }

    /// Remove the FPGA's controller endpoint.
    pub fn mark_unavailable(&self, fpga: &str) {
        self.state.lock().faults.unavailable.insert(fpga.to_string());
    }

    /// Keep adapter buses alive across a module unload.
    pub fn leak_on_unload(&self, enabled: bool) {
        self.state.lock().faults.leak_on_unload = enabled;
    }

    /// Make module unload fail as if the driver were stuck.
    pub fn fail_unload(&self, enabled: bool) {
        self.state.lock().faults.failing_unload = enabled;
    }

    /// Take a declared device off the bus.
    pub fn remove_device(&self, fpga: &str, adapter: &str, channel: u32, address: I2cAddress) {
        if let Some(sim) = self.state.lock().adapters.get_mut(&key(fpga, adapter)) {
            sim.devices.remove(&(channel, address));
        }
    }

    /// Overwrite one register of a device.
    pub fn set_register(
        &self,
        fpga: &str,
        adapter: &str,
        channel: u32,
        address: I2cAddress,
        register: u8,
        value: u8,
    ) {
        self.with_device(fpga, adapter, channel, address, |device| {
            device.registers.insert(register, value);
        });
    }

    /// Override the text `i2cget` prints for `register`.
    pub fn set_get_response(
        &self,
        fpga: &str,
        adapter: &str,
        channel: u32,
        address: I2cAddress,
        register: &str,
        text: &str,
    ) {
        self.with_device(fpga, adapter, channel, address, |device| {
            device
                .get_responses
                .insert(register.to_string(), text.to_string());
        });
    }

    fn with_device<F>(&self, fpga: &str, adapter: &str, channel: u32, address: I2cAddress, f: F)
    where
        F: FnOnce(&mut SimDevice),
    {
        let mut state = self.state.lock();
        match state
            .adapters
            .get_mut(&key(fpga, adapter))
            .and_then(|sim| sim.devices.get_mut(&(channel, address)))
        {
            Some(device) => f(device),
            None => warn!(fpga, adapter, channel, address = %address, "[bsp-i2c] No such simulated device"),
        }
    }

    // -------------------------------------------------------------------------
    // Inspection
    // -------------------------------------------------------------------------

    /// Whether the driver modules are loaded.
    pub fn modules_loaded(&self) -> bool {
        self.state.lock().modules_loaded
    }

    /// Buses currently owned by an adapter.
    pub fn adapter_buses(&self, fpga: &str, adapter: &str) -> Vec<BusNumber> {
        self.state
            .lock()
            .adapters
            .get(&key(fpga, adapter))
            .map(|sim| sim.buses.clone())
            .unwrap_or_default()
    }

    /// Number of live buses, foreign ones included.
    pub fn live_bus_count(&self) -> usize {
        self.state.lock().live.len()
    }

    /// Bound device nodes.
    pub fn bound_nodes(&self) -> Vec<(BusNumber, I2cAddress)> {
        self.state.lock().bound.keys().copied().collect()
    }

    // -------------------------------------------------------------------------
    // i2c-tools
    // -------------------------------------------------------------------------

    fn i2cdetect(&self, args: &[String]) -> Result<CommandOutput, CommandOutput> {
        let positional = positional(args, &[]);
        let [bus, first, last] = positional.as_slice() else {
            return Err(usage("i2cdetect", "expected <bus> <first> <last>"));
        };
        let bus = parse_bus(bus)?;
        let first = parse_hex_u8(first).map_err(|e| usage("i2cdetect", e))?;
        let last = parse_hex_u8(last).map_err(|e| usage("i2cdetect", e))?;

        let state = self.state.lock();
        if !state.live.contains_key(&bus) {
            return Err(no_bus(bus));
        }

        Ok(CommandOutput::ok(format_scan(first, last, self.row_width, |value| {
            let Ok(address) = I2cAddress::new(value) else {
                return ProbeCell::Absent;
            };
            if state.bound.contains_key(&(bus, address)) {
                ProbeCell::Busy
            } else if state.device_at(bus, address).is_some() {
                ProbeCell::Present
            } else {
                ProbeCell::Absent
            }
        })))
    }

    fn i2cdump(&self, args: &[String]) -> Result<CommandOutput, CommandOutput> {
        let range_text = args
            .iter()
            .position(|arg| arg == "-r")
            .and_then(|index| args.get(index + 1))
            .ok_or_else(|| usage("i2cdump", "missing -r <start>-<end>"))?;
        let (start, end) = range_text
            .split_once('-')
            .ok_or_else(|| usage("i2cdump", "bad range"))?;
        let range = ByteRange::new(
            parse_hex_u8(start).map_err(|e| usage("i2cdump", e))?,
            parse_hex_u8(end).map_err(|e| usage("i2cdump", e))?,
        )
        .map_err(|e| usage("i2cdump", e))?;

        let positional = positional(args, &["-r"]);
        let [bus, address] = positional.as_slice() else {
            return Err(usage("i2cdump", "expected <bus> <address>"));
        };
        let bus = parse_bus(bus)?;
        let address = parse_address("i2cdump", address)?;

        let state = self.state.lock();
        if !state.live.contains_key(&bus) {
            return Err(no_bus(bus));
        }
        if state.bound.contains_key(&(bus, address)) {
            return Err(busy(address));
        }

        // An absent device NAKs every read; i2cdump still exits 0.
        let bytes: Vec<u8> = match state.device_at(bus, address) {
            Some(device) => (range.start..=range.end).map(|r| device.read(r)).collect(),
            None => Vec::new(),
        };
        Ok(CommandOutput::ok(format_dump(range, &bytes, self.row_width)))
    }

    fn i2cget(&self, args: &[String]) -> Result<CommandOutput, CommandOutput> {
        let positional = positional(args, &[]);
        let [bus, address, register] = positional.as_slice() else {
            return Err(usage("i2cget", "expected <bus> <address> <register>"));
        };
        let bus = parse_bus(bus)?;
        let address = parse_address("i2cget", address)?;

        let state = self.state.lock();
        if !state.live.contains_key(&bus) {
            return Err(no_bus(bus));
        }
        if state.bound.contains_key(&(bus, address)) {
            return Err(busy(address));
        }
        let device = state
            .device_at(bus, address)
            .ok_or_else(|| CommandOutput::failed(2, "Error: Read failed"))?;

        let text = match device.get_responses.get(*register) {
            Some(text) => text.clone(),
            None => {
                let register = parse_hex_u8(register).map_err(|e| usage("i2cget", e))?;
                format!("0x{:02x}", device.read(register))
            }
        };
        Ok(CommandOutput::ok(format!("{}\n", text)))
    }
}

/// Arguments that are not flags, skipping the values of `valued` flags.
fn positional<'a>(args: &'a [String], valued: &[&str]) -> Vec<&'a str> {
    let mut out = Vec::new();
    let mut skip = false;
    for arg in args {
        if skip {
            skip = false;
            continue;
        }
        if arg.starts_with('-') {
            skip = valued.contains(&arg.as_str());
            continue;
        }
        out.push(arg.as_str());
    }
    out
}

fn usage(tool: &str, detail: impl std::fmt::Display) -> CommandOutput {
    CommandOutput::failed(1, format!("Error: {}: {}", tool, detail))
}

fn no_bus(bus: BusNumber) -> CommandOutput {
    CommandOutput::failed(
        1,
        format!(
            "Error: Could not open file `/dev/i2c-{}': No such file or directory",
            bus
        ),
    )
}

fn busy(address: I2cAddress) -> CommandOutput {
    CommandOutput::failed(
        1,
        format!(
            "Error: Could not set address to {}: Device or resource busy",
            address
        ),
    )
}

fn parse_bus(text: &str) -> Result<BusNumber, CommandOutput> {
    text.parse()
        .map_err(|_| CommandOutput::failed(1, format!("Error: I2C bus name doesn't match any bus present: {}", text)))
}

fn parse_address(tool: &str, text: &str) -> Result<I2cAddress, CommandOutput> {
    text.parse().map_err(|e: String| usage(tool, e))
}

#[async_trait]
impl CommandExecutor for SimulatedI2cSubstrate {
    async fn run(&self, program: &str, args: &[String]) -> Result<CommandOutput, I2cError> {
        let tool = Path::new(program)
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or(program);

        let result = match tool {
            "i2cdetect" => self.i2cdetect(args),
            "i2cdump" => self.i2cdump(args),
            "i2cget" => self.i2cget(args),
            _ => {
                return Err(I2cError::CommandSpawn {
                    program: program.to_string(),
                    reason: "not provided by the simulated substrate".to_string(),
                })
            }
        };
        Ok(result.unwrap_or_else(|failure| failure))
    }
}

#[async_trait]
impl ResourceController for SimulatedI2cSubstrate {
    async fn is_available(&self, fpga: &FpgaSpec) -> Result<bool, I2cError> {
        Ok(self.state.lock().is_available(&fpga.name))
    }

    async fn create(
        &self,
        fpga: &FpgaSpec,
        descriptor: &AuxDeviceDescriptor,
    ) -> Result<(), I2cError> {
        let adapter_key = key(&fpga.name, &descriptor.label());
        let fail = |reason: &str| I2cError::Infrastructure {
            operation: format!("creating {} on fpga {}", descriptor.label(), fpga.name),
            reason: reason.to_string(),
        };

        let mut guard = self.state.lock();
        let state = &mut *guard;

        if !state.modules_loaded {
            return Err(fail("driver modules not loaded"));
        }
        if !state.is_available(&fpga.name) {
            return Err(fail("controller endpoint missing"));
        }
        if state.faults.failing_create.contains(&adapter_key) {
            return Err(fail("ioctl rejected"));
        }
        let channels = match state.adapters.get(&adapter_key) {
            None => return Err(fail("unknown auxiliary device")),
            Some(sim) if !sim.buses.is_empty() => return Err(fail("already exists")),
            Some(sim) => sim.channels,
        };
        let missing = state
            .faults
            .short_channels
            .get(&adapter_key)
            .copied()
            .unwrap_or(0);

        if state.faults.foreign_during_create.contains(&adapter_key) {
            let bus = state.lowest_free_bus();
            state.live.insert(bus, BusOwner::Foreign);
        }

        let mut buses = Vec::new();
        for channel in 0..channels.saturating_sub(missing) {
            let bus = state.lowest_free_bus();
            state.live.insert(
                bus,
                BusOwner::Adapter {
                    key: adapter_key.clone(),
                    channel: channel as u32,
                },
            );
            buses.push(bus);
        }
        debug!(fpga = %fpga.name, adapter = %descriptor.label(), buses = ?buses, "[bsp-i2c] Simulated buses allocated");

        if let Some(sim) = state.adapters.get_mut(&adapter_key) {
            sim.buses = buses;
        }
        Ok(())
    }

    async fn destroy(
        &self,
        fpga: &FpgaSpec,
        descriptor: &AuxDeviceDescriptor,
    ) -> Result<DestroyOutcome, I2cError> {
        let adapter_key = key(&fpga.name, &descriptor.label());
        let mut state = self.state.lock();

        // Buses that outlived their driver cannot be reached through it.
        let holds_buses = state
            .adapters
            .get(&adapter_key)
            .is_some_and(|sim| !sim.buses.is_empty());
        if holds_buses && !state.modules_loaded {
            return Err(I2cError::Infrastructure {
                operation: format!("destroying {} on fpga {}", descriptor.label(), fpga.name),
                reason: "driver modules not loaded".to_string(),
            });
        }

        let released = state.release_adapter(&adapter_key);
        Ok(if released {
            DestroyOutcome::Destroyed
        } else {
            DestroyOutcome::AlreadyAbsent
        })
    }
}

#[async_trait]
impl LiveBusSource for SimulatedI2cSubstrate {
    async fn live_buses(&self) -> Result<BTreeSet<BusNumber>, I2cError> {
        Ok(self.state.lock().live.keys().copied().collect())
    }
}

#[async_trait]
impl DeviceBinder for SimulatedI2cSubstrate {
    async fn bind(
        &self,
        bus: BusNumber,
        device_name: &str,
        address: I2cAddress,
    ) -> Result<bool, I2cError> {
        let mut state = self.state.lock();
        let path = format!("i2c-{}/new_device", bus);

        if !state.live.contains_key(&bus) {
            return Err(I2cError::Io {
                path,
                reason: "No such file or directory".to_string(),
            });
        }
        if state.bound.contains_key(&(bus, address)) {
            return Err(I2cError::Io {
                path,
                reason: "Device or resource busy".to_string(),
            });
        }
        if state.device_at(bus, address).is_none() {
            return Ok(false);
        }
        state
            .bound
            .insert((bus, address), device_name.to_string());
        Ok(true)
    }

    async fn unbind(&self, bus: BusNumber, address: I2cAddress) -> Result<(), I2cError> {
        self.state.lock().bound.remove(&(bus, address));
        Ok(())
    }
}

#[async_trait]
impl KernelModuleController for SimulatedI2cSubstrate {
    async fn load_all(&self) -> Result<(), I2cError> {
        self.state.lock().modules_loaded = true;
        Ok(())
    }

    async fn unload_all(&self) -> Result<(), I2cError> {
        let mut state = self.state.lock();
        if state.faults.failing_unload {
            return Err(I2cError::CommandFailed {
                program: "modprobe".to_string(),
                args: "-r fbiob_i2c".to_string(),
                status: 1,
                stderr: "modprobe: FATAL: Module fbiob_i2c is in use.".to_string(),
            });
        }
        if !state.faults.leak_on_unload {
            let keys: Vec<AdapterKey> = state.adapters.keys().cloned().collect();
            for adapter_key in &keys {
                state.release_adapter(adapter_key);
            }
        }
        state.modules_loaded = false;
        Ok(())
    }
}
