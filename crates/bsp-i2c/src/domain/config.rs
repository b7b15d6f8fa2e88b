//! # Run Configuration
//!
//! Where the engine finds its tools and kernel interfaces. Values come from
//! defaults, then `BSP_*` environment variables, then CLI overrides applied
//! by the runner.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Default row width of `i2cdump`/`i2cdetect` grids.
pub const DEFAULT_ROW_WIDTH: usize = 16;

/// Default bound on one external program run.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

/// External programs invoked by the engine.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ToolPaths {
    /// Presence probe.
    pub i2cdetect: String,
    /// Multi-byte register dump.
    pub i2cdump: String,
    /// Single-register read.
    pub i2cget: String,
    /// Kernel module loader.
    pub modprobe: String,
    /// Auxiliary-device control helper (`create`/`destroy`).
    pub aux_ctl: String,
}

impl Default for ToolPaths {
    fn default() -> Self {
        Self {
            i2cdetect: "i2cdetect".to_string(),
            i2cdump: "i2cdump".to_string(),
            i2cget: "i2cget".to_string(),
            modprobe: "modprobe".to_string(),
            aux_ctl: "fbiob-auxctl".to_string(),
        }
    }
}

/// Bring-up engine configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BringupConfig {
    /// Tool programs.
    pub tools: ToolPaths,
    /// Root of the sysfs mount.
    pub sysfs_root: PathBuf,
    /// Root of the device node tree.
    pub dev_root: PathBuf,
    /// Kernel modules to (un)load. Empty means "use the platform's list".
    pub kernel_modules: Vec<String>,
    /// Grid row width of tool output.
    pub dump_row_width: usize,
    /// Bound on one external program run.
    pub command_timeout: Duration,
}

impl Default for BringupConfig {
    fn default() -> Self {
        Self {
            tools: ToolPaths::default(),
            sysfs_root: PathBuf::from("/sys"),
            dev_root: PathBuf::from("/dev"),
            kernel_modules: Vec::new(),
            dump_row_width: DEFAULT_ROW_WIDTH,
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
        }
    }
}

impl BringupConfig {
    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `BSP_SYSFS_ROOT`: sysfs mount (default: /sys)
    /// - `BSP_DEV_ROOT`: device node root (default: /dev)
    /// - `BSP_KMODS`: comma-separated kernel modules (default: platform list)
    /// - `BSP_I2CDETECT`, `BSP_I2CDUMP`, `BSP_I2CGET`, `BSP_MODPROBE`,
    ///   `BSP_AUX_CTL`: tool overrides
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let tool = |var: &str, fallback: String| env::var(var).unwrap_or(fallback);

        Self {
            tools: ToolPaths {
                i2cdetect: tool("BSP_I2CDETECT", defaults.tools.i2cdetect),
                i2cdump: tool("BSP_I2CDUMP", defaults.tools.i2cdump),
                i2cget: tool("BSP_I2CGET", defaults.tools.i2cget),
                modprobe: tool("BSP_MODPROBE", defaults.tools.modprobe),
                aux_ctl: tool("BSP_AUX_CTL", defaults.tools.aux_ctl),
            },
            sysfs_root: env::var("BSP_SYSFS_ROOT")
                .map(PathBuf::from)
                .unwrap_or(defaults.sysfs_root),
            dev_root: env::var("BSP_DEV_ROOT")
                .map(PathBuf::from)
                .unwrap_or(defaults.dev_root),
            kernel_modules: env::var("BSP_KMODS")
                .map(|v| parse_module_list(&v))
                .unwrap_or_default(),
            dump_row_width: DEFAULT_ROW_WIDTH,
            command_timeout: env::var("BSP_COMMAND_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.command_timeout),
        }
    }

    /// Configuration for unit tests.
    pub fn for_testing() -> Self {
        Self {
            kernel_modules: vec!["fbiob_pci".to_string(), "fbiob_i2c".to_string()],
            ..Self::default()
        }
    }

    /// Modules to manage: the configured list, or the platform's own.
    pub fn modules_for(&self, platform_kmods: &[String]) -> Vec<String> {
        if self.kernel_modules.is_empty() {
            platform_kmods.to_vec()
        } else {
            self.kernel_modules.clone()
        }
    }
}

/// Split a comma-separated module list, dropping blanks.
pub fn parse_module_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .map(str::to_string)
        .collect()
}
