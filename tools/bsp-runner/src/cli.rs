//! Command-line arguments.

use std::path::PathBuf;

use bsp_i2c::{BringupConfig, CheckKind};
use clap::Parser;

/// BSP-Runner: I2C bring-up checks for FPGA-hosted platforms
#[derive(Parser, Debug)]
#[command(name = "bsp-runner")]
#[command(about = "Validate a platform's dynamically instantiated I2C topology")]
pub struct Args {
    /// Platform description (JSON)
    #[arg(short, long)]
    pub platform: PathBuf,

    /// Run only these checks (repeatable); all checks by default
    #[arg(short, long = "check", value_parser = parse_check)]
    pub checks: Vec<CheckKind>,

    /// Write the JSON report here
    #[arg(short, long)]
    pub report: Option<PathBuf>,

    /// Run against the in-memory simulated substrate
    #[arg(long)]
    pub simulate: bool,

    /// Root of the sysfs mount
    #[arg(long)]
    pub sysfs_root: Option<PathBuf>,

    /// Root of the device node tree
    #[arg(long)]
    pub dev_root: Option<PathBuf>,

    /// Debug-level logging
    #[arg(short, long)]
    pub verbose: bool,
}

fn parse_check(value: &str) -> Result<CheckKind, String> {
    value.parse()
}

impl Args {
    /// Merge flags over `config`.
    pub fn apply(&self, mut config: BringupConfig) -> BringupConfig {
        if let Some(root) = &self.sysfs_root {
            config.sysfs_root = root.clone();
        }
        if let Some(root) = &self.dev_root {
            config.dev_root = root.clone();
        }
        config
    }

    /// Checks to run, in execution order.
    pub fn selected_checks(&self) -> Vec<CheckKind> {
        if self.checks.is_empty() {
            return CheckKind::ALL.to_vec();
        }
        CheckKind::ALL
            .into_iter()
            .filter(|check| self.checks.contains(check))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_select_every_check() {
        let args = Args::try_parse_from(["bsp-runner", "--platform", "p.json"]).unwrap();
        assert_eq!(args.selected_checks(), CheckKind::ALL.to_vec());
        assert!(!args.simulate);
        assert!(args.report.is_none());
    }

    #[test]
    fn test_checks_keep_execution_order() {
        let args = Args::try_parse_from([
            "bsp-runner",
            "-p",
            "p.json",
            "--check",
            "transactions",
            "--check",
            "controller-present",
        ])
        .unwrap();
        assert_eq!(
            args.selected_checks(),
            vec![CheckKind::ControllerPresent, CheckKind::Transactions]
        );
    }

    #[test]
    fn test_unknown_check_rejected() {
        let result = Args::try_parse_from(["bsp-runner", "-p", "p.json", "--check", "bogus"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_roots_override_config() {
        let args = Args::try_parse_from([
            "bsp-runner",
            "-p",
            "p.json",
            "--sysfs-root",
            "/tmp/sys",
            "--dev-root",
            "/tmp/dev",
        ])
        .unwrap();
        let config = args.apply(BringupConfig::default());
        assert_eq!(config.sysfs_root, PathBuf::from("/tmp/sys"));
        assert_eq!(config.dev_root, PathBuf::from("/tmp/dev"));
    }
}
