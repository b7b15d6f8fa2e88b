//! BSP-Runner: I2C bring-up checks
//!
//! Loads a platform description, runs the bring-up checks against the live
//! system (or the simulated substrate) and prints a per-check summary.
//!
//! Exit status: 0 when every check passed, 1 when any check recorded a
//! finding, 2 when the run could not be set up.

mod cli;

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info, warn};

use bsp_i2c::{
    BringupConfig, I2cBringupSuite, OutboundPorts, PlatformSpec, SimulatedI2cSubstrate,
    SuiteReport,
};
use bsp_telemetry::{init_telemetry, TelemetryConfig};
use cli::Args;

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let mut telemetry = TelemetryConfig::from_env();
    if args.verbose {
        telemetry = telemetry.verbose();
    }
    let _guard = match init_telemetry(&telemetry) {
        Ok(guard) => Some(guard),
        Err(e) => {
            eprintln!("Warning: {}", e);
            None
        }
    };

    match run(&args).await {
        Ok(report) => {
            print_summary(&report);
            if report.passed() {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(1)
            }
        }
        Err(e) => {
            error!(error = %format!("{:#}", e), "Bring-up run could not be set up");
            eprintln!("Error: {:#}", e);
            ExitCode::from(2)
        }
    }
}

async fn run(args: &Args) -> Result<SuiteReport> {
    let platform = PlatformSpec::from_json_file(&args.platform)
        .with_context(|| format!("Failed to load platform {}", args.platform.display()))?;
    let config = args.apply(BringupConfig::from_env());

    let ports = if args.simulate {
        warn!("Running against the simulated substrate");
        OutboundPorts::simulated(Arc::new(SimulatedI2cSubstrate::from_platform(&platform)))
    } else {
        OutboundPorts::system(&config, config.modules_for(&platform.kmods))
    };

    info!(
        platform = %platform.platform,
        fpgas = platform.fpgas.len(),
        simulate = args.simulate,
        "Starting bring-up run"
    );
    let suite = I2cBringupSuite::new(&config, ports);
    let report = suite.run_checks(&platform, &args.selected_checks()).await;

    if let Some(path) = &args.report {
        let json = report.to_json().context("Failed to serialize report")?;
        tokio::fs::write(path, json)
            .await
            .with_context(|| format!("Failed to write report {}", path.display()))?;
        info!(path = %path.display(), "Report written");
    }

    Ok(report)
}

fn print_summary(report: &SuiteReport) {
    println!("Platform {} (run {})", report.platform, report.run_id);
    for check in &report.checks {
        let status = if check.passed() { "PASS" } else { "FAIL" };
        println!("  {} {}", status, check.check);
        for err in check.aborted.iter().chain(&check.findings) {
            println!("      {}", err);
        }
    }
    println!(
        "{} of {} checks passed",
        report.checks.iter().filter(|c| c.passed()).count(),
        report.checks.len()
    );
}
