//! # Run Reports
//!
//! Results of a bring-up run: one report per check, each listing every
//! finding and the infrastructure error (if any) that cut it short.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::errors::{ErrorKind, I2cError};

/// The checks a bring-up run performs, in execution order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CheckKind {
    /// Each FPGA's controller endpoint exists.
    ControllerPresent,
    /// Each adapter creates one uniquely named bus per channel.
    AdapterCreatesBuses,
    /// Each expected device acknowledges on its bus.
    AdapterDevicesPresent,
    /// The driver substrate unloads with devices bound.
    BusWithDevicesUnloads,
    /// Golden-data transactions match.
    Transactions,
}

impl CheckKind {
    /// All checks in execution order.
    pub const ALL: [CheckKind; 5] = [
        CheckKind::ControllerPresent,
        CheckKind::AdapterCreatesBuses,
        CheckKind::AdapterDevicesPresent,
        CheckKind::BusWithDevicesUnloads,
        CheckKind::Transactions,
    ];

    /// Kebab-case name.
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckKind::ControllerPresent => "controller-present",
            CheckKind::AdapterCreatesBuses => "adapter-creates-buses",
            CheckKind::AdapterDevicesPresent => "adapter-devices-present",
            CheckKind::BusWithDevicesUnloads => "bus-with-devices-unloads",
            CheckKind::Transactions => "transactions",
        }
    }
}

impl fmt::Display for CheckKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CheckKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CheckKind::ALL
            .into_iter()
            .find(|check| check.as_str() == s)
            .ok_or_else(|| format!("unknown check: {}", s))
    }
}

/// Serializable view of an [`I2cError`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    /// Classification.
    pub kind: ErrorKind,
    /// Full message, including location.
    pub message: String,
}

impl From<&I2cError> for Finding {
    fn from(err: &I2cError) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

/// Outcome of one check.
#[derive(Clone, Debug)]
pub struct CheckReport {
    /// Which check.
    pub check: CheckKind,
    /// Presence, verification and leak findings.
    pub findings: Vec<I2cError>,
    /// Fatal errors that aborted part of the check.
    pub aborted: Vec<I2cError>,
}

impl CheckReport {
    /// Empty report for `check`.
    pub fn new(check: CheckKind) -> Self {
        Self {
            check,
            findings: Vec::new(),
            aborted: Vec::new(),
        }
    }

    /// Record an error in the right bucket.
    pub fn record(&mut self, err: I2cError) {
        if err.kind().is_fatal() {
            self.aborted.push(err);
        } else {
            self.findings.push(err);
        }
    }

    /// No findings and nothing aborted.
    pub fn passed(&self) -> bool {
        self.findings.is_empty() && self.aborted.is_empty()
    }
}

/// Outcome of a whole run.
#[derive(Clone, Debug)]
pub struct SuiteReport {
    /// Run identifier.
    pub run_id: Uuid,
    /// Platform under test.
    pub platform: String,
    /// Run start.
    pub started_at: DateTime<Utc>,
    /// Run end.
    pub finished_at: DateTime<Utc>,
    /// Per-check results.
    pub checks: Vec<CheckReport>,
}

impl SuiteReport {
    /// Every check passed.
    pub fn passed(&self) -> bool {
        self.checks.iter().all(CheckReport::passed)
    }

    /// Report for `check`, if it ran.
    pub fn check(&self, check: CheckKind) -> Option<&CheckReport> {
        self.checks.iter().find(|report| report.check == check)
    }

    /// Total findings and aborts across checks.
    pub fn failure_count(&self) -> usize {
        self.checks
            .iter()
            .map(|c| c.findings.len() + c.aborted.len())
            .sum()
    }

    /// JSON rendering for archiving.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&SuiteReportView::from(self))
    }
}

#[derive(Serialize)]
struct CheckReportView {
    check: CheckKind,
    passed: bool,
    findings: Vec<Finding>,
    aborted: Vec<Finding>,
}

#[derive(Serialize)]
struct SuiteReportView {
    run_id: Uuid,
    platform: String,
    started_at: DateTime<Utc>,
    finished_at: DateTime<Utc>,
    passed: bool,
    checks: Vec<CheckReportView>,
}

impl From<&SuiteReport> for SuiteReportView {
    fn from(report: &SuiteReport) -> Self {
        Self {
            run_id: report.run_id,
            platform: report.platform.clone(),
            started_at: report.started_at,
            finished_at: report.finished_at,
            passed: report.passed(),
            checks: report
                .checks
                .iter()
                .map(|c| CheckReportView {
                    check: c.check,
                    passed: c.passed(),
                    findings: c.findings.iter().map(Finding::from).collect(),
                    aborted: c.aborted.iter().map(Finding::from).collect(),
                })
                .collect(),
        }
    }
}
