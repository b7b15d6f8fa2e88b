//! Telemetry configuration from environment variables.

use std::env;

/// Configuration for log output.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Service name attached to the startup log
    pub service_name: String,

    /// Filter directives (level or `target=level` list)
    pub log_level: String,

    /// Whether to emit JSON lines
    pub json_logs: bool,

    /// Whether to include file and line in each event
    pub source_location: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "bsp-bringup".to_string(),
            log_level: "info".to_string(),
            json_logs: false,
            source_location: false,
        }
    }
}

impl TelemetryConfig {
    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `BSP_SERVICE_NAME`: Service name (default: bsp-bringup)
    /// - `RUST_LOG` or `BSP_LOG_LEVEL`: Log filter (default: info)
    /// - `BSP_JSON_LOGS`: Enable JSON logs (default: false)
    /// - `BSP_LOG_SOURCE`: Include file/line (default: false)
    pub fn from_env() -> Self {
        Self {
            service_name: env::var("BSP_SERVICE_NAME")
                .unwrap_or_else(|_| "bsp-bringup".to_string()),

            log_level: env::var("RUST_LOG")
                .or_else(|_| env::var("BSP_LOG_LEVEL"))
                .unwrap_or_else(|_| "info".to_string()),

            json_logs: env::var("BSP_JSON_LOGS")
                .map(|v| is_truthy(&v))
                .unwrap_or(false),

            source_location: env::var("BSP_LOG_SOURCE")
                .map(|v| is_truthy(&v))
                .unwrap_or(false),
        }
    }

    /// Raise the filter to `debug` unless directives were given explicitly.
    pub fn verbose(mut self) -> Self {
        if self.log_level == "info" {
            self.log_level = "debug".to_string();
        }
        self
    }
}

fn is_truthy(value: &str) -> bool {
    value.eq_ignore_ascii_case("true") || value == "1"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = TelemetryConfig::default();
        assert_eq!(config.service_name, "bsp-bringup");
        assert_eq!(config.log_level, "info");
        assert!(!config.json_logs);
    }

    #[test]
    fn test_verbose_keeps_explicit_directives() {
        assert_eq!(TelemetryConfig::default().verbose().log_level, "debug");

        let config = TelemetryConfig {
            log_level: "bsp_i2c=trace".to_string(),
            ..TelemetryConfig::default()
        };
        assert_eq!(config.verbose().log_level, "bsp_i2c=trace");
    }

    #[test]
    fn test_truthy_values() {
        assert!(is_truthy("1"));
        assert!(is_truthy("TRUE"));
        assert!(!is_truthy("0"));
        assert!(!is_truthy("yes"));
    }
}
