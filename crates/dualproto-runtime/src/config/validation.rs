//! Configuration validation utilities.

use super::error::{ConfigError, ConfigResult};
use super::schema::{BusConfig, DualConfig, LogFormat, LogOutput, LoggingConfig};

/// Validates the entire configuration.
pub fn validate_config(config: &DualConfig) -> ConfigResult<()> {
    validate_logging_config(&config.logging)?;
    validate_bus_config(&config.bus)?;
    Ok(())
}

/// Validates logging settings.
fn validate_logging_config(logging: &LoggingConfig) -> ConfigResult<()> {
    if logging.output == LogOutput::File && logging.file_path.is_none() {
        return Err(ConfigError::missing_field("logging.file_path"));
    }

    if logging.format == LogFormat::Json && !cfg!(feature = "json-log") {
        return Err(ConfigError::validation(
            "JSON log format requires the `json-log` feature",
        ));
    }

    if let Some(module) = logging.filters.keys().find(|m| m.trim().is_empty()) {
        return Err(ConfigError::validation(format!(
            "Empty module name in logging filters: {module:?}"
        )));
    }

    Ok(())
}

/// Validates bus settings.
fn validate_bus_config(bus: &BusConfig) -> ConfigResult<()> {
    validate_timeout("bus.request_timeout_secs", bus.request_timeout_secs)?;
    validate_timeout("bus.wait_timeout_secs", bus.wait_timeout_secs)?;

    if let Some(prefix) = &bus.token_prefix {
        if prefix.contains('/') || prefix.starts_with(':') || prefix.starts_with('*') {
            return Err(ConfigError::validation(format!(
                "Token prefix {prefix:?} must be a plain address segment"
            )));
        }
    }

    Ok(())
}

fn validate_timeout(field: &str, secs: f64) -> ConfigResult<()> {
    if !secs.is_finite() || secs < 0.0 {
        return Err(ConfigError::validation(format!(
            "{field} must be a finite, non-negative number of seconds, got {secs}"
        )));
    }
    Ok(())
}
