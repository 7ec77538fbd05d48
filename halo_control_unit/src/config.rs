//! Configuration loading for the control unit.
//!
//! Parses the TOML file into `ControllerConfig`, validates it and logs a
//! summary. Parsing and validation live in `halo_common`; this module only
//! sequences them.

use std::path::Path;

use halo_common::config::{ConfigError, ConfigLoader};
use halo_common::control_unit::config::ControllerConfig;
use tracing::info;

/// Load and validate the configuration file at `path`.
///
/// # Errors
/// `FileNotFound`, `ReadError`, `ParseError`, `ValidationError` or
/// `InvalidGeometry`.
pub fn load_config(path: &Path) -> Result<ControllerConfig, ConfigError> {
    accept_config(ControllerConfig::load(path)?)
}

/// Validate an already parsed configuration and log its summary.
///
/// Lets a caller parse once before logging is set up and finish the job
/// afterwards.
pub fn accept_config(config: ControllerConfig) -> Result<ControllerConfig, ConfigError> {
    config.validate()?;
    log_summary(&config);
    Ok(config)
}

/// Parse and validate configuration from a TOML string.
pub fn load_config_from_str(content: &str) -> Result<ControllerConfig, ConfigError> {
    let config = ControllerConfig::from_toml(content)?;
    config.validate()?;
    Ok(config)
}

fn log_summary(config: &ControllerConfig) {
    info!(
        service = %config.shared.service_name,
        driver = %config.driver.name,
        period_ms = config.cycle.period_ms,
        max_current_a = config.safety.max_allowed_current_amps,
        stop_at_m = config.safety.stop_at_distance_meters,
        "Configuration loaded"
    );
}
