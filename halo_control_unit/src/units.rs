//! Encoder counts to line length.

use halo_common::config::ConfigError;
use halo_common::control_unit::config::SpoolConfig;

/// Convert encoder counts to paid-out line length [m].
///
/// `counts / counts_per_rev * circumference`. Monotonic in `counts` and
/// zero at zero for any valid geometry.
#[inline]
pub fn to_length(counts: i64, counts_per_rev: u32, spool_circumference_m: f64) -> f64 {
    counts as f64 / f64::from(counts_per_rev) * spool_circumference_m
}

/// Line length derived from one sample.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LinearPosition {
    /// Paid-out line length [m].
    pub length_meters: f64,
}

/// Validated spool geometry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpoolGeometry {
    encoder_counts_per_rev: u32,
    spool_circumference_m: f64,
}

impl SpoolGeometry {
    /// Build from raw parameters.
    ///
    /// # Errors
    /// `ConfigError::InvalidGeometry` for zero resolution or a non-positive
    /// circumference.
    pub fn new(encoder_counts_per_rev: u32, spool_circumference_m: f64) -> Result<Self, ConfigError> {
        if encoder_counts_per_rev == 0 {
            return Err(ConfigError::InvalidGeometry(
                "encoder_counts_per_rev must be > 0".to_string(),
            ));
        }
        if !spool_circumference_m.is_finite() || spool_circumference_m <= 0.0 {
            return Err(ConfigError::InvalidGeometry(format!(
                "spool circumference must be > 0, got {spool_circumference_m}"
            )));
        }
        Ok(Self {
            encoder_counts_per_rev,
            spool_circumference_m,
        })
    }

    /// Build from the `[spool]` section.
    pub fn from_config(config: &SpoolConfig) -> Result<Self, ConfigError> {
        Self::new(config.encoder_counts_per_rev, config.circumference())
    }

    #[inline]
    pub const fn encoder_counts_per_rev(&self) -> u32 {
        self.encoder_counts_per_rev
    }

    #[inline]
    pub const fn spool_circumference_m(&self) -> f64 {
        self.spool_circumference_m
    }

    /// Line length for `counts` [m].
    #[inline]
    pub fn to_length(&self, counts: i64) -> f64 {
        to_length(counts, self.encoder_counts_per_rev, self.spool_circumference_m)
    }

    /// Position for an optional encoder reading. Unknown stays unknown.
    #[inline]
    pub fn position(&self, counts: Option<i64>) -> Option<LinearPosition> {
        counts.map(|c| LinearPosition {
            length_meters: self.to_length(c),
        })
    }
}
