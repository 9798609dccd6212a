//! Load current ramp.
//!
//! Set-points are derived from an integer step counter in milliamps, never by
//! accumulating floating-point increments, so the row count of a report does
//! not depend on rounding drift.

use crate::config::ConfigError;

/// Highest commanded load current, in amps.
pub const MAX_LOAD_AMPS: f64 = 5.0;
/// Increment between consecutive set-points, in amps.
pub const RAMP_STEP_AMPS: f64 = 0.2;

const MILLIAMPS_PER_AMP: f64 = 1000.0;

/// One commanded load set-point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RampStep {
    /// Position in the ramp, starting at 0.
    pub index: usize,
    /// Commanded load current in amps.
    pub load_current: f64,
}

/// Strictly increasing sequence of load set-points shared by every trial.
#[derive(Debug, Clone, PartialEq)]
pub struct Ramp {
    steps: Vec<RampStep>,
}

impl Ramp {
    /// Ramp from 0 to the last multiple of `step_amps` not above `max_load_amps`.
    ///
    /// No set-point beyond `max_load_amps` is ever commanded, so when the step
    /// divides the range exactly the ramp ends on `max_load_amps` itself.
    pub fn new(max_load_amps: f64, step_amps: f64) -> Result<Self, ConfigError> {
        if !(step_amps.is_finite() && step_amps > 0.0) {
            return Err(ConfigError::ValidationError(format!(
                "ramp step must be positive, got {}",
                step_amps
            )));
        }
        if !(max_load_amps.is_finite() && max_load_amps >= 0.0) {
            return Err(ConfigError::ValidationError(format!(
                "ramp maximum must be non-negative, got {}",
                max_load_amps
            )));
        }

        let step_ma = (step_amps * MILLIAMPS_PER_AMP).round() as u64;
        if step_ma == 0 {
            return Err(ConfigError::ValidationError(format!(
                "ramp step {} A is below 1 mA resolution",
                step_amps
            )));
        }
        let max_ma = (max_load_amps * MILLIAMPS_PER_AMP).round() as u64;
        Ok(Self::from_milliamps(max_ma, step_ma))
    }

    /// The bench ramp: 0 A to 5 A in 0.2 A steps.
    pub fn standard() -> Self {
        Self::from_milliamps(
            (MAX_LOAD_AMPS * MILLIAMPS_PER_AMP).round() as u64,
            (RAMP_STEP_AMPS * MILLIAMPS_PER_AMP).round() as u64,
        )
    }

    // step_ma must be non-zero
    fn from_milliamps(max_ma: u64, step_ma: u64) -> Self {
        let count = max_ma / step_ma + 1;
        let steps = (0..count)
            .map(|i| RampStep {
                index: i as usize,
                load_current: (i * step_ma) as f64 / MILLIAMPS_PER_AMP,
            })
            .collect();
        Self { steps }
    }

    /// Ramp over explicit set-points, which must be finite and strictly increasing.
    pub fn from_currents(currents: &[f64]) -> Result<Self, ConfigError> {
        if currents.is_empty() {
            return Err(ConfigError::ValidationError(
                "ramp needs at least one set-point".to_string(),
            ));
        }
        if currents.iter().any(|c| !c.is_finite()) {
            return Err(ConfigError::ValidationError(
                "ramp set-points must be finite".to_string(),
            ));
        }
        if currents.windows(2).any(|w| w[1] <= w[0]) {
            return Err(ConfigError::ValidationError(
                "ramp set-points must be strictly increasing".to_string(),
            ));
        }
        Ok(Self {
            steps: currents
                .iter()
                .enumerate()
                .map(|(index, &load_current)| RampStep {
                    index,
                    load_current,
                })
                .collect(),
        })
    }

    /// Set-points in ramp order.
    pub fn steps(&self) -> &[RampStep] {
        &self.steps
    }

    /// Number of set-points, which is the report row count.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Always false for a constructed ramp.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Set-points in ramp order.
    pub fn currents(&self) -> Vec<f64> {
        self.steps.iter().map(|s| s.load_current).collect()
    }
}

impl Default for Ramp {
    fn default() -> Self {
        Self::standard()
    }
}
