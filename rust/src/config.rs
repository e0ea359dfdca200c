//! Configuration types for the scheduling run.

use chrono::NaiveDate;
use pyo3::prelude::*;

use crate::start_date::StartDatePolicy;

/// Default length of the generated horizon, in days.
pub const DEFAULT_HORIZON_DAYS: u32 = 60;

/// Longest generated horizon accepted, in days (about ten years).
pub const MAX_HORIZON_DAYS: u32 = 3660;

/// Configuration for start-date resolution and capacity allocation.
#[pyclass]
#[derive(Clone, Debug)]
pub struct SchedulingConfig {
    /// Start date policy: "earlier_wins" or "override_required"
    #[pyo3(get, set)]
    pub start_date_policy: String,
    /// Days in the generated horizon when no explicit horizon dates are given
    #[pyo3(get, set)]
    pub horizon_days: u32,
    /// Inclusive periods with zero capacity for every group (holidays, shutdowns)
    #[pyo3(get, set)]
    pub closed_dates: Vec<(NaiveDate, NaiveDate)>,
    /// Log verbosity (0 silent, 1 changes, 2 checks, 3 debug)
    #[pyo3(get, set)]
    pub verbosity: u8,
}

impl Default for SchedulingConfig {
    fn default() -> Self {
        Self {
            start_date_policy: StartDatePolicy::default().as_str().to_string(),
            horizon_days: DEFAULT_HORIZON_DAYS,
            closed_dates: Vec::new(),
            verbosity: 0,
        }
    }
}

impl SchedulingConfig {
    /// Parse the configured start date policy.
    pub fn policy(&self) -> Result<StartDatePolicy, String> {
        self.start_date_policy.parse()
    }
}

#[pymethods]
impl SchedulingConfig {
    #[new]
    #[pyo3(signature = (
        start_date_policy=None,
        horizon_days=None,
        closed_dates=None,
        verbosity=None
    ))]
    fn new(
        start_date_policy: Option<String>,
        horizon_days: Option<u32>,
        closed_dates: Option<Vec<(NaiveDate, NaiveDate)>>,
        verbosity: Option<u8>,
    ) -> Self {
        let defaults = Self::default();
        Self {
            start_date_policy: start_date_policy.unwrap_or(defaults.start_date_policy),
            horizon_days: horizon_days.unwrap_or(defaults.horizon_days),
            closed_dates: closed_dates.unwrap_or(defaults.closed_dates),
            verbosity: verbosity.unwrap_or(defaults.verbosity),
        }
    }

    fn __repr__(&self) -> String {
        format!(
            "SchedulingConfig(start_date_policy={:?}, horizon_days={}, closed_periods={})",
            self.start_date_policy,
            self.horizon_days,
            self.closed_dates.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SchedulingConfig::default();
        assert_eq!(config.policy(), Ok(StartDatePolicy::EarlierWins));
        assert_eq!(config.horizon_days, DEFAULT_HORIZON_DAYS);
        assert!(config.closed_dates.is_empty());
    }

    #[test]
    fn test_unknown_policy() {
        let config = SchedulingConfig {
            start_date_policy: "whatever".to_string(),
            ..SchedulingConfig::default()
        };
        assert_eq!(config.policy(), Err("whatever".to_string()));
    }
}
