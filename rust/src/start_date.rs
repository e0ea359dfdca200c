//! Start date resolution.
//!
//! An order may begin once its wafers have been through sequencing, grinding
//! and packaging: `wafer_in + sum(stage durations)`. An actual test start date
//! recorded on the order can override that, according to [`StartDatePolicy`].

use chrono::{Days, NaiveDate};
use std::fmt;
use std::str::FromStr;

use crate::models::Order;
use crate::parsing::Parsed;

/// How an order's actual test start date interacts with its standard start.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum StartDatePolicy {
    /// The actual test start date is optional and only wins when it is
    /// earlier than the process-implied standard start.
    #[default]
    EarlierWins,
    /// The actual test start date is mandatory and always wins.
    OverrideRequired,
}

impl StartDatePolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EarlierWins => "earlier_wins",
            Self::OverrideRequired => "override_required",
        }
    }
}

impl fmt::Display for StartDatePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StartDatePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "earlier_wins" => Ok(Self::EarlierWins),
            "override_required" => Ok(Self::OverrideRequired),
            other => Err(other.to_string()),
        }
    }
}

/// Resolved start for one order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Resolution {
    /// Earliest date allocation may begin. `None` means unschedulable.
    pub start: Option<NaiveDate>,
    /// Wafer-in date plus total stage lead time, when computable.
    pub standard_start: Option<NaiveDate>,
    pub warnings: Vec<String>,
}

/// Compute the process-implied start: wafer-in plus total stage lead time.
pub fn standard_start(order: &Order) -> Option<NaiveDate> {
    let wafer_in = order.wafer_in.get()?;
    wafer_in.checked_add_days(Days::new(order.stages.total_days()))
}

/// Resolve the earliest date scheduling may begin for `order`.
///
/// Data-quality problems never fail here: an unreadable wafer-in date leaves
/// the order unresolved under `EarlierWins`, and unreadable stage durations
/// count as zero. Each degradation is reported in `warnings`.
pub fn resolve_start_date(order: &Order, policy: StartDatePolicy) -> Resolution {
    let mut warnings = order.stages.warnings();

    match &order.wafer_in {
        Parsed::Missing if policy == StartDatePolicy::EarlierWins => {
            warnings.push("wafer_in: missing, start date unresolved".to_string());
        }
        Parsed::Invalid(raw) => {
            warnings.push(format!("wafer_in: unreadable date {raw:?}"));
        }
        _ => {}
    }
    if let Parsed::Invalid(raw) = &order.actual_test_start {
        warnings.push(format!("actual_test_start: unreadable date {raw:?} ignored"));
    }

    let standard = standard_start(order);
    let actual = order.actual_test_start.get();

    let start = match policy {
        StartDatePolicy::EarlierWins => match (standard, actual) {
            (Some(standard), Some(actual)) => Some(standard.min(actual)),
            (standard, _) => standard,
        },
        StartDatePolicy::OverrideRequired => actual,
    };

    Resolution {
        start,
        standard_start: standard,
        warnings,
    }
}

/// Resolve every order, preserving input order.
pub fn resolve_all(orders: &[Order], policy: StartDatePolicy) -> Vec<Resolution> {
    orders
        .iter()
        .map(|order| resolve_start_date(order, policy))
        .collect()
}
