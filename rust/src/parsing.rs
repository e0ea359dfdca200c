//! Typed parsing of raw order-table cells.
//!
//! Cells arrive as optional text from the spreadsheet extraction layer. Every
//! parser returns a [`Parsed`] so callers can tell an empty cell apart from an
//! unreadable one, and a zero-day stage apart from an unknown one.

use chrono::{Days, NaiveDate, NaiveDateTime};

/// Outcome of parsing a single cell.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Parsed<T> {
    /// The cell held a usable value.
    Value(T),
    /// The cell was absent or blank.
    Missing,
    /// The cell held text that could not be interpreted (original text kept).
    Invalid(String),
}

impl<T> Parsed<T> {
    /// The parsed value, if any.
    pub fn value(&self) -> Option<&T> {
        match self {
            Parsed::Value(v) => Some(v),
            _ => None,
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Parsed::Missing)
    }
}

impl<T: Copy> Parsed<T> {
    /// Copy out the parsed value, if any.
    pub fn get(&self) -> Option<T> {
        self.value().copied()
    }
}

/// Spreadsheet serial day zero (1899-12-30).
fn serial_epoch() -> NaiveDate {
    NaiveDate::from_ymd_opt(1899, 12, 30).unwrap_or(NaiveDate::MIN)
}

/// Largest serial a spreadsheet can hold (9999-12-31).
const MAX_SERIAL: f64 = 2_958_465.0;

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d"];

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y/%m/%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
];

fn non_blank(cell: Option<&str>) -> Option<&str> {
    cell.map(str::trim).filter(|s| !s.is_empty())
}

/// Convert a spreadsheet serial day number into a calendar date.
///
/// The fractional (time-of-day) part is discarded.
pub fn date_from_serial(serial: f64) -> Option<NaiveDate> {
    if !serial.is_finite() || serial < 1.0 || serial > MAX_SERIAL {
        return None;
    }
    serial_epoch().checked_add_days(Days::new(serial.trunc() as u64))
}

/// Parse a date cell.
///
/// Accepts ISO-like dates (`2024-01-05`, `2024/01/05`), date-times whose time
/// part is dropped, and spreadsheet serial numbers.
pub fn parse_date(cell: Option<&str>) -> Parsed<NaiveDate> {
    let Some(text) = non_blank(cell) else {
        return Parsed::Missing;
    };

    for fmt in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(text, fmt) {
            return Parsed::Value(date);
        }
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(text, fmt) {
            return Parsed::Value(dt.date());
        }
    }
    if let Ok(serial) = text.parse::<f64>() {
        if let Some(date) = date_from_serial(serial) {
            return Parsed::Value(date);
        }
    }

    Parsed::Invalid(text.to_string())
}

/// Parse a stage duration cell as a whole, non-negative number of days.
///
/// Integral floats (`"3.0"`) are accepted since spreadsheets often store
/// integers that way.
pub fn parse_days(cell: Option<&str>) -> Parsed<u32> {
    let Some(text) = non_blank(cell) else {
        return Parsed::Missing;
    };

    if let Ok(days) = text.parse::<u32>() {
        return Parsed::Value(days);
    }
    match text.parse::<f64>() {
        Ok(days)
            if days.is_finite()
                && days >= 0.0
                && days.fract() == 0.0
                && days <= u32::MAX as f64 =>
        {
            Parsed::Value(days as u32)
        }
        _ => Parsed::Invalid(text.to_string()),
    }
}
