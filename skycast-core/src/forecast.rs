//! Deriving the daily view from the 3-hourly forecast series.

use crate::model::ForecastEntry;

/// Select one representative entry per calendar day.
///
/// The provider emits fixed 3-hour slots, so the time-of-day of the first
/// entry recurs exactly once on each following day. Entries whose
/// time-of-day matches it are kept in provider order. The anchor is
/// whatever slot the series happens to start at, not a fixed hour.
pub fn select_daily(series: &[ForecastEntry]) -> Vec<ForecastEntry> {
    let Some(first) = series.first() else {
        return Vec::new();
    };

    let reference = first.timestamp.time();

    series
        .iter()
        .filter(|entry| entry.timestamp.time() == reference)
        .cloned()
        .collect()
}
