//! Timestamp helpers shared by the aggregator and the session classifier.

use crate::error::{ChargingError, Result};
use chrono::{DateTime, Duration, Utc};

const MILLIS_PER_HOUR: f64 = 3_600_000.0;

/// Convert a (possibly fractional) number of hours to a [`Duration`].
///
/// Resolution is one millisecond. Negative or non-finite values are rejected.
pub fn hours(value: f64) -> Result<Duration> {
    if !value.is_finite() || value < 0.0 {
        return Err(ChargingError::InvalidParameter(format!(
            "hours must be a finite, non-negative number; got {value}"
        )));
    }
    Duration::try_milliseconds((value * MILLIS_PER_HOUR).round() as i64).ok_or_else(|| {
        ChargingError::InvalidParameter(format!("{value} hours is out of range"))
    })
}

/// Median of a set of timestamps.
///
/// Odd counts take the middle order statistic; even counts interpolate
/// halfway between the two middle ones. `None` for an empty slice.
pub fn median_timestamp(timestamps: &[DateTime<Utc>]) -> Option<DateTime<Utc>> {
    if timestamps.is_empty() {
        return None;
    }
    let mut sorted = timestamps.to_vec();
    sorted.sort_unstable();
    let n = sorted.len();
    if n.is_multiple_of(2) {
        let (lo, hi) = (sorted[n / 2 - 1], sorted[n / 2]);
        Some(lo + (hi - lo) / 2)
    } else {
        Some(sorted[n / 2])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, h, m, s).unwrap()
    }

    #[test]
    fn hours_converts_fractions() {
        assert_eq!(hours(4.0).unwrap(), Duration::hours(4));
        assert_eq!(hours(0.5).unwrap(), Duration::minutes(30));
        assert_eq!(hours(0.0).unwrap(), Duration::zero());
    }

    #[test]
    fn hours_rejects_invalid_values() {
        assert!(hours(-1.0).is_err());
        assert!(hours(f64::NAN).is_err());
        assert!(hours(f64::INFINITY).is_err());
    }

    #[test]
    fn median_timestamp_empty() {
        assert_eq!(median_timestamp(&[]), None);
    }

    #[test]
    fn median_timestamp_odd() {
        let ts = vec![at(12, 0, 0), at(10, 0, 0), at(11, 0, 0)];
        assert_eq!(median_timestamp(&ts), Some(at(11, 0, 0)));
    }

    #[test]
    fn median_timestamp_even_interpolates() {
        let ts = vec![at(10, 0, 0), at(10, 3, 0)];
        assert_eq!(median_timestamp(&ts), Some(at(10, 1, 30)));
    }

    #[test]
    fn median_timestamp_counts_duplicates() {
        let ts = vec![at(10, 0, 0), at(10, 0, 0), at(10, 0, 0), at(14, 0, 0)];
        assert_eq!(median_timestamp(&ts), Some(at(10, 0, 0)));
    }
}
