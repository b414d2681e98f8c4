//! Quarter-hour meter readings to hourly load features.
//!
//! Each reading is the energy (kWh) drawn from the grid over one quarter
//! hour. Readings are converted to average power (kW = kWh * 4), bucketed by
//! the hour they fall in, and reduced to the feature columns consumed by the
//! changepoint aggregator.

use crate::core::{FeatureTable, DATETIME_COLUMN};
use crate::error::{ChargingError, Result};
use chrono::{DateTime, Duration, DurationRound, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Total energy per hour.
pub const TOTAL_KWH: &str = "total_kwh";
/// Highest quarter-hour power within the hour.
pub const MAX_KW: &str = "max_kw";
/// Spread between the highest and lowest quarter-hour power.
pub const RANGE_KW: &str = "range_kw";

/// Readings per hour at quarter-hour resolution.
const QUARTERS_PER_HOUR: f64 = 4.0;

/// One quarter-hour consumption reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeterReading {
    /// Meter identifier (EAN)
    pub meter_id: String,
    pub timestamp: DateTime<Utc>,
    /// Energy drawn over the quarter hour; `NaN` when missing
    pub consumption_kwh: f64,
}

impl MeterReading {
    pub fn new(meter_id: impl Into<String>, timestamp: DateTime<Utc>, consumption_kwh: f64) -> Self {
        Self {
            meter_id: meter_id.into(),
            timestamp,
            consumption_kwh,
        }
    }

    /// Average power over the quarter hour.
    pub fn power_kw(&self) -> f64 {
        self.consumption_kwh * QUARTERS_PER_HOUR
    }
}

/// Group readings by meter, keeping input order within each meter.
pub fn partition_by_meter(readings: &[MeterReading]) -> BTreeMap<String, Vec<MeterReading>> {
    let mut meters: BTreeMap<String, Vec<MeterReading>> = BTreeMap::new();
    for reading in readings {
        meters
            .entry(reading.meter_id.clone())
            .or_default()
            .push(reading.clone());
    }
    meters
}

#[derive(Debug, Default)]
struct HourBucket {
    total_kwh: f64,
    max_kw: Option<f64>,
    min_kw: Option<f64>,
}

impl HourBucket {
    fn push(&mut self, reading: &MeterReading) {
        if reading.consumption_kwh.is_nan() {
            return;
        }
        let kw = reading.power_kw();
        self.total_kwh += reading.consumption_kwh;
        self.max_kw = Some(self.max_kw.map_or(kw, |m| m.max(kw)));
        self.min_kw = Some(self.min_kw.map_or(kw, |m| m.min(kw)));
    }
}

/// Build the hourly feature table for the readings of one meter.
///
/// Hours without any reading are left out of the axis. An hour whose
/// readings are all missing has zero total energy and missing power
/// features. The result carries its time axis as a `datetime` column.
pub fn hourly_features(readings: &[MeterReading]) -> Result<FeatureTable> {
    if let Some(first) = readings.first() {
        if let Some(other) = readings.iter().find(|r| r.meter_id != first.meter_id) {
            return Err(ChargingError::InvalidParameter(format!(
                "readings mix meters '{}' and '{}'",
                first.meter_id, other.meter_id
            )));
        }
    }

    let mut buckets: BTreeMap<DateTime<Utc>, HourBucket> = BTreeMap::new();
    for reading in readings {
        let hour = reading
            .timestamp
            .duration_trunc(Duration::hours(1))
            .map_err(|e| ChargingError::InvalidParameter(format!("cannot bucket reading: {e}")))?;
        buckets.entry(hour).or_default().push(reading);
    }

    let n = buckets.len();
    let mut datetime = Vec::with_capacity(n);
    let mut total_kwh = Vec::with_capacity(n);
    let mut max_kw = Vec::with_capacity(n);
    let mut range_kw = Vec::with_capacity(n);
    for (hour, bucket) in buckets {
        datetime.push(hour);
        total_kwh.push(bucket.total_kwh);
        max_kw.push(bucket.max_kw.unwrap_or(f64::NAN));
        range_kw.push(match (bucket.max_kw, bucket.min_kw) {
            (Some(max), Some(min)) => max - min,
            _ => f64::NAN,
        });
    }

    debug!(readings = readings.len(), hours = n, "built hourly features");

    FeatureTable::builder()
        .datetime_column(DATETIME_COLUMN, datetime)
        .column(TOTAL_KWH, total_kwh)
        .column(MAX_KW, max_kw)
        .column(RANGE_KW, range_kw)
        .build()
}
