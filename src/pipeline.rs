//! End-to-end session detection.
//!
//! [`SessionPipeline`] chains changepoint aggregation and session
//! classification for one meter's feature table, or preprocesses raw
//! quarter-hour readings of many meters into a [`SessionReport`].
//!
//! # Example
//!
//! ```
//! use anofox_charging::pipeline::SessionPipeline;
//! use anofox_charging::preprocess::MeterReading;
//! use chrono::{Duration, TimeZone, Utc};
//!
//! let base = Utc.with_ymd_and_hms(2024, 4, 1, 0, 0, 0).unwrap();
//! // 0.75 kWh per quarter (3 kW), with 2 kWh per quarter (8 kW) over 20h..25h.
//! let readings: Vec<MeterReading> = (0..4 * 48)
//!     .map(|q| {
//!         let kwh = if (4 * 20..4 * 25).contains(&q) { 2.0 } else { 0.75 };
//!         MeterReading::new("E1", base + Duration::minutes(15 * q), kwh)
//!     })
//!     .collect();
//!
//! let report = SessionPipeline::default().run_readings(&readings).unwrap();
//! let sessions = report.meter_sessions("E1");
//! assert_eq!(sessions.len(), 1);
//! assert_eq!(sessions[0].start, base + Duration::hours(20));
//! assert_eq!(sessions[0].end, base + Duration::hours(25));
//! ```

use crate::consensus::{aggregate, Aggregation, AggregationConfig};
use crate::core::FeatureTable;
use crate::error::Result;
use crate::preprocess::{hourly_features, partition_by_meter, MeterReading};
use crate::report::SessionReport;
use crate::sessions::{detect_sessions, SessionConfig, SessionInterval};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

/// The complete configuration surface.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    pub aggregation: AggregationConfig,
    pub sessions: SessionConfig,
}

impl DetectionConfig {
    pub fn aggregation(mut self, aggregation: AggregationConfig) -> Self {
        self.aggregation = aggregation;
        self
    }

    pub fn sessions(mut self, sessions: SessionConfig) -> Self {
        self.sessions = sessions;
        self
    }

    pub fn validate(&self) -> Result<()> {
        self.aggregation.validate()?;
        self.sessions.validate()
    }
}

/// Consensus breakpoints and sessions of one meter.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MeterSessions {
    pub aggregation: Aggregation,
    pub sessions: Vec<SessionInterval>,
}

/// Aggregation followed by session classification.
#[derive(Debug, Clone, Default)]
pub struct SessionPipeline {
    config: DetectionConfig,
}

impl SessionPipeline {
    pub fn new(config: DetectionConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &DetectionConfig {
        &self.config
    }

    /// Detect sessions in one meter's hourly feature table.
    pub fn run(&self, table: &FeatureTable) -> Result<MeterSessions> {
        let aggregation = aggregate(table, &self.config.aggregation)?;
        let sessions = detect_sessions(table, &aggregation, &self.config.sessions)?;
        Ok(MeterSessions {
            aggregation,
            sessions,
        })
    }

    /// Detect sessions for every meter in a batch of quarter-hour readings.
    ///
    /// The first error from any meter aborts the whole batch.
    pub fn run_readings(&self, readings: &[MeterReading]) -> Result<SessionReport> {
        let mut report = SessionReport::new();
        for (meter, readings) in partition_by_meter(readings) {
            let result = self.run_meter(&meter, &readings)?;
            report.extend(&meter, result.sessions);
        }
        info!(
            meters = report.meters().count(),
            sessions = report.len(),
            "session report complete"
        );
        Ok(report)
    }

    #[instrument(skip_all, fields(meter = %meter))]
    fn run_meter(&self, meter: &str, readings: &[MeterReading]) -> Result<MeterSessions> {
        let table = hourly_features(readings)?;
        self.run(&table)
    }
}
