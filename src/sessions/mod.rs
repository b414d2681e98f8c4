//! Charging session classification.
//!
//! Consensus breakpoints are scanned in time order. A breakpoint opens a
//! session when the peak load rises by more than a threshold around it, and
//! the immediately following breakpoint closes that session when the load
//! falls back by more than the threshold and the session is not too long.
//!
//! A closing breakpoint is not consumed: it is examined as a start candidate
//! in its own right on the next step, so chained sessions are possible.

use crate::consensus::Aggregation;
use crate::core::{hours, FeatureTable};
use crate::error::{ChargingError, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Longest accepted lookback/lookahead window, in hours (one year).
const MAX_WINDOW_HOURS: f64 = 8760.0;

/// Configuration for session classification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Column holding the hourly peak power
    pub peak_column: String,
    /// Minimum load change (kW) that counts as significant
    pub threshold: f64,
    /// Lookback and lookahead around each breakpoint, in hours
    pub window_hours: f64,
    /// Longest accepted session, in hours
    pub max_duration_hours: f64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            peak_column: "max_kw".to_string(),
            threshold: 1.0,
            window_hours: 2.0,
            max_duration_hours: 24.0,
        }
    }
}

impl SessionConfig {
    pub fn peak_column(mut self, column: impl Into<String>) -> Self {
        self.peak_column = column.into();
        self
    }

    pub fn threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn window_hours(mut self, window: f64) -> Self {
        self.window_hours = window;
        self
    }

    pub fn max_duration_hours(mut self, max_duration: f64) -> Self {
        self.max_duration_hours = max_duration;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.threshold.is_finite() && self.threshold >= 0.0) {
            return Err(ChargingError::InvalidParameter(format!(
                "threshold must be finite and non-negative; got {}",
                self.threshold
            )));
        }
        hours(self.window_hours)?;
        if self.window_hours > MAX_WINDOW_HOURS {
            return Err(ChargingError::InvalidParameter(format!(
                "window_hours must be at most {MAX_WINDOW_HOURS}; got {}",
                self.window_hours
            )));
        }
        hours(self.max_duration_hours)?;
        Ok(())
    }
}

/// One inferred charging event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SessionInterval {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl SessionInterval {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    /// Duration in fractional hours.
    pub fn duration_hours(&self) -> f64 {
        self.duration().num_seconds() as f64 / 3600.0
    }
}

/// Load levels around one breakpoint.
#[derive(Debug, Clone, Copy)]
struct LoadEdge {
    /// Lowest peak load in the lookback window
    before_min: Option<f64>,
    /// Highest peak load in the lookahead window
    after_max: Option<f64>,
    /// Lowest peak load in the lookahead window
    after_min: Option<f64>,
}

/// `a - b > threshold`, false when either side is an empty reduction.
fn exceeds(a: Option<f64>, b: Option<f64>, threshold: f64) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => a - b > threshold,
        _ => false,
    }
}

struct Classifier<'a> {
    table: &'a FeatureTable,
    config: &'a SessionConfig,
    window: Duration,
    max_duration: Duration,
}

impl Classifier<'_> {
    fn edge(&self, at: DateTime<Utc>) -> Result<LoadEdge> {
        let column = self.config.peak_column.as_str();
        let out_of_range = || {
            ChargingError::InvalidParameter(format!(
                "window of {} hours around {at} leaves the supported date range",
                self.config.window_hours
            ))
        };
        let lookback = at.checked_sub_signed(self.window).ok_or_else(out_of_range)?;
        let lookahead = at.checked_add_signed(self.window).ok_or_else(out_of_range)?;
        Ok(LoadEdge {
            before_min: self.table.window_min(column, lookback, at)?,
            after_max: self.table.window_max(column, at, lookahead)?,
            after_min: self.table.window_min(column, at, lookahead)?,
        })
    }

    fn classify(&self, breakpoints: &[DateTime<Utc>]) -> Result<Vec<SessionInterval>> {
        let edges = breakpoints
            .iter()
            .map(|&bkp| self.edge(bkp))
            .collect::<Result<Vec<_>>>()?;

        let mut sessions = Vec::new();
        for (i, (&start, edge)) in breakpoints.iter().zip(&edges).enumerate() {
            if !exceeds(edge.after_max, edge.before_min, self.config.threshold) {
                continue;
            }
            debug!(%start, "rising load edge");

            let Some((&end, end_edge)) = breakpoints.get(i + 1).zip(edges.get(i + 1)) else {
                debug!(%start, "no following breakpoint to close the session");
                continue;
            };

            if !exceeds(edge.after_max, end_edge.after_min, self.config.threshold) {
                debug!(%start, %end, "load does not fall back at next breakpoint");
                continue;
            }
            if end - start > self.max_duration {
                debug!(%start, %end, "session exceeds maximum duration");
                continue;
            }

            sessions.push(SessionInterval::new(start, end));
        }
        Ok(sessions)
    }
}

/// Pair consensus breakpoints into charging sessions.
///
/// `breakpoints` must be strictly increasing in time. Windows that hold no
/// non-missing peak load never satisfy the threshold.
pub fn classify_breakpoints(
    table: &FeatureTable,
    breakpoints: &[DateTime<Utc>],
    config: &SessionConfig,
) -> Result<Vec<SessionInterval>> {
    config.validate()?;
    let table = table.clone().with_datetime_index()?;
    // Fail on a missing or non-numeric peak column even without breakpoints.
    table.numeric_column(&config.peak_column)?;
    if let Some(pair) = breakpoints.windows(2).find(|w| w[1] <= w[0]) {
        return Err(ChargingError::InvalidParameter(format!(
            "breakpoints must be strictly increasing; {} is followed by {}",
            pair[0], pair[1]
        )));
    }

    let classifier = Classifier {
        table: &table,
        config,
        window: hours(config.window_hours)?,
        max_duration: hours(config.max_duration_hours)?,
    };
    let sessions = classifier.classify(breakpoints)?;

    info!(
        breakpoints = breakpoints.len(),
        sessions = sessions.len(),
        "classified charging sessions"
    );
    Ok(sessions)
}

/// Classify the consensus breakpoints of an [`Aggregation`].
pub fn detect_sessions(
    table: &FeatureTable,
    aggregation: &Aggregation,
    config: &SessionConfig,
) -> Result<Vec<SessionInterval>> {
    classify_breakpoints(table, &aggregation.timestamps(), config)
}
