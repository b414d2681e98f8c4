//! Changepoint aggregation across feature series.
//!
//! Each numeric feature is run through a breakpoint detector on its own
//! non-missing samples. The resulting per-feature timestamps are grouped
//! with a seed-anchored tolerance window, and every group backed by enough
//! distinct features collapses to one consensus breakpoint at the median
//! member time.
//!
//! # Example
//!
//! ```
//! use anofox_charging::consensus::{aggregate, AggregationConfig};
//! use anofox_charging::core::FeatureTable;
//! use chrono::{Duration, TimeZone, Utc};
//!
//! let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
//! let timestamps: Vec<_> = (0..40).map(|i| base + Duration::hours(i)).collect();
//! let level = |i: usize| if (20..30).contains(&i) { 8.0 } else { 1.0 };
//!
//! let table = FeatureTable::builder()
//!     .index(timestamps)
//!     .column("max_kw", (0..40).map(level).collect())
//!     .column("total_kwh", (0..40).map(|i| level(i) / 2.0).collect())
//!     .build()
//!     .unwrap();
//!
//! let aggregation = aggregate(&table, &AggregationConfig::default()).unwrap();
//! assert_eq!(aggregation.timestamps(), vec![base + Duration::hours(20), base + Duration::hours(30)]);
//! ```

mod grouping;

pub use grouping::{
    group_breakpoints, sort_breakpoints, BreakpointGroup, ConsensusBreakpoint, RawBreakpoint,
};

use crate::changepoint::{BreakpointDetector, DetectorConfig};
use crate::core::{hours, FeatureTable};
use crate::error::{ChargingError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info};

/// Configuration for [`aggregate`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregationConfig {
    /// Breakpoint detector settings
    pub detector: DetectorConfig,
    /// How far, in hours, a breakpoint may lie from a group seed to join it
    pub merge_tolerance_hours: f64,
    /// Minimum number of distinct features behind a consensus breakpoint
    pub n_contributing_features: usize,
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            detector: DetectorConfig::default(),
            merge_tolerance_hours: 4.0,
            n_contributing_features: 2,
        }
    }
}

impl AggregationConfig {
    pub fn detector(mut self, detector: DetectorConfig) -> Self {
        self.detector = detector;
        self
    }

    pub fn merge_tolerance_hours(mut self, tolerance: f64) -> Self {
        self.merge_tolerance_hours = tolerance;
        self
    }

    pub fn n_contributing_features(mut self, n: usize) -> Self {
        self.n_contributing_features = n;
        self
    }

    pub fn validate(&self) -> Result<()> {
        self.detector.validate()?;
        hours(self.merge_tolerance_hours)?;
        if self.n_contributing_features < 1 {
            return Err(ChargingError::InvalidParameter(
                "n_contributing_features must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Consensus breakpoints of one table, in ascending time order.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Aggregation {
    breakpoints: Vec<ConsensusBreakpoint>,
}

impl Aggregation {
    pub fn new(breakpoints: Vec<ConsensusBreakpoint>) -> Self {
        Self { breakpoints }
    }

    pub fn breakpoints(&self) -> &[ConsensusBreakpoint] {
        &self.breakpoints
    }

    /// Consensus timestamps in ascending order.
    pub fn timestamps(&self) -> Vec<DateTime<Utc>> {
        self.breakpoints.iter().map(|b| b.timestamp).collect()
    }

    /// Contributing features keyed by consensus timestamp.
    ///
    /// Should two groups share a median timestamp, their features are merged.
    pub fn contributing_features(&self) -> BTreeMap<DateTime<Utc>, BTreeSet<String>> {
        let mut map: BTreeMap<DateTime<Utc>, BTreeSet<String>> = BTreeMap::new();
        for bkp in &self.breakpoints {
            map.entry(bkp.timestamp)
                .or_default()
                .extend(bkp.features.iter().cloned());
        }
        map
    }

    /// Every feature that contributed to at least one consensus breakpoint,
    /// sorted by name.
    pub fn feature_names(&self) -> BTreeSet<&str> {
        self.breakpoints
            .iter()
            .flat_map(|b| b.features.iter().map(String::as_str))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.breakpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.breakpoints.is_empty()
    }
}

/// Aggregate changepoints with the detector described by `config`.
pub fn aggregate(table: &FeatureTable, config: &AggregationConfig) -> Result<Aggregation> {
    config.validate()?;
    let detector = config.detector.build()?;
    aggregate_with(table, config, detector.as_ref())
}

/// Aggregate changepoints using a caller-supplied detector.
///
/// `config.detector` only contributes `min_size_hours`, which decides
/// whether a feature has enough samples to be searched at all.
pub fn aggregate_with(
    table: &FeatureTable,
    config: &AggregationConfig,
    detector: &dyn BreakpointDetector,
) -> Result<Aggregation> {
    config.validate()?;
    let tolerance = hours(config.merge_tolerance_hours)?;
    let table = table.clone().with_datetime_index()?;
    let timestamps = table.timestamps()?;

    let features: Vec<&str> = table.numeric_columns().map(|(name, _)| name).collect();
    let per_feature = detect_per_feature(&table, &features, config, detector)?;

    let mut raw: Vec<RawBreakpoint> = Vec::new();
    for (feature, positions) in per_feature {
        raw.extend(
            positions
                .into_iter()
                .map(|pos| RawBreakpoint::new(timestamps[pos], feature)),
        );
    }
    sort_breakpoints(&mut raw);

    let groups = group_breakpoints(&raw, tolerance);
    let breakpoints: Vec<ConsensusBreakpoint> = groups
        .iter()
        .filter_map(|group| {
            let consensus = group.consensus(config.n_contributing_features);
            if consensus.is_none() {
                debug!(
                    seed = %group.seed().timestamp,
                    features = group.features().len(),
                    "dropping weakly corroborated breakpoint group"
                );
            }
            consensus
        })
        .collect();

    debug_assert!(breakpoints
        .windows(2)
        .all(|w| w[0].timestamp <= w[1].timestamp));

    info!(
        features = features.len(),
        raw = raw.len(),
        groups = groups.len(),
        consensus = breakpoints.len(),
        "aggregated changepoints"
    );

    Ok(Aggregation { breakpoints })
}

/// Row positions of detected breakpoints, per feature, in column order.
fn detect_per_feature<'t>(
    table: &FeatureTable,
    features: &[&'t str],
    config: &AggregationConfig,
    detector: &dyn BreakpointDetector,
) -> Result<Vec<(&'t str, Vec<usize>)>> {
    let min_samples = 2 * config.detector.min_size_hours;
    let run = |feature: &'t str| -> Result<Option<(&'t str, Vec<usize>)>> {
        let samples = table.retained_samples(feature)?;
        if samples.len() < min_samples {
            debug!(
                feature,
                samples = samples.len(),
                min_samples,
                "skipping feature with too few samples"
            );
            return Ok(None);
        }

        let mut indices = detector.detect(&samples.values)?;
        // Drop the end-of-series sentinel.
        indices.pop();

        let mut positions = Vec::with_capacity(indices.len());
        for idx in indices {
            let pos = samples.positions.get(idx).copied().ok_or_else(|| {
                ChargingError::InvalidParameter(format!(
                    "detector {} returned index {idx} outside a series of {} samples",
                    detector.name(),
                    samples.len()
                ))
            })?;
            positions.push(pos);
        }
        debug!(feature, breakpoints = positions.len(), "detected feature breakpoints");
        Ok(Some((feature, positions)))
    };

    #[cfg(feature = "parallel")]
    let results: Vec<Result<Option<(&'t str, Vec<usize>)>>> = {
        use rayon::prelude::*;
        features.par_iter().map(|&f| run(f)).collect()
    };
    #[cfg(not(feature = "parallel"))]
    let results: Vec<Result<Option<(&'t str, Vec<usize>)>>> =
        features.iter().map(|&f| run(f)).collect();

    results.into_iter().filter_map(Result::transpose).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::FeatureTable;
    use chrono::{Duration, TimeZone};

    /// Detector returning fixed breakpoints per series length, for tests.
    struct FixedDetector {
        indices: Vec<usize>,
    }

    impl BreakpointDetector for FixedDetector {
        fn detect(&self, series: &[f64]) -> Result<Vec<usize>> {
            let mut out: Vec<usize> = self
                .indices
                .iter()
                .copied()
                .filter(|&i| i < series.len())
                .collect();
            out.push(series.len());
            Ok(out)
        }

        fn name(&self) -> &str {
            "Fixed"
        }
    }

    fn base() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    fn make_timestamps(n: usize) -> Vec<DateTime<Utc>> {
        (0..n).map(|i| base() + Duration::hours(i as i64)).collect()
    }

    #[test]
    fn empty_table_yields_empty_aggregation() {
        let aggregation = aggregate(&FeatureTable::empty(), &AggregationConfig::default()).unwrap();
        assert!(aggregation.is_empty());
        assert!(aggregation.contributing_features().is_empty());
    }

    #[test]
    fn table_without_axis_is_rejected() {
        let table = FeatureTable::builder()
            .column("max_kw", vec![1.0; 10])
            .build()
            .unwrap();
        assert!(matches!(
            aggregate(&table, &AggregationConfig::default()),
            Err(ChargingError::InputShape(_))
        ));
    }

    #[test]
    fn unknown_method_is_fatal() {
        let err = DetectorConfig::default().method_name("kernel").unwrap_err();
        assert!(matches!(err, ChargingError::UnsupportedMethod(_)));
    }

    #[test]
    fn short_features_are_skipped() {
        let table = FeatureTable::builder()
            .index(make_timestamps(3))
            .column("max_kw", vec![1.0, 5.0, 1.0])
            .column("total_kwh", vec![1.0, 5.0, 1.0])
            .build()
            .unwrap();
        let detector = FixedDetector { indices: vec![1] };
        let aggregation =
            aggregate_with(&table, &AggregationConfig::default(), &detector).unwrap();
        assert!(aggregation.is_empty());
    }

    #[test]
    fn breakpoints_map_through_retained_positions() {
        // "a" is missing its first two rows, so its sample 3 is row 5.
        let table = FeatureTable::builder()
            .index(make_timestamps(10))
            .column("a", vec![f64::NAN, f64::NAN, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0])
            .column("b", vec![1.0; 10])
            .build()
            .unwrap();
        let detector = FixedDetector { indices: vec![3] };
        let config = AggregationConfig::default().merge_tolerance_hours(1.0);
        let aggregation = aggregate_with(&table, &config, &detector).unwrap();

        // a -> row 5, b -> row 3: 2h apart, outside the 1h tolerance.
        assert!(aggregation.is_empty());

        let config = AggregationConfig::default().merge_tolerance_hours(2.0);
        let aggregation = aggregate_with(&table, &config, &detector).unwrap();
        assert_eq!(aggregation.timestamps(), vec![base() + Duration::hours(4)]);
    }

    #[test]
    fn datetime_column_is_used_as_axis() {
        let table = FeatureTable::builder()
            .datetime_column("datetime", make_timestamps(10))
            .column("a", vec![1.0; 10])
            .column("b", vec![2.0; 10])
            .build()
            .unwrap();
        let detector = FixedDetector { indices: vec![4] };
        let aggregation =
            aggregate_with(&table, &AggregationConfig::default(), &detector).unwrap();

        assert_eq!(aggregation.len(), 1);
        assert_eq!(aggregation.timestamps(), vec![base() + Duration::hours(4)]);
        assert_eq!(
            aggregation.feature_names().into_iter().collect::<Vec<_>>(),
            vec!["a", "b"]
        );
    }

    #[test]
    fn out_of_range_detector_index_is_an_error() {
        struct Broken;
        impl BreakpointDetector for Broken {
            fn detect(&self, series: &[f64]) -> Result<Vec<usize>> {
                Ok(vec![series.len() + 3, series.len()])
            }
            fn name(&self) -> &str {
                "Broken"
            }
        }

        let table = FeatureTable::builder()
            .index(make_timestamps(8))
            .column("a", vec![1.0; 8])
            .build()
            .unwrap();
        assert!(aggregate_with(&table, &AggregationConfig::default(), &Broken).is_err());
    }

    #[test]
    fn config_validation() {
        assert!(AggregationConfig::default().validate().is_ok());
        assert!(AggregationConfig::default()
            .merge_tolerance_hours(-1.0)
            .validate()
            .is_err());
        assert!(AggregationConfig::default()
            .n_contributing_features(0)
            .validate()
            .is_err());
    }

    #[test]
    fn contributing_features_merge_shared_timestamps() {
        let t = base();
        let aggregation = Aggregation::new(vec![
            ConsensusBreakpoint {
                timestamp: t,
                features: ["a".to_string(), "b".to_string()].into_iter().collect(),
            },
            ConsensusBreakpoint {
                timestamp: t,
                features: ["c".to_string(), "b".to_string()].into_iter().collect(),
            },
        ]);
        let map = aggregation.contributing_features();
        assert_eq!(map.len(), 1);
        assert_eq!(map[&t].len(), 3);
    }
}
