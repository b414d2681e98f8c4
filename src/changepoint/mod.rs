//! Changepoint detection algorithms.
//!
//! The breakpoint source of the pipeline: each detector takes one numeric
//! series and returns strictly increasing breakpoint indices, terminated by
//! a sentinel equal to the series length.
//!
//! # Available Algorithms
//!
//! - **PELT**: Pruned Exact Linear Time - exact penalised search
//! - **BinSeg**: greedy binary segmentation
//! - **Window**: sliding-window discrepancy peaks
//! - **BottomUp**: greedy merging of a fine initial partition
//!
//! All detectors search a grid of candidate indices spaced `jump` samples
//! apart and never emit segments shorter than the minimum segment length.
//!
//! # Example
//!
//! ```
//! use anofox_charging::changepoint::{detect_breakpoints, DetectorConfig};
//!
//! // Create series with a level shift
//! let mut series = vec![0.0; 50];
//! series.extend(vec![10.0; 50]);
//!
//! let config = DetectorConfig::default().penalty(5.0);
//! let breakpoints = detect_breakpoints(&series, &config).unwrap();
//!
//! // One changepoint plus the trailing sentinel
//! assert_eq!(breakpoints, vec![50, 100]);
//! ```

pub mod binseg;
pub mod bottomup;
pub mod cost;
pub mod pelt;
pub mod window;

pub use binseg::BinSeg;
pub use bottomup::BottomUp;
pub use cost::{l1_cost, l2_cost, CostModel, SegmentCost};
pub use pelt::Pelt;
pub use window::SlidingWindow;

use crate::error::{ChargingError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Common interface for all breakpoint detectors.
///
/// This trait is object-safe and can be used with `Box<dyn BreakpointDetector>`.
pub trait BreakpointDetector: Send + Sync {
    /// Detect breakpoints in `series`.
    ///
    /// Returns strictly increasing indices whose last element is
    /// `series.len()`.
    fn detect(&self, series: &[f64]) -> Result<Vec<usize>>;

    /// Get the detector name.
    fn name(&self) -> &str;
}

/// Type alias for boxed detector trait objects.
pub type BoxedDetector = Box<dyn BreakpointDetector>;

/// Changepoint search method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectionMethod {
    #[default]
    Pelt,
    BinSeg,
    Window,
    BottomUp,
}

impl DetectionMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            DetectionMethod::Pelt => "pelt",
            DetectionMethod::BinSeg => "binseg",
            DetectionMethod::Window => "window",
            DetectionMethod::BottomUp => "bottomup",
        }
    }
}

impl fmt::Display for DetectionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DetectionMethod {
    type Err = ChargingError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pelt" => Ok(DetectionMethod::Pelt),
            "binseg" => Ok(DetectionMethod::BinSeg),
            "window" => Ok(DetectionMethod::Window),
            "bottomup" => Ok(DetectionMethod::BottomUp),
            other => Err(ChargingError::UnsupportedMethod(other.to_string())),
        }
    }
}

/// Configuration for the built-in detectors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Search method
    pub method: DetectionMethod,
    /// Segment cost model
    pub model: CostModel,
    /// Minimum segment length, in samples (hours)
    pub min_size_hours: usize,
    /// Penalty per changepoint; higher values yield fewer changepoints
    pub penalty: f64,
    /// Window width for the `window` method, in samples
    pub window_width: usize,
    /// Spacing of the candidate index grid
    pub jump: usize,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            method: DetectionMethod::Pelt,
            model: CostModel::L2,
            min_size_hours: 2,
            penalty: 3.0,
            window_width: 10,
            jump: 5,
        }
    }
}

impl DetectorConfig {
    pub fn method(mut self, method: DetectionMethod) -> Self {
        self.method = method;
        self
    }

    /// Set the method by name (`pelt`, `binseg`, `window`, `bottomup`).
    pub fn method_name(self, name: &str) -> Result<Self> {
        Ok(self.method(name.parse()?))
    }

    pub fn model(mut self, model: CostModel) -> Self {
        self.model = model;
        self
    }

    /// Set the cost model by name (`l1`, `l2`).
    pub fn model_name(self, name: &str) -> Result<Self> {
        Ok(self.model(name.parse()?))
    }

    pub fn min_size_hours(mut self, min_size: usize) -> Self {
        self.min_size_hours = min_size;
        self
    }

    pub fn penalty(mut self, penalty: f64) -> Self {
        self.penalty = penalty;
        self
    }

    pub fn window_width(mut self, width: usize) -> Self {
        self.window_width = width;
        self
    }

    pub fn jump(mut self, jump: usize) -> Self {
        self.jump = jump;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.min_size_hours < 1 {
            return Err(ChargingError::InvalidParameter(
                "min_size_hours must be at least 1".to_string(),
            ));
        }
        if !(self.penalty.is_finite() && self.penalty > 0.0) {
            return Err(ChargingError::InvalidParameter(format!(
                "penalty must be positive; got {}",
                self.penalty
            )));
        }
        if self.jump < 1 {
            return Err(ChargingError::InvalidParameter(
                "jump must be at least 1".to_string(),
            ));
        }
        if self.method == DetectionMethod::Window {
            let min_size = effective_min_size(self.min_size_hours, self.model);
            if self.window_width / 2 < min_size {
                return Err(ChargingError::InvalidParameter(format!(
                    "window_width {} is too small for segments of at least {min_size} samples",
                    self.window_width
                )));
            }
        }
        Ok(())
    }

    /// Build the configured detector.
    pub fn build(&self) -> Result<BoxedDetector> {
        self.validate()?;
        let detector: BoxedDetector = match self.method {
            DetectionMethod::Pelt => Box::new(
                Pelt::new(self.model)
                    .min_size(self.min_size_hours)
                    .jump(self.jump)
                    .penalty(self.penalty),
            ),
            DetectionMethod::BinSeg => Box::new(
                BinSeg::new(self.model)
                    .min_size(self.min_size_hours)
                    .jump(self.jump)
                    .penalty(self.penalty),
            ),
            DetectionMethod::Window => Box::new(
                SlidingWindow::new(self.model, self.window_width)
                    .min_size(self.min_size_hours)
                    .jump(self.jump)
                    .penalty(self.penalty),
            ),
            DetectionMethod::BottomUp => Box::new(
                BottomUp::new(self.model)
                    .min_size(self.min_size_hours)
                    .jump(self.jump)
                    .penalty(self.penalty),
            ),
        };
        Ok(detector)
    }
}

/// Detect breakpoints with the detector described by `config`.
pub fn detect_breakpoints(series: &[f64], config: &DetectorConfig) -> Result<Vec<usize>> {
    config.build()?.detect(series)
}

/// Minimum segment length actually enforced for `model`.
pub(crate) fn effective_min_size(min_size: usize, model: CostModel) -> usize {
    min_size.max(model.min_size())
}

pub(crate) fn check_search_params(penalty: f64, jump: usize) -> Result<()> {
    if jump == 0 {
        return Err(ChargingError::InvalidParameter(
            "jump must be at least 1".to_string(),
        ));
    }
    if !(penalty.is_finite() && penalty >= 0.0) {
        return Err(ChargingError::InvalidParameter(format!(
            "penalty must be finite and non-negative; got {penalty}"
        )));
    }
    Ok(())
}

/// Whether `split` keeps every segment of `selected` (plus the series end)
/// at least `min_size` long.
pub(crate) fn can_insert_split(selected: &[usize], split: usize, min_size: usize, n: usize) -> bool {
    match selected.binary_search(&split) {
        Ok(_) => false,
        Err(pos) => {
            let prev = if pos == 0 { 0 } else { selected[pos - 1] };
            let next = selected.get(pos).copied().unwrap_or(n);
            split.saturating_sub(prev) >= min_size && next.saturating_sub(split) >= min_size
        }
    }
}
