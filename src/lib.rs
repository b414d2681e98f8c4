//! # anofox-charging
//!
//! Electric-vehicle charging session detection in hourly smart-meter data.
//!
//! Detection runs in three stages:
//!
//! 1. a pluggable changepoint detector ([`changepoint`]) is run on every
//!    load feature (total energy, peak power, power range);
//! 2. per-feature breakpoints are fused into consensus breakpoints backed by
//!    several features ([`consensus`]);
//! 3. consensus breakpoints are paired into start/end sessions by how the
//!    peak load moves around them ([`sessions`]).
//!
//! [`preprocess`] turns quarter-hour meter readings into the hourly feature
//! table and [`pipeline`] chains everything together.

// Allow some clippy warnings for cleaner code in specific cases
#![allow(clippy::needless_range_loop)]
#![allow(clippy::type_complexity)]

pub mod changepoint;
pub mod consensus;
pub mod core;
pub mod error;
pub mod pipeline;
pub mod preprocess;
pub mod report;
pub mod sessions;

pub use error::{ChargingError, Result};

pub mod prelude {
    pub use crate::changepoint::{BreakpointDetector, CostModel, DetectionMethod, DetectorConfig};
    pub use crate::consensus::{aggregate, Aggregation, AggregationConfig, ConsensusBreakpoint};
    pub use crate::core::FeatureTable;
    pub use crate::error::{ChargingError, Result};
    pub use crate::pipeline::{DetectionConfig, MeterSessions, SessionPipeline};
    pub use crate::preprocess::{hourly_features, MeterReading};
    pub use crate::report::SessionReport;
    pub use crate::sessions::{detect_sessions, SessionConfig, SessionInterval};
}
