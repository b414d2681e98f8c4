//! Core data structures for hourly load features.

mod table;
mod time;

pub use table::{Column, FeatureTable, FeatureTableBuilder, RetainedSamples, DATETIME_COLUMN};
pub use time::{hours, median_timestamp};
