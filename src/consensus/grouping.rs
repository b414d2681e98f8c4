//! Time-tolerance grouping of per-feature breakpoints.

use crate::core::median_timestamp;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// One detection event: a breakpoint found in one feature series.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawBreakpoint {
    pub timestamp: DateTime<Utc>,
    pub feature: String,
}

impl RawBreakpoint {
    pub fn new(timestamp: DateTime<Utc>, feature: impl Into<String>) -> Self {
        Self {
            timestamp,
            feature: feature.into(),
        }
    }
}

/// Raw breakpoints judged to describe the same real-world event.
///
/// The first member is the seed the tolerance window was anchored on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BreakpointGroup {
    members: Vec<RawBreakpoint>,
}

impl BreakpointGroup {
    pub fn seed(&self) -> &RawBreakpoint {
        &self.members[0]
    }

    pub fn members(&self) -> &[RawBreakpoint] {
        &self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Distinct contributing feature names.
    pub fn features(&self) -> BTreeSet<String> {
        self.members.iter().map(|m| m.feature.clone()).collect()
    }

    /// Median of all member timestamps, repeated features included.
    pub fn median_timestamp(&self) -> DateTime<Utc> {
        let timestamps: Vec<DateTime<Utc>> = self.members.iter().map(|m| m.timestamp).collect();
        // Groups always hold at least their seed.
        median_timestamp(&timestamps).unwrap_or(self.members[0].timestamp)
    }

    /// Collapse into a consensus breakpoint if at least `min_features`
    /// distinct features contributed.
    pub fn consensus(&self, min_features: usize) -> Option<ConsensusBreakpoint> {
        let features = self.features();
        if features.len() < min_features {
            return None;
        }
        Some(ConsensusBreakpoint {
            timestamp: self.median_timestamp(),
            features,
        })
    }
}

/// A breakpoint corroborated by several feature series.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsensusBreakpoint {
    /// Median timestamp of the group members.
    pub timestamp: DateTime<Utc>,
    /// Distinct features that contributed to the group.
    pub features: BTreeSet<String>,
}

/// Sort raw breakpoints by time, keeping encounter order among equal
/// timestamps.
pub fn sort_breakpoints(breakpoints: &mut [RawBreakpoint]) {
    breakpoints.sort_by_key(|b| b.timestamp);
}

/// Group time-sorted breakpoints.
///
/// Each not-yet-grouped point seeds a new group, which absorbs every later
/// ungrouped point within `tolerance` of the seed. Distance is measured from
/// the seed only, so a chain of close neighbours does not extend a group
/// beyond one tolerance window.
pub fn group_breakpoints(sorted: &[RawBreakpoint], tolerance: Duration) -> Vec<BreakpointGroup> {
    let mut used = vec![false; sorted.len()];
    let mut groups = Vec::new();

    for i in 0..sorted.len() {
        if used[i] {
            continue;
        }
        used[i] = true;
        let seed = sorted[i].timestamp;
        let mut members = vec![sorted[i].clone()];

        for j in i + 1..sorted.len() {
            if used[j] {
                continue;
            }
            if (sorted[j].timestamp - seed).abs() <= tolerance {
                members.push(sorted[j].clone());
                used[j] = true;
            }
        }

        groups.push(BreakpointGroup { members });
    }

    groups
}
