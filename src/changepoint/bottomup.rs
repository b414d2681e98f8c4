//! Bottom-up segmentation for changepoint detection.
//!
//! The series is first cut into a fine partition on the candidate grid by
//! repeatedly halving the longest segment. Adjacent segments are then merged
//! greedily, cheapest merge first, while the merge cost stays below the
//! penalty.

use super::cost::{CostModel, SegmentCost};
use super::{check_search_params, effective_min_size, BreakpointDetector};
use crate::error::Result;

/// Bottom-up detector.
#[derive(Debug, Clone)]
pub struct BottomUp {
    pub model: CostModel,
    pub penalty: f64,
    pub min_size: usize,
    pub jump: usize,
}

impl Default for BottomUp {
    fn default() -> Self {
        Self {
            model: CostModel::L2,
            penalty: 3.0,
            min_size: 2,
            jump: 5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct SegmentNode {
    start: usize,
    end: usize,
    cost: f64,
}

impl BottomUp {
    pub fn new(model: CostModel) -> Self {
        Self {
            model,
            ..Default::default()
        }
    }

    pub fn penalty(mut self, penalty: f64) -> Self {
        self.penalty = penalty;
        self
    }

    pub fn min_size(mut self, min_len: usize) -> Self {
        self.min_size = min_len.max(1);
        self
    }

    pub fn jump(mut self, jump: usize) -> Self {
        self.jump = jump;
        self
    }

    /// Initial partition: split the longest segment at the grid point
    /// closest to its middle until the longest one can no longer be split.
    fn initial_partition(&self, n: usize, min_size: usize) -> Vec<(usize, usize)> {
        let mut partition = vec![(0, n)];
        loop {
            let Some(longest) = partition
                .iter()
                .enumerate()
                .rev()
                .max_by_key(|(_, (start, end))| end - start)
                .map(|(i, _)| i)
            else {
                break;
            };
            let (start, end) = partition[longest];
            let first = start.div_ceil(self.jump) * self.jump;
            let split = (first..end)
                .step_by(self.jump)
                .filter(|&s| s - start >= min_size && end - s >= min_size)
                .min_by_key(|&s| (2 * s).abs_diff(start + end));
            let Some(split) = split else {
                break;
            };
            partition.remove(longest);
            partition.push((start, split));
            partition.push((split, end));
        }
        partition.sort_unstable();
        partition
    }
}

impl BreakpointDetector for BottomUp {
    fn detect(&self, series: &[f64]) -> Result<Vec<usize>> {
        check_search_params(self.penalty, self.jump)?;

        let n = series.len();
        let min_size = effective_min_size(self.min_size, self.model);
        if n < 2 * min_size {
            return Ok(vec![n]);
        }

        let cost = SegmentCost::new(series, self.model);
        let mut leaves: Vec<SegmentNode> = self
            .initial_partition(n, min_size)
            .into_iter()
            .map(|(start, end)| SegmentNode {
                start,
                end,
                cost: cost.error(start, end),
            })
            .collect();

        while leaves.len() > 1 {
            let mut best: Option<(usize, f64, f64)> = None;
            for (i, pair) in leaves.windows(2).enumerate() {
                let merged_cost = cost.error(pair[0].start, pair[1].end);
                let gain = merged_cost - pair[0].cost - pair[1].cost;
                if best.is_none_or(|(_, best_gain, _)| gain < best_gain) {
                    best = Some((i, gain, merged_cost));
                }
            }

            match best {
                Some((i, gain, merged_cost)) if gain < self.penalty => {
                    let right = leaves.remove(i + 1);
                    leaves[i].end = right.end;
                    leaves[i].cost = merged_cost;
                }
                _ => break,
            }
        }

        Ok(leaves.iter().map(|leaf| leaf.end).collect())
    }

    fn name(&self) -> &str {
        "BottomUp"
    }
}
