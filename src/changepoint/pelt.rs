//! PELT (Pruned Exact Linear Time) algorithm for changepoint detection.
//!
//! An exact penalised search with O(n) average complexity.

use super::cost::{CostModel, SegmentCost};
use super::{check_search_params, effective_min_size, BreakpointDetector};
use crate::error::Result;

/// PELT detector.
#[derive(Debug, Clone)]
pub struct Pelt {
    /// Cost model to use
    pub model: CostModel,
    /// Penalty for each changepoint (controls number of changepoints)
    pub penalty: f64,
    /// Minimum segment length
    pub min_size: usize,
    /// Candidate grid spacing
    pub jump: usize,
}

impl Default for Pelt {
    fn default() -> Self {
        Self {
            model: CostModel::L2,
            penalty: 3.0,
            min_size: 2,
            jump: 5,
        }
    }
}

impl Pelt {
    pub fn new(model: CostModel) -> Self {
        Self {
            model,
            ..Default::default()
        }
    }

    /// Set the penalty.
    pub fn penalty(mut self, penalty: f64) -> Self {
        self.penalty = penalty;
        self
    }

    /// Set minimum segment length.
    pub fn min_size(mut self, min_len: usize) -> Self {
        self.min_size = min_len.max(1);
        self
    }

    /// Set the candidate grid spacing.
    pub fn jump(mut self, jump: usize) -> Self {
        self.jump = jump;
        self
    }
}

impl BreakpointDetector for Pelt {
    fn detect(&self, series: &[f64]) -> Result<Vec<usize>> {
        check_search_params(self.penalty, self.jump)?;

        let n = series.len();
        let min_size = effective_min_size(self.min_size, self.model);
        if n < 2 * min_size {
            return Ok(vec![n]);
        }

        let cost = SegmentCost::new(series, self.model);

        // f[t] = minimum penalised cost of segmenting series[0..t]
        let mut f = vec![f64::INFINITY; n + 1];
        f[0] = 0.0;

        // last[t] = optimal last changepoint for series[0..t]
        let mut last: Vec<usize> = vec![0; n + 1];

        // Segment ends on the grid, plus the series end
        let mut ends: Vec<usize> = (0..n)
            .step_by(self.jump)
            .filter(|&k| k >= min_size)
            .collect();
        ends.push(n);

        // R = set of admissible segment starts (pruned)
        let mut admissible: Vec<usize> = Vec::new();

        for &end in &ends {
            let new_start = ((end - min_size) / self.jump) * self.jump;
            if admissible.last() != Some(&new_start) {
                admissible.push(new_start);
            }

            // Starts that are not reachable segment ends drop out.
            admissible.retain(|&s| f[s].is_finite());

            let criteria: Vec<f64> = admissible
                .iter()
                .map(|&s| f[s] + cost.error(s, end) + self.penalty)
                .collect();

            let mut best_cost = f64::INFINITY;
            let mut best_start = 0;
            for (&s, &c) in admissible.iter().zip(&criteria) {
                if c < best_cost {
                    best_cost = c;
                    best_start = s;
                }
            }

            f[end] = best_cost;
            last[end] = best_start;

            // Pruning: remove candidates that can never be optimal
            let bound = best_cost + self.penalty;
            let mut kept = criteria.iter();
            admissible.retain(|_| kept.next().is_some_and(|&c| c <= bound));
        }

        // Backtrack to find changepoints
        let mut breakpoints = vec![n];
        let mut t = n;
        while t > 0 {
            let prev = last[t];
            if prev > 0 {
                breakpoints.push(prev);
            }
            t = prev;
        }
        breakpoints.reverse();

        Ok(breakpoints)
    }

    fn name(&self) -> &str {
        "PELT"
    }
}
