//! Binary segmentation for changepoint detection.
//!
//! Greedy top-down search: at each step, the split with the largest cost
//! reduction over all current segments is accepted while that reduction
//! exceeds the penalty.

use super::cost::{CostModel, SegmentCost};
use super::{check_search_params, effective_min_size, BreakpointDetector};
use crate::error::Result;
use std::collections::HashMap;

/// Binary segmentation detector.
#[derive(Debug, Clone)]
pub struct BinSeg {
    pub model: CostModel,
    pub penalty: f64,
    pub min_size: usize,
    pub jump: usize,
}

impl Default for BinSeg {
    fn default() -> Self {
        Self {
            model: CostModel::L2,
            penalty: 3.0,
            min_size: 2,
            jump: 5,
        }
    }
}

impl BinSeg {
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

    /// Best single split of `[start, end)` as `(split, gain)`.
    ///
    /// Ties on gain resolve to the later split.
    fn best_split(
        &self,
        cost: &SegmentCost<'_>,
        min_size: usize,
        start: usize,
        end: usize,
    ) -> Option<(usize, f64)> {
        let whole = cost.error(start, end);
        let mut best: Option<(usize, f64)> = None;
        for split in (start..end).step_by(self.jump) {
            if split - start < min_size || end - split < min_size {
                continue;
            }
            let gain = whole - cost.error(start, split) - cost.error(split, end);
            let better = match best {
                None => true,
                Some((_, best_gain)) => gain >= best_gain,
            };
            if better {
                best = Some((split, gain));
            }
        }
        best
    }
}

impl BreakpointDetector for BinSeg {
    fn detect(&self, series: &[f64]) -> Result<Vec<usize>> {
        check_search_params(self.penalty, self.jump)?;

        let n = series.len();
        let min_size = effective_min_size(self.min_size, self.model);
        if n < 2 * min_size {
            return Ok(vec![n]);
        }

        let cost = SegmentCost::new(series, self.model);
        let mut cache: HashMap<(usize, usize), Option<(usize, f64)>> = HashMap::new();
        let mut breakpoints = vec![n];

        loop {
            let mut best: Option<(usize, f64)> = None;
            let mut start = 0;
            for &end in &breakpoints {
                let candidate = *cache
                    .entry((start, end))
                    .or_insert_with(|| self.best_split(&cost, min_size, start, end));
                if let Some((split, gain)) = candidate {
                    if best.is_none_or(|(_, best_gain)| gain > best_gain) {
                        best = Some((split, gain));
                    }
                }
                start = end;
            }

            match best {
                Some((split, gain)) if gain > self.penalty => {
                    let pos = breakpoints.partition_point(|&b| b < split);
                    breakpoints.insert(pos, split);
                }
                _ => break,
            }
        }

        Ok(breakpoints)
    }

    fn name(&self) -> &str {
        "BinSeg"
    }
}
