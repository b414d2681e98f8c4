//! Cost models for changepoint detection.
//!
//! A cost model evaluates how well a single constant-level model fits a
//! segment of data. Lower cost indicates a better fit.

use crate::error::ChargingError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Segment cost model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CostModel {
    /// L1 cost: sum of absolute deviations from median
    L1,
    /// L2 cost: sum of squared deviations from mean
    #[default]
    L2,
}

impl CostModel {
    pub fn as_str(&self) -> &'static str {
        match self {
            CostModel::L1 => "l1",
            CostModel::L2 => "l2",
        }
    }

    /// Smallest segment the model can score.
    pub fn min_size(&self) -> usize {
        2
    }
}

impl fmt::Display for CostModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CostModel {
    type Err = ChargingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "l1" => Ok(CostModel::L1),
            "l2" => Ok(CostModel::L2),
            other => Err(ChargingError::UnsupportedModel(other.to_string())),
        }
    }
}

/// L1 cost: sum of absolute deviations from median.
///
/// Robust to outliers.
pub fn l1_cost(segment: &[f64]) -> f64 {
    if segment.is_empty() {
        return 0.0;
    }

    let median = compute_median(segment);
    segment.iter().map(|x| (x - median).abs()).sum()
}

/// L2 cost: sum of squared deviations from mean.
///
/// Also known as residual sum of squares (RSS).
pub fn l2_cost(segment: &[f64]) -> f64 {
    if segment.is_empty() {
        return 0.0;
    }

    let mean = segment.iter().sum::<f64>() / segment.len() as f64;
    segment.iter().map(|x| (x - mean).powi(2)).sum()
}

/// Segment cost evaluator bound to one signal.
///
/// L2 costs are answered in O(1) from cumulative sums; L1 costs are computed
/// directly on the slice.
#[derive(Debug, Clone)]
pub struct SegmentCost<'a> {
    signal: &'a [f64],
    model: CostModel,
    cum_sum: Vec<f64>,
    cum_sum_sq: Vec<f64>,
}

impl<'a> SegmentCost<'a> {
    pub fn new(signal: &'a [f64], model: CostModel) -> Self {
        let (cum_sum, cum_sum_sq) = match model {
            CostModel::L2 => {
                let cum_sum = std::iter::once(0.0)
                    .chain(signal.iter().scan(0.0, |acc, &x| {
                        *acc += x;
                        Some(*acc)
                    }))
                    .collect();
                let cum_sum_sq = std::iter::once(0.0)
                    .chain(signal.iter().scan(0.0, |acc, &x| {
                        *acc += x * x;
                        Some(*acc)
                    }))
                    .collect();
                (cum_sum, cum_sum_sq)
            }
            CostModel::L1 => (Vec::new(), Vec::new()),
        };

        Self {
            signal,
            model,
            cum_sum,
            cum_sum_sq,
        }
    }

    pub fn len(&self) -> usize {
        self.signal.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signal.is_empty()
    }

    pub fn model(&self) -> CostModel {
        self.model
    }

    /// Cost of `signal[start..end]`.
    pub fn error(&self, start: usize, end: usize) -> f64 {
        if end <= start {
            return 0.0;
        }
        match self.model {
            CostModel::L2 => {
                // sum((x - mean)^2) = sum(x^2) - n*mean^2
                let n = (end - start) as f64;
                let sum = self.cum_sum[end] - self.cum_sum[start];
                let sum_sq = self.cum_sum_sq[end] - self.cum_sum_sq[start];
                (sum_sq - sum * sum / n).max(0.0)
            }
            CostModel::L1 => l1_cost(&self.signal[start..end]),
        }
    }

    /// Total cost of the segmentation described by `breakpoints`.
    ///
    /// `breakpoints` are sorted segment ends; the last one is normally the
    /// series length.
    pub fn sum_of_costs(&self, breakpoints: &[usize]) -> f64 {
        let mut total = 0.0;
        let mut start = 0;
        for &end in breakpoints {
            if end > start && end <= self.len() {
                total += self.error(start, end);
                start = end;
            }
        }
        if start < self.len() {
            total += self.error(start, self.len());
        }
        total
    }
}

/// Helper: compute median
fn compute_median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let n = sorted.len();
    if n.is_multiple_of(2) {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    } else {
        sorted[n / 2]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    // ==================== l1_cost ====================

    #[test]
    fn l1_cost_empty() {
        assert_relative_eq!(l1_cost(&[]), 0.0, epsilon = 1e-10);
    }

    #[test]
    fn l1_cost_constant() {
        let segment = vec![5.0; 10];
        assert_relative_eq!(l1_cost(&segment), 0.0, epsilon = 1e-10);
    }

    #[test]
    fn l1_cost_known() {
        // [1, 2, 3, 4, 5] -> median = 3
        // |1-3| + |2-3| + |3-3| + |4-3| + |5-3| = 2+1+0+1+2 = 6
        let segment = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        assert_relative_eq!(l1_cost(&segment), 6.0, epsilon = 1e-10);
    }

    // ==================== l2_cost ====================

    #[test]
    fn l2_cost_empty() {
        assert_relative_eq!(l2_cost(&[]), 0.0, epsilon = 1e-10);
    }

    #[test]
    fn l2_cost_known() {
        // [1, 2, 3, 4, 5] -> mean = 3
        // (1-3)² + (2-3)² + (3-3)² + (4-3)² + (5-3)² = 4+1+0+1+4 = 10
        let segment = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        assert_relative_eq!(l2_cost(&segment), 10.0, epsilon = 1e-10);
    }

    // ==================== SegmentCost ====================

    #[test]
    fn segment_cost_matches_direct_l2() {
        let signal = vec![1.0, 4.0, 2.0, 8.0, 5.0, 7.0];
        let cost = SegmentCost::new(&signal, CostModel::L2);
        for start in 0..signal.len() {
            for end in start + 1..=signal.len() {
                assert_relative_eq!(
                    cost.error(start, end),
                    l2_cost(&signal[start..end]),
                    epsilon = 1e-9
                );
            }
        }
    }

    #[test]
    fn segment_cost_l1() {
        let signal = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        let cost = SegmentCost::new(&signal, CostModel::L1);
        assert_relative_eq!(cost.error(0, 5), 6.0, epsilon = 1e-10);
        assert_relative_eq!(cost.error(3, 3), 0.0, epsilon = 1e-10);
    }

    #[test]
    fn sum_of_costs_one_changepoint() {
        let signal = vec![1.0, 1.0, 1.0, 5.0, 5.0, 5.0];
        let cost = SegmentCost::new(&signal, CostModel::L2);

        // Each side of the split is constant -> cost = 0
        assert_relative_eq!(cost.sum_of_costs(&[3, 6]), 0.0, epsilon = 1e-10);
        assert!(cost.sum_of_costs(&[6]) > cost.sum_of_costs(&[3, 6]));
    }

    #[test]
    fn sum_of_costs_without_sentinel_covers_tail() {
        let signal = vec![1.0, 1.0, 5.0, 5.0, 9.0, 9.0];
        let cost = SegmentCost::new(&signal, CostModel::L1);
        assert_relative_eq!(cost.sum_of_costs(&[2, 4]), 0.0, epsilon = 1e-10);
    }

    // ==================== CostModel ====================

    #[test]
    fn cost_model_default_is_l2() {
        assert_eq!(CostModel::default(), CostModel::L2);
    }

    #[test]
    fn cost_model_parses_names() {
        assert_eq!("l1".parse::<CostModel>().unwrap(), CostModel::L1);
        assert_eq!("l2".parse::<CostModel>().unwrap(), CostModel::L2);
        assert_eq!(
            "rbf".parse::<CostModel>(),
            Err(ChargingError::UnsupportedModel("rbf".to_string()))
        );
        assert_eq!(CostModel::L1.to_string(), "l1");
    }
}
