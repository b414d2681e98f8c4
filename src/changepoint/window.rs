//! Sliding-window changepoint detection.
//!
//! Every grid point is scored by how much splitting a window centred on it
//! reduces the window cost. Local score maxima are then accepted in
//! decreasing score order while each one lowers the total segmentation cost
//! by more than the penalty.

use super::cost::{CostModel, SegmentCost};
use super::{can_insert_split, check_search_params, effective_min_size, BreakpointDetector};
use crate::error::{ChargingError, Result};

/// Sliding-window detector.
#[derive(Debug, Clone)]
pub struct SlidingWindow {
    pub model: CostModel,
    pub penalty: f64,
    pub min_size: usize,
    pub jump: usize,
    /// Window width in samples; each half must hold a minimum-size segment.
    pub width: usize,
}

impl Default for SlidingWindow {
    fn default() -> Self {
        Self {
            model: CostModel::L2,
            penalty: 3.0,
            min_size: 2,
            jump: 5,
            width: 10,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct CandidateScore {
    split: usize,
    score: f64,
}

impl SlidingWindow {
    pub fn new(model: CostModel, width: usize) -> Self {
        Self {
            model,
            width,
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

    fn scores(&self, cost: &SegmentCost<'_>) -> Vec<CandidateScore> {
        let n = cost.len();
        let half = self.width / 2;
        (0..n)
            .step_by(self.jump)
            .filter(|&k| k >= half && k + half < n)
            .map(|split| {
                let (start, end) = (split - half, split + half);
                let score =
                    cost.error(start, end) - cost.error(start, split) - cost.error(split, end);
                CandidateScore { split, score }
            })
            .collect()
    }

    /// Neighbourhood radius, in grid steps, for the peak search.
    fn peak_order(&self, min_size: usize) -> usize {
        (self.width.max(2 * min_size) / (2 * self.jump)).max(1)
    }
}

/// Indices of strict local maxima within `order` neighbours on each side,
/// with the score sequence treated as circular.
fn extract_peaks(scores: &[CandidateScore], order: usize) -> Vec<usize> {
    let len = scores.len();
    (0..len)
        .filter(|&i| {
            (1..=order).all(|shift| {
                let right = scores[(i + shift) % len].score;
                let left = scores[(i + len - shift % len) % len].score;
                scores[i].score > right && scores[i].score > left
            })
        })
        .collect()
}

impl BreakpointDetector for SlidingWindow {
    fn detect(&self, series: &[f64]) -> Result<Vec<usize>> {
        check_search_params(self.penalty, self.jump)?;

        let n = series.len();
        let min_size = effective_min_size(self.min_size, self.model);
        if self.width / 2 < min_size {
            return Err(ChargingError::InvalidParameter(format!(
                "window width {} cannot hold two segments of {min_size} samples",
                self.width
            )));
        }

        let cost = SegmentCost::new(series, self.model);
        let scores = self.scores(&cost);
        if scores.is_empty() {
            return Ok(vec![n]);
        }

        let mut peaks: Vec<CandidateScore> = extract_peaks(&scores, self.peak_order(min_size))
            .into_iter()
            .map(|i| scores[i])
            .collect();
        // Ascending by score; candidates are consumed from the back.
        peaks.sort_by(|a, b| a.score.total_cmp(&b.score));

        let mut selected: Vec<usize> = Vec::new();
        let mut error = cost.sum_of_costs(&[n]);

        while let Some(candidate) = peaks.pop() {
            if !can_insert_split(&selected, candidate.split, min_size, n) {
                continue;
            }
            let pos = selected.partition_point(|&s| s < candidate.split);
            let mut trial = selected.clone();
            trial.insert(pos, candidate.split);
            trial.push(n);
            let new_error = cost.sum_of_costs(&trial);
            if error - new_error > self.penalty {
                selected.insert(pos, candidate.split);
                error = new_error;
            } else {
                break;
            }
        }

        selected.push(n);
        Ok(selected)
    }

    fn name(&self) -> &str {
        "Window"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_no_changepoint() {
        let series = vec![2.0; 40];
        assert_eq!(SlidingWindow::default().detect(&series).unwrap(), vec![40]);
    }

    #[test]
    fn window_one_changepoint() {
        let mut series = vec![0.0; 20];
        series.extend(vec![6.0; 20]);

        assert_eq!(
            SlidingWindow::default().detect(&series).unwrap(),
            vec![20, 40]
        );
    }

    #[test]
    fn window_two_changepoints_l1() {
        let mut series = vec![0.0; 20];
        series.extend(vec![6.0; 20]);
        series.extend(vec![2.0; 20]);

        let detector = SlidingWindow::new(CostModel::L1, 10);
        assert_eq!(detector.detect(&series).unwrap(), vec![20, 40, 60]);
    }

    #[test]
    fn window_series_shorter_than_window() {
        let series = vec![0.0, 0.0, 5.0, 5.0];
        assert_eq!(SlidingWindow::default().detect(&series).unwrap(), vec![4]);
    }

    #[test]
    fn window_too_narrow_is_rejected() {
        let series = vec![0.0; 20];
        let detector = SlidingWindow::new(CostModel::L2, 3);
        assert!(matches!(
            detector.detect(&series),
            Err(ChargingError::InvalidParameter(_))
        ));
    }

    #[test]
    fn peaks_are_strict_circular_maxima() {
        let scores: Vec<CandidateScore> = [0.0, 3.0, 1.0, 1.0, 5.0, 0.0]
            .iter()
            .enumerate()
            .map(|(i, &score)| CandidateScore { split: i, score })
            .collect();
        assert_eq!(extract_peaks(&scores, 1), vec![1, 4]);

        // Plateaus are not peaks.
        let flat: Vec<CandidateScore> = (0..4)
            .map(|i| CandidateScore { split: i, score: 1.0 })
            .collect();
        assert!(extract_peaks(&flat, 1).is_empty());
    }
}
