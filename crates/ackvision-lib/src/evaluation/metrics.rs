//! Scoring functions for the reference evaluation
//!
//! Classification scores are weighted by support. A class with no predicted
//! (or no true) members contributes zero instead of failing.

use crate::predictor::output::round_to;
use std::collections::BTreeSet;

/// Round to four decimal places
pub fn round4(value: f64) -> f64 {
    round_to(value, 4)
}

pub fn mean_absolute_error(y_true: &[f64], y_pred: &[f64]) -> f64 {
    if y_true.is_empty() {
        return 0.0;
    }
    let total: f64 = y_true
        .iter()
        .zip(y_pred)
        .map(|(t, p)| (t - p).abs())
        .sum();
    total / y_true.len() as f64
}

pub fn root_mean_squared_error(y_true: &[f64], y_pred: &[f64]) -> f64 {
    if y_true.is_empty() {
        return 0.0;
    }
    let total: f64 = y_true
        .iter()
        .zip(y_pred)
        .map(|(t, p)| (t - p).powi(2))
        .sum();
    (total / y_true.len() as f64).sqrt()
}

/// Coefficient of determination. A constant target scores 1.0 when predicted
/// exactly and 0.0 otherwise.
pub fn r2_score(y_true: &[f64], y_pred: &[f64]) -> f64 {
    if y_true.is_empty() {
        return 0.0;
    }
    let mean = y_true.iter().sum::<f64>() / y_true.len() as f64;
    let ss_res: f64 = y_true
        .iter()
        .zip(y_pred)
        .map(|(t, p)| (t - p).powi(2))
        .sum();
    let ss_tot: f64 = y_true.iter().map(|t| (t - mean).powi(2)).sum();

    if ss_tot == 0.0 {
        return if ss_res == 0.0 { 1.0 } else { 0.0 };
    }
    1.0 - ss_res / ss_tot
}

pub fn accuracy<T: PartialEq>(y_true: &[T], y_pred: &[T]) -> f64 {
    if y_true.is_empty() {
        return 0.0;
    }
    let correct = y_true.iter().zip(y_pred).filter(|(t, p)| t == p).count();
    correct as f64 / y_true.len() as f64
}

/// Support-weighted precision, recall and F1
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeightedScores {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
}

pub fn weighted_scores<T: Ord>(y_true: &[T], y_pred: &[T]) -> WeightedScores {
    let n = y_true.len();
    let mut scores = WeightedScores {
        precision: 0.0,
        recall: 0.0,
        f1: 0.0,
    };
    if n == 0 {
        return scores;
    }

    let classes: BTreeSet<&T> = y_true.iter().chain(y_pred).collect();
    for class in classes {
        let support = y_true.iter().filter(|t| *t == class).count();
        let predicted = y_pred.iter().filter(|p| *p == class).count();
        let hits = y_true
            .iter()
            .zip(y_pred)
            .filter(|(t, p)| *t == class && *p == class)
            .count();

        let precision = ratio(hits, predicted);
        let recall = ratio(hits, support);
        let f1 = if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            0.0
        };

        let weight = support as f64 / n as f64;
        scores.precision += weight * precision;
        scores.recall += weight * recall;
        scores.f1 += weight * f1;
    }
    scores
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

fn euclidean(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y).powi(2))
        .sum::<f64>()
        .sqrt()
}

/// Mean silhouette coefficient over all points.
///
/// Points alone in their cluster score 0; fewer than two distinct clusters
/// score 0 overall.
pub fn silhouette_score<P: AsRef<[f64]>>(points: &[P], labels: &[usize]) -> f64 {
    let distinct: BTreeSet<usize> = labels.iter().copied().collect();
    if points.is_empty() || distinct.len() < 2 {
        return 0.0;
    }

    let mut total = 0.0;
    for (i, point) in points.iter().enumerate() {
        let own = labels[i];
        let own_size = labels.iter().filter(|&&l| l == own).count();
        if own_size <= 1 {
            continue;
        }

        let mean_distance_to = |cluster: usize| {
            let (sum, count) = points
                .iter()
                .zip(labels)
                .enumerate()
                .filter(|(j, (_, l))| **l == cluster && *j != i)
                .fold((0.0, 0usize), |(sum, count), (_, (other, _))| {
                    (sum + euclidean(point.as_ref(), other.as_ref()), count + 1)
                });
            sum / count as f64
        };

        let a = mean_distance_to(own);
        let b = distinct
            .iter()
            .filter(|&&c| c != own)
            .map(|&c| mean_distance_to(c))
            .fold(f64::INFINITY, f64::min);

        let denom = a.max(b);
        if denom > 0.0 {
            total += (b - a) / denom;
        }
    }
    total / points.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_regression_metrics() {
        let y_true = [3.0, -0.5, 2.0, 7.0];
        let y_pred = [2.5, 0.0, 2.0, 8.0];
        assert_eq!(round4(mean_absolute_error(&y_true, &y_pred)), 0.5);
        assert_eq!(round4(root_mean_squared_error(&y_true, &y_pred)), 0.6124);
        assert_eq!(round4(r2_score(&y_true, &y_pred)), 0.9486);
    }

    #[test]
    fn test_round4_ties_to_even() {
        assert_eq!(round4(0.03125), 0.0312);
        assert_eq!(round4(0.09375), 0.0938);
    }

    #[test]
    fn test_r2_constant_target() {
        assert_eq!(r2_score(&[5.0, 5.0], &[5.0, 5.0]), 1.0);
        assert_eq!(r2_score(&[5.0, 5.0], &[4.0, 6.0]), 0.0);
    }

    #[test]
    fn test_weighted_scores() {
        let y_true = ["a", "b", "c", "a", "b", "c"];
        let y_pred = ["a", "c", "b", "a", "a", "b"];
        let scores = weighted_scores(&y_true, &y_pred);
        assert_eq!(round4(accuracy(&y_true, &y_pred)), 0.3333);
        assert_eq!(round4(scores.precision), 0.2222);
        assert_eq!(round4(scores.recall), 0.3333);
        assert_eq!(round4(scores.f1), 0.2667);
    }

    #[test]
    fn test_perfect_classification() {
        let y = ["Pass", "Fail", "Pass"];
        let scores = weighted_scores(&y, &y);
        assert_eq!(accuracy(&y, &y), 1.0);
        assert_eq!(scores.precision, 1.0);
        assert_eq!(scores.f1, 1.0);
    }

    #[test]
    fn test_silhouette_two_separated_clusters() {
        let points = vec![vec![0.0], vec![1.0], vec![10.0], vec![11.0]];
        let labels = [0, 0, 1, 1];
        assert_eq!(round4(silhouette_score(&points, &labels)), 0.8997);
    }

    #[test]
    fn test_silhouette_degenerate_cases() {
        let points = vec![vec![0.0], vec![1.0]];
        assert_eq!(silhouette_score(&points, &[0, 0]), 0.0);
        // both clusters are singletons
        assert_eq!(silhouette_score(&points, &[0, 1]), 0.0);
    }
}
