//! Head-to-head comparison of several models on the same rows.

use super::metrics::check_lengths;
use crate::error::{PipelineError, Result};
use std::collections::BTreeMap;

/// Fraction of rows on which each model is closest to the ground truth.
///
/// Ties go to the model listed first. A NaN prediction never wins a row
/// unless every model predicts NaN there, in which case the first model wins.
/// Models without a single win are reported with `0.0`, so the fractions
/// always sum to one.
///
/// # Errors
/// `InvalidArgument` for an empty model list, empty ground truth, a
/// prediction vector of the wrong length, or a repeated model name.
pub fn win_rate(
    ground_truth: &[f64],
    predictions: &[(String, Vec<f64>)],
) -> Result<BTreeMap<String, f64>> {
    if predictions.is_empty() {
        return Err(PipelineError::InvalidArgument("no models to compare".to_string()));
    }
    for (_, preds) in predictions {
        check_lengths(ground_truth, preds)?;
    }

    let mut wins = vec![0usize; predictions.len()];
    for (row, truth) in ground_truth.iter().enumerate() {
        let mut best: Option<(usize, f64)> = None;
        for (model, (_, preds)) in predictions.iter().enumerate() {
            let deviation = (preds[row] - truth).abs();
            if deviation.is_nan() {
                continue;
            }
            if best.is_none_or(|(_, d)| deviation < d) {
                best = Some((model, deviation));
            }
        }
        wins[best.map_or(0, |(model, _)| model)] += 1;
    }

    let n = ground_truth.len() as f64;
    let mut rates = BTreeMap::new();
    for ((name, _), count) in predictions.iter().zip(wins) {
        if rates.insert(name.clone(), count as f64 / n).is_some() {
            return Err(PipelineError::InvalidArgument(format!(
                "model '{}' listed twice",
                name
            )));
        }
    }
    Ok(rates)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str, preds: &[f64]) -> (String, Vec<f64>) {
        (name.to_string(), preds.to_vec())
    }

    #[test]
    fn test_ties_go_to_first_model() {
        let gt = [100.0, 200.0, 300.0];
        let rates = win_rate(
            &gt,
            &[entry("m1", &[110.0, 190.0, 305.0]), entry("m2", &[90.0, 210.0, 295.0])],
        )
        .unwrap();
        assert_eq!(rates["m1"], 1.0);
        assert_eq!(rates["m2"], 0.0);
    }

    #[test]
    fn test_zero_win_models_are_reported() {
        let gt = [1.0, 2.0];
        let rates = win_rate(
            &gt,
            &[entry("a", &[1.0, 2.0]), entry("b", &[5.0, 5.0]), entry("c", &[9.0, 9.0])],
        )
        .unwrap();
        assert_eq!(rates.len(), 3);
        assert_eq!(rates["a"], 1.0);
        assert_eq!(rates.values().sum::<f64>(), 1.0);
    }

    #[test]
    fn test_nan_never_wins() {
        let gt = [1.0, 2.0];
        let rates = win_rate(
            &gt,
            &[entry("nan", &[f64::NAN, f64::NAN]), entry("ok", &[100.0, 2.0])],
        )
        .unwrap();
        assert_eq!(rates["ok"], 1.0);

        let all_nan = win_rate(&[1.0], &[entry("x", &[f64::NAN]), entry("y", &[f64::NAN])]).unwrap();
        assert_eq!(all_nan["x"], 1.0);
    }

    #[test]
    fn test_invalid_comparisons() {
        assert!(win_rate(&[1.0], &[]).is_err());
        assert!(win_rate(&[1.0, 2.0], &[entry("a", &[1.0])]).is_err());
        assert!(win_rate(&[1.0], &[entry("a", &[1.0]), entry("a", &[2.0])]).is_err());
    }
}
