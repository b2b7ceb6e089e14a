//! Non-photochemical quenching correction of chlorophyll fluorescence.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::error::RegressionError;
use crate::numerics::stats::reorder;
use crate::numerics::{
    argsort_nan_last, interp_linear, invert_permutation, nan_median, Regression,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QuenchingStrategy {
    /// Xing et al. (2012): extend the fluorescence at the onset depth to the surface.
    #[serde(rename = "Xing")]
    SingleValue,
    /// Median of a window of samples around the onset.
    #[serde(rename = "Xing2")]
    WindowedMedian,
    /// Sackmann et al. (2008): fluorescence predicted from backscatter below the onset.
    #[serde(rename = "Sackmann")]
    BackscatterRegression,
}

impl QuenchingStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuenchingStrategy::SingleValue => "Xing",
            QuenchingStrategy::WindowedMedian => "Xing2",
            QuenchingStrategy::BackscatterRegression => "Sackmann",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuenchingParameters {
    pub window_before: usize,
    pub window_after: usize,
    /// Fluorescence below this is ignored when learning the backscatter relation.
    pub min_fluorescence: f64,
}

impl Default for QuenchingParameters {
    fn default() -> Self {
        Self {
            window_before: 1,
            window_after: 2,
            min_fluorescence: 0.003,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum QuenchingError {
    #[error("backscatter is required by the {0} strategy")]
    MissingBackscatter(&'static str),

    #[error(transparent)]
    Regression(#[from] RegressionError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct QuenchingCorrection {
    /// Corrected fluorescence in the input order.
    pub values: Vec<f64>,
    /// False when the strategy declined to modify the profile.
    pub applied: bool,
}

/// Replaces fluorescence from the surface down to `onset` using `strategy`.
///
/// Works on a pressure-sorted copy; the returned values follow the input order.
pub fn correct_quenching(
    strategy: QuenchingStrategy,
    pressure: &[f64],
    fluorescence: &[f64],
    backscatter: Option<&[f64]>,
    onset: f64,
    parameters: &QuenchingParameters,
) -> Result<QuenchingCorrection, QuenchingError> {
    let order = argsort_nan_last(pressure);
    let p = reorder(pressure, &order);
    let mut fchl = reorder(fluorescence, &order);

    let Some(start) = closest_index(&p, onset) else {
        return Ok(QuenchingCorrection {
            values: fluorescence.to_vec(),
            applied: false,
        });
    };

    let applied = match strategy {
        QuenchingStrategy::SingleValue => {
            let finite = p.iter().take_while(|v| v.is_finite()).count();
            let value = interp_linear(&p[..finite], &fchl[..finite], onset);
            fchl[..=start].fill(value);
            true
        }
        QuenchingStrategy::WindowedMedian => {
            let (before, after) = (parameters.window_before, parameters.window_after);
            if before + after + 1 < fchl.len() {
                let lo = start.saturating_sub(before);
                let hi = (start + after).min(fchl.len() - 1);
                let value = nan_median(&fchl[lo..=hi]);
                fchl[..=start].fill(value);
                true
            } else {
                warn!(
                    before,
                    after,
                    samples = fchl.len(),
                    "quenching window spans the whole profile, correction skipped"
                );
                false
            }
        }
        QuenchingStrategy::BackscatterRegression => {
            let bbp = backscatter
                .map(|values| reorder(values, &order))
                .ok_or(QuenchingError::MissingBackscatter(strategy.as_str()))?;

            let (x, y): (Vec<f64>, Vec<f64>) = (start + 1..fchl.len())
                .filter(|&i| fchl[i] > parameters.min_fluorescence)
                .map(|i| (bbp[i], fchl[i]))
                .unzip();
            let fit = Regression::new(&x, &y).fit()?;

            for i in 0..=start {
                fchl[i] = fit.intercept + bbp[i] * fit.slope;
            }
            true
        }
    };

    Ok(QuenchingCorrection {
        values: reorder(&fchl, &invert_permutation(&order)),
        applied,
    })
}

/// First sorted index whose pressure is nearest to `target`.
fn closest_index(sorted_pressure: &[f64], target: f64) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (idx, p) in sorted_pressure.iter().enumerate() {
        if !p.is_finite() {
            continue;
        }
        let delta = (p - target).abs();
        match best {
            Some((_, current)) if delta >= current => {}
            _ => best = Some((idx, delta)),
        }
    }
    best.map(|(idx, _)| idx)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window(before: usize, after: usize) -> QuenchingParameters {
        QuenchingParameters {
            window_before: before,
            window_after: after,
            ..QuenchingParameters::default()
        }
    }

    #[test]
    fn windowed_median_replaces_shallow_samples() {
        let p = [0.0, 1.0, 2.0, 3.0, 4.0, 5.0];
        let fchl = [1.0, 1.0, 5.0, 2.0, 2.0, 2.0];
        let out = correct_quenching(
            QuenchingStrategy::WindowedMedian,
            &p,
            &fchl,
            None,
            1.0,
            &window(1, 1),
        )
        .unwrap();
        assert!(out.applied);
        assert_eq!(out.values, vec![1.0, 1.0, 5.0, 2.0, 2.0, 2.0]);
    }

    #[test]
    fn windowed_median_restores_input_order() {
        let p = [5.0, 0.0, 3.0, 1.0, 4.0, 2.0];
        let fchl = [2.0, 0.1, 2.0, 0.2, 2.0, 4.0];
        let out = correct_quenching(
            QuenchingStrategy::WindowedMedian,
            &p,
            &fchl,
            None,
            1.0,
            &window(1, 2),
        )
        .unwrap();
        // sorted window [0.1, 0.2, 4.0, 2.0] has median 1.1
        assert_eq!(out.values, vec![2.0, 1.1, 2.0, 1.1, 2.0, 4.0]);
    }

    #[test]
    fn oversized_window_is_skipped() {
        let p = [0.0, 1.0, 2.0];
        let fchl = [0.1, 0.2, 0.3];
        let out = correct_quenching(
            QuenchingStrategy::WindowedMedian,
            &p,
            &fchl,
            None,
            1.0,
            &window(1, 1),
        )
        .unwrap();
        assert!(!out.applied);
        assert_eq!(out.values, fchl.to_vec());
    }

    #[test]
    fn single_value_interpolates_at_onset() {
        let p = [0.0, 2.0, 4.0, 6.0];
        let fchl = [0.2, 1.0, 3.0, 3.0];
        let out = correct_quenching(
            QuenchingStrategy::SingleValue,
            &p,
            &fchl,
            None,
            3.0,
            &QuenchingParameters::default(),
        )
        .unwrap();
        // nearest sample to 3.0 is index 1 (ties resolve shallow)
        assert_eq!(out.values, vec![2.0, 2.0, 3.0, 3.0]);
    }

    #[test]
    fn backscatter_regression_learns_below_onset() {
        let p = [0.0, 1.0, 2.0, 3.0, 4.0, 5.0];
        let bbp = [0.001, 0.001, 0.002, 0.003, 0.004, 0.005];
        // fchl = 1000 * bbp below the onset, quenched above
        let fchl = [0.1, 0.1, 2.0, 3.0, 4.0, 5.0];
        let out = correct_quenching(
            QuenchingStrategy::BackscatterRegression,
            &p,
            &fchl,
            Some(&bbp),
            1.0,
            &QuenchingParameters::default(),
        )
        .unwrap();
        assert!((out.values[0] - 1.0).abs() < 1e-9);
        assert!((out.values[1] - 1.0).abs() < 1e-9);
        assert_eq!(&out.values[2..], &fchl[2..]);
    }

    #[test]
    fn backscatter_regression_requires_backscatter() {
        let p = [0.0, 1.0, 2.0, 3.0];
        let fchl = [0.1, 0.1, 2.0, 3.0];
        let err = correct_quenching(
            QuenchingStrategy::BackscatterRegression,
            &p,
            &fchl,
            None,
            1.0,
            &QuenchingParameters::default(),
        )
        .unwrap_err();
        assert_eq!(err, QuenchingError::MissingBackscatter("Sackmann"));
    }
}
