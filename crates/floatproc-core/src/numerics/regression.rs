//! Type II linear regression built from a pair of directional type I fits.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use super::stats::{nan_mean, nan_median};
use crate::error::RegressionError;

const HUBER_T: f64 = 1.345;
const MAD_NORMALIZATION: f64 = 0.674_489_750_196_081_7;
const IRLS_MAX_ITERATIONS: usize = 50;
const IRLS_TOLERANCE: f64 = 1e-8;
const MIN_SAMPLES: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeOneMethod {
    #[serde(rename = "OLS")]
    Ols,
    #[serde(rename = "WLS")]
    Wls,
    /// Huber M-estimator solved by iteratively reweighted least squares.
    #[serde(rename = "RLM")]
    Rlm,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeTwoMethod {
    ReducedMajorAxis,
    MajorAxis,
    ArithmeticMean,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RegressionResult {
    pub slope: f64,
    pub intercept: f64,
    pub r: f64,
    pub std_slope: f64,
    pub std_intercept: f64,
    /// `slope * x + intercept` for every input x, NaN where x was missing.
    pub predicted: Vec<f64>,
    pub samples: usize,
    pub type_one: TypeOneMethod,
    pub type_two: TypeTwoMethod,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct LinearFit {
    slope: f64,
    intercept: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Estimate {
    slope: f64,
    intercept: f64,
    r: f64,
    std_slope: f64,
    std_intercept: f64,
}

struct Sample {
    x: Vec<f64>,
    y: Vec<f64>,
    weight_x: Option<Vec<f64>>,
    weight_y: Option<Vec<f64>>,
    intercept: bool,
    type_one: TypeOneMethod,
}

type DirectionalFit = fn(&Sample) -> Result<(LinearFit, LinearFit), RegressionError>;
type Combine = fn(&Sample, Option<(LinearFit, LinearFit)>) -> Result<Estimate, RegressionError>;

#[derive(Clone, Copy)]
struct Strategy {
    directional: Option<DirectionalFit>,
    combine: Combine,
}

static STRATEGIES: Lazy<HashMap<(TypeOneMethod, TypeTwoMethod), Strategy>> = Lazy::new(|| {
    let fits: [(TypeOneMethod, DirectionalFit); 3] = [
        (TypeOneMethod::Ols, ordinary_fits),
        (TypeOneMethod::Wls, weighted_fits),
        (TypeOneMethod::Rlm, robust_fits),
    ];
    let mut table = HashMap::new();
    for (method, fit) in fits {
        table.insert(
            (method, TypeTwoMethod::ReducedMajorAxis),
            Strategy {
                directional: Some(fit),
                combine: reduced_major_axis,
            },
        );
        table.insert(
            (method, TypeTwoMethod::ArithmeticMean),
            Strategy {
                directional: Some(fit),
                combine: arithmetic_mean,
            },
        );
        // Closed form; the type I method plays no part.
        table.insert(
            (method, TypeTwoMethod::MajorAxis),
            Strategy {
                directional: None,
                combine: major_axis,
            },
        );
    }
    table
});

/// Configures and runs a type II regression of `y` on `x`.
#[derive(Debug, Clone, Copy)]
pub struct Regression<'a> {
    x: &'a [f64],
    y: &'a [f64],
    weights: Option<(&'a [f64], &'a [f64])>,
    type_one: TypeOneMethod,
    type_two: TypeTwoMethod,
    intercept: bool,
}

impl<'a> Regression<'a> {
    pub fn new(x: &'a [f64], y: &'a [f64]) -> Self {
        Self {
            x,
            y,
            weights: None,
            type_one: TypeOneMethod::Ols,
            type_two: TypeTwoMethod::ReducedMajorAxis,
            intercept: true,
        }
    }

    pub fn type_one(mut self, method: TypeOneMethod) -> Self {
        self.type_one = method;
        self
    }

    pub fn type_two(mut self, method: TypeTwoMethod) -> Self {
        self.type_two = method;
        self
    }

    /// Measurement uncertainties; fits are weighted by their inverse.
    pub fn weights(mut self, weight_x: &'a [f64], weight_y: &'a [f64]) -> Self {
        self.weights = Some((weight_x, weight_y));
        self
    }

    pub fn through_origin(mut self) -> Self {
        self.intercept = false;
        self
    }

    pub fn fit(&self) -> Result<RegressionResult, RegressionError> {
        if self.x.len() != self.y.len() {
            return Err(RegressionError::LengthMismatch {
                x: self.x.len(),
                y: self.y.len(),
            });
        }
        if self.type_two == TypeTwoMethod::MajorAxis && !self.intercept {
            return Err(RegressionError::InterceptRequired);
        }
        if self.type_one == TypeOneMethod::Wls && self.weights.is_none() {
            return Err(RegressionError::MissingWeights);
        }

        let sample = self.sample()?;
        let strategy = STRATEGIES
            .get(&(self.type_one, self.type_two))
            .copied()
            .ok_or_else(|| RegressionError::Degenerate("no strategy registered".into()))?;

        let directional = match strategy.directional {
            Some(fit) => Some(fit(&sample)?),
            None => None,
        };
        let estimate = (strategy.combine)(&sample, directional)?;

        let predicted = self
            .x
            .iter()
            .map(|x| estimate.slope * x + estimate.intercept)
            .collect();

        Ok(RegressionResult {
            slope: estimate.slope,
            intercept: estimate.intercept,
            r: estimate.r,
            std_slope: estimate.std_slope,
            std_intercept: estimate.std_intercept,
            predicted,
            samples: sample.x.len(),
            type_one: self.type_one,
            type_two: self.type_two,
        })
    }

    /// Keeps the pairs where every participating value is finite.
    fn sample(&self) -> Result<Sample, RegressionError> {
        if let Some((wx, wy)) = self.weights {
            if wx.len() != self.x.len() || wy.len() != self.x.len() {
                return Err(RegressionError::LengthMismatch {
                    x: wx.len(),
                    y: wy.len(),
                });
            }
        }

        let mut sample = Sample {
            x: Vec::new(),
            y: Vec::new(),
            weight_x: self.weights.map(|_| Vec::new()),
            weight_y: self.weights.map(|_| Vec::new()),
            intercept: self.intercept,
            type_one: self.type_one,
        };

        for i in 0..self.x.len() {
            let (x, y) = (self.x[i], self.y[i]);
            if !x.is_finite() || !y.is_finite() {
                continue;
            }
            if let Some((wx, wy)) = self.weights {
                if !(wx[i].is_finite() && wy[i].is_finite() && wx[i] > 0.0 && wy[i] > 0.0) {
                    continue;
                }
                if let (Some(kept_x), Some(kept_y)) =
                    (sample.weight_x.as_mut(), sample.weight_y.as_mut())
                {
                    kept_x.push(1.0 / wx[i]);
                    kept_y.push(1.0 / wy[i]);
                }
            }
            sample.x.push(x);
            sample.y.push(y);
        }

        if sample.x.len() < MIN_SAMPLES {
            return Err(RegressionError::InsufficientData {
                required: MIN_SAMPLES,
                found: sample.x.len(),
            });
        }
        Ok(sample)
    }
}

fn least_squares(
    x: &[f64],
    y: &[f64],
    weights: Option<&[f64]>,
    intercept: bool,
) -> Result<LinearFit, RegressionError> {
    let weight = |i: usize| weights.map_or(1.0, |w| w[i]);
    let total: f64 = (0..x.len()).map(weight).sum();

    let (x_mean, y_mean) = if intercept {
        (
            (0..x.len()).map(|i| weight(i) * x[i]).sum::<f64>() / total,
            (0..x.len()).map(|i| weight(i) * y[i]).sum::<f64>() / total,
        )
    } else {
        (0.0, 0.0)
    };

    let sxx: f64 = (0..x.len())
        .map(|i| weight(i) * (x[i] - x_mean).powi(2))
        .sum();
    if sxx <= f64::EPSILON {
        return Err(RegressionError::Degenerate(
            "predictor has no spread".into(),
        ));
    }
    let sxy: f64 = (0..x.len())
        .map(|i| weight(i) * (x[i] - x_mean) * (y[i] - y_mean))
        .sum();
    let slope = sxy / sxx;
    Ok(LinearFit {
        slope,
        intercept: y_mean - slope * x_mean,
    })
}

fn huber(x: &[f64], y: &[f64], intercept: bool) -> Result<LinearFit, RegressionError> {
    let mut fit = least_squares(x, y, None, intercept)?;
    for _ in 0..IRLS_MAX_ITERATIONS {
        let residuals: Vec<f64> = x
            .iter()
            .zip(y)
            .map(|(x, y)| y - (fit.slope * x + fit.intercept))
            .collect();
        let abs: Vec<f64> = residuals.iter().map(|r| r.abs()).collect();
        let scale = nan_median(&abs) / MAD_NORMALIZATION;
        if !(scale > f64::EPSILON) {
            break;
        }
        let weights: Vec<f64> = residuals
            .iter()
            .map(|r| {
                let u = (r / scale).abs();
                if u <= HUBER_T {
                    1.0
                } else {
                    HUBER_T / u
                }
            })
            .collect();

        let next = least_squares(x, y, Some(&weights), intercept)?;
        let converged = (next.slope - fit.slope).abs() <= IRLS_TOLERANCE * (1.0 + fit.slope.abs())
            && (next.intercept - fit.intercept).abs()
                <= IRLS_TOLERANCE * (1.0 + fit.intercept.abs());
        fit = next;
        if converged {
            break;
        }
    }
    Ok(fit)
}

fn ordinary_fits(sample: &Sample) -> Result<(LinearFit, LinearFit), RegressionError> {
    Ok((
        least_squares(&sample.x, &sample.y, None, sample.intercept)?,
        least_squares(&sample.y, &sample.x, None, sample.intercept)?,
    ))
}

fn weighted_fits(sample: &Sample) -> Result<(LinearFit, LinearFit), RegressionError> {
    let (Some(wx), Some(wy)) = (&sample.weight_x, &sample.weight_y) else {
        return Err(RegressionError::MissingWeights);
    };
    Ok((
        least_squares(&sample.x, &sample.y, Some(wy), sample.intercept)?,
        least_squares(&sample.y, &sample.x, Some(wx), sample.intercept)?,
    ))
}

fn robust_fits(sample: &Sample) -> Result<(LinearFit, LinearFit), RegressionError> {
    Ok((
        huber(&sample.x, &sample.y, sample.intercept)?,
        huber(&sample.y, &sample.x, sample.intercept)?,
    ))
}

/// Slope of the x-on-y fit expressed in the y-on-x frame.
fn inverted_slope(fit: LinearFit) -> Result<f64, RegressionError> {
    if fit.slope == 0.0 {
        return Err(RegressionError::Degenerate(
            "x on y regression has zero slope".into(),
        ));
    }
    Ok(1.0 / fit.slope)
}

fn centred_intercept(sample: &Sample, slope: f64) -> f64 {
    if !sample.intercept {
        return 0.0;
    }
    match sample.type_one {
        TypeOneMethod::Ols => nan_mean(&sample.y) - slope * nan_mean(&sample.x),
        TypeOneMethod::Wls | TypeOneMethod::Rlm => {
            nan_median(&sample.y) - slope * nan_median(&sample.x)
        }
    }
}

fn directional(
    fits: Option<(LinearFit, LinearFit)>,
) -> Result<(LinearFit, LinearFit), RegressionError> {
    fits.ok_or_else(|| RegressionError::Degenerate("directional fits missing".into()))
}

fn reduced_major_axis(
    sample: &Sample,
    fits: Option<(LinearFit, LinearFit)>,
) -> Result<Estimate, RegressionError> {
    let (y_on_x, x_on_y) = directional(fits)?;
    let a = y_on_x.slope;
    let b = inverted_slope(x_on_y)?;
    if a.signum() != b.signum() || a == 0.0 {
        return Err(RegressionError::SignMismatch {
            y_on_x: a,
            x_on_y: b,
        });
    }

    let slope = a.signum() * (a * b).sqrt();
    let intercept = centred_intercept(sample, slope);
    let r = a.signum() * (a / b).sqrt();
    let (std_slope, std_intercept) = least_squares_errors(sample, slope, intercept);
    Ok(Estimate {
        slope,
        intercept,
        r,
        std_slope,
        std_intercept,
    })
}

fn arithmetic_mean(
    sample: &Sample,
    fits: Option<(LinearFit, LinearFit)>,
) -> Result<Estimate, RegressionError> {
    let (y_on_x, x_on_y) = directional(fits)?;
    let a = y_on_x.slope;
    let b = inverted_slope(x_on_y)?;

    let slope = (a + b) / 2.0;
    let intercept = centred_intercept(sample, slope);
    let r = a.signum() * (a / b).sqrt();
    let (std_slope, std_intercept) = least_squares_errors(sample, slope, intercept);
    Ok(Estimate {
        slope,
        intercept,
        r,
        std_slope,
        std_intercept,
    })
}

fn major_axis(
    sample: &Sample,
    _fits: Option<(LinearFit, LinearFit)>,
) -> Result<Estimate, RegressionError> {
    let n = sample.x.len() as f64;
    let xm = nan_mean(&sample.x);
    let ym = nan_mean(&sample.y);
    let mut sumx2 = 0.0;
    let mut sumy2 = 0.0;
    let mut sumxy = 0.0;
    for (x, y) in sample.x.iter().zip(&sample.y) {
        let (dx, dy) = (x - xm, y - ym);
        sumx2 += dx * dx;
        sumy2 += dy * dy;
        sumxy += dx * dy;
    }
    if sumxy == 0.0 {
        return Err(RegressionError::Degenerate(
            "major axis undefined for uncorrelated data".into(),
        ));
    }

    let slope = (sumy2 - sumx2 + ((sumy2 - sumx2).powi(2) + 4.0 * sumxy * sumxy).sqrt())
        / (2.0 * sumxy);
    let intercept = ym - slope * xm;
    let r = sumxy / (sumx2 * sumy2).sqrt();

    let std_slope = (slope / r) * ((1.0 - r * r) / n).sqrt();
    let sigx = (sumx2 / (n - 1.0)).sqrt();
    let sigy = (sumy2 / (n - 1.0)).sqrt();
    let std_i1 = (sigy - sigx * slope).powi(2);
    let std_i2 = 2.0 * sigx * sigy + (xm * xm * slope * (1.0 + r)) / (r * r);
    let std_intercept = ((std_i1 + (1.0 - r) * slope * std_i2) / n).sqrt();

    Ok(Estimate {
        slope,
        intercept,
        r,
        std_slope,
        std_intercept,
    })
}

/// Standard errors of slope and intercept from the residuals of the combined line.
fn least_squares_errors(sample: &Sample, slope: f64, intercept: f64) -> (f64, f64) {
    let n = sample.x.len() as f64;
    let sum_x: f64 = sample.x.iter().sum();
    let sum_x2: f64 = sample.x.iter().map(|x| x * x).sum();
    let den = n * sum_x2 - sum_x * sum_x;
    let s2 = sample
        .x
        .iter()
        .zip(&sample.y)
        .map(|(x, y)| (y - (slope * x + intercept)).powi(2))
        .sum::<f64>()
        / (n - 2.0);

    let std_slope = (n * s2 / den).sqrt();
    let std_intercept = if sample.intercept {
        (sum_x2 * s2 / den).sqrt()
    } else {
        0.0
    };
    (std_slope, std_intercept)
}
