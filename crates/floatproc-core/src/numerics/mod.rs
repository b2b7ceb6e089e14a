//! Pure numeric helpers shared by the level 2 engine.
//!
//! Missing samples are NaN throughout; functions skip them rather than
//! propagating unless stated otherwise.

pub mod interpolate;
pub mod regression;
pub mod stats;
pub mod thresholds;

pub use interpolate::{interp_linear, CubicSpline};
pub use regression::{Regression, RegressionResult, TypeOneMethod, TypeTwoMethod};
pub use stats::{argsort_nan_last, invert_permutation, nan_mean, nan_median, nan_std};
pub use thresholds::{euphotic_depth, mixed_layer_index, quench_onset};
