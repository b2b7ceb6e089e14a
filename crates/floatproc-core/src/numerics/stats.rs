use std::cmp::Ordering;

use statrs::statistics::{Data, OrderStatistics, Statistics};

fn finite(values: &[f64]) -> Vec<f64> {
    values.iter().copied().filter(|v| v.is_finite()).collect()
}

/// Median of the finite values, NaN when there are none.
pub fn nan_median(values: &[f64]) -> f64 {
    let kept = finite(values);
    if kept.is_empty() {
        return f64::NAN;
    }
    Data::new(kept).median()
}

pub fn nan_mean(values: &[f64]) -> f64 {
    let kept = finite(values);
    if kept.is_empty() {
        return f64::NAN;
    }
    kept.iter().mean()
}

/// Population standard deviation of the finite values.
pub fn nan_std(values: &[f64]) -> f64 {
    let kept = finite(values);
    if kept.is_empty() {
        return f64::NAN;
    }
    kept.iter().population_std_dev()
}

/// Stable ascending order with NaN entries placed last.
pub fn argsort_nan_last(values: &[f64]) -> Vec<usize> {
    let mut index: Vec<usize> = (0..values.len()).collect();
    index.sort_by(|&a, &b| {
        let (x, y) = (values[a], values[b]);
        match (x.is_nan(), y.is_nan()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Greater,
            (false, true) => Ordering::Less,
            (false, false) => x.total_cmp(&y),
        }
    });
    index
}

pub fn invert_permutation(order: &[usize]) -> Vec<usize> {
    let mut inverse = vec![0; order.len()];
    for (position, &original) in order.iter().enumerate() {
        inverse[original] = position;
    }
    inverse
}

pub fn reorder(values: &[f64], order: &[usize]) -> Vec<f64> {
    order.iter().map(|&i| values[i]).collect()
}
