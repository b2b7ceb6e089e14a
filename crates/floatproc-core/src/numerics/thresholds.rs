use super::stats::argsort_nan_last;

/// Deepest pressure at which PAR exceeds `threshold`.
pub fn quench_onset(pressure: &[f64], par: &[f64], threshold: f64) -> Option<f64> {
    pressure
        .iter()
        .zip(par)
        .filter(|(p, light)| p.is_finite() && light.is_finite() && **light > threshold)
        .map(|(p, _)| *p)
        .max_by(|a, b| a.total_cmp(b))
}

/// Index whose density departure from the surface value is closest to `threshold`.
///
/// The surface value is the first finite sample; ties resolve to the shallowest index.
pub fn mixed_layer_index(sigma: &[f64], threshold: f64) -> Option<usize> {
    let surface = sigma.iter().copied().find(|v| v.is_finite())?;
    let mut best: Option<(usize, f64)> = None;
    for (idx, value) in sigma.iter().enumerate() {
        if !value.is_finite() {
            continue;
        }
        let distance = ((value - surface).abs() - threshold).abs();
        match best {
            Some((_, current)) if distance >= current => {}
            _ => best = Some((idx, distance)),
        }
    }
    best.map(|(idx, _)| idx)
}

/// Pressure where PAR first falls to 1% of its shallowest value, interpolated linearly.
pub fn euphotic_depth(pressure: &[f64], par: &[f64]) -> Option<f64> {
    let order = argsort_nan_last(pressure);
    let samples: Vec<(f64, f64)> = order
        .into_iter()
        .map(|i| (pressure[i], par[i]))
        .filter(|(p, light)| p.is_finite() && light.is_finite())
        .collect();
    let (_, surface) = *samples.first()?;
    let target = 0.01 * surface;

    for pair in samples.windows(2) {
        let ((p0, l0), (p1, l1)) = (pair[0], pair[1]);
        if l1 < target {
            if l0 == l1 {
                return Some(p1);
            }
            return Some(p0 + (p1 - p0) * (target - l0) / (l1 - l0));
        }
    }
    None
}
