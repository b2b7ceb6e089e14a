use nalgebra::{DMatrix, DVector};

/// Linear interpolation of `x` on ascending abscissae; NaN outside the range.
pub fn interp_linear(xs: &[f64], ys: &[f64], x: f64) -> f64 {
    if xs.is_empty() || xs.len() != ys.len() || !x.is_finite() {
        return f64::NAN;
    }
    let last = xs.len() - 1;
    if x < xs[0] || x > xs[last] {
        return f64::NAN;
    }
    for i in 0..last {
        let (x0, x1) = (xs[i], xs[i + 1]);
        if x >= x0 && x <= x1 {
            if x1 == x0 {
                return ys[i];
            }
            return ys[i] + (ys[i + 1] - ys[i]) * (x - x0) / (x1 - x0);
        }
    }
    if x == xs[last] {
        ys[last]
    } else {
        f64::NAN
    }
}

/// Interpolating cubic spline with not-a-knot end conditions.
#[derive(Debug, Clone, PartialEq)]
pub struct CubicSpline {
    knots: Vec<f64>,
    values: Vec<f64>,
    second_derivatives: Vec<f64>,
}

impl CubicSpline {
    /// `None` unless there are at least four strictly increasing knots.
    pub fn not_a_knot(knots: &[f64], values: &[f64]) -> Option<Self> {
        let n = knots.len();
        if n < 4 || values.len() != n || knots.windows(2).any(|w| w[1] <= w[0]) {
            return None;
        }
        let h: Vec<f64> = knots.windows(2).map(|w| w[1] - w[0]).collect();

        let mut matrix = DMatrix::<f64>::zeros(n, n);
        let mut rhs = DVector::<f64>::zeros(n);

        matrix[(0, 0)] = h[1];
        matrix[(0, 1)] = -(h[0] + h[1]);
        matrix[(0, 2)] = h[0];

        for i in 1..n - 1 {
            matrix[(i, i - 1)] = h[i - 1];
            matrix[(i, i)] = 2.0 * (h[i - 1] + h[i]);
            matrix[(i, i + 1)] = h[i];
            rhs[i] = 6.0
                * ((values[i + 1] - values[i]) / h[i] - (values[i] - values[i - 1]) / h[i - 1]);
        }

        matrix[(n - 1, n - 3)] = h[n - 2];
        matrix[(n - 1, n - 2)] = -(h[n - 3] + h[n - 2]);
        matrix[(n - 1, n - 1)] = h[n - 3];

        let second_derivatives = matrix.lu().solve(&rhs)?.iter().copied().collect();
        Some(Self {
            knots: knots.to_vec(),
            values: values.to_vec(),
            second_derivatives,
        })
    }

    pub fn domain(&self) -> (f64, f64) {
        (self.knots[0], self.knots[self.knots.len() - 1])
    }

    /// Value at `x`, or `None` outside the knot range.
    pub fn evaluate(&self, x: f64) -> Option<f64> {
        let (lo, hi) = self.domain();
        if !(lo..=hi).contains(&x) {
            return None;
        }
        let last = self.knots.len() - 2;
        let i = self
            .knots
            .windows(2)
            .position(|w| x >= w[0] && x <= w[1])
            .unwrap_or(last);

        let (x0, x1) = (self.knots[i], self.knots[i + 1]);
        let (y0, y1) = (self.values[i], self.values[i + 1]);
        let (m0, m1) = (self.second_derivatives[i], self.second_derivatives[i + 1]);
        let h = x1 - x0;
        let a = x1 - x;
        let b = x - x0;

        Some(
            m0 * a.powi(3) / (6.0 * h)
                + m1 * b.powi(3) / (6.0 * h)
                + (y0 / h - m0 * h / 6.0) * a
                + (y1 / h - m1 * h / 6.0) * b,
        )
    }
}
