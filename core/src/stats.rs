//! Small numeric toolkit shared by the prediction models.
//!
//! Everything here is deterministic and allocation-light. Population
//! (not sample) statistics are used throughout.

// Abramowitz & Stegun 7.1.26 coefficients.
const AS_A1: f64 = 0.254_829_592;
const AS_A2: f64 = -0.284_496_736;
const AS_A3: f64 = 1.421_413_741;
const AS_A4: f64 = -1.453_152_027;
const AS_A5: f64 = 1.061_405_429;
const AS_P: f64 = 0.327_591_1;

pub fn mean(xs: &[f64]) -> f64 {
    if xs.is_empty() {
        return 0.0;
    }
    xs.iter().sum::<f64>() / xs.len() as f64
}

/// Population standard deviation (divides by n).
pub fn std_dev_population(xs: &[f64]) -> f64 {
    if xs.is_empty() {
        return 0.0;
    }
    let m = mean(xs);
    let var = xs.iter().map(|x| (x - m) * (x - m)).sum::<f64>() / xs.len() as f64;
    var.sqrt()
}

/// Ordinary least-squares line `y = slope * x + intercept`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearFit {
    pub slope:     f64,
    pub intercept: f64,
}

impl LinearFit {
    pub fn predict(&self, x: f64) -> f64 {
        self.slope * x + self.intercept
    }
}

/// Fit OLS of `ys` on `xs`. `None` when the inputs are mismatched, shorter
/// than two points, or every `x` is identical.
pub fn linear_regression(xs: &[f64], ys: &[f64]) -> Option<LinearFit> {
    if xs.len() != ys.len() || xs.len() < 2 {
        return None;
    }
    let x_mean = mean(xs);
    let y_mean = mean(ys);
    let (mut sxy, mut sxx) = (0.0, 0.0);
    for (x, y) in xs.iter().zip(ys) {
        sxy += (x - x_mean) * (y - y_mean);
        sxx += (x - x_mean) * (x - x_mean);
    }
    if sxx == 0.0 {
        return None;
    }
    let slope = sxy / sxx;
    Some(LinearFit { slope, intercept: y_mean - slope * x_mean })
}

/// Coefficient of determination between observed and fitted values.
///
/// A constant series has no variance to explain: it scores 1.0 when the fit
/// reproduces it exactly and 0.0 otherwise.
pub fn r_squared(actual: &[f64], fitted: &[f64]) -> f64 {
    if actual.is_empty() || actual.len() != fitted.len() {
        return 0.0;
    }
    let m = mean(actual);
    let ss_tot: f64 = actual.iter().map(|a| (a - m) * (a - m)).sum();
    let ss_res: f64 = actual.iter().zip(fitted).map(|(a, f)| (a - f) * (a - f)).sum();
    if ss_tot == 0.0 {
        return if ss_res <= f64::EPSILON { 1.0 } else { 0.0 };
    }
    1.0 - ss_res / ss_tot
}

pub fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// Error function, Abramowitz & Stegun rational approximation (|err| < 1.5e-7).
pub fn erf(x: f64) -> f64 {
    let sign = if x < 0.0 { -1.0 } else { 1.0 };
    let x = x.abs();
    let t = 1.0 / (1.0 + AS_P * x);
    let poly = ((((AS_A5 * t + AS_A4) * t + AS_A3) * t + AS_A2) * t + AS_A1) * t;
    sign * (1.0 - poly * (-x * x).exp())
}

/// Standard normal cumulative distribution function Φ(z).
pub fn normal_cdf(z: f64) -> f64 {
    0.5 * (1.0 + erf(z / std::f64::consts::SQRT_2))
}

/// Output of Holt's linear (double exponential) smoothing.
#[derive(Debug, Clone, PartialEq)]
pub struct HoltFit {
    pub level: Vec<f64>,
    pub trend: Vec<f64>,
}

impl HoltFit {
    /// Point forecast `h` steps past the last observation.
    pub fn forecast(&self, h: usize) -> f64 {
        let level = self.level.last().copied().unwrap_or(0.0);
        let trend = self.trend.last().copied().unwrap_or(0.0);
        level + h as f64 * trend
    }
}

/// Holt's method seeded with `level = a0`, `trend = a1 - a0`. Needs ≥2 points.
pub fn holt_linear(series: &[f64], alpha: f64, beta: f64) -> Option<HoltFit> {
    if series.len() < 2 {
        return None;
    }
    let mut level = Vec::with_capacity(series.len());
    let mut trend = Vec::with_capacity(series.len());
    level.push(series[0]);
    trend.push(series[1] - series[0]);

    for i in 1..series.len() {
        let prev_level = level[i - 1];
        let prev_trend = trend[i - 1];
        let l = alpha * series[i] + (1.0 - alpha) * (prev_level + prev_trend);
        let t = beta * (l - prev_level) + (1.0 - beta) * prev_trend;
        level.push(l);
        trend.push(t);
    }
    Some(HoltFit { level, trend })
}

/// Simple exponential smoothing; returns the final smoothed value.
pub fn simple_exponential_smoothing(series: &[f64], alpha: f64) -> Option<f64> {
    let (first, rest) = series.split_first()?;
    Some(rest.iter().fold(*first, |s, x| alpha * x + (1.0 - alpha) * s))
}

/// Mean absolute percentage error as a fraction. Points whose actual value is
/// zero are skipped; `None` when no point qualifies.
pub fn mean_absolute_percentage_error(actual: &[f64], predicted: &[f64]) -> Option<f64> {
    let errors: Vec<f64> = actual
        .iter()
        .zip(predicted)
        .filter(|(a, _)| **a != 0.0)
        .map(|(a, p)| ((a - p) / a).abs())
        .collect();
    if errors.is_empty() {
        None
    } else {
        Some(mean(&errors))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64, tol: f64) -> bool {
        (a - b).abs() <= tol
    }

    #[test]
    fn mean_and_population_std_dev() {
        let xs = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert_eq!(mean(&xs), 5.0);
        assert_eq!(std_dev_population(&xs), 2.0);
        assert_eq!(mean(&[]), 0.0);
        assert_eq!(std_dev_population(&[]), 0.0);
    }

    #[test]
    fn regression_recovers_exact_line() {
        let xs = [0.0, 1.0, 2.0, 3.0];
        let ys = [100.0, 110.0, 120.0, 130.0];
        let fit = linear_regression(&xs, &ys).unwrap();
        assert!(close(fit.slope, 10.0, 1e-12));
        assert!(close(fit.intercept, 100.0, 1e-12));
        assert!(close(fit.predict(4.0), 140.0, 1e-9));

        let fitted: Vec<f64> = xs.iter().map(|x| fit.predict(*x)).collect();
        assert!(close(r_squared(&ys, &fitted), 1.0, 1e-12));
    }

    #[test]
    fn regression_rejects_degenerate_input() {
        assert!(linear_regression(&[1.0], &[1.0]).is_none());
        assert!(linear_regression(&[2.0, 2.0], &[1.0, 3.0]).is_none());
        assert!(linear_regression(&[1.0, 2.0], &[1.0]).is_none());
    }

    #[test]
    fn r_squared_of_constant_series() {
        assert_eq!(r_squared(&[5.0, 5.0, 5.0], &[5.0, 5.0, 5.0]), 1.0);
        assert_eq!(r_squared(&[5.0, 5.0, 5.0], &[4.0, 5.0, 6.0]), 0.0);
    }

    #[test]
    fn normal_cdf_matches_reference_values() {
        assert!(close(normal_cdf(0.0), 0.5, 1e-7));
        assert!(close(normal_cdf(1.645), 0.95002, 1e-4));
        assert!(close(normal_cdf(-1.96), 0.02500, 1e-4));
        assert!(close(normal_cdf(1.0) + normal_cdf(-1.0), 1.0, 1e-7));
    }

    #[test]
    fn sigmoid_is_centred() {
        assert_eq!(sigmoid(0.0), 0.5);
        assert!(sigmoid(-3.0) < 0.05);
        assert!(sigmoid(3.0) > 0.95);
    }

    #[test]
    fn holt_follows_a_linear_series_exactly() {
        let series = [10.0, 20.0, 30.0, 40.0];
        let fit = holt_linear(&series, 0.3, 0.1).unwrap();
        for (l, a) in fit.level.iter().zip(series.iter()) {
            assert!(close(*l, *a, 1e-9));
        }
        assert!(close(fit.forecast(1), 50.0, 1e-9));
        assert!(close(fit.forecast(3), 70.0, 1e-9));
        assert!(holt_linear(&[1.0], 0.3, 0.1).is_none());
    }

    #[test]
    fn ses_weights_recent_values() {
        let s = simple_exponential_smoothing(&[1.0, 0.0], 0.3).unwrap();
        assert!(close(s, 0.7, 1e-12));
        assert!(simple_exponential_smoothing(&[], 0.3).is_none());
    }

    #[test]
    fn mape_skips_zero_actuals() {
        let m = mean_absolute_percentage_error(&[100.0, 0.0, 200.0], &[110.0, 5.0, 180.0]).unwrap();
        assert!(close(m, 0.1, 1e-12));
        assert!(mean_absolute_percentage_error(&[0.0], &[1.0]).is_none());
    }
}
