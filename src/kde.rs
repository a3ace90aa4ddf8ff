// Kernel density estimation collaborator

use crate::error::{PlotError, Result};
use crate::stat::quantile;

/// Resolution of the evaluation grid when the caller does not choose one.
pub const DEFAULT_GRID_POINTS: usize = 128;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kernel {
    Gaussian,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Bandwidth {
    Silverman,
    Fixed(f64),
}

/// Silverman's rule: h = 0.9 * min(std, IQR/1.34) * n^(-1/5)
pub fn silverman_bandwidth(data: &[f64]) -> f64 {
    let n = data.len() as f64;
    if n < 2.0 {
        return 1.0;
    }

    let mean = data.iter().sum::<f64>() / n;
    let variance = data.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1.0);
    let std_dev = variance.sqrt();

    let mut sorted = data.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let iqr = quantile(&sorted, 0.75) - quantile(&sorted, 0.25);

    let scale = if iqr > 0.0 {
        std_dev.min(iqr / 1.34)
    } else {
        std_dev
    };
    if scale <= 0.0 {
        return 1.0;
    }
    0.9 * scale * n.powf(-0.2)
}

fn gaussian_kernel(u: f64) -> f64 {
    const SQRT_2PI: f64 = 2.5066282746310002;
    (-0.5 * u * u).exp() / SQRT_2PI
}

/// Fit a KDE over `data` and evaluate it on a regular grid extended three
/// bandwidths past the sample range. Returns (support, density).
///
/// Empty or zero-variance samples fail loudly rather than fabricating a
/// curve.
pub fn estimate(
    data: &[f64],
    kernel: Kernel,
    bandwidth: Bandwidth,
    n_points: usize,
) -> Result<(Vec<f64>, Vec<f64>)> {
    if data.is_empty() {
        return Err(PlotError::data(
            "density estimate requested for an empty group",
        ));
    }
    let min = data.iter().fold(f64::INFINITY, |a, &b| a.min(b));
    let max = data.iter().fold(f64::NEG_INFINITY, |a, &b| a.max(b));
    if max - min <= 0.0 {
        return Err(PlotError::data(format!(
            "density estimate requested for a zero-variance group (all values {})",
            min
        )));
    }
    if n_points < 2 {
        return Err(PlotError::config(format!(
            "density grid needs at least 2 points, got {}",
            n_points
        )));
    }

    let h = match bandwidth {
        Bandwidth::Silverman => silverman_bandwidth(data),
        Bandwidth::Fixed(h) if h > 0.0 => h,
        Bandwidth::Fixed(h) => {
            return Err(PlotError::config(format!(
                "bandwidth must be positive, got {}",
                h
            )))
        }
    };

    let n = data.len() as f64;
    let extend = 3.0 * h;
    let start = min - extend;
    let step = (max + extend - start) / (n_points - 1) as f64;

    let mut support = Vec::with_capacity(n_points);
    let mut density = Vec::with_capacity(n_points);
    for i in 0..n_points {
        let s = start + i as f64 * step;
        let d = data
            .iter()
            .map(|&xi| match kernel {
                Kernel::Gaussian => gaussian_kernel((s - xi) / h),
            })
            .sum::<f64>()
            / (n * h);
        support.push(s);
        density.push(d);
    }
    Ok((support, density))
}

/// Trapezoidal integral of y over x.
pub fn trapezoid(x: &[f64], y: &[f64]) -> f64 {
    x.windows(2)
        .zip(y.windows(2))
        .map(|(xs, ys)| (xs[1] - xs[0]) * (ys[0] + ys[1]) / 2.0)
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_silverman_matches_formula() {
        let data = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        let h = silverman_bandwidth(&data);
        // std = sqrt(2.5), IQR = 2, n = 5
        let expected = 0.9 * (2.0 / 1.34f64).min(2.5f64.sqrt()) * 5f64.powf(-0.2);
        assert!((h - expected).abs() < 1e-12);
    }

    #[test]
    fn test_estimate_integrates_to_one() {
        let data = vec![0.0, 0.5, 1.0, 1.5, 2.0, 3.0, 4.0];
        let (support, density) =
            estimate(&data, Kernel::Gaussian, Bandwidth::Silverman, 256).unwrap();
        let area = trapezoid(&support, &density);
        assert!((area - 1.0).abs() < 0.02, "area was {}", area);
    }

    #[test]
    fn test_estimate_rejects_empty_and_degenerate() {
        assert!(estimate(&[], Kernel::Gaussian, Bandwidth::Silverman, 64).is_err());
        assert!(estimate(
            &[2.0, 2.0, 2.0],
            Kernel::Gaussian,
            Bandwidth::Silverman,
            64
        )
        .is_err());
    }

    #[test]
    fn test_estimate_grid_size() {
        let data = vec![0.0, 1.0, 2.0];
        let (support, density) =
            estimate(&data, Kernel::Gaussian, Bandwidth::Fixed(0.5), 64).unwrap();
        assert_eq!(support.len(), 64);
        assert_eq!(density.len(), 64);
        assert!(support[0] < 0.0 && support[63] > 2.0);
    }
}
