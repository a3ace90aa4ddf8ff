use std::collections::BTreeMap;

use crate::aes::{ParamValue, Resolved};
use crate::error::{PlotError, Result};
use crate::frame::Value;
use crate::kde::{self, Bandwidth, Kernel};
use crate::scale::ScaleRegistry;

/// Positional axis selector shared by stats and geoms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
}

impl Axis {
    pub fn name(&self) -> &'static str {
        match self {
            Axis::X => "x",
            Axis::Y => "y",
        }
    }

    pub fn err_name(&self) -> &'static str {
        match self {
            Axis::X => "xerr",
            Axis::Y => "yerr",
        }
    }

    pub fn other(&self) -> Axis {
        match self {
            Axis::X => Axis::Y,
            Axis::Y => Axis::X,
        }
    }
}

/// Point-estimate function for the interval stat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointEstimate {
    Median,
    Mean,
}

impl PointEstimate {
    fn compute(&self, sorted: &[f64]) -> f64 {
        match self {
            PointEstimate::Median => quantile(sorted, 0.5),
            PointEstimate::Mean => sorted.iter().sum::<f64>() / sorted.len() as f64,
        }
    }
}

/// Quantile with linear interpolation between order statistics.
/// `sorted` must be ascending and non-empty.
pub fn quantile(sorted: &[f64], q: f64) -> f64 {
    let n = sorted.len();
    if n == 1 {
        return sorted[0];
    }
    let pos = q.clamp(0.0, 1.0) * (n - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    if lo == hi {
        sorted[lo]
    } else {
        let frac = pos - lo as f64;
        sorted[lo] * (1.0 - frac) + sorted[hi] * frac
    }
}

/// The resolved aesthetic values of one group, keyed by aesthetic name.
pub type GroupValues = BTreeMap<String, Resolved>;

/// Statistical transform from one group's raw resolved values to derived
/// renderable values. Pure: scale transforms come in through the registry
/// argument, never ambient state.
#[derive(Debug, Clone, PartialEq)]
pub enum Stat {
    /// Values pass through unchanged.
    Identity,
    /// Collapse each listed axis to a point estimate plus a paired
    /// `<axis>err` entry holding [point - q(lower), q(upper) - point].
    PointInterval {
        point: PointEstimate,
        lower: f64,
        upper: f64,
        axes: Vec<Axis>,
    },
    /// Kernel density estimate over the support axis, evaluated through
    /// that axis' scale transform and inverted back. Stores `support` and
    /// `density` entries.
    Density {
        kernel: Kernel,
        bandwidth: Bandwidth,
        n_points: usize,
        support_axis: Axis,
    },
}

impl Stat {
    pub fn point_interval(axes: Vec<Axis>) -> Stat {
        Stat::PointInterval {
            point: PointEstimate::Median,
            lower: 0.025,
            upper: 0.975,
            axes,
        }
    }

    pub fn density(support_axis: Axis) -> Stat {
        Stat::Density {
            kernel: Kernel::Gaussian,
            bandwidth: Bandwidth::Silverman,
            n_points: kde::DEFAULT_GRID_POINTS,
            support_axis,
        }
    }

    /// Apply to one group's values. Returns the augmented value set.
    pub fn apply(&self, values: &GroupValues, scales: &ScaleRegistry) -> Result<GroupValues> {
        match self {
            Stat::Identity => Ok(values.clone()),
            Stat::PointInterval {
                point,
                lower,
                upper,
                axes,
            } => {
                let mut out = values.clone();
                for axis in axes {
                    let resolved = match values.get(axis.name()) {
                        Some(r) if !r.is_unset() => r,
                        _ => continue,
                    };
                    let mut nums = resolved.as_nums().ok_or_else(|| {
                        PlotError::data(format!(
                            "point-interval stat needs numeric values on {}",
                            axis.name()
                        ))
                    })?;
                    if nums.is_empty() {
                        return Err(PlotError::data(format!(
                            "point-interval stat received an empty group on {}",
                            axis.name()
                        )));
                    }
                    nums.sort_by(|a, b| a.total_cmp(b));
                    let estimate = point.compute(&nums);
                    let lower_dist = (estimate - quantile(&nums, *lower)).abs();
                    let upper_dist = (quantile(&nums, *upper) - estimate).abs();
                    out.insert(
                        axis.name().to_string(),
                        Resolved::Scalar(ParamValue::Num(estimate)),
                    );
                    out.insert(
                        axis.err_name().to_string(),
                        Resolved::Scalar(ParamValue::NumList(vec![lower_dist, upper_dist])),
                    );
                }
                Ok(out)
            }
            Stat::Density {
                kernel,
                bandwidth,
                n_points,
                support_axis,
            } => {
                let resolved = values.get(support_axis.name()).ok_or_else(|| {
                    PlotError::data(format!(
                        "density stat needs values on its support axis {}",
                        support_axis.name()
                    ))
                })?;
                let raw = resolved.as_nums().ok_or_else(|| {
                    PlotError::data(format!(
                        "density stat needs numeric values on {}",
                        support_axis.name()
                    ))
                })?;

                let transform = scales
                    .get_or_identity(support_axis.name())
                    .axis_transform();
                let transformed: Vec<f64> = raw.iter().map(|&v| transform.transform(v)).collect();

                let (support, density) =
                    kde::estimate(&transformed, *kernel, *bandwidth, *n_points)?;

                let mut out = values.clone();
                out.insert(
                    "support".to_string(),
                    Resolved::Column(
                        support
                            .iter()
                            .map(|&s| Value::Num(transform.invert(s)))
                            .collect(),
                    ),
                );
                out.insert(
                    "density".to_string(),
                    Resolved::Column(density.into_iter().map(Value::Num).collect()),
                );
                Ok(out)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scale::{Scale, ScaleRegistry};

    fn column(vals: &[f64]) -> Resolved {
        Resolved::Column(vals.iter().map(|&v| Value::Num(v)).collect())
    }

    #[test]
    fn test_quantile_interpolates() {
        let vals = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(quantile(&vals, 0.5), 3.0);
        assert!((quantile(&vals, 0.025) - 1.1).abs() < 1e-12);
        assert!((quantile(&vals, 0.975) - 4.9).abs() < 1e-12);
    }

    #[test]
    fn test_point_interval_defaults() {
        let mut values = GroupValues::new();
        values.insert("y".to_string(), column(&[1.0, 2.0, 3.0, 4.0, 5.0]));
        let stat = Stat::point_interval(vec![Axis::Y]);
        let out = stat.apply(&values, &ScaleRegistry::new()).unwrap();

        assert_eq!(
            out["y"],
            Resolved::Scalar(ParamValue::Num(3.0)),
        );
        match &out["yerr"] {
            Resolved::Scalar(ParamValue::NumList(dists)) => {
                assert!((dists[0] - 1.9).abs() < 1e-12);
                assert!((dists[1] - 1.9).abs() < 1e-12);
            }
            other => panic!("unexpected yerr: {:?}", other),
        }
    }

    #[test]
    fn test_point_interval_skips_unset_axis() {
        let mut values = GroupValues::new();
        values.insert("x".to_string(), column(&[1.0, 2.0, 3.0]));
        let stat = Stat::point_interval(vec![Axis::X, Axis::Y]);
        let out = stat.apply(&values, &ScaleRegistry::new()).unwrap();
        assert!(out.contains_key("xerr"));
        assert!(!out.contains_key("yerr"));
    }

    #[test]
    fn test_density_stores_support_and_density() {
        let mut values = GroupValues::new();
        values.insert("x".to_string(), column(&[0.0, 1.0, 1.5, 2.0, 4.0]));
        let stat = Stat::density(Axis::X);
        let out = stat.apply(&values, &ScaleRegistry::new()).unwrap();
        match (&out["support"], &out["density"]) {
            (Resolved::Column(s), Resolved::Column(d)) => {
                assert_eq!(s.len(), kde::DEFAULT_GRID_POINTS);
                assert_eq!(d.len(), kde::DEFAULT_GRID_POINTS);
            }
            other => panic!("unexpected entries: {:?}", other),
        }
    }

    #[test]
    fn test_density_respects_scale_transform() {
        let mut values = GroupValues::new();
        values.insert("x".to_string(), column(&[1.0, 10.0, 100.0, 1000.0]));
        let mut scales = ScaleRegistry::new();
        scales.insert("x", Scale::log10()).unwrap();
        scales.seal();

        let stat = Stat::density(Axis::X);
        let out = stat.apply(&values, &scales).unwrap();
        if let Resolved::Column(support) = &out["support"] {
            // support is inverted back out of log space, so it stays positive
            assert!(support.iter().all(|v| v.as_num().unwrap() > 0.0));
        } else {
            panic!("support missing");
        }
    }

    #[test]
    fn test_identity_passthrough() {
        let mut values = GroupValues::new();
        values.insert("x".to_string(), column(&[1.0, 2.0]));
        let out = Stat::Identity.apply(&values, &ScaleRegistry::new()).unwrap();
        assert_eq!(out, values);
    }
}
