use crate::aes::{Mapping, ParamValue, Params};
use crate::error::{PlotError, Result};
use crate::frame::Frame;
use crate::kde;
use crate::position::Position;
use crate::scale::Scale;
use crate::stat::{Axis, GroupValues, Stat};
use crate::surface::{DrawCommand, Style};

/// How a violin shape is normalized before mirroring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViolinNorm {
    /// Equal area across violins.
    Area,
    /// Equal maximum width across violins.
    Max,
}

/// The closed set of layer variants. Adding a layer kind means adding a
/// variant here plus its capability-table entry and draw arm below.
#[derive(Debug, Clone, PartialEq)]
pub enum GeomKind {
    Point,
    Line,
    PointLine,
    HLine,
    VLine,
    AxHLine,
    AxVLine,
    PointInterval { axes: Vec<Axis> },
    /// Exponential growth curve from a rate, an intercept on the value
    /// axis, and a domain on the time axis.
    Exponential { time_axis: Axis },
    Density { support_axis: Axis },
    Violin { support_axis: Axis, norm: ViolinNorm },
}

/// Declared metadata for one layer kind: every aesthetic it understands,
/// the subsets that are required / grouped / excluded from legends, its
/// per-aesthetic defaults, and its default positional scales.
#[derive(Debug, Clone)]
pub struct GeomCaps {
    pub aesthetics: Vec<String>,
    pub required: Vec<String>,
    pub grouped: Vec<String>,
    pub legend_excluded: Vec<String>,
    pub defaults: Vec<(String, ParamValue)>,
    pub default_scales: Vec<(String, Scale)>,
}

impl GeomCaps {
    pub fn default_for(&self, aesthetic: &str) -> Option<&ParamValue> {
        self.defaults
            .iter()
            .find(|(name, _)| name == aesthetic)
            .map(|(_, v)| v)
    }

    /// Structural contract: required and grouped sets must name declared
    /// aesthetics.
    pub fn validate(&self) -> Result<()> {
        for name in self.required.iter().chain(self.grouped.iter()) {
            if !self.aesthetics.contains(name) {
                return Err(PlotError::config(format!(
                    "aesthetic {:?} listed as required or grouped but not declared",
                    name
                )));
            }
        }
        Ok(())
    }
}

fn strings(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

fn style_defaults(color: &str, alpha: f64) -> Vec<(String, ParamValue)> {
    vec![
        ("color".to_string(), ParamValue::Str(color.to_string())),
        ("alpha".to_string(), ParamValue::Num(alpha)),
        ("lw".to_string(), ParamValue::Num(1.0)),
    ]
}

fn axis_scales() -> Vec<(String, Scale)> {
    vec![
        ("x".to_string(), Scale::linear()),
        ("y".to_string(), Scale::linear()),
    ]
}

impl GeomKind {
    pub fn caps(&self) -> GeomCaps {
        match self {
            GeomKind::Point => GeomCaps {
                aesthetics: strings(&[
                    "x",
                    "y",
                    "color",
                    "marker",
                    "alpha",
                    "markersize",
                    "markeredgecolor",
                ]),
                required: strings(&["x", "y"]),
                grouped: strings(&[
                    "color",
                    "marker",
                    "alpha",
                    "markersize",
                    "markeredgecolor",
                ]),
                legend_excluded: strings(&["x", "y"]),
                defaults: {
                    let mut d = style_defaults("blue", 1.0);
                    d.push(("marker".to_string(), ParamValue::Str("circle".to_string())));
                    d.push(("markersize".to_string(), ParamValue::Num(3.0)));
                    d
                },
                default_scales: axis_scales(),
            },
            GeomKind::Line => GeomCaps {
                aesthetics: strings(&["x", "y", "color", "alpha", "lw"]),
                required: strings(&["x", "y"]),
                grouped: strings(&["color", "alpha", "lw"]),
                legend_excluded: strings(&["x", "y"]),
                defaults: style_defaults("blue", 1.0),
                default_scales: axis_scales(),
            },
            GeomKind::PointLine => GeomCaps {
                aesthetics: strings(&[
                    "x",
                    "y",
                    "color",
                    "marker",
                    "alpha",
                    "lw",
                    "markersize",
                    "markeredgecolor",
                ]),
                required: strings(&["x", "y"]),
                grouped: strings(&[
                    "color",
                    "marker",
                    "alpha",
                    "lw",
                    "markersize",
                    "markeredgecolor",
                ]),
                legend_excluded: strings(&["x", "y"]),
                defaults: {
                    let mut d = style_defaults("blue", 1.0);
                    d.push(("marker".to_string(), ParamValue::Str("circle".to_string())));
                    d.push(("markersize".to_string(), ParamValue::Num(3.0)));
                    d
                },
                default_scales: axis_scales(),
            },
            GeomKind::HLine => GeomCaps {
                aesthetics: strings(&["yintercept", "xmin", "xmax", "color", "alpha", "lw"]),
                required: strings(&["yintercept"]),
                grouped: strings(&["color", "alpha", "lw"]),
                legend_excluded: strings(&["yintercept", "xmin", "xmax"]),
                defaults: style_defaults("black", 1.0),
                default_scales: axis_scales(),
            },
            GeomKind::VLine => GeomCaps {
                aesthetics: strings(&["xintercept", "ymin", "ymax", "color", "alpha", "lw"]),
                required: strings(&["xintercept"]),
                grouped: strings(&["color", "alpha", "lw"]),
                legend_excluded: strings(&["xintercept", "ymin", "ymax"]),
                defaults: style_defaults("black", 1.0),
                default_scales: axis_scales(),
            },
            GeomKind::AxHLine => GeomCaps {
                aesthetics: strings(&["yintercept", "color", "alpha", "lw"]),
                required: strings(&["yintercept"]),
                grouped: strings(&["color", "alpha", "lw"]),
                legend_excluded: strings(&["yintercept"]),
                defaults: style_defaults("black", 1.0),
                default_scales: axis_scales(),
            },
            GeomKind::AxVLine => GeomCaps {
                aesthetics: strings(&["xintercept", "color", "alpha", "lw"]),
                required: strings(&["xintercept"]),
                grouped: strings(&["color", "alpha", "lw"]),
                legend_excluded: strings(&["xintercept"]),
                defaults: style_defaults("black", 1.0),
                default_scales: axis_scales(),
            },
            GeomKind::PointInterval { axes } => {
                let all = strings(&[
                    "x",
                    "y",
                    "xerr",
                    "yerr",
                    "color",
                    "marker",
                    "alpha",
                    "lw",
                    "markersize",
                ]);
                // axes collapsed by the stat cannot also define groups
                let grouped = all
                    .iter()
                    .filter(|a| {
                        !axes.iter().any(|ax| ax.name() == a.as_str())
                            && !matches!(a.as_str(), "xerr" | "yerr")
                    })
                    .cloned()
                    .collect();
                GeomCaps {
                    aesthetics: all,
                    required: strings(&["x", "y"]),
                    grouped,
                    legend_excluded: strings(&["x", "y", "xerr", "yerr"]),
                    defaults: {
                        let mut d = style_defaults("blue", 1.0);
                        d.push(("marker".to_string(), ParamValue::Str("circle".to_string())));
                        d.push(("markersize".to_string(), ParamValue::Num(4.0)));
                        d
                    },
                    default_scales: axis_scales(),
                }
            }
            GeomKind::Exponential { time_axis } => {
                let value_axis = time_axis.other();
                let curve = vec![
                    "rate".to_string(),
                    format!("{}intercept", value_axis.name()),
                    format!("{}min", time_axis.name()),
                    format!("{}max", time_axis.name()),
                    "n_points".to_string(),
                    "base".to_string(),
                ];
                let mut aesthetics = curve.clone();
                aesthetics.extend(strings(&["color", "marker", "alpha", "lw"]));
                GeomCaps {
                    required: curve.clone(),
                    // every curve is one group; any varying aesthetic splits it
                    grouped: aesthetics.clone(),
                    legend_excluded: curve,
                    aesthetics,
                    defaults: {
                        let mut d = style_defaults("black", 1.0);
                        d.push(("n_points".to_string(), ParamValue::Num(100.0)));
                        d.push(("base".to_string(), ParamValue::Num(std::f64::consts::E)));
                        d
                    },
                    default_scales: axis_scales(),
                }
            }
            GeomKind::Density { support_axis } => GeomCaps {
                aesthetics: {
                    let mut a = strings(&["color", "alpha", "lw", "support", "density"]);
                    a.push(support_axis.name().to_string());
                    a
                },
                required: vec![support_axis.name().to_string()],
                grouped: strings(&["color", "alpha", "lw"]),
                legend_excluded: {
                    let mut a = strings(&["support", "density"]);
                    a.push(support_axis.name().to_string());
                    a
                },
                defaults: style_defaults("blue", 1.0),
                default_scales: axis_scales(),
            },
            GeomKind::Violin { support_axis, .. } => {
                let all = strings(&["x", "y", "color", "alpha", "lw", "violinwidth"]);
                let grouped = all
                    .iter()
                    .filter(|a| a.as_str() != support_axis.name())
                    .cloned()
                    .collect();
                GeomCaps {
                    aesthetics: all,
                    required: strings(&["x", "y"]),
                    grouped,
                    legend_excluded: strings(&["x", "y"]),
                    defaults: {
                        let mut d = style_defaults("blue", 0.6);
                        d.push(("violinwidth".to_string(), ParamValue::Num(0.8)));
                        d
                    },
                    default_scales: axis_scales(),
                }
            }
        }
    }

    fn default_stat(&self) -> Stat {
        match self {
            GeomKind::PointInterval { axes } => Stat::point_interval(axes.clone()),
            GeomKind::Density { support_axis } => Stat::density(*support_axis),
            GeomKind::Violin { support_axis, .. } => Stat::density(*support_axis),
            _ => Stat::Identity,
        }
    }
}

/// One renderable layer: a kind plus its own data, mapping, parameters,
/// inheritance toggles, stat, and position adjustment. Immutable once
/// built; invoked once per facet panel at render time.
#[derive(Debug, Clone)]
pub struct Geom {
    pub kind: GeomKind,
    pub data: Option<Frame>,
    pub mapping: Mapping,
    pub params: Params,
    pub inherit_data: bool,
    pub inherit_mapping: bool,
    pub inherit_params: bool,
    pub stat: Stat,
    pub position: Position,
    pub name: Option<String>,
}

impl Geom {
    /// Validating constructor; the built-in kinds always pass since their
    /// capability tables are closed.
    pub fn new(kind: GeomKind) -> Result<Geom> {
        kind.caps().validate()?;
        Ok(Self::from_kind(kind))
    }

    fn from_kind(kind: GeomKind) -> Geom {
        let stat = kind.default_stat();
        Geom {
            kind,
            data: None,
            mapping: Mapping::new(),
            params: Params::new(),
            inherit_data: true,
            inherit_mapping: true,
            inherit_params: true,
            stat,
            position: Position::Identity,
            name: None,
        }
    }

    pub fn point() -> Geom {
        Self::from_kind(GeomKind::Point)
    }

    pub fn line() -> Geom {
        Self::from_kind(GeomKind::Line)
    }

    pub fn point_line() -> Geom {
        Self::from_kind(GeomKind::PointLine)
    }

    pub fn hline() -> Geom {
        Self::from_kind(GeomKind::HLine)
    }

    pub fn vline() -> Geom {
        Self::from_kind(GeomKind::VLine)
    }

    pub fn axhline() -> Geom {
        Self::from_kind(GeomKind::AxHLine)
    }

    pub fn axvline() -> Geom {
        Self::from_kind(GeomKind::AxVLine)
    }

    pub fn point_interval(axes: Vec<Axis>) -> Geom {
        Self::from_kind(GeomKind::PointInterval { axes })
    }

    pub fn exponential(time_axis: Axis) -> Geom {
        Self::from_kind(GeomKind::Exponential { time_axis })
    }

    pub fn density(support_axis: Axis) -> Geom {
        Self::from_kind(GeomKind::Density { support_axis })
    }

    pub fn violin(support_axis: Axis) -> Geom {
        Self::from_kind(GeomKind::Violin {
            support_axis,
            norm: ViolinNorm::Area,
        })
    }

    pub fn with_data(mut self, data: Frame) -> Geom {
        self.data = Some(data);
        self
    }

    pub fn with_mapping(mut self, mapping: Mapping) -> Geom {
        self.mapping = mapping;
        self
    }

    pub fn with_params(mut self, params: Params) -> Geom {
        self.params = params;
        self
    }

    pub fn with_stat(mut self, stat: Stat) -> Geom {
        self.stat = stat;
        self
    }

    pub fn with_position(mut self, position: Position) -> Geom {
        self.position = position;
        self
    }

    pub fn named(mut self, name: &str) -> Geom {
        self.name = Some(name.to_string());
        self
    }

    pub fn caps(&self) -> GeomCaps {
        self.kind.caps()
    }

    /// The data this layer renders from: its own if set, else the
    /// inherited table when inheritance is on.
    pub fn choose_data<'a>(&'a self, inherited: Option<&'a Frame>) -> Option<&'a Frame> {
        match (&self.data, self.inherit_data) {
            (Some(own), _) => Some(own),
            (None, true) => inherited,
            (None, false) => None,
        }
    }

    pub fn display_name(&self) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| format!("{:?}", self.kind))
    }

    /// Turn one group's final values into draw commands. Positional values
    /// arrive already scaled to numeric coordinates.
    pub fn draw_group(&self, values: &GroupValues) -> Result<Vec<DrawCommand>> {
        let style = Style {
            color: scalar_str(values, "color", "blue"),
            alpha: scalar_num(values, "alpha", 1.0),
            width: scalar_num(values, "lw", 1.0),
        };
        match &self.kind {
            GeomKind::Point => {
                let points = xy_points(values, "x", "y")?;
                Ok(vec![marker_command(values, points, style)])
            }
            GeomKind::Line => {
                let points = xy_points(values, "x", "y")?;
                Ok(vec![DrawCommand::Line { points, style }])
            }
            GeomKind::PointLine => {
                let points = xy_points(values, "x", "y")?;
                Ok(vec![
                    DrawCommand::Line {
                        points: points.clone(),
                        style: style.clone(),
                    },
                    marker_command(values, points, style),
                ])
            }
            GeomKind::HLine => {
                let ys = required_nums(values, "yintercept", &self.display_name())?;
                let x0 = opt_scalar_num(values, "xmin");
                let x1 = opt_scalar_num(values, "xmax");
                Ok(ys
                    .into_iter()
                    .map(|y| DrawCommand::HLine {
                        y,
                        x0,
                        x1,
                        style: style.clone(),
                    })
                    .collect())
            }
            GeomKind::VLine => {
                let xs = required_nums(values, "xintercept", &self.display_name())?;
                let y0 = opt_scalar_num(values, "ymin");
                let y1 = opt_scalar_num(values, "ymax");
                Ok(xs
                    .into_iter()
                    .map(|x| DrawCommand::VLine {
                        x,
                        y0,
                        y1,
                        style: style.clone(),
                    })
                    .collect())
            }
            GeomKind::AxHLine => {
                let ys = required_nums(values, "yintercept", &self.display_name())?;
                let x0 = self.param_num("left_limit", 0.0);
                let x1 = self.param_num("right_limit", 1.0);
                Ok(ys
                    .into_iter()
                    .map(|y| DrawCommand::AxHLine {
                        y,
                        x0_frac: x0,
                        x1_frac: x1,
                        style: style.clone(),
                    })
                    .collect())
            }
            GeomKind::AxVLine => {
                let xs = required_nums(values, "xintercept", &self.display_name())?;
                let y0 = self.param_num("bottom_limit", 0.0);
                let y1 = self.param_num("top_limit", 1.0);
                Ok(xs
                    .into_iter()
                    .map(|x| DrawCommand::AxVLine {
                        x,
                        y0_frac: y0,
                        y1_frac: y1,
                        style: style.clone(),
                    })
                    .collect())
            }
            GeomKind::PointInterval { .. } => {
                let x = single_num(values, "x", &self.display_name())?;
                let y = single_num(values, "y", &self.display_name())?;
                let xerr = err_pair(values, "xerr")?;
                let yerr = err_pair(values, "yerr")?;
                let mut out = vec![DrawCommand::ErrorBar {
                    x,
                    y,
                    xerr,
                    yerr,
                    style: style.clone(),
                }];
                out.push(marker_command(values, vec![(x, y)], style));
                Ok(out)
            }
            GeomKind::Exponential { time_axis } => {
                let name = self.display_name();
                let value_axis = time_axis.other();
                let rate = single_num(values, "rate", &name)?;
                let intercept =
                    single_num(values, &format!("{}intercept", value_axis.name()), &name)?;
                let t0 = single_num(values, &format!("{}min", time_axis.name()), &name)?;
                let t1 = single_num(values, &format!("{}max", time_axis.name()), &name)?;
                let base = scalar_num(values, "base", std::f64::consts::E);
                if intercept <= 0.0 || base <= 0.0 {
                    return Err(PlotError::data(format!(
                        "{} needs a positive intercept and base, got {} and {}",
                        name, intercept, base
                    )));
                }
                let n = (scalar_num(values, "n_points", 100.0).round() as usize).max(2);
                let log_slope = base.ln() * rate;
                let step = (t1 - t0) / (n - 1) as f64;
                let points: Vec<(f64, f64)> = (0..n)
                    .map(|i| {
                        let t = t0 + step * i as f64;
                        let v = (intercept.ln() + log_slope * t).exp();
                        oriented(*time_axis, t, v)
                    })
                    .collect();
                let mut out = vec![DrawCommand::Line {
                    points: points.clone(),
                    style: style.clone(),
                }];
                if values.get("marker").map_or(false, |r| !r.is_unset()) {
                    out.push(marker_command(values, points, style));
                }
                Ok(out)
            }
            GeomKind::Density { support_axis } => {
                let support = required_nums(values, "support", &self.display_name())?;
                let density = required_nums(values, "density", &self.display_name())?;
                let points = match support_axis {
                    Axis::X => support.into_iter().zip(density).collect(),
                    Axis::Y => density.into_iter().zip(support).collect(),
                };
                Ok(vec![DrawCommand::Line { points, style }])
            }
            GeomKind::Violin { support_axis, norm } => {
                let support = required_nums(values, "support", &self.display_name())?;
                let density = required_nums(values, "density", &self.display_name())?;
                let position_axis = support_axis.other();
                let center = single_num(values, position_axis.name(), &self.display_name())?;
                let violinwidth = scalar_num(values, "violinwidth", 0.8);

                let half_widths = normalize_widths(&support, &density, *norm, violinwidth)?;
                let mut outline: Vec<(f64, f64)> = Vec::with_capacity(2 * support.len());
                for (s, w) in support.iter().zip(half_widths.iter()) {
                    outline.push(oriented(position_axis, center - w, *s));
                }
                for (s, w) in support.iter().zip(half_widths.iter()).rev() {
                    outline.push(oriented(position_axis, center + w, *s));
                }
                Ok(vec![
                    DrawCommand::Polygon {
                        points: outline.clone(),
                        style: style.clone(),
                    },
                    DrawCommand::Line {
                        points: outline,
                        style: Style {
                            alpha: 1.0,
                            ..style
                        },
                    },
                ])
            }
        }
    }

    fn param_num(&self, name: &str, default: f64) -> f64 {
        self.params
            .get(name)
            .and_then(|p| p.as_num())
            .unwrap_or(default)
    }
}

/// (coordinate on the position axis, coordinate on the support axis) in
/// (x, y) order.
fn oriented(position_axis: Axis, pos: f64, support: f64) -> (f64, f64) {
    match position_axis {
        Axis::X => (pos, support),
        Axis::Y => (support, pos),
    }
}

fn normalize_widths(
    support: &[f64],
    density: &[f64],
    norm: ViolinNorm,
    violinwidth: f64,
) -> Result<Vec<f64>> {
    match norm {
        ViolinNorm::Max => {
            let max = density.iter().fold(0.0f64, |a, &b| a.max(b));
            if max <= 0.0 {
                return Err(PlotError::data("violin density is identically zero"));
            }
            Ok(density
                .iter()
                .map(|d| d / max * violinwidth / 2.0)
                .collect())
        }
        ViolinNorm::Area => {
            let area = kde::trapezoid(support, density);
            if area <= 0.0 {
                return Err(PlotError::data("violin density has zero area"));
            }
            Ok(density
                .iter()
                .map(|d| d / area * violinwidth / 2.0)
                .collect())
        }
    }
}

fn marker_command(values: &GroupValues, points: Vec<(f64, f64)>, style: Style) -> DrawCommand {
    DrawCommand::Marker {
        points,
        marker: scalar_str(values, "marker", "circle"),
        size: scalar_num(values, "markersize", 3.0),
        edge_color: values
            .get("markeredgecolor")
            .and_then(|r| match r {
                crate::aes::Resolved::Scalar(ParamValue::Str(s)) => Some(s.clone()),
                _ => None,
            }),
        style,
    }
}

fn scalar_num(values: &GroupValues, key: &str, default: f64) -> f64 {
    values
        .get(key)
        .and_then(|r| r.as_nums())
        .and_then(|v| v.first().copied())
        .unwrap_or(default)
}

fn opt_scalar_num(values: &GroupValues, key: &str) -> Option<f64> {
    values
        .get(key)
        .filter(|r| !r.is_unset())
        .and_then(|r| r.as_nums())
        .and_then(|v| v.first().copied())
}

fn scalar_str(values: &GroupValues, key: &str, default: &str) -> String {
    match values.get(key) {
        Some(crate::aes::Resolved::Scalar(ParamValue::Str(s))) => s.clone(),
        Some(crate::aes::Resolved::Column(vals)) => vals
            .first()
            .and_then(|v| v.as_str())
            .unwrap_or(default)
            .to_string(),
        _ => default.to_string(),
    }
}

fn required_nums(values: &GroupValues, key: &str, geom: &str) -> Result<Vec<f64>> {
    values
        .get(key)
        .filter(|r| !r.is_unset())
        .and_then(|r| r.as_nums())
        .ok_or_else(|| {
            PlotError::data(format!(
                "{} needs numeric values for aesthetic {:?}",
                geom, key
            ))
        })
}

fn single_num(values: &GroupValues, key: &str, geom: &str) -> Result<f64> {
    let nums = required_nums(values, key, geom)?;
    match nums.first() {
        Some(v) => Ok(*v),
        None => Err(PlotError::data(format!(
            "{} has no value for aesthetic {:?}",
            geom, key
        ))),
    }
}

fn err_pair(values: &GroupValues, key: &str) -> Result<Option<(f64, f64)>> {
    match values.get(key) {
        None => Ok(None),
        Some(r) if r.is_unset() => Ok(None),
        Some(r) => {
            let nums = r.as_nums().ok_or_else(|| {
                PlotError::data(format!("interval aesthetic {:?} must be numeric", key))
            })?;
            match nums.as_slice() {
                [lo, hi] => Ok(Some((*lo, *hi))),
                [v] => Ok(Some((*v, *v))),
                _ => Err(PlotError::data(format!(
                    "interval aesthetic {:?} must hold [lower, upper], got {} values",
                    key,
                    nums.len()
                ))),
            }
        }
    }
}

/// Broadcast x and y to a common point list.
fn xy_points(values: &GroupValues, x_key: &str, y_key: &str) -> Result<Vec<(f64, f64)>> {
    let xs = required_nums(values, x_key, "layer")?;
    let ys = required_nums(values, y_key, "layer")?;
    match (xs.len(), ys.len()) {
        (a, b) if a == b => Ok(xs.into_iter().zip(ys).collect()),
        (1, _) => Ok(ys.into_iter().map(|y| (xs[0], y)).collect()),
        (_, 1) => Ok(xs.into_iter().map(|x| (x, ys[0])).collect()),
        (a, b) => Err(PlotError::data(format!(
            "x and y lengths differ ({} vs {}) and neither is scalar",
            a, b
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aes::Resolved;
    use crate::frame::Value;

    fn column(vals: &[f64]) -> Resolved {
        Resolved::Column(vals.iter().map(|&v| Value::Num(v)).collect())
    }

    #[test]
    fn test_caps_are_internally_consistent() {
        let kinds = [
            GeomKind::Point,
            GeomKind::Line,
            GeomKind::PointLine,
            GeomKind::HLine,
            GeomKind::VLine,
            GeomKind::AxHLine,
            GeomKind::AxVLine,
            GeomKind::PointInterval {
                axes: vec![Axis::X, Axis::Y],
            },
            GeomKind::Exponential { time_axis: Axis::X },
            GeomKind::Exponential { time_axis: Axis::Y },
            GeomKind::Density {
                support_axis: Axis::X,
            },
            GeomKind::Violin {
                support_axis: Axis::Y,
                norm: ViolinNorm::Area,
            },
        ];
        for kind in kinds {
            kind.caps().validate().unwrap();
        }
    }

    #[test]
    fn test_point_interval_grouped_excludes_collapsed_axes() {
        let caps = GeomKind::PointInterval {
            axes: vec![Axis::Y],
        }
        .caps();
        assert!(caps.grouped.contains(&"x".to_string()));
        assert!(!caps.grouped.contains(&"y".to_string()));
        assert!(!caps.grouped.contains(&"yerr".to_string()));
    }

    #[test]
    fn test_density_required_follows_support_axis() {
        let caps = GeomKind::Density {
            support_axis: Axis::Y,
        }
        .caps();
        assert_eq!(caps.required, vec!["y".to_string()]);
    }

    #[test]
    fn test_point_draw_broadcasts_scalar_x() {
        let geom = Geom::point();
        let mut values = GroupValues::new();
        values.insert(
            "x".to_string(),
            Resolved::Scalar(ParamValue::Num(2.0)),
        );
        values.insert("y".to_string(), column(&[1.0, 2.0, 3.0]));
        let commands = geom.draw_group(&values).unwrap();
        match &commands[0] {
            DrawCommand::Marker { points, .. } => {
                assert_eq!(points, &vec![(2.0, 1.0), (2.0, 2.0), (2.0, 3.0)]);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_point_draw_length_mismatch() {
        let geom = Geom::point();
        let mut values = GroupValues::new();
        values.insert("x".to_string(), column(&[1.0, 2.0]));
        values.insert("y".to_string(), column(&[1.0, 2.0, 3.0]));
        assert!(geom.draw_group(&values).is_err());
    }

    #[test]
    fn test_violin_outline_mirrors_around_center() {
        let geom = Geom::violin(Axis::Y);
        let mut values = GroupValues::new();
        values.insert("x".to_string(), Resolved::Scalar(ParamValue::Num(2.0)));
        values.insert("support".to_string(), column(&[0.0, 1.0, 2.0]));
        values.insert("density".to_string(), column(&[0.0, 1.0, 0.0]));
        let commands = geom.draw_group(&values).unwrap();
        match &commands[0] {
            DrawCommand::Polygon { points, .. } => {
                assert_eq!(points.len(), 6);
                // widest point sits symmetric around x = 2
                let left = points[1].0;
                let right = points[4].0;
                assert!((left + right - 4.0).abs() < 1e-12);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_interval_draw() {
        let geom = Geom::point_interval(vec![Axis::Y]);
        let mut values = GroupValues::new();
        values.insert("x".to_string(), Resolved::Scalar(ParamValue::Num(1.0)));
        values.insert("y".to_string(), Resolved::Scalar(ParamValue::Num(3.0)));
        values.insert(
            "yerr".to_string(),
            Resolved::Scalar(ParamValue::NumList(vec![1.9, 1.9])),
        );
        let commands = geom.draw_group(&values).unwrap();
        match &commands[0] {
            DrawCommand::ErrorBar { y, yerr, xerr, .. } => {
                assert_eq!(*y, 3.0);
                assert_eq!(*yerr, Some((1.9, 1.9)));
                assert_eq!(*xerr, None);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_exponential_curve_values() {
        let geom = Geom::exponential(Axis::X);
        let mut values = GroupValues::new();
        values.insert("rate".to_string(), Resolved::Scalar(ParamValue::Num(1.0)));
        values.insert(
            "yintercept".to_string(),
            Resolved::Scalar(ParamValue::Num(3.0)),
        );
        values.insert("xmin".to_string(), Resolved::Scalar(ParamValue::Num(0.0)));
        values.insert("xmax".to_string(), Resolved::Scalar(ParamValue::Num(2.0)));
        values.insert("base".to_string(), Resolved::Scalar(ParamValue::Num(2.0)));
        values.insert(
            "n_points".to_string(),
            Resolved::Scalar(ParamValue::Num(3.0)),
        );
        let commands = geom.draw_group(&values).unwrap();
        assert_eq!(commands.len(), 1);
        match &commands[0] {
            DrawCommand::Line { points, .. } => {
                // 3 * 2^t at t = 0, 1, 2
                assert_eq!(points.len(), 3);
                for (point, expected) in points.iter().zip([(0.0, 3.0), (1.0, 6.0), (2.0, 12.0)]) {
                    assert!((point.0 - expected.0).abs() < 1e-12);
                    assert!((point.1 - expected.1).abs() < 1e-12);
                }
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_exponential_time_on_y_swaps_coordinates() {
        let geom = Geom::exponential(Axis::Y);
        let mut values = GroupValues::new();
        values.insert("rate".to_string(), Resolved::Scalar(ParamValue::Num(1.0)));
        values.insert(
            "xintercept".to_string(),
            Resolved::Scalar(ParamValue::Num(3.0)),
        );
        values.insert("ymin".to_string(), Resolved::Scalar(ParamValue::Num(0.0)));
        values.insert("ymax".to_string(), Resolved::Scalar(ParamValue::Num(2.0)));
        values.insert("base".to_string(), Resolved::Scalar(ParamValue::Num(2.0)));
        values.insert(
            "n_points".to_string(),
            Resolved::Scalar(ParamValue::Num(3.0)),
        );
        let commands = geom.draw_group(&values).unwrap();
        match &commands[0] {
            DrawCommand::Line { points, .. } => {
                assert!((points[2].0 - 12.0).abs() < 1e-12);
                assert!((points[2].1 - 2.0).abs() < 1e-12);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_exponential_rejects_nonpositive_intercept() {
        let geom = Geom::exponential(Axis::X);
        let mut values = GroupValues::new();
        values.insert("rate".to_string(), Resolved::Scalar(ParamValue::Num(1.0)));
        values.insert(
            "yintercept".to_string(),
            Resolved::Scalar(ParamValue::Num(-1.0)),
        );
        values.insert("xmin".to_string(), Resolved::Scalar(ParamValue::Num(0.0)));
        values.insert("xmax".to_string(), Resolved::Scalar(ParamValue::Num(1.0)));
        assert!(matches!(
            geom.draw_group(&values),
            Err(PlotError::Data(_))
        ));
    }

    #[test]
    fn test_choose_data_respects_toggle() {
        let inherited = Frame::empty(vec!["x".to_string()]);
        let mut geom = Geom::line();
        assert!(geom.choose_data(Some(&inherited)).is_some());
        geom.inherit_data = false;
        assert!(geom.choose_data(Some(&inherited)).is_none());
    }
}
