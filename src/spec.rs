//! Serde front end: a JSON plot description lowered into a `Plot`.

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::aes::{Mapping, ParamValue, Params};
use crate::config::PlotConfig;
use crate::error::{PlotError, Result};
use crate::facet::{ColLabels, FacetSpec, GridOptions, RowLabels, WrapOptions, WrapOrder};
use crate::frame::Frame;
use crate::geom::{Geom, GeomKind, ViolinNorm};
use crate::plot::Plot;
use crate::position::Position;
use crate::scale::Scale;
use crate::stat::Axis;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PlotSpec {
    /// Inline data as an array of row objects; when absent the caller
    /// supplies a frame (the CLI reads CSV from stdin).
    #[serde(default)]
    pub data: Option<serde_json::Value>,
    #[serde(default)]
    pub mapping: BTreeMap<String, String>,
    #[serde(default)]
    pub params: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    pub geoms: Vec<GeomSpec>,
    #[serde(default)]
    pub scales: BTreeMap<String, ScaleSpec>,
    #[serde(default)]
    pub facet: Option<FacetBlock>,
    #[serde(default)]
    pub config: Option<PlotConfig>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GeomSpec {
    pub kind: String,
    #[serde(default)]
    pub data: Option<serde_json::Value>,
    #[serde(default)]
    pub mapping: BTreeMap<String, String>,
    #[serde(default)]
    pub params: BTreeMap<String, serde_json::Value>,
    #[serde(default = "default_true")]
    pub inherit_data: bool,
    #[serde(default = "default_true")]
    pub inherit_mapping: bool,
    #[serde(default = "default_true")]
    pub inherit_params: bool,
    /// Axes collapsed by a point-interval stat, e.g. ["y"].
    #[serde(default)]
    pub axes: Option<Vec<String>>,
    /// Support axis for density and violin layers.
    #[serde(default)]
    pub support_axis: Option<String>,
    /// Time axis for exponential layers, "x" or "y".
    #[serde(default)]
    pub time_axis: Option<String>,
    /// Violin normalization, "area" or "max".
    #[serde(default)]
    pub norm: Option<String>,
    #[serde(default)]
    pub position: Option<PositionSpec>,
    #[serde(default)]
    pub name: Option<String>,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PositionSpec {
    pub kind: String,
    #[serde(default)]
    pub axis: Option<String>,
    #[serde(default)]
    pub offset: Option<f64>,
}

/// Scale shorthand: a bare name for the built-ins, or a lookup table for a
/// manual discrete scale.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ScaleSpec {
    Named(String),
    Discrete {
        table: BTreeMap<String, String>,
        #[serde(default)]
        strict: bool,
    },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FacetBlock {
    pub faceter: String,
    #[serde(default)]
    pub row: Option<Vec<String>>,
    #[serde(default)]
    pub col: Option<Vec<String>>,
    #[serde(default)]
    pub wrap: Option<Vec<String>>,
    #[serde(default)]
    pub nrows: Option<usize>,
    #[serde(default)]
    pub ncols: Option<usize>,
    #[serde(default = "default_true")]
    pub sharex: bool,
    #[serde(default = "default_true")]
    pub sharey: bool,
    #[serde(default = "default_true")]
    pub label: bool,
    #[serde(default)]
    pub order: Option<String>,
}

impl PlotSpec {
    pub fn from_json(json: &str) -> Result<PlotSpec> {
        serde_json::from_str(json)
            .map_err(|e| PlotError::config(format!("invalid plot description: {}", e)))
    }

    /// Lower into a `Plot`. `fallback_data` is the externally supplied
    /// frame, used when the description carries no inline data.
    pub fn into_plot(self, fallback_data: Option<Frame>) -> Result<Plot> {
        let data = match &self.data {
            Some(inline) => Some(Frame::from_json_value(inline)?),
            None => fallback_data,
        };

        let mut plot = Plot::new()
            .with_mapping(build_mapping(&self.mapping)?)
            .with_params(build_params(&self.params)?);
        if let Some(data) = data {
            plot = plot.with_data(data);
        }

        for spec in self.geoms {
            plot = plot.with_geom(spec.into_geom()?);
        }
        for (aesthetic, scale) in &self.scales {
            plot = plot.with_scale(aesthetic, scale.to_scale(aesthetic)?);
        }
        if let Some(block) = self.facet {
            plot = plot.with_facet(block.into_facet()?);
        }
        if let Some(config) = self.config {
            plot = plot.with_config(config);
        }
        Ok(plot)
    }
}

impl GeomSpec {
    fn into_geom(self) -> Result<Geom> {
        let kind = match self.kind.as_str() {
            "point" => GeomKind::Point,
            "line" => GeomKind::Line,
            "pointline" => GeomKind::PointLine,
            "hline" => GeomKind::HLine,
            "vline" => GeomKind::VLine,
            "axhline" => GeomKind::AxHLine,
            "axvline" => GeomKind::AxVLine,
            "pointinterval" => GeomKind::PointInterval {
                // omitted axes collapse both, per the stat's default
                axes: match self.axes.as_deref() {
                    Some(axes) => parse_axes(axes)?,
                    None => vec![Axis::X, Axis::Y],
                },
            },
            "exponential" => GeomKind::Exponential {
                time_axis: parse_axis(self.time_axis.as_deref().unwrap_or("x"))?,
            },
            "density" => GeomKind::Density {
                support_axis: parse_axis(self.support_axis.as_deref().unwrap_or("x"))?,
            },
            "violin" => GeomKind::Violin {
                support_axis: parse_axis(self.support_axis.as_deref().unwrap_or("y"))?,
                norm: parse_norm(self.norm.as_deref().unwrap_or("area"))?,
            },
            other => {
                return Err(PlotError::config(format!("unknown layer kind {:?}", other)))
            }
        };

        let mut geom = Geom::new(kind)?
            .with_mapping(build_mapping(&self.mapping)?)
            .with_params(build_params(&self.params)?);
        geom.inherit_data = self.inherit_data;
        geom.inherit_mapping = self.inherit_mapping;
        geom.inherit_params = self.inherit_params;
        if let Some(inline) = &self.data {
            geom = geom.with_data(Frame::from_json_value(inline)?);
        }
        if let Some(position) = self.position {
            geom = geom.with_position(position.to_position()?);
        }
        if let Some(name) = self.name {
            geom = geom.named(&name);
        }
        Ok(geom)
    }
}

impl PositionSpec {
    fn to_position(&self) -> Result<Position> {
        match self.kind.as_str() {
            "identity" => Ok(Position::Identity),
            "dodge" => {
                let offset = self.offset.ok_or_else(|| {
                    PlotError::config("dodge position needs an offset")
                })?;
                match self.axis.as_deref().unwrap_or("x") {
                    "x" => Ok(Position::dodge_x(offset)),
                    "y" => Ok(Position::dodge_y(offset)),
                    other => Err(PlotError::config(format!(
                        "unknown dodge axis {:?}",
                        other
                    ))),
                }
            }
            other => Err(PlotError::config(format!(
                "unknown position adjustment {:?}",
                other
            ))),
        }
    }
}

impl ScaleSpec {
    fn to_scale(&self, aesthetic: &str) -> Result<Scale> {
        match self {
            ScaleSpec::Named(name) => match name.as_str() {
                "identity" => Ok(Scale::Identity),
                "linear" => Ok(Scale::linear()),
                "log" | "log10" => Ok(Scale::log10()),
                "categorical" => Ok(Scale::categorical()),
                other => Err(PlotError::config(format!(
                    "unknown scale {:?} for aesthetic {:?}",
                    other, aesthetic
                ))),
            },
            ScaleSpec::Discrete { table, strict } => Ok(Scale::DiscreteManual {
                table: table.clone(),
                strict: *strict,
            }),
        }
    }
}

impl FacetBlock {
    fn into_facet(self) -> Result<FacetSpec> {
        match self.faceter.as_str() {
            "no" | "null" => Ok(FacetSpec::Null),
            "grid" => {
                if self.wrap.is_some() {
                    return Err(PlotError::config(
                        "grid faceter does not take a wrap dimension",
                    ));
                }
                Ok(FacetSpec::Grid {
                    row: self.row,
                    col: self.col,
                    options: GridOptions {
                        sharex: self.sharex,
                        sharey: self.sharey,
                        label: self.label,
                        label_rows: RowLabels::Right,
                        label_cols: ColLabels::Top,
                        order: parse_order(self.order.as_deref())?,
                    },
                })
            }
            "wrap" => {
                if self.row.is_some() || self.col.is_some() {
                    return Err(PlotError::config(
                        "wrap faceter does not take row or col dimensions",
                    ));
                }
                let wrap = self.wrap.ok_or_else(|| {
                    PlotError::config("wrap faceter needs a wrap dimension")
                })?;
                Ok(FacetSpec::Wrap {
                    wrap,
                    nrows: self.nrows,
                    ncols: self.ncols,
                    options: WrapOptions {
                        sharex: self.sharex,
                        sharey: self.sharey,
                        label: self.label,
                        ..WrapOptions::default()
                    },
                })
            }
            other => Err(PlotError::config(format!("unknown faceter {:?}", other))),
        }
    }
}

fn parse_order(order: Option<&str>) -> Result<WrapOrder> {
    match order {
        None | Some("row") => Ok(WrapOrder::RowMajor),
        Some("col") => Ok(WrapOrder::ColMajor),
        Some(other) => Err(PlotError::config(format!(
            "unknown facet order {:?}, expected \"row\" or \"col\"",
            other
        ))),
    }
}

fn parse_axis(name: &str) -> Result<Axis> {
    match name {
        "x" => Ok(Axis::X),
        "y" => Ok(Axis::Y),
        other => Err(PlotError::config(format!("unknown axis {:?}", other))),
    }
}

fn parse_axes(names: &[String]) -> Result<Vec<Axis>> {
    names.iter().map(|n| parse_axis(n)).collect()
}

fn parse_norm(name: &str) -> Result<ViolinNorm> {
    match name {
        "area" => Ok(ViolinNorm::Area),
        "max" => Ok(ViolinNorm::Max),
        other => Err(PlotError::config(format!(
            "unknown violin normalization {:?}",
            other
        ))),
    }
}

fn build_mapping(entries: &BTreeMap<String, String>) -> Result<Mapping> {
    let mut mapping = Mapping::new();
    for (aesthetic, expr) in entries {
        mapping = mapping.set(aesthetic, expr)?;
    }
    Ok(mapping)
}

fn build_params(entries: &BTreeMap<String, serde_json::Value>) -> Result<Params> {
    let mut params = Params::new();
    for (name, value) in entries {
        params = params.set(name, json_param(name, value)?);
    }
    Ok(params)
}

fn json_param(name: &str, value: &serde_json::Value) -> Result<ParamValue> {
    match value {
        serde_json::Value::Number(n) => Ok(ParamValue::Num(n.as_f64().unwrap_or(f64::NAN))),
        serde_json::Value::String(s) => Ok(ParamValue::Str(s.clone())),
        serde_json::Value::Array(items) => {
            let nums = items
                .iter()
                .map(|v| v.as_f64())
                .collect::<Option<Vec<f64>>>()
                .ok_or_else(|| {
                    PlotError::config(format!(
                        "parameter {:?} must be a list of numbers",
                        name
                    ))
                })?;
            Ok(ParamValue::NumList(nums))
        }
        other => Err(PlotError::config(format!(
            "parameter {:?} has unsupported value {}",
            name, other
        ))),
    }
}
