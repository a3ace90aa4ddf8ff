use std::collections::BTreeMap;

use crate::error::{PlotError, Result};
use crate::frame::Value;

/// Axis coordinate transform for continuous scales. Kept as a pure
/// transform/invert pair so statistical transforms can take it as an
/// explicit argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AxisTransform {
    Linear,
    Log10,
}

impl AxisTransform {
    pub fn transform(&self, v: f64) -> f64 {
        match self {
            AxisTransform::Linear => v,
            AxisTransform::Log10 => v.log10(),
        }
    }

    pub fn invert(&self, v: f64) -> f64 {
        match self {
            AxisTransform::Linear => v,
            AxisTransform::Log10 => 10f64.powf(v),
        }
    }
}

/// An aesthetic scale: the mapping between raw data values and the
/// renderable domain of an aesthetic. A closed variant set; equality is
/// used to detect clashing geom defaults.
#[derive(Debug, Clone, PartialEq)]
pub enum Scale {
    /// Values pass through untouched.
    Identity,
    /// Explicit discrete lookup, e.g. species name -> color name. In strict
    /// mode a level missing from the table is an error; otherwise the raw
    /// value passes through.
    DiscreteManual {
        table: BTreeMap<String, String>,
        strict: bool,
    },
    /// Continuous positional axis.
    Axis { transform: AxisTransform },
    /// Positional axis over categorical levels. Levels are accumulated from
    /// the data before the registry is sealed; each level renders at its
    /// index.
    AxisCategorical { levels: Vec<String> },
}

impl Scale {
    pub fn discrete_manual(pairs: &[(&str, &str)], strict: bool) -> Scale {
        Scale::DiscreteManual {
            table: pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            strict,
        }
    }

    pub fn linear() -> Scale {
        Scale::Axis {
            transform: AxisTransform::Linear,
        }
    }

    pub fn log10() -> Scale {
        Scale::Axis {
            transform: AxisTransform::Log10,
        }
    }

    pub fn categorical() -> Scale {
        Scale::AxisCategorical { levels: Vec::new() }
    }

    /// Discrete scales constrain grouping: a grouped aesthetic on a
    /// discrete scale must collapse to one value per group.
    pub fn is_discrete(&self) -> bool {
        matches!(
            self,
            Scale::DiscreteManual { .. } | Scale::AxisCategorical { .. }
        )
    }

    /// The transform/invert pair for continuous axes; linear for everything
    /// else.
    pub fn axis_transform(&self) -> AxisTransform {
        match self {
            Scale::Axis { transform } => *transform,
            _ => AxisTransform::Linear,
        }
    }

    /// Map one raw value into the render domain.
    pub fn apply(&self, raw: &Value) -> Result<Value> {
        match self {
            Scale::Identity | Scale::Axis { .. } => Ok(raw.clone()),
            Scale::DiscreteManual { table, strict } => match raw {
                Value::Str(s) => match table.get(s) {
                    Some(mapped) => Ok(Value::Str(mapped.clone())),
                    None if *strict => Err(PlotError::data(format!(
                        "value {:?} has no entry in strict discrete scale",
                        s
                    ))),
                    None => Ok(raw.clone()),
                },
                other => Ok(other.clone()),
            },
            Scale::AxisCategorical { levels } => match raw {
                Value::Str(s) => levels
                    .iter()
                    .position(|l| l == s)
                    .map(|i| Value::Num(i as f64))
                    .ok_or_else(|| {
                        PlotError::data(format!(
                            "categorical level {:?} not registered on axis scale",
                            s
                        ))
                    }),
                other => Ok(other.clone()),
            },
        }
    }

    /// Numeric position for a coordinate value: numbers pass through,
    /// categorical strings map to their level index.
    pub fn position(&self, raw: &Value) -> Result<f64> {
        match self.apply(raw)? {
            Value::Num(v) => Ok(v),
            other => Err(PlotError::data(format!(
                "value {:?} has no numeric position under scale {:?}",
                other, self
            ))),
        }
    }

    fn add_levels(&mut self, values: &[Value]) {
        if let Scale::AxisCategorical { levels } = self {
            let mut fresh: Vec<String> = values
                .iter()
                .filter_map(|v| v.as_str())
                .filter(|s| !levels.iter().any(|l| l == s))
                .map(|s| s.to_string())
                .collect();
            fresh.sort();
            fresh.dedup();
            levels.extend(fresh);
        }
    }

    pub fn levels(&self) -> &[String] {
        match self {
            Scale::AxisCategorical { levels } => levels,
            _ => &[],
        }
    }
}

/// Session object owning one scale per rendered aesthetic for a single
/// render pass. Levels accumulate while open; sealing freezes the registry
/// before the panel loop so every panel sees identical scales.
#[derive(Debug, Clone)]
pub struct ScaleRegistry {
    scales: BTreeMap<String, Scale>,
    sealed: bool,
}

impl ScaleRegistry {
    pub fn new() -> Self {
        ScaleRegistry {
            scales: BTreeMap::new(),
            sealed: false,
        }
    }

    pub fn insert(&mut self, aesthetic: &str, scale: Scale) -> Result<()> {
        if self.sealed {
            return Err(PlotError::config(format!(
                "cannot register scale for {:?} after the registry is sealed",
                aesthetic
            )));
        }
        self.scales.insert(aesthetic.to_string(), scale);
        Ok(())
    }

    pub fn get(&self, aesthetic: &str) -> Option<&Scale> {
        self.scales.get(aesthetic)
    }

    /// Scale for an aesthetic, defaulting to identity when none was
    /// registered (non-positional aesthetics that nobody scaled).
    pub fn get_or_identity(&self, aesthetic: &str) -> Scale {
        self.scales
            .get(aesthetic)
            .cloned()
            .unwrap_or(Scale::Identity)
    }

    /// Feed observed raw values into a categorical axis scale.
    pub fn observe(&mut self, aesthetic: &str, values: &[Value]) -> Result<()> {
        if self.sealed {
            return Err(PlotError::config(format!(
                "cannot extend levels for {:?} after the registry is sealed",
                aesthetic
            )));
        }
        if let Some(scale) = self.scales.get_mut(aesthetic) {
            scale.add_levels(values);
        }
        Ok(())
    }

    pub fn seal(&mut self) {
        self.sealed = true;
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    pub fn aesthetics(&self) -> impl Iterator<Item = &String> {
        self.scales.keys()
    }
}

impl Default for ScaleRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Collapse the resolved values of a grouped aesthetic to the single value
/// it must hold within one group.
pub fn collapse_single(aesthetic: &str, values: &[Value]) -> Result<Value> {
    let mut distinct: Vec<&Value> = Vec::new();
    for v in values {
        if !distinct.contains(&v) {
            distinct.push(v);
        }
    }
    match distinct.len() {
        0 => Err(PlotError::data(format!(
            "grouped aesthetic {:?} has no values within a group",
            aesthetic
        ))),
        1 => Ok(distinct[0].clone()),
        n => Err(PlotError::data(format!(
            "grouped aesthetic {:?} takes {} distinct values within a single group",
            aesthetic, n
        ))),
    }
}
