use std::collections::BTreeMap;

use crate::error::Result;
use crate::frame::{Frame, Value};
use crate::parser::{parse_expr, Expr};

/// A literal fixed value supplied as a parameter rather than mapped from data.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Num(f64),
    Str(String),
    NumList(Vec<f64>),
}

impl ParamValue {
    pub fn as_num(&self) -> Option<f64> {
        match self {
            ParamValue::Num(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParamValue::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        ParamValue::Num(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        ParamValue::Str(v.to_string())
    }
}

impl From<Vec<f64>> for ParamValue {
    fn from(v: Vec<f64>) -> Self {
        ParamValue::NumList(v)
    }
}

/// Aesthetic name -> derived-column expression. Iteration order is the
/// sorted key order, which keeps grouping and rendering deterministic.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mapping {
    entries: BTreeMap<String, Expr>,
}

impl Mapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert with an expression string, e.g.
    /// `Mapping::new().set("x", "time")?.set("y", "count / 2")?`.
    pub fn set(mut self, aesthetic: &str, expr: &str) -> Result<Self> {
        let parsed = parse_expr(expr)?;
        self.entries.insert(aesthetic.to_string(), parsed);
        Ok(self)
    }

    pub fn set_expr(mut self, aesthetic: &str, expr: Expr) -> Self {
        self.entries.insert(aesthetic.to_string(), expr);
        self
    }

    pub fn get(&self, aesthetic: &str) -> Option<&Expr> {
        self.entries.get(aesthetic)
    }

    pub fn contains(&self, aesthetic: &str) -> bool {
        self.entries.contains_key(aesthetic)
    }

    pub fn remove(&mut self, aesthetic: &str) -> Option<Expr> {
        self.entries.remove(aesthetic)
    }

    pub fn insert(&mut self, aesthetic: &str, expr: Expr) {
        self.entries.insert(aesthetic.to_string(), expr);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Expr)> {
        self.entries.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.entries.keys()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Aesthetic name (or named option) -> literal value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Params {
    entries: BTreeMap<String, ParamValue>,
}

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, name: &str, value: impl Into<ParamValue>) -> Self {
        self.entries.insert(name.to_string(), value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.entries.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.entries.keys()
    }
}

/// Outcome of resolving one aesthetic: a per-row column, a single literal,
/// or explicitly nothing. `Unset` is a tagged state, not a null sentinel;
/// callers decide whether it is fatal (required aesthetics) or passed along.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolved {
    Column(Vec<Value>),
    Scalar(ParamValue),
    Unset,
}

impl Resolved {
    pub fn is_unset(&self) -> bool {
        matches!(self, Resolved::Unset)
    }

    /// Numeric view: columns yield their non-null cells, numeric scalars a
    /// single-element vec. Strings and unset yield None.
    pub fn as_nums(&self) -> Option<Vec<f64>> {
        match self {
            Resolved::Column(vals) => {
                let nums: Vec<f64> = vals.iter().filter_map(|v| v.as_num()).collect();
                if nums.is_empty() {
                    None
                } else {
                    Some(nums)
                }
            }
            Resolved::Scalar(ParamValue::Num(v)) => Some(vec![*v]),
            Resolved::Scalar(ParamValue::NumList(vs)) => Some(vs.clone()),
            _ => None,
        }
    }

    /// Broadcast to `n` rows of values.
    pub fn broadcast(&self, n: usize) -> Option<Vec<Value>> {
        match self {
            Resolved::Column(vals) => Some(vals.clone()),
            Resolved::Scalar(ParamValue::Num(v)) => Some(vec![Value::Num(*v); n]),
            Resolved::Scalar(ParamValue::Str(s)) => Some(vec![Value::Str(s.clone()); n]),
            Resolved::Scalar(ParamValue::NumList(_)) => None,
            Resolved::Unset => None,
        }
    }
}

/// The inheritance chain a layer resolves against.
#[derive(Debug, Clone, Copy)]
pub struct Inheritance<'a> {
    pub own_mapping: &'a Mapping,
    pub own_params: &'a Params,
    pub inherited_mapping: &'a Mapping,
    pub inherited_params: &'a Params,
    pub inherit_mapping: bool,
    pub inherit_params: bool,
}

/// Resolve one aesthetic against the full inheritance chain.
///
/// Priority, first match wins:
/// 1. own mapping, evaluated against `data`
/// 2. own parameter literal
/// 3. inherited mapping (if inheritance enabled), evaluated against `data`
/// 4. inherited parameter literal (if inheritance enabled)
/// 5. the supplied default, else `Unset`
pub fn resolve_aesthetic(
    aesthetic: &str,
    data: &Frame,
    chain: Inheritance<'_>,
    default: Option<&ParamValue>,
) -> Result<Resolved> {
    if let Some(expr) = chain.own_mapping.get(aesthetic) {
        return Ok(Resolved::Column(expr.eval(data)?));
    }
    if let Some(value) = chain.own_params.get(aesthetic) {
        return Ok(Resolved::Scalar(value.clone()));
    }
    if chain.inherit_mapping {
        if let Some(expr) = chain.inherited_mapping.get(aesthetic) {
            // The inherited expression runs against the layer's own rows.
            return Ok(Resolved::Column(expr.eval(data)?));
        }
    }
    if chain.inherit_params {
        if let Some(value) = chain.inherited_params.get(aesthetic) {
            return Ok(Resolved::Scalar(value.clone()));
        }
    }
    Ok(match default {
        Some(value) => Resolved::Scalar(value.clone()),
        None => Resolved::Unset,
    })
}

/// Merge inherited and own mappings into the view used for grouping.
///
/// Keys fixed by an own parameter are stripped from the inherited mapping
/// first, so an explicit parameter is never shadowed by an inherited column.
pub fn combined_mapping(chain: Inheritance<'_>) -> Mapping {
    let mut combined = Mapping::new();
    if chain.inherit_mapping {
        for (aes, expr) in chain.inherited_mapping.iter() {
            if !chain.own_params.contains(aes) {
                combined.insert(aes, expr.clone());
            }
        }
    }
    for (aes, expr) in chain.own_mapping.iter() {
        combined.insert(aes, expr.clone());
    }
    combined
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::Frame;

    fn make_data() -> Frame {
        Frame::new(
            vec!["u".to_string(), "v".to_string()],
            vec![
                vec![Value::Num(1.0), Value::Num(10.0)],
                vec![Value::Num(2.0), Value::Num(20.0)],
            ],
        )
        .unwrap()
    }

    fn full_chain<'a>(
        own_mapping: &'a Mapping,
        own_params: &'a Params,
        inherited_mapping: &'a Mapping,
        inherited_params: &'a Params,
    ) -> Inheritance<'a> {
        Inheritance {
            own_mapping,
            own_params,
            inherited_mapping,
            inherited_params,
            inherit_mapping: true,
            inherit_params: true,
        }
    }

    #[test]
    fn test_priority_own_mapping_wins() {
        let data = make_data();
        let own_mapping = Mapping::new().set("color", "u").unwrap();
        let own_params = Params::new().set("color", "red");
        let inherited_mapping = Mapping::new().set("color", "v").unwrap();
        let inherited_params = Params::new().set("color", "blue");
        let chain = full_chain(&own_mapping, &own_params, &inherited_mapping, &inherited_params);

        let resolved = resolve_aesthetic("color", &data, chain, None).unwrap();
        assert_eq!(
            resolved,
            Resolved::Column(vec![Value::Num(1.0), Value::Num(2.0)])
        );
    }

    #[test]
    fn test_priority_own_param_beats_inherited_mapping() {
        let data = make_data();
        let own_mapping = Mapping::new();
        let own_params = Params::new().set("color", "red");
        let inherited_mapping = Mapping::new().set("color", "v").unwrap();
        let inherited_params = Params::new();
        let chain = full_chain(&own_mapping, &own_params, &inherited_mapping, &inherited_params);

        let resolved = resolve_aesthetic("color", &data, chain, None).unwrap();
        assert_eq!(resolved, Resolved::Scalar(ParamValue::Str("red".to_string())));
    }

    #[test]
    fn test_inherited_mapping_evaluates_against_own_data() {
        let data = make_data();
        let own_mapping = Mapping::new();
        let own_params = Params::new();
        let inherited_mapping = Mapping::new().set("x", "v").unwrap();
        let inherited_params = Params::new();
        let chain = full_chain(&own_mapping, &own_params, &inherited_mapping, &inherited_params);

        let resolved = resolve_aesthetic("x", &data, chain, None).unwrap();
        assert_eq!(
            resolved,
            Resolved::Column(vec![Value::Num(10.0), Value::Num(20.0)])
        );
    }

    #[test]
    fn test_inheritance_toggles_off() {
        let data = make_data();
        let own_mapping = Mapping::new();
        let own_params = Params::new();
        let inherited_mapping = Mapping::new().set("x", "v").unwrap();
        let inherited_params = Params::new().set("x", 3.0);
        let mut chain =
            full_chain(&own_mapping, &own_params, &inherited_mapping, &inherited_params);
        chain.inherit_mapping = false;
        chain.inherit_params = false;

        let resolved = resolve_aesthetic("x", &data, chain, None).unwrap();
        assert_eq!(resolved, Resolved::Unset);
    }

    #[test]
    fn test_default_is_last_resort() {
        let data = make_data();
        let empty_mapping = Mapping::new();
        let empty_params = Params::new();
        let chain = full_chain(&empty_mapping, &empty_params, &empty_mapping, &empty_params);

        let fallback = ParamValue::Num(1.5);
        let resolved = resolve_aesthetic("lw", &data, chain, Some(&fallback)).unwrap();
        assert_eq!(resolved, Resolved::Scalar(ParamValue::Num(1.5)));
    }

    #[test]
    fn test_resolution_is_idempotent() {
        let data = make_data();
        let own_mapping = Mapping::new().set("y", "u + v").unwrap();
        let empty_params = Params::new();
        let empty_mapping = Mapping::new();
        let chain = full_chain(&own_mapping, &empty_params, &empty_mapping, &empty_params);

        let first = resolve_aesthetic("y", &data, chain, None).unwrap();
        let second = resolve_aesthetic("y", &data, chain, None).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_combined_mapping_param_suppression() {
        let own_mapping = Mapping::new().set("x", "u").unwrap();
        let own_params = Params::new().set("color", "black");
        let inherited_mapping = Mapping::new()
            .set("color", "v")
            .unwrap()
            .set("y", "v")
            .unwrap();
        let inherited_params = Params::new();
        let chain = full_chain(&own_mapping, &own_params, &inherited_mapping, &inherited_params);

        let combined = combined_mapping(chain);
        assert!(combined.contains("x"));
        assert!(combined.contains("y"));
        // the fixed color parameter suppresses the inherited color column
        assert!(!combined.contains("color"));
    }
}
