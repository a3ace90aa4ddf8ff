use std::collections::BTreeMap;

use crate::aes::{
    combined_mapping, resolve_aesthetic, Inheritance, Mapping, ParamValue, Params, Resolved,
};
use crate::config::PlotConfig;
use crate::error::{PlotError, Result};
use crate::facet::{FacetSpec, Faceter};
use crate::frame::{Frame, Value};
use crate::geom::Geom;
use crate::group::group_data;
use crate::palette;
use crate::scale::{collapse_single, Scale, ScaleRegistry};
use crate::stat::GroupValues;
use crate::surface::{self, DrawCommand, PanelScene};
use crate::RenderOptions;

/// Positional aesthetics share the scale of their axis.
fn axis_family(aesthetic: &str) -> Option<&'static str> {
    match aesthetic {
        "x" | "xintercept" | "xmin" | "xmax" => Some("x"),
        "y" | "yintercept" | "ymin" | "ymax" => Some("y"),
        _ => None,
    }
}

/// Top-level declarative plot description. Build one up, then call
/// `render`; the instance itself stays immutable across render passes and
/// all accumulating state lives in per-pass session objects.
#[derive(Debug, Clone)]
pub struct Plot {
    pub data: Option<Frame>,
    pub mapping: Mapping,
    pub params: Params,
    pub geoms: Vec<Geom>,
    pub scales: BTreeMap<String, Scale>,
    pub facet: FacetSpec,
    pub config: PlotConfig,
}

impl Plot {
    pub fn new() -> Plot {
        Plot {
            data: None,
            mapping: Mapping::new(),
            params: Params::new(),
            geoms: Vec::new(),
            scales: BTreeMap::new(),
            facet: FacetSpec::Null,
            config: PlotConfig::default(),
        }
    }

    pub fn with_data(mut self, data: Frame) -> Plot {
        self.data = Some(data);
        self
    }

    pub fn with_mapping(mut self, mapping: Mapping) -> Plot {
        self.mapping = mapping;
        self
    }

    pub fn with_params(mut self, params: Params) -> Plot {
        self.params = params;
        self
    }

    pub fn with_geom(mut self, geom: Geom) -> Plot {
        self.geoms.push(geom);
        self
    }

    pub fn with_scale(mut self, aesthetic: &str, scale: Scale) -> Plot {
        self.scales.insert(aesthetic.to_string(), scale);
        self
    }

    pub fn with_facet(mut self, facet: FacetSpec) -> Plot {
        self.facet = facet;
        self
    }

    pub fn with_config(mut self, config: PlotConfig) -> Plot {
        self.config = config;
        self
    }

    fn inheritance<'a>(&'a self, geom: &'a Geom) -> Inheritance<'a> {
        Inheritance {
            own_mapping: &geom.mapping,
            own_params: &geom.params,
            inherited_mapping: &self.mapping,
            inherited_params: &self.params,
            inherit_mapping: geom.inherit_mapping,
            inherit_params: geom.inherit_params,
        }
    }

    /// Build the faceter session and run the level-accumulation pass over
    /// every data source.
    fn build_faceter(&self) -> Result<Faceter> {
        let mut faceter = Faceter::new(self.facet.clone());
        faceter.add_levels_from_data(self.data.as_ref())?;
        for geom in &self.geoms {
            faceter.add_levels_from_data(geom.data.as_ref())?;
        }
        faceter.seal();
        Ok(faceter)
    }

    /// One scale per rendered aesthetic: plot-level override first, else a
    /// single consistent default across the layers that use it.
    fn collate_scales(&self) -> Result<ScaleRegistry> {
        let mut registry = ScaleRegistry::new();
        let mut defaults: BTreeMap<String, (Scale, String)> = BTreeMap::new();

        for geom in &self.geoms {
            let caps = geom.caps();
            for (aes, scale) in &caps.default_scales {
                let slot = axis_family(aes).unwrap_or(aes).to_string();
                match defaults.get(&slot) {
                    Some((existing, owner)) if existing != scale => {
                        return Err(PlotError::config(format!(
                            "no scale specified for aesthetic {:?} and clashing defaults \
                             between {} and {}",
                            slot,
                            owner,
                            geom.display_name()
                        )));
                    }
                    Some(_) => {}
                    None => {
                        defaults.insert(slot, (scale.clone(), geom.display_name()));
                    }
                }
            }
        }

        for (slot, (scale, _)) in defaults {
            let chosen = self.scales.get(&slot).cloned().unwrap_or(scale);
            registry.insert(&slot, chosen)?;
        }
        // explicit overrides for aesthetics no geom declared a default for
        for (aes, scale) in &self.scales {
            if registry.get(aes).is_none() {
                registry.insert(aes, scale.clone())?;
            }
        }

        self.infer_data_driven_scales(&mut registry)?;
        registry.seal();
        Ok(registry)
    }

    /// Inspect every layer's resolved values once before sealing: string
    /// values on a positional axis upgrade it to a categorical scale, and
    /// mapped string levels on an unscaled color aesthetic get a palette
    /// cycle.
    fn infer_data_driven_scales(&self, registry: &mut ScaleRegistry) -> Result<()> {
        let mut axis_strings: BTreeMap<String, Vec<Value>> = BTreeMap::new();
        let mut color_levels: Vec<String> = Vec::new();
        let mut color_needs_palette = false;

        for geom in &self.geoms {
            let caps = geom.caps();
            let data = geom.choose_data(self.data.as_ref());
            let empty = Frame::empty(Vec::new());
            let data = data.unwrap_or(&empty);
            let chain = self.inheritance(geom);
            for aes in &caps.aesthetics {
                let resolved =
                    resolve_aesthetic(aes, data, chain, caps.default_for(aes))?;
                if let Some(family) = axis_family(aes) {
                    let values = match &resolved {
                        Resolved::Column(vals) => vals.clone(),
                        Resolved::Scalar(ParamValue::Str(s)) => vec![Value::Str(s.clone())],
                        _ => continue,
                    };
                    let strings: Vec<Value> = values
                        .iter()
                        .filter(|v| v.as_str().is_some())
                        .cloned()
                        .collect();
                    if !strings.is_empty() {
                        axis_strings
                            .entry(family.to_string())
                            .or_default()
                            .extend(strings);
                    }
                } else if aes == "color" || aes == "markeredgecolor" {
                    // only mapped columns cycle the palette; a parameter
                    // string is taken literally as a color name
                    if let Resolved::Column(vals) = &resolved {
                        for v in vals {
                            if let Some(s) = v.as_str() {
                                color_needs_palette = true;
                                if !color_levels.contains(&s.to_string()) {
                                    color_levels.push(s.to_string());
                                }
                            }
                        }
                    }
                }
            }
        }

        for (family, strings) in axis_strings {
            let upgrade = match registry.get(&family) {
                Some(Scale::Axis { .. }) | None => true,
                _ => false,
            };
            if upgrade {
                registry.insert(&family, Scale::categorical())?;
            }
            registry.observe(&family, &strings)?;
        }

        if color_needs_palette {
            let unscaled = matches!(registry.get("color"), Some(Scale::Identity) | None);
            if unscaled {
                registry.insert("color", palette::color_scale_for(&color_levels))?;
            }
        }
        Ok(())
    }

    /// Resolve, group, scale, transform, and adjust one layer against one
    /// panel's data, yielding its draw commands.
    fn layer_commands(
        &self,
        geom: &Geom,
        panel_data: Option<&Frame>,
        registry: &ScaleRegistry,
    ) -> Result<Vec<DrawCommand>> {
        let caps = geom.caps();
        let empty = Frame::empty(Vec::new());
        let data = panel_data.unwrap_or(&empty);
        let chain = self.inheritance(geom);

        // required aesthetics must resolve to something before grouping
        for aes in &caps.required {
            let resolved = resolve_aesthetic(aes, data, chain, caps.default_for(aes))?;
            match resolved {
                Resolved::Unset => {
                    return Err(PlotError::data(format!(
                        "required aesthetic {:?} unresolved for {}",
                        aes,
                        geom.display_name()
                    )))
                }
                Resolved::Column(vals) if vals.is_empty() => {
                    // empty panel subset: nothing to draw, not an error
                    return Ok(Vec::new());
                }
                _ => {}
            }
        }

        let combined = combined_mapping(chain);
        let groups = group_data(data, &combined, &caps.grouped)?;

        let mut group_values: Vec<GroupValues> = Vec::with_capacity(groups.len());
        for group in &groups {
            let mut values = GroupValues::new();
            for aes in &caps.aesthetics {
                let mut resolved =
                    resolve_aesthetic(aes, &group.data, chain, caps.default_for(aes))?;
                if resolved.is_unset() {
                    values.insert(aes.clone(), resolved);
                    continue;
                }
                // a grouped aesthetic holds one value per group
                if caps.grouped.contains(aes) {
                    if let Resolved::Column(vals) = &resolved {
                        let single = collapse_single(aes, vals)?;
                        resolved = Resolved::Scalar(value_to_param(single));
                    }
                }
                let scale = match axis_family(aes) {
                    Some(family) => registry.get_or_identity(family),
                    None => registry.get_or_identity(aes),
                };
                resolved = scale_resolved(&resolved, &scale, axis_family(aes).is_some())?;
                values.insert(aes.clone(), resolved);
            }
            group_values.push(values);
        }

        let transformed: Vec<GroupValues> = group_values
            .iter()
            .map(|values| geom.stat.apply(values, registry))
            .collect::<Result<_>>()?;

        let adjusted = geom.position.apply(&transformed)?;

        let mut commands = Vec::new();
        for values in &adjusted {
            commands.extend(geom.draw_group(values)?);
        }
        Ok(commands)
    }

    /// Render to PNG bytes.
    pub fn render(&self, options: &RenderOptions) -> Result<Vec<u8>> {
        let faceter = self.build_faceter()?;
        let n_facets = faceter.n_facets()?;
        let shape = faceter.shape()?;
        let registry = self.collate_scales()?;

        // pre-pass: all panel commands before any backend work, so axis
        // ranges can be fitted from the full command set
        let mut panel_commands: Vec<Vec<DrawCommand>> = Vec::with_capacity(n_facets);
        for panel in 0..n_facets {
            let inherited = faceter.subset(self.data.as_ref(), panel)?;
            let mut commands = Vec::new();
            for geom in &self.geoms {
                let own = faceter.subset(geom.data.as_ref(), panel)?;
                let chosen = match (&own, geom.inherit_data) {
                    (Some(own), _) => Some(own),
                    (None, true) => inherited.as_ref(),
                    (None, false) => None,
                };
                commands.extend(self.layer_commands(geom, chosen, &registry)?);
            }
            panel_commands.push(commands);
        }

        let scenes = self.assemble_scenes(&faceter, &registry, panel_commands)?;

        let sup_xlabel = self.axis_label("x");
        let sup_ylabel = self.axis_label("y");

        surface::render_figure(
            options.width,
            options.height,
            shape,
            &scenes,
            sup_xlabel.as_deref(),
            sup_ylabel.as_deref(),
            &self.config,
        )
    }

    fn assemble_scenes(
        &self,
        faceter: &Faceter,
        registry: &ScaleRegistry,
        panel_commands: Vec<Vec<DrawCommand>>,
    ) -> Result<Vec<PanelScene>> {
        let x_categories = categorical_levels(registry, "x");
        let y_categories = categorical_levels(registry, "y");

        let extents: Vec<((f64, f64), (f64, f64))> = panel_commands
            .iter()
            .map(|commands| command_extent(commands))
            .collect();
        let shared_x = merge_extents(extents.iter().map(|(x, _)| *x));
        let shared_y = merge_extents(extents.iter().map(|(_, y)| *y));

        let mut scenes = Vec::with_capacity(panel_commands.len());
        for (panel, commands) in panel_commands.into_iter().enumerate() {
            let (local_x, local_y) = extents[panel];
            let x_extent = if self.facet.sharex() { shared_x } else { local_x };
            let y_extent = if self.facet.sharey() { shared_y } else { local_y };

            let x_range = match &x_categories {
                Some(levels) if !levels.is_empty() => -0.5..(levels.len() as f64 - 0.5),
                _ => surface::pad_range(x_extent.0, x_extent.1),
            };
            let y_range = match &y_categories {
                Some(levels) if !levels.is_empty() => -0.5..(levels.len() as f64 - 0.5),
                _ => surface::pad_range(y_extent.0, y_extent.1),
            };

            scenes.push(PanelScene {
                grid_pos: faceter.grid_position(panel)?,
                x_range,
                y_range,
                x_categories: x_categories.clone(),
                y_categories: y_categories.clone(),
                commands,
                labels: faceter.labels(panel)?,
            });
        }
        Ok(scenes)
    }

    /// Shared axis label: explicit parameter first, else the mapping
    /// expression's display form when autolabeling is on.
    fn axis_label(&self, axis: &str) -> Option<String> {
        let param_key = format!("{}label", axis);
        if let Some(ParamValue::Str(label)) = self.params.get(&param_key) {
            return Some(label.clone());
        }
        let auto = match axis {
            "x" => self.config.autolabel_xaxis,
            _ => self.config.autolabel_yaxis,
        };
        if auto {
            self.mapping.get(axis).map(|expr| expr.name())
        } else {
            None
        }
    }
}

impl Default for Plot {
    fn default() -> Self {
        Self::new()
    }
}

fn value_to_param(value: Value) -> ParamValue {
    match value {
        Value::Num(v) => ParamValue::Num(v),
        Value::Str(s) => ParamValue::Str(s),
        Value::Null => ParamValue::Num(f64::NAN),
    }
}

/// Run a resolved value through a scale. Positional aesthetics must come
/// out numeric; everything else keeps its shape.
fn scale_resolved(resolved: &Resolved, scale: &Scale, positional: bool) -> Result<Resolved> {
    match resolved {
        Resolved::Column(vals) => {
            if positional {
                let nums = vals
                    .iter()
                    .map(|v| scale.position(v).map(Value::Num))
                    .collect::<Result<Vec<_>>>()?;
                Ok(Resolved::Column(nums))
            } else {
                Ok(Resolved::Column(
                    vals.iter()
                        .map(|v| scale.apply(v))
                        .collect::<Result<Vec<_>>>()?,
                ))
            }
        }
        Resolved::Scalar(ParamValue::Str(s)) => {
            let value = Value::Str(s.clone());
            if positional {
                Ok(Resolved::Scalar(ParamValue::Num(scale.position(&value)?)))
            } else {
                Ok(Resolved::Scalar(value_to_param(scale.apply(&value)?)))
            }
        }
        other => Ok(other.clone()),
    }
}

fn categorical_levels(registry: &ScaleRegistry, axis: &str) -> Option<Vec<String>> {
    match registry.get(axis) {
        Some(Scale::AxisCategorical { levels }) => Some(levels.clone()),
        _ => None,
    }
}

fn command_extent(commands: &[DrawCommand]) -> ((f64, f64), (f64, f64)) {
    let mut x = (f64::INFINITY, f64::NEG_INFINITY);
    let mut y = (f64::INFINITY, f64::NEG_INFINITY);
    for command in commands {
        let (xs, ys) = command.extent();
        for v in xs {
            x.0 = x.0.min(v);
            x.1 = x.1.max(v);
        }
        for v in ys {
            y.0 = y.0.min(v);
            y.1 = y.1.max(v);
        }
    }
    (x, y)
}

fn merge_extents(extents: impl Iterator<Item = (f64, f64)>) -> (f64, f64) {
    let mut merged = (f64::INFINITY, f64::NEG_INFINITY);
    for (lo, hi) in extents {
        merged.0 = merged.0.min(lo);
        merged.1 = merged.1.max(hi);
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::position::Position;
    use crate::stat::Axis;

    fn make_data() -> Frame {
        Frame::new(
            vec!["t".to_string(), "v".to_string(), "g".to_string()],
            vec![
                vec![
                    Value::Num(1.0),
                    Value::Num(10.0),
                    Value::Str("a".to_string()),
                ],
                vec![
                    Value::Num(2.0),
                    Value::Num(20.0),
                    Value::Str("a".to_string()),
                ],
                vec![
                    Value::Num(1.0),
                    Value::Num(15.0),
                    Value::Str("b".to_string()),
                ],
                vec![
                    Value::Num(2.0),
                    Value::Num(25.0),
                    Value::Str("b".to_string()),
                ],
            ],
        )
        .unwrap()
    }

    fn base_plot() -> Plot {
        Plot::new()
            .with_data(make_data())
            .with_mapping(
                Mapping::new()
                    .set("x", "t")
                    .unwrap()
                    .set("y", "v")
                    .unwrap(),
            )
    }

    #[test]
    fn test_collate_scales_defaults_to_linear_axes() {
        let plot = base_plot().with_geom(Geom::line());
        let registry = plot.collate_scales().unwrap();
        assert_eq!(registry.get("x"), Some(&Scale::linear()));
        assert!(registry.is_sealed());
    }

    #[test]
    fn test_collate_scales_upgrades_categorical_axis() {
        let plot = base_plot()
            .with_mapping(
                Mapping::new()
                    .set("x", "g")
                    .unwrap()
                    .set("y", "v")
                    .unwrap(),
            )
            .with_geom(Geom::point());
        let registry = plot.collate_scales().unwrap();
        match registry.get("x") {
            Some(Scale::AxisCategorical { levels }) => {
                assert_eq!(levels, &["a".to_string(), "b".to_string()]);
            }
            other => panic!("expected categorical x scale, got {:?}", other),
        }
    }

    #[test]
    fn test_mapped_color_gets_palette() {
        let plot = base_plot().with_geom(
            Geom::point().with_mapping(Mapping::new().set("color", "g").unwrap()),
        );
        let registry = plot.collate_scales().unwrap();
        match registry.get("color") {
            Some(Scale::DiscreteManual { table, .. }) => {
                assert_eq!(table["a"], "blue");
                assert_eq!(table["b"], "orange");
            }
            other => panic!("expected palette scale, got {:?}", other),
        }
    }

    #[test]
    fn test_mapped_color_levels_named_like_colors_still_palette() {
        let data = Frame::new(
            vec!["t".to_string(), "v".to_string(), "g".to_string()],
            vec![
                vec![Value::Num(1.0), Value::Num(10.0), Value::Str("b".to_string())],
                vec![Value::Num(2.0), Value::Num(20.0), Value::Str("r".to_string())],
            ],
        )
        .unwrap();
        let plot = Plot::new()
            .with_data(data)
            .with_mapping(
                Mapping::new()
                    .set("x", "t")
                    .unwrap()
                    .set("y", "v")
                    .unwrap(),
            )
            .with_geom(
                Geom::point().with_mapping(Mapping::new().set("color", "g").unwrap()),
            );
        let registry = plot.collate_scales().unwrap();
        match registry.get("color") {
            Some(Scale::DiscreteManual { table, .. }) => {
                // every mapped level gets a palette entry, even levels that
                // collide with literal color names
                assert_eq!(table["b"], "blue");
                assert_eq!(table["r"], "orange");
            }
            other => panic!("expected palette scale, got {:?}", other),
        }
    }

    #[test]
    fn test_param_color_literal_stays_unscaled() {
        let plot = base_plot()
            .with_geom(Geom::point().with_params(Params::new().set("color", "red")));
        let registry = plot.collate_scales().unwrap();
        assert!(registry.get("color").is_none());
    }

    #[test]
    fn test_layer_commands_groups_by_color() {
        let plot = base_plot().with_geom(
            Geom::line().with_mapping(Mapping::new().set("color", "g").unwrap()),
        );
        let registry = plot.collate_scales().unwrap();
        let commands = plot
            .layer_commands(&plot.geoms[0], plot.data.as_ref(), &registry)
            .unwrap();
        // one line per group
        assert_eq!(commands.len(), 2);
    }

    #[test]
    fn test_dodge_pipeline_produces_offset_positions() {
        let data = Frame::new(
            vec!["x".to_string(), "y".to_string(), "g".to_string()],
            vec![
                vec![Value::Num(5.0), Value::Num(1.0), Value::Str("a".to_string())],
                vec![Value::Num(5.0), Value::Num(2.0), Value::Str("b".to_string())],
            ],
        )
        .unwrap();
        let plot = Plot::new()
            .with_data(data)
            .with_mapping(
                Mapping::new()
                    .set("x", "x")
                    .unwrap()
                    .set("y", "y")
                    .unwrap()
                    .set("color", "g")
                    .unwrap(),
            )
            .with_geom(Geom::point().with_position(Position::dodge_x(2.0)));
        let registry = plot.collate_scales().unwrap();
        let commands = plot
            .layer_commands(&plot.geoms[0], plot.data.as_ref(), &registry)
            .unwrap();
        let xs: Vec<f64> = commands
            .iter()
            .filter_map(|c| match c {
                DrawCommand::Marker { points, .. } => Some(points[0].0),
                _ => None,
            })
            .collect();
        assert_eq!(xs, vec![4.5, 5.5]);
    }

    #[test]
    fn test_missing_required_aesthetic_is_data_error() {
        let plot = Plot::new()
            .with_data(make_data())
            .with_mapping(Mapping::new().set("x", "t").unwrap())
            .with_geom(Geom::point());
        let registry = plot.collate_scales().unwrap();
        let res = plot.layer_commands(&plot.geoms[0], plot.data.as_ref(), &registry);
        assert!(matches!(res, Err(PlotError::Data(_))));
    }

    #[test]
    fn test_point_interval_pipeline() {
        let data = Frame::new(
            vec!["x".to_string(), "y".to_string()],
            (1..=5)
                .map(|i| vec![Value::Num(1.0), Value::Num(i as f64)])
                .collect(),
        )
        .unwrap();
        let plot = Plot::new()
            .with_data(data)
            .with_mapping(
                Mapping::new()
                    .set("x", "x")
                    .unwrap()
                    .set("y", "y")
                    .unwrap(),
            )
            .with_geom(Geom::point_interval(vec![Axis::Y]));
        let registry = plot.collate_scales().unwrap();
        let commands = plot
            .layer_commands(&plot.geoms[0], plot.data.as_ref(), &registry)
            .unwrap();
        match &commands[0] {
            DrawCommand::ErrorBar { y, yerr, .. } => {
                assert_eq!(*y, 3.0);
                let (lo, hi) = yerr.unwrap();
                assert!((lo - 1.9).abs() < 1e-12);
                assert!((hi - 1.9).abs() < 1e-12);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_render_end_to_end_png() {
        let plot = base_plot().with_geom(Geom::line());
        let png = plot.render(&RenderOptions::default()).unwrap();
        assert_eq!(&png[0..8], &[137, 80, 78, 71, 13, 10, 26, 10]);
    }

    #[test]
    fn test_facet_render_grid() {
        let plot = base_plot()
            .with_geom(Geom::point())
            .with_facet(FacetSpec::grid(None, Some(vec!["g".to_string()])));
        let png = plot.render(&RenderOptions::default()).unwrap();
        assert_eq!(&png[0..8], &[137, 80, 78, 71, 13, 10, 26, 10]);
    }

    #[test]
    fn test_axis_label_param_beats_autolabel() {
        let plot = base_plot().with_params(Params::new().set("xlabel", "time (s)"));
        assert_eq!(plot.axis_label("x").unwrap(), "time (s)");
        assert_eq!(plot.axis_label("y").unwrap(), "v");
    }

    #[test]
    fn test_axis_autolabel_off() {
        let mut config = PlotConfig::default();
        config.autolabel_yaxis = false;
        let plot = base_plot().with_config(config);
        assert!(plot.axis_label("y").is_none());
    }
}
