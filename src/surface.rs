use std::ops::Range;

use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};

use crate::config::PlotConfig;
use crate::error::{PlotError, Result};
use crate::facet::{LabelLoc, PanelLabel};

/// Shared stroke/fill styling for a draw command.
#[derive(Debug, Clone, PartialEq)]
pub struct Style {
    pub color: String,
    pub alpha: f64,
    pub width: f64,
}

/// One primitive draw call against a panel, in data coordinates unless
/// noted. Commands are collected first so axis ranges can be computed from
/// their extents before anything touches the backend.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    Line {
        points: Vec<(f64, f64)>,
        style: Style,
    },
    Marker {
        points: Vec<(f64, f64)>,
        marker: String,
        size: f64,
        edge_color: Option<String>,
        style: Style,
    },
    ErrorBar {
        x: f64,
        y: f64,
        xerr: Option<(f64, f64)>,
        yerr: Option<(f64, f64)>,
        style: Style,
    },
    Polygon {
        points: Vec<(f64, f64)>,
        style: Style,
    },
    HLine {
        y: f64,
        x0: Option<f64>,
        x1: Option<f64>,
        style: Style,
    },
    VLine {
        x: f64,
        y0: Option<f64>,
        y1: Option<f64>,
        style: Style,
    },
    /// y in data coordinates, horizontal span in panel fractions.
    AxHLine {
        y: f64,
        x0_frac: f64,
        x1_frac: f64,
        style: Style,
    },
    /// x in data coordinates, vertical span in panel fractions.
    AxVLine {
        x: f64,
        y0_frac: f64,
        y1_frac: f64,
        style: Style,
    },
}

impl DrawCommand {
    /// Data-coordinate extent contributed to (xs, ys) for range fitting.
    pub fn extent(&self) -> (Vec<f64>, Vec<f64>) {
        match self {
            DrawCommand::Line { points, .. }
            | DrawCommand::Marker { points, .. }
            | DrawCommand::Polygon { points, .. } => (
                points.iter().map(|p| p.0).collect(),
                points.iter().map(|p| p.1).collect(),
            ),
            DrawCommand::ErrorBar { x, y, xerr, yerr, .. } => {
                let mut xs = vec![*x];
                let mut ys = vec![*y];
                if let Some((lo, hi)) = xerr {
                    xs.push(x - lo);
                    xs.push(x + hi);
                }
                if let Some((lo, hi)) = yerr {
                    ys.push(y - lo);
                    ys.push(y + hi);
                }
                (xs, ys)
            }
            DrawCommand::HLine { y, x0, x1, .. } => {
                let xs = [x0, x1].iter().filter_map(|v| **v).collect();
                (xs, vec![*y])
            }
            DrawCommand::VLine { x, y0, y1, .. } => {
                let ys = [y0, y1].iter().filter_map(|v| **v).collect();
                (vec![*x], ys)
            }
            DrawCommand::AxHLine { y, .. } => (Vec::new(), vec![*y]),
            DrawCommand::AxVLine { x, .. } => (vec![*x], Vec::new()),
        }
    }
}

/// Everything needed to draw one panel: its grid slot, axis ranges,
/// optional categorical tick labels, the draw commands, and facet labels.
#[derive(Debug, Clone)]
pub struct PanelScene {
    pub grid_pos: (usize, usize),
    pub x_range: Range<f64>,
    pub y_range: Range<f64>,
    pub x_categories: Option<Vec<String>>,
    pub y_categories: Option<Vec<String>>,
    pub commands: Vec<DrawCommand>,
    pub labels: Vec<PanelLabel>,
}

/// Pad a raw [min, max] extent by 5%, or by 1.0 around a single point.
pub fn pad_range(min: f64, max: f64) -> Range<f64> {
    if !min.is_finite() || !max.is_finite() {
        return 0.0..1.0;
    }
    if min == max {
        (min - 1.0)..(max + 1.0)
    } else {
        let padding = (max - min) * 0.05;
        (min - padding)..(max + padding)
    }
}

/// Render a grid of panels onto a fresh RGB buffer and encode it as PNG.
pub fn render_figure(
    width: u32,
    height: u32,
    shape: (usize, usize),
    scenes: &[PanelScene],
    sup_xlabel: Option<&str>,
    sup_ylabel: Option<&str>,
    config: &PlotConfig,
) -> Result<Vec<u8>> {
    let (nrows, ncols) = shape;
    let mut buffer = vec![0u8; (width * height * 3) as usize];
    {
        let root = BitMapBackend::with_buffer(&mut buffer, (width, height)).into_drawing_area();
        root.fill(&WHITE).map_err(backend_err)?;

        let bottom = if sup_xlabel.is_some() { 28 } else { 4 };
        let left = if sup_ylabel.is_some() { 24 } else { 4 };
        let plot_area = root.margin(4, bottom, left, 4);
        let areas = plot_area.split_evenly((nrows, ncols));

        for scene in scenes {
            let (r, c) = scene.grid_pos;
            let area = &areas[r * ncols + c];
            draw_panel(area, scene, config)?;
        }

        if let Some(text) = sup_xlabel {
            let x = config
                .xaxis_label_x
                .map(|f| (f * width as f64) as i32)
                .unwrap_or((width / 2) as i32);
            let y = config
                .xaxis_label_y
                .map(|f| (f * height as f64) as i32)
                .unwrap_or((height - 18) as i32);
            root.draw(&Text::new(
                text.to_string(),
                (x, y),
                TextStyle::from(("sans-serif", 16).into_font())
                    .pos(Pos::new(HPos::Center, VPos::Top)),
            ))
            .map_err(backend_err)?;
        }
        if let Some(text) = sup_ylabel {
            let x = config
                .yaxis_label_x
                .map(|f| (f * width as f64) as i32)
                .unwrap_or(16);
            let y = config
                .yaxis_label_y
                .map(|f| (f * height as f64) as i32)
                .unwrap_or((height / 2) as i32);
            root.draw(&Text::new(
                text.to_string(),
                (x, y),
                TextStyle::from(
                    ("sans-serif", 16)
                        .into_font()
                        .transform(FontTransform::Rotate270),
                )
                .pos(Pos::new(HPos::Center, VPos::Center)),
            ))
            .map_err(backend_err)?;
        }

        root.present().map_err(backend_err)?;
    }

    let mut png_bytes = Vec::new();
    {
        use image::ImageEncoder;
        let encoder = image::codecs::png::PngEncoder::new(&mut png_bytes);
        encoder
            .write_image(&buffer, width, height, image::ColorType::Rgb8)
            .map_err(|e| PlotError::backend(format!("failed to encode PNG: {}", e)))?;
    }
    Ok(png_bytes)
}

fn draw_panel<DB: DrawingBackend>(
    area: &DrawingArea<DB, plotters::coord::Shift>,
    scene: &PanelScene,
    config: &PlotConfig,
) -> Result<()> {
    let mut chart = ChartBuilder::on(area)
        .margin(6)
        .x_label_area_size(26)
        .y_label_area_size(34)
        .build_cartesian_2d(scene.x_range.clone(), scene.y_range.clone())
        .map_err(|e| PlotError::backend(format!("failed to build chart: {}", e)))?;

    let x_cats = scene.x_categories.clone();
    let y_cats = scene.y_categories.clone();
    let x_fmt = |v: &f64| match &x_cats {
        Some(cats) => category_label(cats, *v),
        None => String::new(),
    };
    let y_fmt = |v: &f64| match &y_cats {
        Some(cats) => category_label(cats, *v),
        None => String::new(),
    };
    let mut mesh = chart.configure_mesh();
    mesh.light_line_style(RGBColor(235, 235, 235))
        .label_style(("sans-serif", 11));
    if let Some(cats) = &scene.x_categories {
        mesh.x_labels(cats.len().max(2)).x_label_formatter(&x_fmt);
    }
    if let Some(cats) = &scene.y_categories {
        mesh.y_labels(cats.len().max(2)).y_label_formatter(&y_fmt);
    }
    mesh.draw()
        .map_err(|e| PlotError::backend(format!("failed to draw mesh: {}", e)))?;

    let x_span = scene.x_range.end - scene.x_range.start;
    let y_span = scene.y_range.end - scene.y_range.start;

    for command in &scene.commands {
        match command {
            DrawCommand::Line { points, style } => {
                let color = stroke(style);
                chart
                    .draw_series(LineSeries::new(points.clone(), color))
                    .map_err(|e| PlotError::backend(e.to_string()))?;
            }
            DrawCommand::Marker {
                points,
                marker,
                size,
                edge_color,
                style,
            } => {
                let color = parse_color(&style.color).mix(style.alpha);
                let size = (*size).max(1.0) as i32;
                for &point in points {
                    draw_marker(&mut chart, point, marker, size, color)?;
                    if let Some(edge) = edge_color {
                        let edge = parse_color(edge).mix(style.alpha);
                        chart
                            .draw_series(std::iter::once(Circle::new(point, size, edge)))
                            .map_err(|e| PlotError::backend(e.to_string()))?;
                    }
                }
            }
            DrawCommand::ErrorBar {
                x,
                y,
                xerr,
                yerr,
                style,
            } => {
                let color = stroke(style);
                if let Some((lo, hi)) = yerr {
                    chart
                        .draw_series(LineSeries::new(
                            vec![(*x, y - lo), (*x, y + hi)],
                            color.clone(),
                        ))
                        .map_err(|e| PlotError::backend(e.to_string()))?;
                }
                if let Some((lo, hi)) = xerr {
                    chart
                        .draw_series(LineSeries::new(
                            vec![(x - lo, *y), (x + hi, *y)],
                            color.clone(),
                        ))
                        .map_err(|e| PlotError::backend(e.to_string()))?;
                }
            }
            DrawCommand::Polygon { points, style } => {
                let color = parse_color(&style.color).mix(style.alpha);
                chart
                    .draw_series(std::iter::once(Polygon::new(points.clone(), color.filled())))
                    .map_err(|e| PlotError::backend(e.to_string()))?;
            }
            DrawCommand::HLine { y, x0, x1, style } => {
                let x0 = x0.unwrap_or(scene.x_range.start);
                let x1 = x1.unwrap_or(scene.x_range.end);
                chart
                    .draw_series(LineSeries::new(vec![(x0, *y), (x1, *y)], stroke(style)))
                    .map_err(|e| PlotError::backend(e.to_string()))?;
            }
            DrawCommand::VLine { x, y0, y1, style } => {
                let y0 = y0.unwrap_or(scene.y_range.start);
                let y1 = y1.unwrap_or(scene.y_range.end);
                chart
                    .draw_series(LineSeries::new(vec![(*x, y0), (*x, y1)], stroke(style)))
                    .map_err(|e| PlotError::backend(e.to_string()))?;
            }
            DrawCommand::AxHLine {
                y,
                x0_frac,
                x1_frac,
                style,
            } => {
                let x0 = scene.x_range.start + x0_frac * x_span;
                let x1 = scene.x_range.start + x1_frac * x_span;
                chart
                    .draw_series(LineSeries::new(vec![(x0, *y), (x1, *y)], stroke(style)))
                    .map_err(|e| PlotError::backend(e.to_string()))?;
            }
            DrawCommand::AxVLine {
                x,
                y0_frac,
                y1_frac,
                style,
            } => {
                let y0 = scene.y_range.start + y0_frac * y_span;
                let y1 = scene.y_range.start + y1_frac * y_span;
                chart
                    .draw_series(LineSeries::new(vec![(*x, y0), (*x, y1)], stroke(style)))
                    .map_err(|e| PlotError::backend(e.to_string()))?;
            }
        }
    }

    draw_labels(area, &scene.labels, config)?;
    Ok(())
}

fn draw_labels<DB: DrawingBackend>(
    area: &DrawingArea<DB, plotters::coord::Shift>,
    labels: &[PanelLabel],
    config: &PlotConfig,
) -> Result<()> {
    let (w, h) = area.dim_in_pixel();
    let size = config.facet_label_size;
    for label in labels {
        // multi-column levels are newline-joined; stack the lines
        for (i, line) in label.text.lines().enumerate() {
            let offset = (i as u32 * (size + 2)) as i32;
            match label.loc {
                LabelLoc::Top => {
                    let y = (config.facet_label_pad_y * h as f64 * 0.3) as i32 + offset;
                    area.draw(&Text::new(
                        line.to_string(),
                        ((w / 2) as i32, y),
                        TextStyle::from(("sans-serif", size).into_font())
                            .pos(Pos::new(HPos::Center, VPos::Top)),
                    ))
                    .map_err(backend_err)?;
                }
                LabelLoc::Bottom => {
                    let y = h as i32 - (config.facet_label_pad_y * h as f64 * 0.3) as i32 - offset;
                    area.draw(&Text::new(
                        line.to_string(),
                        ((w / 2) as i32, y),
                        TextStyle::from(("sans-serif", size).into_font())
                            .pos(Pos::new(HPos::Center, VPos::Bottom)),
                    ))
                    .map_err(backend_err)?;
                }
                LabelLoc::Right => {
                    let x = w as i32 - (config.facet_label_pad_x * w as f64 * 0.3) as i32 - offset;
                    area.draw(&Text::new(
                        line.to_string(),
                        (x, (h / 2) as i32),
                        TextStyle::from(
                            ("sans-serif", size)
                                .into_font()
                                .transform(FontTransform::Rotate90),
                        )
                        .pos(Pos::new(HPos::Center, VPos::Center)),
                    ))
                    .map_err(backend_err)?;
                }
                LabelLoc::Left => {
                    let x = (config.facet_label_pad_x * w as f64 * 0.3) as i32 + offset;
                    area.draw(&Text::new(
                        line.to_string(),
                        (x, (h / 2) as i32),
                        TextStyle::from(
                            ("sans-serif", size)
                                .into_font()
                                .transform(FontTransform::Rotate270),
                        )
                        .pos(Pos::new(HPos::Center, VPos::Center)),
                    ))
                    .map_err(backend_err)?;
                }
            }
        }
    }
    Ok(())
}

fn draw_marker<DB: DrawingBackend>(
    chart: &mut ChartContext<'_, DB, Cartesian2d<plotters::coord::types::RangedCoordf64, plotters::coord::types::RangedCoordf64>>,
    point: (f64, f64),
    marker: &str,
    size: i32,
    color: RGBAColor,
) -> Result<()> {
    match marker {
        "square" => chart
            .draw_series(std::iter::once(
                EmptyElement::at(point)
                    + Rectangle::new([(-size, -size), (size, size)], color.filled()),
            ))
            .map(|_| ())
            .map_err(|e| PlotError::backend(e.to_string())),
        "triangle" => chart
            .draw_series(std::iter::once(TriangleMarker::new(point, size, color)))
            .map(|_| ())
            .map_err(|e| PlotError::backend(e.to_string())),
        "cross" => chart
            .draw_series(std::iter::once(Cross::new(point, size, color)))
            .map(|_| ())
            .map_err(|e| PlotError::backend(e.to_string())),
        _ => chart
            .draw_series(std::iter::once(Circle::new(point, size, color.filled())))
            .map(|_| ())
            .map_err(|e| PlotError::backend(e.to_string())),
    }
}

fn stroke(style: &Style) -> ShapeStyle {
    parse_color(&style.color)
        .mix(style.alpha)
        .stroke_width(style.width.max(1.0) as u32)
}

fn category_label(categories: &[String], v: f64) -> String {
    let idx = v.round();
    if (v - idx).abs() < 1e-6 && idx >= 0.0 && (idx as usize) < categories.len() {
        categories[idx as usize].clone()
    } else {
        String::new()
    }
}

fn backend_err<E: std::fmt::Display>(e: E) -> PlotError {
    PlotError::backend(e.to_string())
}

/// Parse a color name (including matplotlib-style single letter codes) to
/// an RGB color; unknown names fall back to blue.
pub fn parse_color(name: &str) -> RGBColor {
    match name {
        "red" | "r" => RED,
        "green" | "g" => GREEN,
        "blue" | "b" => BLUE,
        "black" | "k" => BLACK,
        "white" | "w" => WHITE,
        "yellow" | "y" => YELLOW,
        "cyan" | "c" => CYAN,
        "magenta" | "m" => MAGENTA,
        "orange" => RGBColor(255, 165, 0),
        "purple" => RGBColor(128, 0, 128),
        "brown" => RGBColor(139, 69, 19),
        "pink" => RGBColor(255, 105, 180),
        "gray" | "grey" => RGBColor(128, 128, 128),
        "olive" => RGBColor(128, 128, 0),
        _ => BLUE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn style() -> Style {
        Style {
            color: "blue".to_string(),
            alpha: 1.0,
            width: 1.0,
        }
    }

    #[test]
    fn test_extent_error_bar() {
        let cmd = DrawCommand::ErrorBar {
            x: 5.0,
            y: 3.0,
            xerr: None,
            yerr: Some((1.0, 2.0)),
            style: style(),
        };
        let (xs, ys) = cmd.extent();
        assert_eq!(xs, vec![5.0]);
        assert_eq!(ys, vec![3.0, 2.0, 5.0]);
    }

    #[test]
    fn test_extent_axhline_only_contributes_y() {
        let cmd = DrawCommand::AxHLine {
            y: 2.0,
            x0_frac: 0.0,
            x1_frac: 1.0,
            style: style(),
        };
        let (xs, ys) = cmd.extent();
        assert!(xs.is_empty());
        assert_eq!(ys, vec![2.0]);
    }

    #[test]
    fn test_pad_range() {
        let r = pad_range(0.0, 10.0);
        assert_eq!(r.start, -0.5);
        assert_eq!(r.end, 10.5);
        let single = pad_range(5.0, 5.0);
        assert_eq!(single, 4.0..6.0);
    }

    #[test]
    fn test_category_label() {
        let cats = vec!["a".to_string(), "b".to_string()];
        assert_eq!(category_label(&cats, 1.0), "b");
        assert_eq!(category_label(&cats, 0.5), "");
        assert_eq!(category_label(&cats, 7.0), "");
    }

    #[test]
    fn test_render_small_figure_is_png() {
        let scene = PanelScene {
            grid_pos: (0, 0),
            x_range: 0.0..1.0,
            y_range: 0.0..1.0,
            x_categories: None,
            y_categories: None,
            commands: vec![DrawCommand::Line {
                points: vec![(0.1, 0.1), (0.9, 0.9)],
                style: style(),
            }],
            labels: Vec::new(),
        };
        let png = render_figure(
            160,
            120,
            (1, 1),
            &[scene],
            Some("x"),
            Some("y"),
            &PlotConfig::default(),
        )
        .unwrap();
        assert_eq!(&png[0..8], &[137, 80, 78, 71, 13, 10, 26, 10]);
    }

    #[test]
    fn test_render_anchored_labels_on_every_side() {
        let scene = PanelScene {
            grid_pos: (0, 0),
            x_range: 0.0..1.0,
            y_range: 0.0..1.0,
            x_categories: None,
            y_categories: None,
            commands: Vec::new(),
            labels: vec![
                PanelLabel {
                    text: "top".to_string(),
                    loc: LabelLoc::Top,
                },
                PanelLabel {
                    text: "bottom".to_string(),
                    loc: LabelLoc::Bottom,
                },
                PanelLabel {
                    text: "left".to_string(),
                    loc: LabelLoc::Left,
                },
                PanelLabel {
                    text: "right".to_string(),
                    loc: LabelLoc::Right,
                },
            ],
        };
        let png = render_figure(
            160,
            120,
            (1, 1),
            &[scene],
            None,
            None,
            &PlotConfig::default(),
        )
        .unwrap();
        assert_eq!(&png[0..8], &[137, 80, 78, 71, 13, 10, 26, 10]);
    }
}
