use std::collections::BTreeMap;

use crate::error::{PlotError, Result};
use crate::frame::{Frame, Value};

/// Flattening order mapping panel ids onto the grid. Wrap facets are always
/// row-major; Grid facets may use either.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WrapOrder {
    RowMajor,
    ColMajor,
}

/// Which panels of a facet grid carry row labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowLabels {
    Right,
    Left,
    All,
    Off,
}

/// Which panels of a facet grid carry column labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColLabels {
    Top,
    Bottom,
    All,
    Off,
}

/// Anchor side for a panel label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelLoc {
    Top,
    Bottom,
    Left,
    Right,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GridOptions {
    pub sharex: bool,
    pub sharey: bool,
    pub label: bool,
    pub label_rows: RowLabels,
    pub label_cols: ColLabels,
    pub order: WrapOrder,
}

impl Default for GridOptions {
    fn default() -> Self {
        GridOptions {
            sharex: true,
            sharey: true,
            label: true,
            label_rows: RowLabels::Right,
            label_cols: ColLabels::Top,
            order: WrapOrder::RowMajor,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WrapOptions {
    pub sharex: bool,
    pub sharey: bool,
    pub label: bool,
    pub label_loc: LabelLoc,
}

impl Default for WrapOptions {
    fn default() -> Self {
        WrapOptions {
            sharex: true,
            sharey: true,
            label: true,
            label_loc: LabelLoc::Top,
        }
    }
}

/// Declarative faceting scheme: which columns split the data into panels
/// and how the panels are arranged.
#[derive(Debug, Clone, PartialEq)]
pub enum FacetSpec {
    /// One panel, no dimensions.
    Null,
    /// Two independent dimensions; the panel grid is rows x cols.
    Grid {
        row: Option<Vec<String>>,
        col: Option<Vec<String>>,
        options: GridOptions,
    },
    /// One dimension auto-arranged into a rectangle.
    Wrap {
        wrap: Vec<String>,
        nrows: Option<usize>,
        ncols: Option<usize>,
        options: WrapOptions,
    },
}

impl FacetSpec {
    pub fn grid(row: Option<Vec<String>>, col: Option<Vec<String>>) -> FacetSpec {
        FacetSpec::Grid {
            row,
            col,
            options: GridOptions::default(),
        }
    }

    pub fn wrap(columns: Vec<String>) -> FacetSpec {
        FacetSpec::Wrap {
            wrap: columns,
            nrows: None,
            ncols: None,
            options: WrapOptions::default(),
        }
    }

    fn dimensions(&self) -> Vec<(&'static str, &[String])> {
        match self {
            FacetSpec::Null => Vec::new(),
            FacetSpec::Grid { row, col, .. } => {
                let mut dims = Vec::new();
                if let Some(cols) = row {
                    dims.push(("row", cols.as_slice()));
                }
                if let Some(cols) = col {
                    dims.push(("col", cols.as_slice()));
                }
                dims
            }
            FacetSpec::Wrap { wrap, .. } => vec![("wrap", wrap.as_slice())],
        }
    }

    pub fn sharex(&self) -> bool {
        match self {
            FacetSpec::Null => true,
            FacetSpec::Grid { options, .. } => options.sharex,
            FacetSpec::Wrap { options, .. } => options.sharex,
        }
    }

    pub fn sharey(&self) -> bool {
        match self {
            FacetSpec::Null => true,
            FacetSpec::Grid { options, .. } => options.sharey,
            FacetSpec::Wrap { options, .. } => options.sharey,
        }
    }
}

/// A label to draw on one panel.
#[derive(Debug, Clone, PartialEq)]
pub struct PanelLabel {
    pub text: String,
    pub loc: LabelLoc,
}

/// Session object for one render pass.
///
/// State machine: created -> levels accumulating (`add_levels_from_data`,
/// additive only) -> sealed (`seal`) -> panel loop (`subset` / `labels` per
/// panel id). Geometry queries before sealing are configuration errors,
/// since the panel count is undefined until every data source has been
/// inspected.
#[derive(Debug, Clone)]
pub struct Faceter {
    spec: FacetSpec,
    levels: BTreeMap<String, Frame>,
    sealed: bool,
}

impl Faceter {
    pub fn new(spec: FacetSpec) -> Faceter {
        Faceter {
            spec,
            levels: BTreeMap::new(),
            sealed: false,
        }
    }

    pub fn spec(&self) -> &FacetSpec {
        &self.spec
    }

    /// Extend each dimension's level set with the distinct values observed
    /// in `data`. New level batches are sorted before appending; levels
    /// already present keep their position, so panel ids stay stable as
    /// more sources are added.
    pub fn add_levels_from_data(&mut self, data: Option<&Frame>) -> Result<()> {
        if self.sealed {
            return Err(PlotError::config(
                "cannot add facet levels after geometry is finalized",
            ));
        }
        let data = match data {
            Some(d) => d,
            None => return Ok(()),
        };
        let dims: Vec<(String, Vec<String>)> = self
            .spec
            .dimensions()
            .into_iter()
            .map(|(name, cols)| (name.to_string(), cols.to_vec()))
            .collect();
        for (dim, columns) in dims {
            let names: Vec<&str> = columns.iter().map(|c| c.as_str()).collect();
            let fresh = data.select(&names)?.unique();
            let key_columns: Vec<Vec<Value>> = (0..names.len())
                .map(|i| fresh.rows().iter().map(|r| r[i].clone()).collect())
                .collect();
            let fresh = fresh.sort_by(&key_columns)?;
            let merged = match self.levels.get(&dim) {
                Some(existing) => existing.vstack(&fresh)?.unique(),
                None => fresh,
            };
            self.levels.insert(dim, merged);
        }
        Ok(())
    }

    /// Finalize geometry. Panel count and layout become queryable.
    pub fn seal(&mut self) {
        self.sealed = true;
    }

    fn require_sealed(&self) -> Result<()> {
        if !self.sealed {
            return Err(PlotError::config(
                "facet geometry queried before level accumulation finished",
            ));
        }
        Ok(())
    }

    fn dim_level_count(&self, dim: &str) -> usize {
        self.levels.get(dim).map(|f| f.n_rows()).unwrap_or(0)
    }

    /// Number of panels: the product of level counts over mapped
    /// dimensions, unmapped dimensions contributing 1.
    pub fn n_facets(&self) -> Result<usize> {
        self.require_sealed()?;
        let mut n = 1usize;
        for (dim, _) in self.spec.dimensions() {
            n *= self.dim_level_count(dim).max(1);
        }
        Ok(n)
    }

    /// Panel grid shape (nrows, ncols).
    pub fn shape(&self) -> Result<(usize, usize)> {
        self.require_sealed()?;
        match &self.spec {
            FacetSpec::Null => Ok((1, 1)),
            FacetSpec::Grid { .. } => Ok((
                self.dim_level_count("row").max(1),
                self.dim_level_count("col").max(1),
            )),
            FacetSpec::Wrap { nrows, ncols, .. } => {
                let n = self.n_facets()?;
                let (nr, nc) = match (nrows, ncols) {
                    (Some(r), Some(c)) => (*r, *c),
                    (Some(r), None) => (*r, div_ceil(n, (*r).max(1))),
                    (None, Some(c)) => (div_ceil(n, (*c).max(1)), *c),
                    (None, None) => {
                        let r = (n as f64).sqrt().ceil() as usize;
                        let r = r.max(1);
                        (r, div_ceil(n, r))
                    }
                };
                if nr * nc < n {
                    return Err(PlotError::range(format!(
                        "wrap grid of {}x{} cannot hold {} facets",
                        nr, nc, n
                    )));
                }
                Ok((nr, nc))
            }
        }
    }

    fn validate_facet_id(&self, panel_id: usize) -> Result<()> {
        let n = self.n_facets()?;
        if panel_id >= n {
            return Err(PlotError::range(format!(
                "panel id {} out of range for {} facets",
                panel_id, n
            )));
        }
        Ok(())
    }

    /// Level index per mapped dimension for a panel id.
    pub fn dimension_indices(&self, panel_id: usize) -> Result<BTreeMap<String, usize>> {
        self.validate_facet_id(panel_id)?;
        let mut out = BTreeMap::new();
        match &self.spec {
            FacetSpec::Null => {}
            FacetSpec::Grid { options, .. } => {
                let n_rows = self.dim_level_count("row").max(1);
                let n_cols = self.dim_level_count("col").max(1);
                let (row_id, col_id) = match options.order {
                    WrapOrder::RowMajor => (panel_id / n_cols, panel_id % n_cols),
                    WrapOrder::ColMajor => (panel_id % n_rows, panel_id / n_rows),
                };
                // a dimension with no observed levels behaves as unmapped
                if self.dim_level_count("row") > 0 {
                    out.insert("row".to_string(), row_id);
                }
                if self.dim_level_count("col") > 0 {
                    out.insert("col".to_string(), col_id);
                }
            }
            FacetSpec::Wrap { .. } => {
                if self.dim_level_count("wrap") > 0 {
                    out.insert("wrap".to_string(), panel_id);
                }
            }
        }
        Ok(out)
    }

    /// Grid coordinate (row, col) of a panel within the drawn grid.
    pub fn grid_position(&self, panel_id: usize) -> Result<(usize, usize)> {
        self.validate_facet_id(panel_id)?;
        match &self.spec {
            FacetSpec::Null => Ok((0, 0)),
            FacetSpec::Grid { options, .. } => {
                let n_rows = self.dim_level_count("row").max(1);
                let n_cols = self.dim_level_count("col").max(1);
                Ok(match options.order {
                    WrapOrder::RowMajor => (panel_id / n_cols, panel_id % n_cols),
                    WrapOrder::ColMajor => (panel_id % n_rows, panel_id / n_rows),
                })
            }
            FacetSpec::Wrap { .. } => {
                let (_, n_cols) = self.shape()?;
                Ok((panel_id / n_cols, panel_id % n_cols))
            }
        }
    }

    /// The rows of `data` belonging to a panel: an inner join against the
    /// single level row per mapped dimension. `None` data passes through;
    /// no matching rows is an empty frame, not an error.
    pub fn subset(&self, data: Option<&Frame>, panel_id: usize) -> Result<Option<Frame>> {
        let indices = self.dimension_indices(panel_id)?;
        let data = match data {
            Some(d) => d,
            None => return Ok(None),
        };
        let mut on: Vec<(String, Value)> = Vec::new();
        for (dim, columns) in self.spec.dimensions() {
            let idx = match indices.get(dim) {
                Some(i) => *i,
                None => continue,
            };
            let levels = &self.levels[dim];
            let level_row = levels.slice(idx, 1);
            for (c, column) in columns.iter().enumerate() {
                on.push((column.clone(), level_row.rows()[0][c].clone()));
            }
        }
        if on.is_empty() {
            return Ok(Some(data.clone()));
        }
        Ok(Some(data.semi_join(&on)?))
    }

    fn level_text(&self, dim: &str, idx: usize) -> String {
        let levels = &self.levels[dim];
        levels.rows()[idx]
            .iter()
            .map(|v| v.to_string())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Labels to draw on one panel, per the variant's labeling rules.
    pub fn labels(&self, panel_id: usize) -> Result<Vec<PanelLabel>> {
        let indices = self.dimension_indices(panel_id)?;
        let mut out = Vec::new();
        match &self.spec {
            FacetSpec::Null => {}
            FacetSpec::Grid { options, .. } => {
                if !options.label {
                    return Ok(out);
                }
                let (row_pos, col_pos) = self.grid_position(panel_id)?;
                let n_rows = self.dim_level_count("row").max(1);
                let n_cols = self.dim_level_count("col").max(1);
                if let Some(&row_idx) = indices.get("row") {
                    let show = match options.label_rows {
                        RowLabels::Right => col_pos == n_cols - 1,
                        RowLabels::Left => col_pos == 0,
                        RowLabels::All => true,
                        RowLabels::Off => false,
                    };
                    if show {
                        let loc = if options.label_rows == RowLabels::Left {
                            LabelLoc::Left
                        } else {
                            LabelLoc::Right
                        };
                        out.push(PanelLabel {
                            text: self.level_text("row", row_idx),
                            loc,
                        });
                    }
                }
                if let Some(&col_idx) = indices.get("col") {
                    let show = match options.label_cols {
                        ColLabels::Top => row_pos == 0,
                        ColLabels::Bottom => row_pos == n_rows - 1,
                        ColLabels::All => true,
                        ColLabels::Off => false,
                    };
                    if show {
                        let loc = if options.label_cols == ColLabels::Bottom {
                            LabelLoc::Bottom
                        } else {
                            LabelLoc::Top
                        };
                        out.push(PanelLabel {
                            text: self.level_text("col", col_idx),
                            loc,
                        });
                    }
                }
            }
            FacetSpec::Wrap { options, .. } => {
                if !options.label {
                    return Ok(out);
                }
                if let Some(&idx) = indices.get("wrap") {
                    out.push(PanelLabel {
                        text: self.level_text("wrap", idx),
                        loc: options.label_loc,
                    });
                }
            }
        }
        Ok(out)
    }
}

fn div_ceil(a: usize, b: usize) -> usize {
    (a + b - 1) / b
}
