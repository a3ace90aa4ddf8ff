use crate::aes::{ParamValue, Resolved};
use crate::error::{PlotError, Result};
use crate::stat::{Axis, GroupValues};

/// Position adjustment across the groups of one layer within one panel.
/// Pure and order-preserving: n groups in, n groups out.
#[derive(Debug, Clone, PartialEq)]
pub enum Position {
    Identity,
    /// Fan out groups that share a coordinate value. Per configured axis,
    /// every group must already be collapsed to one distinct value on that
    /// axis; the i-th of n clashing groups (first-seen order) moves by
    /// `(i - (n-1)/2) * (offset / n)`. Y offsets are negated so increasing
    /// group index fans downward, mirroring the x direction visually.
    Dodge {
        x_offset: Option<f64>,
        y_offset: Option<f64>,
    },
}

impl Position {
    pub fn dodge_x(offset: f64) -> Position {
        Position::Dodge {
            x_offset: Some(offset),
            y_offset: None,
        }
    }

    pub fn dodge_y(offset: f64) -> Position {
        Position::Dodge {
            x_offset: None,
            y_offset: Some(offset),
        }
    }

    pub fn apply(&self, groups: &[GroupValues]) -> Result<Vec<GroupValues>> {
        match self {
            Position::Identity => Ok(groups.to_vec()),
            Position::Dodge { x_offset, y_offset } => {
                let mut adjusted = groups.to_vec();
                if let Some(offset) = x_offset {
                    dodge_axis(&mut adjusted, Axis::X, *offset)?;
                }
                if let Some(offset) = y_offset {
                    dodge_axis(&mut adjusted, Axis::Y, -*offset)?;
                }
                Ok(adjusted)
            }
        }
    }
}

fn dodge_axis(groups: &mut [GroupValues], axis: Axis, offset: f64) -> Result<()> {
    // each group must sit at exactly one coordinate value
    let mut coords = Vec::with_capacity(groups.len());
    for (i, group) in groups.iter().enumerate() {
        let resolved = group.get(axis.name()).ok_or_else(|| {
            PlotError::data(format!(
                "dodge on {} but group {} has no value there",
                axis.name(),
                i
            ))
        })?;
        coords.push(single_coord(resolved, axis, i)?);
    }

    // clash sets keyed by shared coordinate, members in first-seen order
    let mut clash_sets: Vec<(f64, Vec<usize>)> = Vec::new();
    for (i, &coord) in coords.iter().enumerate() {
        match clash_sets
            .iter_mut()
            .find(|(c, _)| c.total_cmp(&coord).is_eq())
        {
            Some((_, members)) => members.push(i),
            None => clash_sets.push((coord, vec![i])),
        }
    }

    for (coord, members) in &clash_sets {
        let n = members.len();
        for (rank, &i) in members.iter().enumerate() {
            let delta = if n > 1 {
                (rank as f64 - (n as f64 - 1.0) / 2.0) * (offset / n as f64)
            } else {
                0.0
            };
            groups[i].insert(
                axis.name().to_string(),
                Resolved::Scalar(ParamValue::Num(coord + delta)),
            );
        }
    }
    Ok(())
}

fn single_coord(resolved: &Resolved, axis: Axis, group_index: usize) -> Result<f64> {
    let nums = resolved.as_nums().ok_or_else(|| {
        PlotError::data(format!(
            "dodge on {} needs numeric coordinates (group {})",
            axis.name(),
            group_index
        ))
    })?;
    let mut distinct: Vec<f64> = Vec::new();
    for v in nums {
        if !distinct.iter().any(|d| d.total_cmp(&v).is_eq()) {
            distinct.push(v);
        }
    }
    match distinct.len() {
        1 => Ok(distinct[0]),
        n => Err(PlotError::data(format!(
            "dodge on {} undefined: group {} spans {} distinct coordinate values",
            axis.name(),
            group_index,
            n
        ))),
    }
}
