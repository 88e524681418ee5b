//! Area-level and population-level summaries of a computed table.
//!
//! Every function here is read-only over a table that already carries
//! `affordability_index` / `affordability_class`, and returns plain data
//! for whatever renders it.
//!
//! - [`summarize_by_area`] - median index per (area, class)
//! - [`estimate_struggling`] - rows above a stress threshold, overall and per area
//! - [`recommend`] - worst rows as readable recommendations
//! - [`describe_index`] - count/mean/median/min/max of the index
//! - [`map_points`] - coordinates with their class, for map layers

use serde::Serialize;
use std::cmp::Ordering;

use crate::models::{
    AffordabilityClass, Cell, Column, CoordinateColumns, Table, AFFORDABILITY_CLASS,
    AFFORDABILITY_INDEX,
};
use crate::stats::{mean, median};

/// Index above which a row counts as struggling.
pub const DEFAULT_STRUGGLING_THRESHOLD: f64 = 50.0;

/// Number of recommendations produced by default.
pub const DEFAULT_TOP_K: usize = 3;

/// Returned alone when no row has both an area and an index.
pub const INSUFFICIENT_DATA: &str = "Insufficient data to generate recommendations.";

const REMEDIATION: &str = "Prioritize affordable units near major transit and schools.";

/// Median index of one (area, class) group.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AreaSummary {
    pub area: Cell,
    pub class: AffordabilityClass,
    /// `None` when every index in the group is missing
    pub median_index: Option<f64>,
}

/// Struggling rows of one area.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AreaStress {
    pub area: Cell,
    pub struggling_count: usize,
    /// All rows of the area, including those with a missing index
    pub total: usize,
    pub struggling_fraction: f64,
}

/// Struggling rows overall and per area.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StrugglingEstimate {
    pub threshold: f64,
    pub overall_count: usize,
    /// Rows with a non-missing index
    pub overall_total: usize,
    pub overall_fraction: f64,
    /// One entry per non-missing area, in area order
    pub per_area: Vec<AreaStress>,
}

impl StrugglingEstimate {
    /// Areas by struggling fraction, highest first; ties keep area order.
    pub fn ranked(&self) -> Vec<&AreaStress> {
        let mut ranked: Vec<&AreaStress> = self.per_area.iter().collect();
        ranked.sort_by(|a, b| b.struggling_fraction.total_cmp(&a.struggling_fraction));
        ranked
    }
}

/// Summary statistics of the non-missing indices.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexStats {
    pub count: usize,
    pub mean: Option<f64>,
    pub median: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

/// One plottable row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MapPoint {
    pub latitude: f64,
    pub longitude: f64,
    pub area: Cell,
    pub index: Option<f64>,
    pub class: AffordabilityClass,
}

fn index_values(table: &Table) -> Vec<Option<f64>> {
    table
        .column(AFFORDABILITY_INDEX)
        .map(Column::numbers)
        .unwrap_or_else(|| vec![None; table.row_count()])
}

fn classes(table: &Table, index: &[Option<f64>]) -> Vec<AffordabilityClass> {
    match table.column(AFFORDABILITY_CLASS) {
        Some(column) => column
            .cells
            .iter()
            .zip(index)
            .map(|(cell, idx)| {
                cell.as_text()
                    .and_then(AffordabilityClass::from_label)
                    .unwrap_or_else(|| AffordabilityClass::from_index(*idx))
            })
            .collect(),
        None => index.iter().map(|v| AffordabilityClass::from_index(*v)).collect(),
    }
}

fn area_cells(table: &Table, area_col: &str) -> Vec<Cell> {
    table
        .column(area_col)
        .map(|c| c.cells.clone())
        .unwrap_or_else(|| vec![Cell::Missing; table.row_count()])
}

/// Row indices grouped by equal keys, groups in key order.
fn group_by<K, F>(keys: &[K], cmp: F) -> Vec<Vec<usize>>
where
    F: Fn(&K, &K) -> Ordering,
{
    let mut order: Vec<usize> = (0..keys.len()).collect();
    order.sort_by(|&a, &b| cmp(&keys[a], &keys[b]));

    let mut groups: Vec<Vec<usize>> = Vec::new();
    for row in order {
        match groups.last_mut() {
            Some(group) if cmp(&keys[group[0]], &keys[row]) == Ordering::Equal => group.push(row),
            _ => groups.push(vec![row]),
        }
    }
    groups
}

/// Median index per (area, class) pair.
///
/// Groups are ordered by area, then class. Classes within an area follow
/// declaration order (Affordable, Moderate, Expensive, Unknown), not their
/// names. Rows with a missing area form their own group, placed last.
pub fn summarize_by_area(table: &Table, area_col: &str) -> Vec<AreaSummary> {
    let index = index_values(table);
    let keys: Vec<(Cell, AffordabilityClass)> = area_cells(table, area_col)
        .into_iter()
        .zip(classes(table, &index))
        .collect();

    group_by(&keys, |a, b| a.0.sort_cmp(&b.0).then(a.1.cmp(&b.1)))
        .into_iter()
        .map(|rows| {
            let values: Vec<f64> = rows.iter().filter_map(|&r| index[r]).collect();
            AreaSummary {
                area: keys[rows[0]].0.clone(),
                class: keys[rows[0]].1,
                median_index: median(&values),
            }
        })
        .collect()
}

/// Count rows whose index is strictly above `threshold`.
///
/// The overall fraction is over rows with an index; per-area fractions are
/// over every row of the area. Empty denominators give `0.0`.
pub fn estimate_struggling(table: &Table, area_col: &str, threshold: f64) -> StrugglingEstimate {
    let index = index_values(table);
    let struggling: Vec<bool> = index
        .iter()
        .map(|v| v.map_or(false, |x| x > threshold))
        .collect();

    let overall_total = index.iter().flatten().count();
    let overall_count = struggling.iter().filter(|s| **s).count();

    let areas = area_cells(table, area_col);
    let per_area = group_by(&areas, |a, b| a.sort_cmp(b))
        .into_iter()
        .filter(|rows| !areas[rows[0]].is_missing())
        .map(|rows| {
            let total = rows.len();
            let struggling_count = rows.iter().filter(|&&r| struggling[r]).count();
            AreaStress {
                area: areas[rows[0]].clone(),
                struggling_count,
                total,
                struggling_fraction: fraction(struggling_count, total),
            }
        })
        .collect();

    StrugglingEstimate {
        threshold,
        overall_count,
        overall_total,
        overall_fraction: fraction(overall_count, overall_total),
        per_area,
    }
}

fn fraction(count: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        count as f64 / total as f64
    }
}

/// Recommendations for the `top_k` highest-index rows.
///
/// Rows without an area or an index are ignored. With none left, returns
/// only [`INSUFFICIENT_DATA`].
pub fn recommend(table: &Table, area_col: &str, top_k: usize) -> Vec<String> {
    let index = index_values(table);
    let areas = area_cells(table, area_col);

    let mut rows: Vec<(&Cell, f64)> = areas
        .iter()
        .zip(&index)
        .filter_map(|(area, idx)| match (area, idx) {
            (Cell::Missing, _) | (_, None) => None,
            (area, Some(v)) => Some((area, *v)),
        })
        .collect();

    if rows.is_empty() {
        return vec![INSUFFICIENT_DATA.to_string()];
    }

    rows.sort_by(|a, b| b.1.total_cmp(&a.1));
    rows.into_iter()
        .take(top_k)
        .map(|(area, idx)| {
            format!(
                "{} shows high housing stress (affordability index={:.1}). {}",
                area, idx, REMEDIATION
            )
        })
        .collect()
}

/// Count, mean, median, min and max of the non-missing indices.
pub fn describe_index(table: &Table) -> IndexStats {
    let values: Vec<f64> = index_values(table).into_iter().flatten().collect();
    IndexStats {
        count: values.len(),
        mean: mean(&values),
        median: median(&values),
        min: values.iter().copied().reduce(f64::min),
        max: values.iter().copied().reduce(f64::max),
    }
}

/// Rows with numeric coordinates, with their area and class.
pub fn map_points(table: &Table, coords: &CoordinateColumns, area_col: &str) -> Vec<MapPoint> {
    let (lat, lon) = match (table.column(&coords.latitude), table.column(&coords.longitude)) {
        (Some(lat), Some(lon)) => (lat.numbers(), lon.numbers()),
        _ => return Vec::new(),
    };
    let index = index_values(table);
    let class = classes(table, &index);
    let areas = area_cells(table, area_col);

    (0..table.row_count())
        .filter_map(|row| {
            Some(MapPoint {
                latitude: lat[row]?,
                longitude: lon[row]?,
                area: areas[row].clone(),
                index: index[row],
                class: class[row],
            })
        })
        .collect()
}
