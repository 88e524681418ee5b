//! Domain models for the housing affordability pipeline.
//!
//! This module contains the core data structures used throughout the pipeline:
//!
//! - [`Cell`] - A single value: number, text or missing
//! - [`Column`] - A named, typed column of cells
//! - [`Table`] - Ordered rows sharing one column set, plus the resolved [`ColumnMapping`]
//! - [`AffordabilityClass`] - Stress tier derived from the affordability index
//! - [`IncomeGroup`] - Tercile label derived from the income distribution

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::error::{TableError, TableResult};

// =============================================================================
// Well-known column names
// =============================================================================

/// Computed affordability index, `(annual cost / annual income) * 100`.
pub const AFFORDABILITY_INDEX: &str = "affordability_index";

/// Stress tier of [`AFFORDABILITY_INDEX`].
pub const AFFORDABILITY_CLASS: &str = "affordability_class";

/// Area label derived from a free-text address column.
pub const DERIVED_AREA_LABEL: &str = "derived_area_label";

/// Synthetic income created when no income column exists.
pub const ESTIMATED_INCOME: &str = "estimated_income";

/// Synthetic (all-missing) cost created when no cost column exists.
pub const ESTIMATED_RENT: &str = "estimated_rent";

/// Income tercile label.
pub const INCOME_GROUP: &str = "income_group";

/// Index shipped by some datasets, used only where ours is missing.
pub const PRECOMPUTED_INDEX: &str = "Affordability_Index";

// =============================================================================
// Cell
// =============================================================================

/// A single table value.
///
/// `Number` never holds NaN or an infinity; those are stored as `Missing`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Cell {
    Number(f64),
    Text(String),
    Missing,
}

impl Cell {
    /// Build a numeric cell, turning non-finite values into `Missing`.
    pub fn number(value: f64) -> Self {
        if value.is_finite() {
            Cell::Number(value)
        } else {
            Cell::Missing
        }
    }

    pub fn text(value: impl Into<String>) -> Self {
        Cell::Text(value.into())
    }

    pub fn from_option(value: Option<f64>) -> Self {
        value.map(Cell::number).unwrap_or(Cell::Missing)
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Cell::Missing)
    }

    /// Numeric view of the cell. Text is parsed as-is (no separator stripping).
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Cell::Number(n) => Some(*n),
            Cell::Text(s) => parse_number(s),
            Cell::Missing => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Cell::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Total order used for grouping: numbers, then text, then missing.
    pub fn sort_cmp(&self, other: &Cell) -> Ordering {
        match (self, other) {
            (Cell::Number(a), Cell::Number(b)) => a.total_cmp(b),
            (Cell::Text(a), Cell::Text(b)) => a.cmp(b),
            (Cell::Missing, Cell::Missing) => Ordering::Equal,
            (Cell::Number(_), _) => Ordering::Less,
            (_, Cell::Number(_)) => Ordering::Greater,
            (Cell::Text(_), Cell::Missing) => Ordering::Less,
            (Cell::Missing, Cell::Text(_)) => Ordering::Greater,
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            Cell::Number(n) => serde_json::Number::from_f64(*n)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            Cell::Text(s) => Value::String(s.clone()),
            Cell::Missing => Value::Null,
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Number(n) => write!(f, "{}", n),
            Cell::Text(s) => write!(f, "{}", s),
            Cell::Missing => Ok(()),
        }
    }
}

/// Parse a trimmed decimal number, rejecting NaN and infinities.
pub fn parse_number(raw: &str) -> Option<f64> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
}

// =============================================================================
// Column
// =============================================================================

/// Storage type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnKind {
    Numeric,
    Text,
}

/// A named column of cells.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Column {
    pub name: String,
    pub kind: ColumnKind,
    pub cells: Vec<Cell>,
}

impl Column {
    /// Numeric column; `None` becomes `Missing`.
    pub fn numeric(name: impl Into<String>, values: Vec<Option<f64>>) -> Self {
        Self {
            name: name.into(),
            kind: ColumnKind::Numeric,
            cells: values.into_iter().map(Cell::from_option).collect(),
        }
    }

    /// Text column holding the given cells verbatim.
    pub fn text(name: impl Into<String>, cells: Vec<Cell>) -> Self {
        Self {
            name: name.into(),
            kind: ColumnKind::Text,
            cells,
        }
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn is_numeric(&self) -> bool {
        self.kind == ColumnKind::Numeric
    }

    pub fn has_missing(&self) -> bool {
        self.cells.iter().any(Cell::is_missing)
    }

    /// Per-row numeric view, unparseable cells as `None`.
    pub fn numbers(&self) -> Vec<Option<f64>> {
        self.cells.iter().map(Cell::as_f64).collect()
    }

    /// Present numeric values only, in row order.
    pub fn present_numbers(&self) -> Vec<f64> {
        self.cells.iter().filter_map(Cell::as_f64).collect()
    }
}

// =============================================================================
// Column Mapping
// =============================================================================

/// Resolved role assignment for a table.
///
/// Attached once per table, never per row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMapping {
    /// Column holding the geographic area label.
    pub area: String,
    /// Recurring cost column (rent or price), possibly synthetic.
    pub rent: Option<String>,
    /// Annual income column, possibly synthetic.
    pub income: Option<String>,
    /// Geometry column (WKT/GeoJSON), passed through for renderers.
    #[serde(default)]
    pub geometry: Option<String>,
}

/// Latitude/longitude column pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoordinateColumns {
    pub latitude: String,
    pub longitude: String,
}

// =============================================================================
// Table
// =============================================================================

/// An ordered sequence of rows sharing one column set.
///
/// Invariants: at least one column, every column has `row_count` cells.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    columns: Vec<Column>,
    row_count: usize,
    mapping: Option<ColumnMapping>,
}

impl Table {
    pub fn new(columns: Vec<Column>) -> TableResult<Self> {
        let row_count = columns.first().map(Column::len).ok_or(TableError::NoColumns)?;
        if let Some(bad) = columns.iter().find(|c| c.len() != row_count) {
            return Err(TableError::RaggedColumn {
                column: bad.name.clone(),
                expected: row_count,
                found: bad.len(),
            });
        }
        Ok(Self {
            columns,
            row_count,
            mapping: None,
        })
    }

    pub fn row_count(&self) -> usize {
        self.row_count
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// True when the table has no rows.
    pub fn is_empty(&self) -> bool {
        self.row_count == 0
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    pub fn first_column_name(&self) -> &str {
        &self.columns[0].name
    }

    pub fn cell(&self, column: &str, row: usize) -> Option<&Cell> {
        self.column(column).and_then(|c| c.cells.get(row))
    }

    /// Replace the column with the same name, or append it.
    pub fn set_column(&mut self, column: Column) -> TableResult<()> {
        let found = column.len();
        if found != self.row_count {
            return Err(TableError::RaggedColumn {
                column: column.name,
                expected: self.row_count,
                found,
            });
        }
        match self.columns.iter_mut().find(|c| c.name == column.name) {
            Some(existing) => *existing = column,
            None => self.columns.push(column),
        }
        Ok(())
    }

    pub fn mapping(&self) -> Option<&ColumnMapping> {
        self.mapping.as_ref()
    }

    pub fn with_mapping(mut self, mapping: ColumnMapping) -> Self {
        self.mapping = Some(mapping);
        self
    }

    /// New table holding the given rows, in the given order.
    pub fn select_rows(&self, rows: &[usize]) -> Table {
        let columns = self
            .columns
            .iter()
            .map(|c| Column {
                name: c.name.clone(),
                kind: c.kind,
                cells: rows.iter().filter_map(|&i| c.cells.get(i).cloned()).collect(),
            })
            .collect();
        Table {
            columns,
            row_count: rows.iter().filter(|&&i| i < self.row_count).count(),
            mapping: self.mapping.clone(),
        }
    }

    /// New table keeping rows for which `keep(row)` holds.
    pub fn filter_rows<F>(&self, keep: F) -> Table
    where
        F: Fn(usize) -> bool,
    {
        let rows: Vec<usize> = (0..self.row_count).filter(|&i| keep(i)).collect();
        self.select_rows(&rows)
    }

    /// Rows as JSON objects keyed by column name.
    pub fn to_records(&self) -> Vec<Value> {
        (0..self.row_count)
            .map(|row| {
                let mut obj = Map::new();
                for column in &self.columns {
                    obj.insert(column.name.clone(), column.cells[row].to_json());
                }
                Value::Object(obj)
            })
            .collect()
    }
}

// =============================================================================
// Affordability Class
// =============================================================================

/// Stress tier of an affordability index.
///
/// Thresholds are fixed: below 30 affordable, 30 to 50 inclusive moderate,
/// above 50 expensive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AffordabilityClass {
    Affordable,
    Moderate,
    Expensive,
    Unknown,
}

impl AffordabilityClass {
    pub const MODERATE_FROM: f64 = 30.0;
    pub const EXPENSIVE_ABOVE: f64 = 50.0;

    pub fn from_index(index: Option<f64>) -> Self {
        match index {
            Some(v) if v.is_nan() => Self::Unknown,
            Some(v) if v < Self::MODERATE_FROM => Self::Affordable,
            Some(v) if v <= Self::EXPENSIVE_ABOVE => Self::Moderate,
            Some(_) => Self::Expensive,
            None => Self::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Affordable => "Affordable",
            Self::Moderate => "Moderate",
            Self::Expensive => "Expensive",
            Self::Unknown => "Unknown",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "Affordable" => Some(Self::Affordable),
            "Moderate" => Some(Self::Moderate),
            "Expensive" => Some(Self::Expensive),
            "Unknown" => Some(Self::Unknown),
            _ => None,
        }
    }
}

impl fmt::Display for AffordabilityClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Income Group
// =============================================================================

/// Income tercile of a row relative to its table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IncomeGroup {
    LowIncome,
    MedianIncome,
    HighIncome,
    Unknown,
}

impl IncomeGroup {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LowIncome => "low-income",
            Self::MedianIncome => "median-income",
            Self::HighIncome => "high-income",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for IncomeGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IncomeGroup {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "low-income" | "low" => Ok(Self::LowIncome),
            "median-income" | "median" => Ok(Self::MedianIncome),
            "high-income" | "high" => Ok(Self::HighIncome),
            "unknown" => Ok(Self::Unknown),
            other => Err(format!(
                "unknown income group '{}' (expected low-income, median-income, high-income or unknown)",
                other
            )),
        }
    }
}
