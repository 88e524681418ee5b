//! Column-name normalisation, imputation and numeric coercion.
//!
//! ```text
//! raw table ──▶ trim names ──▶ impute (median / mode) ──▶ coerce numeric text
//! ```
//!
//! Never fails on a bad cell: anything unparseable becomes missing and is
//! imputed like any other gap.

use serde::Serialize;
use std::collections::BTreeMap;

use crate::models::{parse_number, Cell, Column, ColumnKind, Table};
use crate::stats::median;

/// Share of rows that must parse for a text column to become numeric.
pub const DEFAULT_COERCION_THRESHOLD: f64 = 0.6;

/// What the cleaner changed, for logging.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CleanReport {
    /// `(original, trimmed)` for every renamed column
    pub renamed: Vec<(String, String)>,
    /// Columns that had gaps filled
    pub imputed: Vec<String>,
    /// Text columns converted to numbers
    pub coerced: Vec<String>,
}

/// Clean a raw table with the default coercion threshold.
pub fn clean(raw: &Table) -> Table {
    clean_with_report(raw, DEFAULT_COERCION_THRESHOLD).0
}

/// Clean a raw table and report what changed.
pub fn clean_with_report(raw: &Table, coercion_threshold: f64) -> (Table, CleanReport) {
    let mut report = CleanReport::default();
    let row_count = raw.row_count();

    let columns: Vec<Column> = raw
        .columns()
        .iter()
        .map(|column| {
            let trimmed = column.name.trim().to_string();
            if trimmed != column.name {
                report.renamed.push((column.name.clone(), trimmed.clone()));
            }

            let mut cleaned = Column {
                name: trimmed,
                kind: column.kind,
                cells: column.cells.clone(),
            };

            if impute(&mut cleaned) {
                report.imputed.push(cleaned.name.clone());
            }
            if cleaned.kind == ColumnKind::Text {
                if let Some(numeric) = coerce(&cleaned, row_count, coercion_threshold) {
                    report.coerced.push(cleaned.name.clone());
                    cleaned = numeric;
                }
            }
            cleaned
        })
        .collect();

    // Same column count and lengths as the input, so the invariants hold
    let table = match Table::new(columns) {
        Ok(t) => t,
        Err(_) => raw.clone(),
    };
    (table, report)
}

/// Fill gaps in place: numeric columns with the median, text with the mode.
///
/// Returns whether anything was filled. A column with no present value at
/// all has nothing to impute from and is left as is.
fn impute(column: &mut Column) -> bool {
    if !column.has_missing() {
        return false;
    }

    let fill = match column.kind {
        ColumnKind::Numeric => median(&column.present_numbers()).map(Cell::Number),
        ColumnKind::Text => mode(&column.cells).map(Cell::Text),
    };

    match fill {
        Some(value) => {
            for cell in column.cells.iter_mut().filter(|c| c.is_missing()) {
                *cell = value.clone();
            }
            true
        }
        None => false,
    }
}

/// Most frequent text value; ties go to the lexicographically smallest.
fn mode(cells: &[Cell]) -> Option<String> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for text in cells.iter().filter_map(Cell::as_text) {
        *counts.entry(text).or_insert(0) += 1;
    }

    let mut best: Option<(&str, usize)> = None;
    for (value, count) in counts {
        if best.map_or(true, |(_, c)| count > c) {
            best = Some((value, count));
        }
    }
    best.map(|(value, _)| value.to_string())
}

/// Numeric version of a text column, if enough rows parse.
///
/// Thousands-separator commas are stripped before parsing. Rows that still
/// fail are filled with the median of the parsed values.
fn coerce(column: &Column, row_count: usize, threshold: f64) -> Option<Column> {
    let parsed: Vec<Option<f64>> = column
        .cells
        .iter()
        .map(|cell| match cell {
            Cell::Number(n) => Some(*n),
            Cell::Text(s) => parse_number(&s.replace(',', "")),
            Cell::Missing => None,
        })
        .collect();

    let ok = parsed.iter().flatten().count();
    if ok == 0 || (ok as f64 / row_count as f64) < threshold {
        return None;
    }

    let present: Vec<f64> = parsed.iter().flatten().copied().collect();
    let fill = median(&present);
    Some(Column::numeric(
        column.name.clone(),
        parsed.into_iter().map(|v| v.or(fill)).collect(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(columns: Vec<Column>) -> Table {
        Table::new(columns).unwrap()
    }

    #[test]
    fn test_trims_column_names() {
        let raw = table(vec![Column::numeric(" Rent ", vec![Some(1.0)])]);
        let (cleaned, report) = clean_with_report(&raw, DEFAULT_COERCION_THRESHOLD);

        assert!(cleaned.has_column("Rent"));
        assert!(!cleaned.has_column(" Rent "));
        assert_eq!(report.renamed, vec![(" Rent ".to_string(), "Rent".to_string())]);
    }

    #[test]
    fn test_numeric_median_imputation() {
        let raw = table(vec![Column::numeric(
            "Income",
            vec![Some(10.0), None, Some(30.0), Some(20.0)],
        )]);
        let cleaned = clean(&raw);

        assert_eq!(cleaned.cell("Income", 1), Some(&Cell::Number(20.0)));
        assert!(!cleaned.column("Income").unwrap().has_missing());
    }

    #[test]
    fn test_text_mode_imputation() {
        let raw = table(vec![Column::text(
            "City",
            vec![
                Cell::text("Pune"),
                Cell::Missing,
                Cell::text("Mumbai"),
                Cell::text("Pune"),
            ],
        )]);
        let cleaned = clean(&raw);

        assert_eq!(cleaned.cell("City", 1), Some(&Cell::text("Pune")));
    }

    #[test]
    fn test_mode_tie_breaks_lexicographically() {
        let cells = vec![Cell::text("b"), Cell::text("a"), Cell::Missing];
        assert_eq!(mode(&cells), Some("a".to_string()));
    }

    #[test]
    fn test_coerces_thousands_separators() {
        let raw = table(vec![Column::text(
            "Price",
            vec![
                Cell::text("20,000"),
                Cell::text("1,250,000"),
                Cell::text("n/a price"),
                Cell::text("30,000"),
                Cell::text("40,000"),
            ],
        )]);
        let (cleaned, report) = clean_with_report(&raw, DEFAULT_COERCION_THRESHOLD);
        let price = cleaned.column("Price").unwrap();

        assert!(price.is_numeric());
        assert_eq!(price.cells[0], Cell::Number(20000.0));
        assert_eq!(price.cells[1], Cell::Number(1_250_000.0));
        // median of 20k, 30k, 40k, 1.25M
        assert_eq!(price.cells[2], Cell::Number(35000.0));
        assert_eq!(report.coerced, vec!["Price".to_string()]);
    }

    #[test]
    fn test_below_threshold_stays_text() {
        let raw = table(vec![Column::text(
            "Notes",
            vec![
                Cell::text("12"),
                Cell::text("quiet street"),
                Cell::text("near station"),
                Cell::text("7"),
                Cell::text("corner"),
            ],
        )]);
        let cleaned = clean(&raw);
        let notes = cleaned.column("Notes").unwrap();

        assert!(!notes.is_numeric());
        assert_eq!(notes.cells[1], Cell::text("quiet street"));
    }

    #[test]
    fn test_exactly_sixty_percent_is_coerced() {
        let raw = table(vec![Column::text(
            "Mixed",
            vec![
                Cell::text("1"),
                Cell::text("2"),
                Cell::text("3"),
                Cell::text("x"),
                Cell::text("y"),
            ],
        )]);
        assert!(clean(&raw).column("Mixed").unwrap().is_numeric());
    }

    #[test]
    fn test_no_missing_after_clean() {
        let raw = table(vec![
            Column::numeric("a", vec![None, Some(1.0), Some(3.0)]),
            Column::text("b", vec![Cell::Missing, Cell::text("x"), Cell::Missing]),
            Column::text("c", vec![Cell::text("5"), Cell::Missing, Cell::text("bad")]),
        ]);
        let cleaned = clean(&raw);

        for column in cleaned.columns() {
            assert!(!column.has_missing(), "column {} has gaps", column.name);
        }
    }

    #[test]
    fn test_all_missing_column_left_alone() {
        let raw = table(vec![Column::numeric("empty", vec![None, None])]);
        let (cleaned, report) = clean_with_report(&raw, DEFAULT_COERCION_THRESHOLD);

        assert!(cleaned.column("empty").unwrap().has_missing());
        assert!(report.imputed.is_empty());
    }

    #[test]
    fn test_clean_is_deterministic() {
        let raw = table(vec![
            Column::text("a", vec![Cell::text("q"), Cell::Missing, Cell::text("r")]),
            Column::numeric("b", vec![Some(2.0), None, Some(4.0)]),
        ]);
        assert_eq!(clean(&raw), clean(&raw));
    }
}
