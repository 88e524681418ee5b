//! Income tercile segmentation.
//!
//! Each row is labelled against the 33rd/66th percentiles of the income
//! column of the table it belongs to. Labels depend on the whole row set, so
//! a filtered view keeps the labels of the table it came from; call
//! [`assign_income_groups`] on the view to re-segment it.

use crate::models::{Cell, Column, IncomeGroup, Table, ESTIMATED_INCOME, INCOME_GROUP};
use crate::stats::quantile;

/// Percentile cuts separating low/median/high income.
pub const DEFAULT_TERCILE_CUTS: (f64, f64) = (0.33, 0.66);

/// Label a single income against precomputed cut values.
pub fn income_group_of(income: Option<f64>, low_cut: f64, high_cut: f64) -> IncomeGroup {
    match income {
        None => IncomeGroup::Unknown,
        Some(v) if v <= low_cut => IncomeGroup::LowIncome,
        Some(v) if v <= high_cut => IncomeGroup::MedianIncome,
        Some(_) => IncomeGroup::HighIncome,
    }
}

/// Add or refresh the `income_group` column using the default cuts.
pub fn assign_income_groups(table: &Table) -> Table {
    assign_income_groups_with(table, DEFAULT_TERCILE_CUTS)
}

/// Add or refresh the `income_group` column.
///
/// Uses the income column of the table's mapping. Without one, or when it is
/// the synthetic `estimated_income`, every row is `unknown`.
pub fn assign_income_groups_with(table: &Table, cuts: (f64, f64)) -> Table {
    let rows = table.row_count();
    let incomes: Vec<Option<f64>> = table
        .mapping()
        .and_then(|m| m.income.as_deref())
        .filter(|name| *name != ESTIMATED_INCOME)
        .and_then(|name| table.column(name))
        .map(Column::numbers)
        .unwrap_or_else(|| vec![None; rows]);

    let present: Vec<f64> = incomes.iter().flatten().copied().collect();
    let labels: Vec<Cell> = match (quantile(&present, cuts.0), quantile(&present, cuts.1)) {
        (Some(low), Some(high)) => incomes
            .iter()
            .map(|v| Cell::text(income_group_of(*v, low, high).as_str()))
            .collect(),
        _ => vec![Cell::text(IncomeGroup::Unknown.as_str()); rows],
    };

    let mut out = table.clone();
    let result = out.set_column(Column::text(INCOME_GROUP, labels));
    debug_assert!(result.is_ok());
    out
}

/// New view holding only rows of the given group; `None` keeps every row.
pub fn filter_by_income_group(table: &Table, group: Option<IncomeGroup>) -> Table {
    let group = match group {
        Some(g) => g,
        None => return table.clone(),
    };

    let labelled;
    let source = if table.has_column(INCOME_GROUP) {
        table
    } else {
        labelled = assign_income_groups(table);
        &labelled
    };

    source.filter_rows(|row| {
        source
            .cell(INCOME_GROUP, row)
            .and_then(Cell::as_text)
            .is_some_and(|label| label == group.as_str())
    })
}
