//! Affordability index and stress classification.
//!
//! `affordability_index = annual cost / annual income * 100`, per row.
//!
//! Resolution rules when the inferred roles are incomplete:
//!
//! - No cost column: use a column named exactly `price`, `saleprice`,
//!   `houseprice` or `house_price` (case-insensitive); failing that, add an
//!   all-missing `estimated_rent` column.
//! - No income column: estimate a monthly rent from the cost column, then
//!   `income = monthly rent * 12 * rent_to_income_multiple`, stored as
//!   `estimated_income`.
//!
//! A cost column whose name contains "month" is monthly and gets annualized.
//! Division by a missing or zero income yields a missing index, never an
//! infinity.

use serde::{Deserialize, Serialize};

use crate::models::{
    AffordabilityClass, Cell, Column, ColumnMapping, Table, AFFORDABILITY_CLASS,
    AFFORDABILITY_INDEX, ESTIMATED_INCOME, ESTIMATED_RENT, PRECOMPUTED_INDEX,
};

/// Crude sale-price to monthly-rent divisor.
pub const DEFAULT_PRICE_TO_RENT_DIVISOR: f64 = 300.0;

/// Annual income assumed per unit of annual rent.
pub const DEFAULT_RENT_TO_INCOME_MULTIPLE: f64 = 3.5;

/// A non-monthly cost column peaking above this holds sale prices.
pub const DEFAULT_SALE_PRICE_CUTOFF: f64 = 1_000_000.0;

/// Exact names tried when no cost column was inferred.
pub const PRICE_COLUMN_NAMES: &[&str] = &["price", "saleprice", "houseprice", "house_price"];

/// Heuristic constants of the income and rent estimates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AffordabilityParams {
    pub price_to_rent_divisor: f64,
    pub rent_to_income_multiple: f64,
    pub sale_price_cutoff: f64,
}

impl Default for AffordabilityParams {
    fn default() -> Self {
        Self {
            price_to_rent_divisor: DEFAULT_PRICE_TO_RENT_DIVISOR,
            rent_to_income_multiple: DEFAULT_RENT_TO_INCOME_MULTIPLE,
            sale_price_cutoff: DEFAULT_SALE_PRICE_CUTOFF,
        }
    }
}

/// Compute the index and class with the default constants.
pub fn compute(table: &Table, area: &str, rent: Option<&str>, income: Option<&str>) -> Table {
    compute_with(table, area, rent, income, &AffordabilityParams::default())
}

/// Compute the index and class.
///
/// Returns a new table with `affordability_index`, `affordability_class`,
/// any synthetic column, and the resolved mapping attached. The input table
/// is left untouched.
pub fn compute_with(
    table: &Table,
    area: &str,
    rent: Option<&str>,
    income: Option<&str>,
    params: &AffordabilityParams,
) -> Table {
    let mut out = table.clone();
    let rows = out.row_count();

    let rent_col = match rent.filter(|r| out.has_column(r)) {
        Some(r) => r.to_string(),
        None => match price_column(&out) {
            Some(p) => p,
            None => {
                put(&mut out, Column::numeric(ESTIMATED_RENT, vec![None; rows]));
                ESTIMATED_RENT.to_string()
            }
        },
    };

    let cost = out
        .column(&rent_col)
        .map(Column::numbers)
        .unwrap_or_else(|| vec![None; rows]);
    let monthly = is_monthly(&rent_col);
    let annual_cost: Vec<Option<f64>> = cost
        .iter()
        .map(|v| v.map(|c| if monthly { c * 12.0 } else { c }))
        .collect();

    let income_col = match income.filter(|i| out.has_column(i)) {
        Some(i) => i.to_string(),
        None => {
            let estimate = estimate_income(&cost, monthly, params);
            put(&mut out, Column::numeric(ESTIMATED_INCOME, estimate));
            ESTIMATED_INCOME.to_string()
        }
    };

    let annual_income = out
        .column(&income_col)
        .map(Column::numbers)
        .unwrap_or_else(|| vec![None; rows]);

    let mut index: Vec<Option<f64>> = annual_cost
        .iter()
        .zip(&annual_income)
        .map(|(c, i)| affordability_index(*c, *i))
        .collect();

    if let Some(precomputed) = out.column(PRECOMPUTED_INDEX) {
        for (value, cell) in index.iter_mut().zip(&precomputed.cells) {
            if value.is_none() {
                *value = cell.as_f64();
            }
        }
    }

    let classes: Vec<Cell> = index
        .iter()
        .map(|v| Cell::text(AffordabilityClass::from_index(*v).as_str()))
        .collect();

    put(&mut out, Column::numeric(AFFORDABILITY_INDEX, index));
    put(&mut out, Column::text(AFFORDABILITY_CLASS, classes));

    let geometry = table.mapping().and_then(|m| m.geometry.clone());
    out.with_mapping(ColumnMapping {
        area: area.to_string(),
        rent: Some(rent_col),
        income: Some(income_col),
        geometry,
    })
}

/// `cost / income * 100`, missing on a missing operand or zero income.
pub fn affordability_index(annual_cost: Option<f64>, annual_income: Option<f64>) -> Option<f64> {
    match (annual_cost, annual_income) {
        (Some(cost), Some(income)) if income != 0.0 => {
            Some(cost / income * 100.0).filter(|v| v.is_finite())
        }
        _ => None,
    }
}

/// Whether a cost column holds monthly figures.
pub fn is_monthly(column: &str) -> bool {
    column.to_lowercase().contains("month")
}

fn price_column(table: &Table) -> Option<String> {
    table
        .column_names()
        .find(|n| PRICE_COLUMN_NAMES.contains(&n.to_lowercase().as_str()))
        .map(str::to_string)
}

/// Synthetic annual income from the cost column.
fn estimate_income(
    cost: &[Option<f64>],
    monthly: bool,
    params: &AffordabilityParams,
) -> Vec<Option<f64>> {
    let max = cost.iter().flatten().copied().fold(None, |acc: Option<f64>, v| {
        Some(acc.map_or(v, |m| m.max(v)))
    });
    let sale_prices = !monthly && max.map_or(false, |m| m > params.sale_price_cutoff);

    cost.iter()
        .map(|v| {
            v.map(|c| {
                let monthly_rent = if sale_prices {
                    c / params.price_to_rent_divisor
                } else if monthly {
                    c
                } else {
                    c / 12.0
                };
                monthly_rent * 12.0 * params.rent_to_income_multiple
            })
        })
        .collect()
}

fn put(table: &mut Table, column: Column) {
    // Columns built here always have one cell per row
    let result = table.set_column(column);
    debug_assert!(result.is_ok());
}
