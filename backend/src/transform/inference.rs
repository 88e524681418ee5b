//! Column role inference.
//!
//! Decides which column of an unknown schema holds the area label, the
//! recurring cost, the income and the geometry. Rules live in one ordered
//! table, [`RULES`]: for a role, rules are tried in order and, within a rule,
//! columns in table order. The first hit wins, so the same column-name set
//! always resolves the same way.
//!
//! ```text
//! "address" column? ──yes──▶ derive city per row ──▶ area = derived_area_label
//!        │no
//!        ▼
//! area rules ──▶ first hit, else first column
//! rent rules ──▶ first hit, else none
//! income rules ─▶ first hit, else none
//! geometry rules (exact) ──▶ first hit, else none
//! ```

use serde::Serialize;

use crate::models::{Cell, Column, ColumnMapping, CoordinateColumns, Table, DERIVED_AREA_LABEL};

/// Area label used when an address cannot be parsed.
pub const UNKNOWN_AREA: &str = "Unknown";

/// Role a column can play.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Area,
    Rent,
    Income,
    Geometry,
    Latitude,
    Longitude,
}

/// Predicate over a lowercased column name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NameMatch {
    /// Name contains the pattern
    Contains { pattern: &'static str },

    /// Name contains the pattern and does not start with `unless_prefix`
    ContainsUnlessPrefix {
        pattern: &'static str,
        unless_prefix: &'static str,
    },

    /// Name equals the pattern
    Exact { pattern: &'static str },
}

impl NameMatch {
    /// Test a column name, case-insensitively.
    pub fn matches(&self, name: &str) -> bool {
        let name = name.to_lowercase();
        match self {
            NameMatch::Contains { pattern } => name.contains(pattern),
            NameMatch::ContainsUnlessPrefix {
                pattern,
                unless_prefix,
            } => name.contains(pattern) && !name.starts_with(unless_prefix),
            NameMatch::Exact { pattern } => name == *pattern,
        }
    }
}

/// One `(predicate, role)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Rule {
    pub role: Role,
    pub matcher: NameMatch,
}

const fn contains(role: Role, pattern: &'static str) -> Rule {
    Rule {
        role,
        matcher: NameMatch::Contains { pattern },
    }
}

const fn exact(role: Role, pattern: &'static str) -> Rule {
    Rule {
        role,
        matcher: NameMatch::Exact { pattern },
    }
}

/// Column holding a free-text postal address.
pub const ADDRESS_RULE: NameMatch = NameMatch::Exact { pattern: "address" };

/// Role rules in priority order.
pub const RULES: &[Rule] = &[
    // Area labels; "area" last, skipping "Avg. Area ..." numeric features
    contains(Role::Area, "neighborhood"),
    contains(Role::Area, "ward"),
    contains(Role::Area, "zone"),
    contains(Role::Area, "district"),
    contains(Role::Area, "city"),
    contains(Role::Area, "location"),
    contains(Role::Area, "locality"),
    Rule {
        role: Role::Area,
        matcher: NameMatch::ContainsUnlessPrefix {
            pattern: "area",
            unless_prefix: "avg. area",
        },
    },
    // Recurring cost
    contains(Role::Rent, "rent"),
    contains(Role::Rent, "avg_rent"),
    contains(Role::Rent, "average_rent"),
    contains(Role::Rent, "rent_price"),
    contains(Role::Rent, "monthly_rent"),
    contains(Role::Rent, "rent_per_month"),
    contains(Role::Rent, "houseprice"),
    contains(Role::Rent, "house_price"),
    contains(Role::Rent, "price"),
    contains(Role::Rent, "saleprice"),
    // Income
    contains(Role::Income, "income"),
    contains(Role::Income, "avg_income"),
    contains(Role::Income, "average_income"),
    contains(Role::Income, "median_income"),
    contains(Role::Income, "household_income"),
    // Geometry, exact names only
    exact(Role::Geometry, "geometry"),
    exact(Role::Geometry, "wkt"),
    exact(Role::Geometry, "geojson"),
    exact(Role::Geometry, "geom"),
    // Coordinates
    exact(Role::Latitude, "lat"),
    exact(Role::Latitude, "latitude"),
    exact(Role::Longitude, "lon"),
    exact(Role::Longitude, "longitude"),
    exact(Role::Longitude, "lng"),
];

/// Rules for one role, in priority order.
pub fn rules_for(role: Role) -> impl Iterator<Item = &'static Rule> {
    RULES.iter().filter(move |r| r.role == role)
}

/// First column matching the role's rules.
pub fn resolve<'a>(role: Role, names: &[&'a str]) -> Option<&'a str> {
    rules_for(role).find_map(|rule| names.iter().copied().find(|n| rule.matcher.matches(n)))
}

/// City label from a postal address.
///
/// Takes the last non-blank line and keeps the text before its first comma.
/// Blank or non-text input gives [`UNKNOWN_AREA`].
///
/// # Example
/// ```ignore
/// let cell = Cell::text("123 Main St\nSpringfield, IL 62704");
/// assert_eq!(derive_area_label(&cell), "Springfield");
/// ```
pub fn derive_area_label(address: &Cell) -> String {
    let text = match address {
        Cell::Text(s) => s,
        _ => return UNKNOWN_AREA.to_string(),
    };

    let last_line = match text
        .split(['\n', '\r'])
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .last()
    {
        Some(line) => line,
        None => return UNKNOWN_AREA.to_string(),
    };

    let label = match last_line.split_once(',') {
        Some((city, _)) => city.trim(),
        None => last_line,
    };

    if label.is_empty() {
        UNKNOWN_AREA.to_string()
    } else {
        label.to_string()
    }
}

/// Resolve the column mapping of a table.
///
/// When an `address` column exists, adds [`DERIVED_AREA_LABEL`] (unless
/// already present) and uses it as the area column.
pub fn infer(table: &mut Table) -> ColumnMapping {
    let address = table
        .column_names()
        .find(|n| ADDRESS_RULE.matches(n))
        .map(str::to_string);

    let area = match address {
        Some(address) => derive_area_column(table, &address),
        None => {
            let names: Vec<&str> = table.column_names().collect();
            resolve(Role::Area, &names)
                .unwrap_or_else(|| table.first_column_name())
                .to_string()
        }
    };

    let names: Vec<&str> = table.column_names().collect();
    ColumnMapping {
        area,
        rent: resolve(Role::Rent, &names).map(str::to_string),
        income: resolve(Role::Income, &names).map(str::to_string),
        geometry: resolve(Role::Geometry, &names).map(str::to_string),
    }
}

fn derive_area_column(table: &mut Table, address: &str) -> String {
    if table.has_column(DERIVED_AREA_LABEL) {
        return DERIVED_AREA_LABEL.to_string();
    }

    let labels: Vec<Cell> = table
        .column(address)
        .map(|c| c.cells.iter().map(|cell| Cell::Text(derive_area_label(cell))).collect())
        .unwrap_or_default();

    match table.set_column(Column::text(DERIVED_AREA_LABEL, labels)) {
        Ok(()) => DERIVED_AREA_LABEL.to_string(),
        Err(_) => table.first_column_name().to_string(),
    }
}

/// Latitude/longitude columns, when both exist.
pub fn infer_coordinates(table: &Table) -> Option<CoordinateColumns> {
    let names: Vec<&str> = table.column_names().collect();
    let latitude = resolve(Role::Latitude, &names)?;
    let longitude = resolve(Role::Longitude, &names)?;
    Some(CoordinateColumns {
        latitude: latitude.to_string(),
        longitude: longitude.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table_with(names: &[&str]) -> Table {
        Table::new(
            names
                .iter()
                .map(|n| Column::numeric(*n, vec![Some(1.0)]))
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_address_examples() {
        assert_eq!(
            derive_area_label(&Cell::text("123 Main St\nSpringfield, IL 62704")),
            "Springfield"
        );
        assert_eq!(derive_area_label(&Cell::text("Unit 4 Somewhere")), "Unit 4 Somewhere");
        assert_eq!(derive_area_label(&Cell::text("   \n  ")), UNKNOWN_AREA);
        assert_eq!(derive_area_label(&Cell::Missing), UNKNOWN_AREA);
        assert_eq!(derive_area_label(&Cell::Number(12.0)), UNKNOWN_AREA);
    }

    #[test]
    fn test_address_trailing_blank_lines() {
        let cell = Cell::text("1 Elm Rd\r\n  Shelbyville , KY\n\n");
        assert_eq!(derive_area_label(&cell), "Shelbyville");
    }

    #[test]
    fn test_address_bare_carriage_return() {
        assert_eq!(derive_area_label(&Cell::text("1 Elm\rSpringfield, IL")), "Springfield");
    }

    #[test]
    fn test_address_leading_comma_is_unknown() {
        assert_eq!(derive_area_label(&Cell::text(", IL 62704")), UNKNOWN_AREA);
    }

    #[test]
    fn test_address_column_wins() {
        let mut table = Table::new(vec![
            Column::text(
                "Address",
                vec![Cell::text("9 Oak Ave\nRiverside, CA 92501"), Cell::Missing],
            ),
            Column::text("City", vec![Cell::text("x"), Cell::text("y")]),
            Column::numeric("Price", vec![Some(1.0), Some(2.0)]),
        ])
        .unwrap();

        let mapping = infer(&mut table);
        assert_eq!(mapping.area, DERIVED_AREA_LABEL);
        assert_eq!(table.cell(DERIVED_AREA_LABEL, 0), Some(&Cell::text("Riverside")));
        assert_eq!(table.cell(DERIVED_AREA_LABEL, 1), Some(&Cell::text(UNKNOWN_AREA)));
        assert_eq!(mapping.rent.as_deref(), Some("Price"));
    }

    #[test]
    fn test_area_priority_order() {
        let mut table = table_with(&["City Name", "Ward No", "Value"]);
        assert_eq!(infer(&mut table).area, "Ward No");
    }

    #[test]
    fn test_avg_area_columns_skipped() {
        let mut table = table_with(&["Avg. Area Income", "Avg. Area House Age", "Price"]);
        let mapping = infer(&mut table);

        // nothing area-like, falls back to the first column
        assert_eq!(mapping.area, "Avg. Area Income");
        assert_eq!(mapping.income.as_deref(), Some("Avg. Area Income"));
        assert_eq!(mapping.rent.as_deref(), Some("Price"));
    }

    #[test]
    fn test_area_substring_still_matches_other_names() {
        let mut table = table_with(&["Avg. Area Rooms", "Service Area"]);
        assert_eq!(infer(&mut table).area, "Service Area");
    }

    #[test]
    fn test_mumbai_style_columns() {
        let mut table = table_with(&[
            "Neighborhood",
            "Latitude",
            "Longitude",
            "Avg_Rent_Monthly_INR",
            "Median_Annual_Household_Income_INR",
        ]);
        let mapping = infer(&mut table);

        assert_eq!(mapping.area, "Neighborhood");
        assert_eq!(mapping.rent.as_deref(), Some("Avg_Rent_Monthly_INR"));
        assert_eq!(mapping.income.as_deref(), Some("Median_Annual_Household_Income_INR"));
        assert_eq!(mapping.geometry, None);

        let coords = infer_coordinates(&table).unwrap();
        assert_eq!(coords.latitude, "Latitude");
        assert_eq!(coords.longitude, "Longitude");
    }

    #[test]
    fn test_rent_rule_order_beats_column_order() {
        // "rent" is tried before "price" even though Price comes first
        let mut table = table_with(&["SalePrice", "Rent_Estimate"]);
        assert_eq!(infer(&mut table).rent.as_deref(), Some("Rent_Estimate"));
    }

    #[test]
    fn test_geometry_requires_exact_name() {
        let mut table = table_with(&["geometry_id", "WKT"]);
        assert_eq!(infer(&mut table).geometry.as_deref(), Some("WKT"));

        let mut table = table_with(&["geometry_id"]);
        assert_eq!(infer(&mut table).geometry, None);
    }

    #[test]
    fn test_no_signal_fallbacks() {
        let mut table = table_with(&["a", "b"]);
        let mapping = infer(&mut table);

        assert_eq!(mapping.area, "a");
        assert_eq!(mapping.rent, None);
        assert_eq!(mapping.income, None);
    }

    #[test]
    fn test_infer_is_deterministic() {
        let names = ["Zone", "Locality", "Monthly_Rent", "Household_Income", "geom"];
        let first = infer(&mut table_with(&names));
        let second = infer(&mut table_with(&names));
        assert_eq!(first, second);
    }

    #[test]
    fn test_rule_table_order() {
        let area: Vec<&str> = rules_for(Role::Area)
            .map(|r| match r.matcher {
                NameMatch::Contains { pattern }
                | NameMatch::ContainsUnlessPrefix { pattern, .. }
                | NameMatch::Exact { pattern } => pattern,
            })
            .collect();
        assert_eq!(
            area,
            vec!["neighborhood", "ward", "zone", "district", "city", "location", "locality", "area"]
        );
        assert!(rules_for(Role::Geometry).all(|r| matches!(r.matcher, NameMatch::Exact { .. })));
    }

    #[test]
    fn test_coordinates_need_both() {
        let table = table_with(&["lat", "value"]);
        assert_eq!(infer_coordinates(&table), None);

        let table = table_with(&["LAT", "lng"]);
        let coords = infer_coordinates(&table).unwrap();
        assert_eq!(coords.latitude, "LAT");
        assert_eq!(coords.longitude, "lng");
    }
}
