//! High-level pipeline API: raw table to annotated table and summaries.
//!
//! ```text
//! raw ──▶ clean ──▶ infer ──▶ overrides ──▶ compute ──▶ segment ──▶ filter ──▶ aggregate
//! ```
//!
//! [`prepare`] runs everything up to segmentation and is what callers cache;
//! [`report`] filters a prepared table by income group and summarises it.
//!
//! # Example
//!
//! ```rust,ignore
//! use housing_mapper::transform::pipeline::{analyze_file, PipelineOptions};
//! use std::path::Path;
//!
//! let analysis = analyze_file(Path::new("rents.csv"), &PipelineOptions::default())?;
//! for line in &analysis.report.summaries.recommendations {
//!     println!("{}", line);
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;

use super::affordability::{compute_with, AffordabilityParams};
use super::cleaner::{clean_with_report, CleanReport, DEFAULT_COERCION_THRESHOLD};
use super::inference::{infer, infer_coordinates};
use super::segmentation::{assign_income_groups_with, filter_by_income_group, DEFAULT_TERCILE_CUTS};
use crate::aggregate::{
    describe_index, estimate_struggling, map_points, recommend, summarize_by_area, AreaSummary,
    IndexStats, MapPoint, StrugglingEstimate, DEFAULT_STRUGGLING_THRESHOLD,
};
use crate::api::logs::{log_info, log_success, log_warning, Stage};
use crate::error::{PipelineError, PipelineResult};
use crate::models::{
    ColumnMapping, CoordinateColumns, IncomeGroup, Table, ESTIMATED_INCOME, ESTIMATED_RENT,
};
use crate::parser::{parse_bytes_auto, parse_csv_file_auto, ParseResult};

/// Recommendations shown by the application surfaces.
pub const DEFAULT_REPORT_TOP_K: usize = 5;

/// Explicit column pins. A pin naming a column that does not exist is ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnOverrides {
    pub area: Option<String>,
    pub rent: Option<String>,
    pub income: Option<String>,
}

impl ColumnOverrides {
    pub fn is_empty(&self) -> bool {
        self.area.is_none() && self.rent.is_none() && self.income.is_none()
    }
}

/// Options for the analysis pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineOptions {
    /// Share of parseable rows needed to coerce a text column
    pub coercion_threshold: f64,

    /// Income/rent estimation constants
    pub affordability: AffordabilityParams,

    /// Percentiles separating low/median/high income
    pub income_tercile_cuts: (f64, f64),

    /// Index above which a row counts as struggling
    pub struggling_threshold: f64,

    /// Number of recommendations
    pub top_k: usize,

    /// Restrict summaries to one income group; `None` is all rows
    pub income_group: Option<IncomeGroup>,

    /// Column pins applied over inference
    pub overrides: ColumnOverrides,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            coercion_threshold: DEFAULT_COERCION_THRESHOLD,
            affordability: AffordabilityParams::default(),
            income_tercile_cuts: DEFAULT_TERCILE_CUTS,
            struggling_threshold: DEFAULT_STRUGGLING_THRESHOLD,
            top_k: DEFAULT_REPORT_TOP_K,
            income_group: None,
            overrides: ColumnOverrides::default(),
        }
    }
}

/// CSV file information
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CsvInfo {
    pub encoding: String,
    pub delimiter: char,
    pub headers: Vec<String>,
    pub row_count: usize,
    /// Input fingerprint, when loaded from disk
    pub fingerprint: Option<String>,
}

impl CsvInfo {
    fn from_parsed(parsed: &ParseResult) -> Self {
        Self {
            encoding: parsed.encoding.clone(),
            delimiter: parsed.delimiter,
            headers: parsed.headers.clone(),
            row_count: parsed.table.row_count(),
            fingerprint: None,
        }
    }
}

/// Cleaned, annotated and segmented table with what was resolved for it.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedTable {
    pub table: Table,
    pub mapping: ColumnMapping,
    pub coordinates: Option<CoordinateColumns>,
    pub clean_report: CleanReport,
}

/// Summaries of one table view.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Summaries {
    pub area_summary: Vec<AreaSummary>,
    pub struggling: StrugglingEstimate,
    pub recommendations: Vec<String>,
    pub index_stats: IndexStats,
    pub map_points: Vec<MapPoint>,
}

/// A prepared table filtered to an income group, with its summaries.
#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    pub income_group: Option<IncomeGroup>,
    pub view: Table,
    pub summaries: Summaries,
}

/// Result of a complete pipeline run
#[derive(Debug, Clone, PartialEq)]
pub struct Analysis {
    pub csv_info: CsvInfo,
    pub prepared: PreparedTable,
    pub report: Report,
}

/// Analyse a CSV file.
pub fn analyze_file(path: &Path, options: &PipelineOptions) -> PipelineResult<Analysis> {
    let parsed = parse_csv_file_auto(path)?;
    analyze_parsed(parsed, options)
}

/// Analyse raw CSV bytes (upload bodies).
pub fn analyze_bytes(bytes: &[u8], options: &PipelineOptions) -> PipelineResult<Analysis> {
    let parsed = parse_bytes_auto(bytes)?;
    analyze_parsed(parsed, options)
}

/// Analyse an already-loaded table.
pub fn analyze_table(raw: &Table, options: &PipelineOptions) -> PipelineResult<Analysis> {
    let parsed = ParseResult {
        table: raw.clone(),
        encoding: "utf-8".to_string(),
        delimiter: ',',
        headers: raw.column_names().map(str::to_string).collect(),
    };
    analyze_parsed(parsed, options)
}

/// Analyse loader output.
pub fn analyze_parsed(parsed: ParseResult, options: &PipelineOptions) -> PipelineResult<Analysis> {
    log_success(
        Stage::Load,
        format!(
            "Read {} rows, {} columns (encoding {}, separator '{}')",
            parsed.table.row_count(),
            parsed.headers.len(),
            parsed.encoding,
            format_delimiter(parsed.delimiter)
        ),
    );

    let csv_info = CsvInfo::from_parsed(&parsed);
    let prepared = prepare(&parsed.table, options)?;
    let report = report(&prepared, options);

    Ok(Analysis {
        csv_info,
        prepared,
        report,
    })
}

/// Clean, infer, apply overrides, compute and segment.
///
/// Fails only with [`PipelineError::DataUnavailable`] on a table without rows.
pub fn prepare(raw: &Table, options: &PipelineOptions) -> PipelineResult<PreparedTable> {
    if raw.is_empty() {
        return Err(PipelineError::DataUnavailable);
    }

    let (mut table, clean_report) = clean_with_report(raw, options.coercion_threshold);
    log_clean_report(&clean_report);

    let inferred = infer(&mut table);
    let mapping = apply_overrides(&table, inferred, &options.overrides);
    log_mapping(&mapping);

    let table = table.with_mapping(mapping.clone());
    let table = compute_with(
        &table,
        &mapping.area,
        mapping.rent.as_deref(),
        mapping.income.as_deref(),
        &options.affordability,
    );
    // compute may swap in synthetic columns
    let mapping = table.mapping().cloned().unwrap_or(mapping);
    log_synthetic(&mapping);

    let table = assign_income_groups_with(&table, options.income_tercile_cuts);
    log_info(
        Stage::Segment,
        format!(
            "Income terciles at {:.0}th/{:.0}th percentile",
            options.income_tercile_cuts.0 * 100.0,
            options.income_tercile_cuts.1 * 100.0
        ),
    );

    let coordinates = infer_coordinates(&table);
    if let Some(coords) = &coordinates {
        log_info(
            Stage::Infer,
            format!("Coordinates: {} / {}", coords.latitude, coords.longitude),
        );
    }

    Ok(PreparedTable {
        table,
        mapping,
        coordinates,
        clean_report,
    })
}

/// Filter a prepared table to `options.income_group` and summarise the view.
pub fn report(prepared: &PreparedTable, options: &PipelineOptions) -> Report {
    let view = filter_by_income_group(&prepared.table, options.income_group);
    if let Some(group) = options.income_group {
        log_info(
            Stage::Segment,
            format!("{} of {} rows in {}", view.row_count(), prepared.table.row_count(), group),
        );
    }

    let summaries = summarize(
        &view,
        &prepared.mapping.area,
        prepared.coordinates.as_ref(),
        options,
    );
    log_success(
        Stage::Aggregate,
        format!(
            "{} area groups, {} of {} rows above {}",
            summaries.area_summary.len(),
            summaries.struggling.overall_count,
            summaries.struggling.overall_total,
            summaries.struggling.threshold
        ),
    );

    Report {
        income_group: options.income_group,
        view,
        summaries,
    }
}

/// Every aggregate of one table view.
pub fn summarize(
    view: &Table,
    area: &str,
    coordinates: Option<&CoordinateColumns>,
    options: &PipelineOptions,
) -> Summaries {
    Summaries {
        area_summary: summarize_by_area(view, area),
        struggling: estimate_struggling(view, area, options.struggling_threshold),
        recommendations: recommend(view, area, options.top_k),
        index_stats: describe_index(view),
        map_points: coordinates
            .map(|c| map_points(view, c, area))
            .unwrap_or_default(),
    }
}

/// Replace inferred roles with pins naming existing columns.
pub fn apply_overrides(
    table: &Table,
    mut mapping: ColumnMapping,
    overrides: &ColumnOverrides,
) -> ColumnMapping {
    let pin = |role: &str, name: &Option<String>| -> Option<String> {
        let name = name.as_deref()?.trim();
        if name.is_empty() {
            return None;
        }
        if table.has_column(name) {
            Some(name.to_string())
        } else {
            log_warning(
                Stage::Infer,
                format!("Ignoring {} override '{}': no such column", role, name),
            );
            None
        }
    };

    if let Some(area) = pin("area", &overrides.area) {
        mapping.area = area;
    }
    if let Some(rent) = pin("rent", &overrides.rent) {
        mapping.rent = Some(rent);
    }
    if let Some(income) = pin("income", &overrides.income) {
        mapping.income = Some(income);
    }
    mapping
}

fn log_clean_report(report: &CleanReport) {
    for (from, to) in &report.renamed {
        log_info(Stage::Clean, format!("Renamed '{}' -> '{}'", from, to));
    }
    if !report.coerced.is_empty() {
        log_info(
            Stage::Clean,
            format!("Coerced to numeric: {}", report.coerced.join(", ")),
        );
    }
    if !report.imputed.is_empty() {
        log_info(
            Stage::Clean,
            format!("Filled missing values in: {}", report.imputed.join(", ")),
        );
    }
    log_success(Stage::Clean, "Table cleaned");
}

fn log_mapping(mapping: &ColumnMapping) {
    log_success(
        Stage::Infer,
        format!(
            "area={} rent={} income={}",
            mapping.area,
            mapping.rent.as_deref().unwrap_or("-"),
            mapping.income.as_deref().unwrap_or("-")
        ),
    );
    if let Some(geometry) = &mapping.geometry {
        log_info(Stage::Infer, format!("Geometry column: {}", geometry));
    }
}

fn log_synthetic(mapping: &ColumnMapping) {
    if mapping.rent.as_deref() == Some(ESTIMATED_RENT) {
        log_warning(Stage::Compute, "No rent or price column; index will be missing");
    }
    if mapping.income.as_deref() == Some(ESTIMATED_INCOME) {
        log_warning(Stage::Compute, "No income column; using estimated income");
    }
    log_success(Stage::Compute, "Affordability index computed");
}

/// Format delimiter for display
fn format_delimiter(d: char) -> &'static str {
    match d {
        ';' => ";",
        ',' => ",",
        '\t' => "TAB",
        '|' => "|",
        _ => "?",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        AffordabilityClass, Cell, Column, AFFORDABILITY_CLASS, AFFORDABILITY_INDEX, INCOME_GROUP,
    };

    fn sample() -> Table {
        Table::new(vec![
            Column::text(
                " City ",
                vec![
                    Cell::text("Springfield"),
                    Cell::text("Shelbyville"),
                    Cell::text("Springfield"),
                    Cell::Missing,
                ],
            ),
            Column::text(
                "Monthly Rent",
                vec![
                    Cell::text("1,000"),
                    Cell::text("2,500"),
                    Cell::Missing,
                    Cell::text("1,500"),
                ],
            ),
            Column::numeric(
                "Median Income",
                vec![Some(60000.0), Some(50000.0), Some(40000.0), Some(30000.0)],
            ),
        ])
        .unwrap()
    }

    #[test]
    fn test_default_options() {
        let opts = PipelineOptions::default();
        assert_eq!(opts.top_k, 5);
        assert_eq!(opts.coercion_threshold, 0.6);
        assert_eq!(opts.struggling_threshold, 50.0);
        assert_eq!(opts.income_tercile_cuts, (0.33, 0.66));
        assert!(opts.overrides.is_empty());
        assert!(opts.income_group.is_none());
    }

    #[test]
    fn test_options_deserialize_partial() {
        let opts: PipelineOptions = serde_json::from_value(serde_json::json!({
            "top_k": 2,
            "income_group": "low-income",
            "overrides": { "area": "City" }
        }))
        .unwrap();

        assert_eq!(opts.top_k, 2);
        assert_eq!(opts.income_group, Some(IncomeGroup::LowIncome));
        assert_eq!(opts.overrides.area.as_deref(), Some("City"));
        assert_eq!(opts.struggling_threshold, 50.0);
    }

    #[test]
    fn test_empty_table_is_data_unavailable() {
        let empty = Table::new(vec![Column::numeric("rent", vec![])]).unwrap();
        let err = analyze_table(&empty, &PipelineOptions::default()).unwrap_err();
        assert!(matches!(err, PipelineError::DataUnavailable));
    }

    #[test]
    fn test_full_run() {
        let analysis = analyze_table(&sample(), &PipelineOptions::default()).unwrap();
        let prepared = &analysis.prepared;

        assert_eq!(prepared.mapping.area, "City");
        assert_eq!(prepared.mapping.rent.as_deref(), Some("Monthly Rent"));
        assert_eq!(prepared.mapping.income.as_deref(), Some("Median Income"));
        assert_eq!(prepared.clean_report.coerced, vec!["Monthly Rent".to_string()]);

        // 1000 * 12 / 60000 * 100
        assert_eq!(
            prepared.table.cell(AFFORDABILITY_INDEX, 0),
            Some(&Cell::Number(20.0))
        );
        assert_eq!(
            prepared.table.cell(AFFORDABILITY_CLASS, 1),
            Some(&Cell::text(AffordabilityClass::Expensive.as_str()))
        );
        assert!(prepared.table.has_column(INCOME_GROUP));
        assert_eq!(prepared.table.mapping(), Some(&prepared.mapping));

        assert_eq!(analysis.csv_info.row_count, 4);
        assert_eq!(analysis.report.view, prepared.table);
        assert!(analysis.report.summaries.recommendations.len() <= 5);
        assert_eq!(analysis.report.summaries.index_stats.count, 4);
    }

    #[test]
    fn test_rerun_is_identical() {
        let options = PipelineOptions::default();
        let first = analyze_table(&sample(), &options).unwrap();
        let second = analyze_table(&sample(), &options).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_overrides_only_apply_to_existing_columns() {
        let mut options = PipelineOptions::default();
        options.overrides = ColumnOverrides {
            area: Some("Median Income".into()),
            rent: Some("missing column".into()),
            income: None,
        };

        let prepared = prepare(&sample(), &options).unwrap();
        assert_eq!(prepared.mapping.area, "Median Income");
        assert_eq!(prepared.mapping.rent.as_deref(), Some("Monthly Rent"));
    }

    #[test]
    fn test_report_filters_by_income_group() {
        let mut options = PipelineOptions::default();
        let prepared = prepare(&sample(), &options).unwrap();

        options.income_group = Some(IncomeGroup::HighIncome);
        let high = report(&prepared, &options);

        assert_eq!(high.income_group, Some(IncomeGroup::HighIncome));
        assert!(high.view.row_count() < prepared.table.row_count());
        for row in 0..high.view.row_count() {
            assert_eq!(
                high.view.cell(INCOME_GROUP, row),
                Some(&Cell::text("high-income"))
            );
        }
    }

    #[test]
    fn test_no_income_column_uses_estimate() {
        let raw = Table::new(vec![
            Column::text("Region", vec![Cell::text("A"), Cell::text("B")]),
            Column::numeric("Rent", vec![Some(1200.0), Some(900.0)]),
        ])
        .unwrap();

        let prepared = prepare(&raw, &PipelineOptions::default()).unwrap();
        assert_eq!(prepared.mapping.income.as_deref(), Some(ESTIMATED_INCOME));
        assert!(prepared.table.has_column(ESTIMATED_INCOME));
    }

    #[test]
    fn test_no_income_column_groups_are_unknown() {
        let raw = Table::new(vec![
            Column::text("city", vec![Cell::text("A"), Cell::text("B"), Cell::text("C")]),
            Column::numeric("rent", vec![Some(900.0), Some(1500.0), Some(2400.0)]),
        ])
        .unwrap();

        let prepared = prepare(&raw, &PipelineOptions::default()).unwrap();
        for row in 0..3 {
            assert_eq!(
                prepared.table.cell(INCOME_GROUP, row),
                Some(&Cell::text("unknown"))
            );
        }
    }

    #[test]
    fn test_analyze_bytes() {
        let csv = b"city;rent;income\nA;1000;48000\nB;2000;48000\n";
        let analysis = analyze_bytes(csv, &PipelineOptions::default()).unwrap();

        assert_eq!(analysis.csv_info.delimiter, ';');
        assert_eq!(analysis.prepared.mapping.area, "city");
        assert_eq!(analysis.report.summaries.struggling.overall_total, 2);
    }

    #[test]
    fn test_coordinates_flow_into_map_points() {
        let raw = Table::new(vec![
            Column::text("area", vec![Cell::text("A"), Cell::text("B")]),
            Column::numeric("rent", vec![Some(1000.0), Some(2000.0)]),
            Column::numeric("income", vec![Some(40000.0), Some(40000.0)]),
            Column::numeric("lat", vec![Some(40.1), Some(40.2)]),
            Column::numeric("lon", vec![Some(-74.0), Some(-74.1)]),
        ])
        .unwrap();

        let analysis = analyze_table(&raw, &PipelineOptions::default()).unwrap();
        assert!(analysis.prepared.coordinates.is_some());
        assert_eq!(analysis.report.summaries.map_points.len(), 2);
    }
}
