//! REST API types.
//!
//! Rows are returned as plain JSON objects (original columns plus the derived
//! ones) so any map or chart layer can consume them directly.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::models::{ColumnMapping, CoordinateColumns, ESTIMATED_INCOME, ESTIMATED_RENT};
use crate::transform::cleaner::CleanReport;
use crate::transform::pipeline::{Analysis, CsvInfo, PreparedTable, Report, Summaries};

/// Response of both analysis endpoints.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResponse {
    /// Unique job identifier
    pub job_id: String,

    /// "ready", or "warning" when a role fell back to an estimate
    pub status: String,

    /// Income group the summaries are restricted to, or "all"
    pub income_group: String,

    pub mapping: ColumnMapping,

    pub coordinates: Option<CoordinateColumns>,

    #[serde(flatten)]
    pub summaries: Summaries,

    /// Rows of the (filtered) table
    pub rows: Vec<Value>,

    pub metadata: ResponseMetadata,
}

/// Metadata about the run
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseMetadata {
    pub total_rows: usize,
    pub view_rows: usize,
    /// Whether the prepared table came from the cache
    pub cached: bool,
    pub computed_at: Option<String>,
    pub csv_info: CsvMetadata,
    pub cleaning: CleanReport,
    /// Synthetic columns created for missing roles
    pub synthetic: Vec<String>,
}

/// CSV file metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CsvMetadata {
    pub encoding: String,
    pub delimiter: String,
    pub row_count: usize,
    pub columns: Vec<String>,
    pub fingerprint: Option<String>,
}

impl From<&CsvInfo> for CsvMetadata {
    fn from(info: &CsvInfo) -> Self {
        Self {
            encoding: info.encoding.clone(),
            delimiter: info.delimiter.to_string(),
            row_count: info.row_count,
            columns: info.headers.clone(),
            fingerprint: info.fingerprint.clone(),
        }
    }
}

impl AnalysisResponse {
    pub fn new(
        csv_info: &CsvInfo,
        prepared: &PreparedTable,
        report: Report,
        cached: bool,
        computed_at: Option<String>,
    ) -> Self {
        let mapping = &prepared.mapping;
        let synthetic: Vec<String> = [mapping.rent.as_deref(), mapping.income.as_deref()]
            .into_iter()
            .flatten()
            .filter(|name| *name == ESTIMATED_RENT || *name == ESTIMATED_INCOME)
            .map(str::to_string)
            .collect();

        Self {
            job_id: Uuid::new_v4().to_string(),
            status: if synthetic.is_empty() { "ready" } else { "warning" }.to_string(),
            income_group: report
                .income_group
                .map(|g| g.to_string())
                .unwrap_or_else(|| "all".to_string()),
            mapping: mapping.clone(),
            coordinates: prepared.coordinates.clone(),
            rows: report.view.to_records(),
            summaries: report.summaries,
            metadata: ResponseMetadata {
                total_rows: prepared.table.row_count(),
                view_rows: report.view.row_count(),
                cached,
                computed_at,
                csv_info: csv_info.into(),
                cleaning: prepared.clean_report.clone(),
                synthetic,
            },
        }
    }
}

impl From<Analysis> for AnalysisResponse {
    fn from(analysis: Analysis) -> Self {
        Self::new(
            &analysis.csv_info,
            &analysis.prepared,
            analysis.report,
            false,
            None,
        )
    }
}

/// Create an error response
pub fn error_response(error: &str) -> Value {
    json!({
        "jobId": Uuid::new_v4().to_string(),
        "status": "error",
        "error": error,
        "rows": [],
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Cell, Column, IncomeGroup, Table};
    use crate::transform::pipeline::{analyze_table, PipelineOptions};

    fn cities() -> Column {
        Column::text("city", vec![Cell::text("A"), Cell::text("B"), Cell::text("C")])
    }

    fn analysis(options: &PipelineOptions) -> Analysis {
        let raw = Table::new(vec![
            cities(),
            Column::numeric("rent", vec![Some(900.0), Some(1500.0), Some(2400.0)]),
        ])
        .unwrap();
        analyze_table(&raw, options).unwrap()
    }

    #[test]
    fn test_response_from_analysis() {
        let response = AnalysisResponse::from(analysis(&PipelineOptions::default()));
        let json = serde_json::to_value(&response).unwrap();

        assert_eq!(json["status"], "warning");
        assert_eq!(json["incomeGroup"], "all");
        assert_eq!(json["mapping"]["area"], "city");
        assert_eq!(json["metadata"]["synthetic"], json!(["estimated_income"]));
        assert_eq!(json["metadata"]["totalRows"], 3);
        assert_eq!(json["rows"].as_array().unwrap().len(), 3);
        assert!(json["areaSummary"].is_array());
        assert!(json["struggling"]["perArea"].is_array());
        assert!(json["recommendations"].is_array());
    }

    #[test]
    fn test_filtered_view_counts() {
        let options = PipelineOptions {
            income_group: Some(IncomeGroup::LowIncome),
            ..PipelineOptions::default()
        };
        let raw = Table::new(vec![
            cities(),
            Column::numeric("rent", vec![Some(900.0), Some(1500.0), Some(2400.0)]),
            Column::numeric("income", vec![Some(30000.0), Some(50000.0), Some(90000.0)]),
        ])
        .unwrap();
        let response = AnalysisResponse::from(analyze_table(&raw, &options).unwrap());

        assert_eq!(response.income_group, "low-income");
        assert_eq!(response.metadata.total_rows, 3);
        assert_eq!(response.metadata.view_rows, response.rows.len());
        assert_eq!(response.metadata.view_rows, 1);
    }

    #[test]
    fn test_estimated_income_view_is_empty_for_low_income() {
        let options = PipelineOptions {
            income_group: Some(IncomeGroup::LowIncome),
            ..PipelineOptions::default()
        };
        let response = AnalysisResponse::from(analysis(&options));

        assert_eq!(response.metadata.total_rows, 3);
        assert_eq!(response.metadata.view_rows, 0);
        assert!(response.rows.is_empty());
    }

    #[test]
    fn test_error_response_shape() {
        let err = error_response("No data rows found in input");
        assert_eq!(err["status"], "error");
        assert_eq!(err["error"], "No data rows found in input");
        assert_eq!(err["rows"], json!([]));
        assert!(err["jobId"].is_string());
    }
}
