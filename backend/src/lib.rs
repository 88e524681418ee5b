//! # Housing Mapper - housing affordability analysis
//!
//! Takes a housing CSV of unknown schema, works out which columns hold the
//! area, the recurring cost and the income, computes an affordability index
//! per row and summarises housing stress by area and income group.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │   CSV File  │────▶│   Parser    │────▶│  Transform  │────▶│  Aggregate  │
//! │  (any enc)  │     │  (auto-enc) │     │ (clean/infer│     │ (summaries) │
//! └─────────────┘     └─────────────┘     │  /compute)  │     └─────────────┘
//!                                         └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use housing_mapper::{analyze_file, PipelineOptions};
//!
//! let analysis = analyze_file("rents.csv".as_ref(), &PipelineOptions::default())?;
//! println!("{} areas", analysis.report.summaries.area_summary.len());
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Hierarchical error types
//! - [`models`] - Table, cells, column mapping, classes
//! - [`parser`] - CSV loading with auto-detection, dataset selection
//! - [`transform`] - Cleaning, inference, affordability, segmentation, pipeline
//! - [`aggregate`] - Area summaries, stress estimates, recommendations
//! - [`cache`] - Analysis cache keyed by input fingerprint
//! - [`config`] - Environment configuration
//! - [`api`] - HTTP API server and log stream

// Core modules
pub mod error;
pub mod models;
pub mod stats;

// Loading
pub mod parser;

// Transformation
pub mod transform;

// Summaries
pub mod aggregate;

// Caching
pub mod cache;

// Configuration
pub mod config;

// HTTP API
pub mod api;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{ConfigError, CsvError, PipelineError, ServerError, TableError};

// =============================================================================
// Re-exports - Models
// =============================================================================

pub use models::{
    AffordabilityClass, Cell, Column, ColumnKind, ColumnMapping, CoordinateColumns, IncomeGroup,
    Table,
};

// =============================================================================
// Re-exports - CSV Parsing
// =============================================================================

pub use parser::{
    decode_content, detect_delimiter, detect_encoding, fingerprint_dir, load_dataset,
    parse_bytes_auto, parse_csv_file_auto, select_csv, DataSource, ParseResult,
};

// =============================================================================
// Re-exports - Core operations
// =============================================================================

pub use transform::affordability::{compute, compute_with, AffordabilityParams};
pub use transform::cleaner::{clean, clean_with_report, CleanReport};
pub use transform::inference::{infer, infer_coordinates};
pub use transform::segmentation::{assign_income_groups, filter_by_income_group};

pub use aggregate::{
    describe_index, estimate_struggling, map_points, recommend, summarize_by_area, AreaStress,
    AreaSummary, IndexStats, MapPoint, StrugglingEstimate,
};

// =============================================================================
// Re-exports - Pipeline
// =============================================================================

pub use transform::pipeline::{
    analyze_bytes, analyze_file, analyze_parsed, analyze_table, prepare, report, Analysis,
    ColumnOverrides, CsvInfo, PipelineOptions, PreparedTable, Report, Summaries,
};

// =============================================================================
// Re-exports - Cache, config, API
// =============================================================================

pub use cache::{AnalysisCache, CachedAnalysis};
pub use config::AppConfig;
pub use api::types::{error_response, AnalysisResponse, CsvMetadata, ResponseMetadata};

// Server
pub mod server {
    pub use crate::api::server::start_server;
}
