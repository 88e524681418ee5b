//! Transformation module.
//!
//! From a raw loaded table to an annotated one:
//! - Cleaner: name trimming, imputation, numeric coercion
//! - Inference: column roles from a rule table
//! - Affordability: index and class per row
//! - Segmentation: income terciles and group filtering
//! - Pipeline: all of the above plus the aggregates

pub mod affordability;
pub mod cleaner;
pub mod inference;
pub mod pipeline;
pub mod segmentation;

pub use affordability::{compute, compute_with, AffordabilityParams};
pub use cleaner::{clean, clean_with_report, CleanReport};
pub use inference::{infer, infer_coordinates};
pub use pipeline::*;
pub use segmentation::{assign_income_groups, filter_by_income_group};
