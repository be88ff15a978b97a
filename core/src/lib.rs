//! fraudlens-core: tabular transaction analysis.
//!
//! Upload → parse → detect columns → score (local heuristic or remote
//! oracle) → aggregate → insights.

pub mod aggregate;
pub mod config;
pub mod dates;
pub mod detector;
pub mod error;
pub mod insights;
pub mod parser;
pub mod pipeline;
pub mod progress;
pub mod query;
pub mod record;
pub mod remote;
pub mod rng;
pub mod scoring;
pub mod store;
pub mod strategy;
pub mod types;
pub mod upload;

pub use error::{PipelineError, PipelineResult};
pub use pipeline::{AnalysisPipeline, AnalysisReport, AnalysisSession};
