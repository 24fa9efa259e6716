pub mod batch;
pub mod config;
pub mod error;
pub mod tier;

pub use batch::{Batch, Value};
pub use config::PipelineConfig;
pub use error::*;
pub use tier::Tier;

/// Source label recorded for delimited-file ingestion.
pub const FILE_SOURCE: &str = "csv_ingestion";

/// Source label recorded for REST endpoint ingestion.
pub const API_SOURCE: &str = "api_ingestion";
