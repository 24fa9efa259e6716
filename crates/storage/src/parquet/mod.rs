//! Columnar codec for [`Batch`](lakeshore_core::Batch).
//!
//! Column types are inferred from cell values (all ints → Int64, any float →
//! Float64, all bools → Boolean, anything else → Utf8) and written as typed,
//! Zstd-compressed Parquet so downstream readers get real types.

mod builders;
mod error;
mod reader;
pub(crate) mod schema;
mod writer;


pub use error::ParquetError;
pub use reader::read_parquet;
pub use writer::{batch_to_record_batch, write_parquet};
