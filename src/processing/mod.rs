//! Per-chunk reductions and cross-chunk merges.
//!
//! - [`column_stats`]: count, sum, min and max of one column inside a chunk
//! - [`merge`]: reducers folding ordered per-chunk partials into one value
//!
//! ## Example: chunk sums merged in order
//!
//! ```rust
//! use sales_data_processing::execution::{ExecutionEngine, ExecutionOptions};
//! use sales_data_processing::processing::{column_stats, merge, NumericColumn};
//! use sales_data_processing::types::Record;
//!
//! # fn main() -> Result<(), sales_data_processing::EngineError> {
//! let records = vec![
//!     Record::new("USA", 1000.0),
//!     Record::new("Canada", 1500.0),
//!     Record::new("USA", 2000.0),
//! ];
//!
//! let engine = ExecutionEngine::new(ExecutionOptions::with_workers(2))?;
//! let partials = engine.map_partitions(&records, |chunk| {
//!     Ok(column_stats(chunk.rows, NumericColumn::TotalProfit).sum)
//! })?;
//! assert_eq!(merge::sum_reduce(partials)?, 4500.0);
//! # Ok(())
//! # }
//! ```

pub mod merge;
pub mod reduce;

pub use merge::{AverageSummary, FilteredRows};
pub use reduce::{column_stats, ColumnStats, NumericColumn};
