//! `sales-data-processing` runs analytic queries over an in-memory sales [`types::DataSet`] by
//! splitting it into chunks, mapping each chunk on a bounded worker pool, and merging the
//! per-chunk partials in chunk order.
//!
//! The primary entrypoint is [`analysis::run_map_reduce`], which takes an
//! [`analysis::Operation`] and [`execution::ExecutionOptions`]. A companion utility,
//! [`copy::copy_file`], streams a CSV file through the same pool into a single-writer sink.
//!
//! ## What you get
//!
//! - **Partitioning**: N chunks of `len / N` rows, the last taking the remainder
//! - **Execution**: one pool per invocation, results ordered by chunk index, fail-fast
//!   cancellation, optional throttling of in-flight chunks
//! - **Merging**: ordered reducers (sum, concat, grouped sums, top-N, average of averages)
//! - **Operations**: profit comparison, yearly trends, validation/cleaning, average profit per
//!   order, profit margin, average profit by country, profit by region
//!
//! Missing and unparseable cells are kept apart by [`types::FieldValue`]; neither is an error.
//!
//! ## Quick example
//!
//! ```rust
//! use sales_data_processing::analysis::{average_profit_per_order, profit_by_region};
//! use sales_data_processing::execution::ExecutionOptions;
//! use sales_data_processing::types::{DataSet, Record};
//!
//! # fn main() -> Result<(), sales_data_processing::EngineError> {
//! let ds = DataSet::new(vec![
//!     Record::new("USA", 1000.0).with_region("North America"),
//!     Record::new("Canada", 1500.0).with_region("North America"),
//!     Record::new("Kenya", 400.0).with_region("Africa"),
//!     Record::new("USA", 2000.0).with_region("North America"),
//! ]);
//! let opts = ExecutionOptions::with_workers(2);
//!
//! let regions = profit_by_region(&ds, &opts)?;
//! assert_eq!(regions[0].region, "North America");
//! assert_eq!(regions[0].profit, 4500.0);
//!
//! let summary = average_profit_per_order(&ds, true, &opts)?;
//! assert_eq!(summary.orders, 4);
//! assert_eq!(summary.average, 1225.0);
//! # Ok(())
//! # }
//! ```
//!
//! ## Copying a CSV file
//!
//! ```no_run
//! use sales_data_processing::copy::{copy_file, CopyOptions};
//!
//! # fn main() -> Result<(), sales_data_processing::EngineError> {
//! let written = copy_file("sales.csv", "out", &CopyOptions::default())?;
//! println!("wrote {}", written.display());
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`types`]: records, lenient cell parsing, the dataset
//! - [`execution`]: partitioning, the worker pool, observers/metrics, the sequential sink
//! - [`processing`]: per-chunk reductions and ordered merge reducers
//! - [`analysis`]: the analytic operations
//! - [`copy`]: parallel CSV copy
//! - [`error`]: error types shared by all of the above

pub mod analysis;
pub mod copy;
pub mod error;
pub mod execution;
pub mod processing;
pub mod types;

pub use error::{ChunkError, EngineError, EngineResult};
