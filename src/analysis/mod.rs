//! The seven analytic operations, each a (map-function, reducer) pair run on a fresh
//! [`ExecutionEngine`](crate::execution::ExecutionEngine).
//!
//! Callers either use the typed functions directly ([`compare_profit`], [`yearly_trend`], ...)
//! or describe the request as an [`Operation`] and call [`run_map_reduce`].
//!
//! ```rust
//! use sales_data_processing::analysis::{run_map_reduce, ComparisonOutcome, Operation, OperationOutput};
//! use sales_data_processing::execution::ExecutionOptions;
//! use sales_data_processing::types::{DataSet, Record};
//!
//! # fn main() -> Result<(), sales_data_processing::EngineError> {
//! let ds = DataSet::new(vec![
//!     Record::new("USA", 1000.0),
//!     Record::new("Canada", 1500.0),
//!     Record::new("USA", 2000.0),
//! ]);
//! let op = Operation::CompareProfit {
//!     first: "USA".to_string(),
//!     second: "Canada".to_string(),
//! };
//! let OperationOutput::ProfitComparison(cmp) = run_map_reduce(&ds, &op, &ExecutionOptions::with_workers(2))? else {
//!     unreachable!()
//! };
//! assert_eq!(cmp.outcome(), ComparisonOutcome::FirstHigher { by: 1500.0 });
//! # Ok(())
//! # }
//! ```

mod clean;
mod profit;
mod trend;

use std::collections::BTreeMap;
use std::time::Instant;

use chrono::NaiveDate;

use crate::error::EngineResult;
use crate::execution::ExecutionOptions;
use crate::types::DataSet;

pub use clean::{is_valid, validate_and_clean, CleanedData};
pub use profit::{
    average_profit_by_country, average_profit_per_order, compare_profit, profit_by_region, profit_margin,
    ComparisonOutcome, CountryProfit, CountryTotal, GroupTally, ItemMargin, ProfitComparison, ProfitSummary,
    RegionProfit,
};
pub use trend::{yearly_trend, ItemUnits, TrendOptions, YearlyTrend, DEFAULT_TOP_ITEMS};

/// An analytic request with its operation-specific parameters.
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    /// Total profit of two countries and which is higher.
    CompareProfit { first: String, second: String },
    /// Profit per year and top item types per year.
    YearlyTrend(TrendOptions),
    /// Drop invalid rows. `as_of` defaults to today.
    ValidateClean { as_of: Option<NaiveDate> },
    /// Average profit per order; `weighted == false` keeps the mean-of-chunk-means behavior.
    AvgProfitPerOrder { weighted: bool },
    /// Per-row profit margin by item type.
    ProfitMargin,
    /// Average profit per order for each country.
    AvgProfitByCountry,
    /// Total profit per region, highest first.
    ProfitByRegion,
}

impl Operation {
    pub fn name(&self) -> &'static str {
        match self {
            Self::CompareProfit { .. } => "compare-profit",
            Self::YearlyTrend(_) => "yearly-trend",
            Self::ValidateClean { .. } => "validate-clean",
            Self::AvgProfitPerOrder { .. } => "avg-profit-per-order",
            Self::ProfitMargin => "profit-margin",
            Self::AvgProfitByCountry => "avg-profit-by-country",
            Self::ProfitByRegion => "profit-by-region",
        }
    }
}

/// Merged result of an [`Operation`].
#[derive(Debug, Clone, PartialEq)]
pub enum OperationOutput {
    ProfitComparison(ProfitComparison),
    YearlyTrend(YearlyTrend),
    Cleaned(CleanedData),
    ProfitSummary(ProfitSummary),
    ProfitMargins(Vec<ItemMargin>),
    AverageProfitByCountry(BTreeMap<String, f64>),
    ProfitByRegion(Vec<RegionProfit>),
}

/// Partition `dataset`, run the operation's map-function on every chunk, and merge the partials.
///
/// All-or-nothing: if any chunk fails the whole request fails and no partial result is returned.
pub fn run_map_reduce(
    dataset: &DataSet,
    operation: &Operation,
    options: &ExecutionOptions,
) -> EngineResult<OperationOutput> {
    let start = Instant::now();
    log::info!(
        "{} over {} rows ({} workers, {} chunks)",
        operation.name(),
        dataset.row_count(),
        options.worker_count,
        options.effective_chunk_count()
    );

    let out = match operation {
        Operation::CompareProfit { first, second } => {
            compare_profit(dataset, first, second, options).map(OperationOutput::ProfitComparison)
        }
        Operation::YearlyTrend(trend) => {
            yearly_trend(dataset, trend, options).map(OperationOutput::YearlyTrend)
        }
        Operation::ValidateClean { as_of } => {
            validate_and_clean(dataset, *as_of, options).map(OperationOutput::Cleaned)
        }
        Operation::AvgProfitPerOrder { weighted } => {
            average_profit_per_order(dataset, *weighted, options).map(OperationOutput::ProfitSummary)
        }
        Operation::ProfitMargin => profit_margin(dataset, options).map(OperationOutput::ProfitMargins),
        Operation::AvgProfitByCountry => {
            average_profit_by_country(dataset, options).map(OperationOutput::AverageProfitByCountry)
        }
        Operation::ProfitByRegion => {
            profit_by_region(dataset, options).map(OperationOutput::ProfitByRegion)
        }
    };

    match &out {
        Ok(_) => log::info!("{} completed in {:?}", operation.name(), start.elapsed()),
        Err(e) => log::error!("{} failed after {:?}: {e}", operation.name(), start.elapsed()),
    }
    out
}
