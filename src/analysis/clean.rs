//! Validation and cleaning.

use chrono::{Local, NaiveDate};

use crate::error::EngineResult;
use crate::execution::{ExecutionEngine, ExecutionOptions};
use crate::processing::merge::{self, FilteredRows};
use crate::types::{DataSet, FieldValue, Record};

/// Cleaned dataset plus the number of rows removed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CleanedData {
    pub dataset: DataSet,
    pub invalid_rows: usize,
}

fn positive(v: &FieldValue<f64>) -> bool {
    v.value().is_some_and(|v| v > 0.0)
}

/// Whether `record` passes validation for orders placed on or before `as_of`.
///
/// Country, total profit and order date must be present and parsed; units sold, unit price,
/// unit cost and total revenue must be present and positive.
pub fn is_valid(record: &Record, as_of: NaiveDate) -> bool {
    record.profit_key().is_some_and(|(country, _)| !country.is_empty())
        && record.order_date.get().is_some_and(|d| *d <= as_of)
        && positive(&record.units_sold)
        && positive(&record.unit_price)
        && positive(&record.unit_cost)
        && positive(&record.total_revenue)
}

/// Drop invalid rows chunk-wise and concatenate the survivors in their original order.
///
/// `as_of` defaults to today's local date; orders dated after it are invalid.
pub fn validate_and_clean(
    dataset: &DataSet,
    as_of: Option<NaiveDate>,
    options: &ExecutionOptions,
) -> EngineResult<CleanedData> {
    let as_of = as_of.unwrap_or_else(|| Local::now().date_naive());
    let engine = ExecutionEngine::new(options.clone())?;

    let partials = engine.map_partitions(&dataset.records, |chunk| {
        let mut out = FilteredRows::default();
        for r in chunk.rows {
            if is_valid(r, as_of) {
                let mut kept = r.clone();
                if let FieldValue::Present(c) = &r.country {
                    kept.country = FieldValue::Present(c.trim().to_string());
                }
                out.rows.push(kept);
            } else {
                out.rejected += 1;
            }
        }
        Ok(out)
    })?;

    let merged = merge::concat_reduce(partials)?;
    log::info!("validation removed {} invalid rows", merged.rejected);

    Ok(CleanedData {
        dataset: DataSet::new(merged.rows),
        invalid_rows: merged.rejected,
    })
}
