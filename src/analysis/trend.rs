//! Yearly trends: profit per order year and best-selling item types per year.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::error::EngineResult;
use crate::execution::{ExecutionEngine, ExecutionOptions};
use crate::processing::merge;
use crate::types::{DataSet, Record};

/// Number of item types reported per year by default.
pub const DEFAULT_TOP_ITEMS: usize = 3;

/// Parameters for [`yearly_trend`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrendOptions {
    /// Restrict to one country (compared after trimming). `None` uses every row.
    pub country: Option<String>,
    /// How many item types to keep per year.
    pub top_n: usize,
    /// How many ranked candidates each chunk reports per year.
    ///
    /// `None` reports every item type, which makes the merged ranking exact. `Some(k)` keeps only
    /// each chunk's local top `k`; an item that is never in any chunk's local top `k` cannot
    /// appear in the result even if it leads globally.
    pub chunk_candidates: Option<usize>,
}

impl TrendOptions {
    pub fn for_country(country: impl Into<String>) -> Self {
        Self {
            country: Some(country.into()),
            ..Self::default()
        }
    }
}

impl Default for TrendOptions {
    fn default() -> Self {
        Self {
            country: None,
            top_n: DEFAULT_TOP_ITEMS,
            chunk_candidates: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemUnits {
    pub item_type: String,
    pub units_sold: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct YearlyTrend {
    /// Total profit per order year. Rows without a parsed date or profit are skipped.
    pub profit_by_year: BTreeMap<i32, f64>,
    /// Item types by units sold per order year, best first.
    pub top_items_by_year: BTreeMap<i32, Vec<ItemUnits>>,
}

type ChunkTrend = (BTreeMap<i32, f64>, BTreeMap<i32, Vec<(String, f64)>>);

fn matches_country(record: &Record, country: Option<&str>) -> bool {
    match country {
        None => true,
        Some(wanted) => record
            .country
            .get()
            .map(|c| c.trim() == wanted)
            .unwrap_or(false),
    }
}

fn chunk_trend(rows: &[Record], country: Option<&str>, candidates: usize) -> ChunkTrend {
    let mut profit_by_year: BTreeMap<i32, f64> = BTreeMap::new();
    let mut units: BTreeMap<i32, BTreeMap<String, f64>> = BTreeMap::new();

    for r in rows.iter().filter(|r| matches_country(r, country)) {
        let Some(year) = r.order_year() else {
            continue;
        };
        if let Some(profit) = r.total_profit.value() {
            *profit_by_year.entry(year).or_insert(0.0) += profit;
        }
        if let (Some(item), Some(sold)) = (r.item_type.get(), r.units_sold.value()) {
            *units
                .entry(year)
                .or_default()
                .entry(item.clone())
                .or_insert(0.0) += sold;
        }
    }

    let ranked = units
        .into_iter()
        .map(|(year, items)| (year, merge::top_n(items, candidates)))
        .collect();
    (profit_by_year, ranked)
}

/// Profit per year and top item types per year, optionally for a single country.
pub fn yearly_trend(
    dataset: &DataSet,
    trend: &TrendOptions,
    options: &ExecutionOptions,
) -> EngineResult<YearlyTrend> {
    let country = trend.country.as_deref().map(str::trim);
    let candidates = trend.chunk_candidates.unwrap_or(usize::MAX);
    let engine = ExecutionEngine::new(options.clone())?;

    let partials = engine.map_partitions(&dataset.records, |chunk| {
        Ok(chunk_trend(chunk.rows, country, candidates))
    })?;

    let (profits, items) = merge::unzip_partials(partials);
    let profit_by_year = merge::grouped_sum_reduce(profits)?;
    let top_items_by_year = merge::grouped_top_n_merge(items, trend.top_n)?
        .into_iter()
        .map(|(year, ranked)| {
            let ranked = ranked
                .into_iter()
                .map(|(item_type, units_sold)| ItemUnits {
                    item_type,
                    units_sold,
                })
                .collect();
            (year, ranked)
        })
        .collect();

    Ok(YearlyTrend {
        profit_by_year,
        top_items_by_year,
    })
}
