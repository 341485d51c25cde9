//! Profit aggregations: country comparison, per-order average, margins, per-country average and
//! per-region totals.

use std::collections::BTreeMap;
use std::ops::AddAssign;

use serde::Serialize;

use crate::error::{ChunkError, EngineResult};
use crate::execution::{ExecutionEngine, ExecutionOptions};
use crate::processing::merge::{self, FilteredRows};
use crate::processing::{column_stats, NumericColumn};
use crate::types::DataSet;

/// Profit total and matching row count for one group.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GroupTally {
    pub profit: f64,
    pub rows: usize,
}

impl GroupTally {
    fn add(&mut self, profit: f64) {
        self.profit += profit;
        self.rows += 1;
    }
}

impl AddAssign for GroupTally {
    fn add_assign(&mut self, other: Self) {
        self.profit += other.profit;
        self.rows += other.rows;
    }
}

/// Total profit of a requested country.
///
/// A country with no matching rows is [`CountryTotal::NotFound`], which is distinct from a
/// country whose rows sum to zero.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum CountryTotal {
    Found { profit: f64, orders: usize },
    NotFound,
}

impl CountryTotal {
    fn from_tally(tally: GroupTally) -> Self {
        if tally.rows == 0 {
            Self::NotFound
        } else {
            Self::Found {
                profit: tally.profit,
                orders: tally.rows,
            }
        }
    }

    /// Profit, counting an absent country as zero.
    pub fn profit_or_zero(&self) -> f64 {
        match self {
            Self::Found { profit, .. } => *profit,
            Self::NotFound => 0.0,
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, Self::Found { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CountryProfit {
    pub country: String,
    pub total: CountryTotal,
}

/// Which side of a [`ProfitComparison`] is ahead, and by how much.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ComparisonOutcome {
    FirstHigher { by: f64 },
    SecondHigher { by: f64 },
    Equal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProfitComparison {
    pub first: CountryProfit,
    pub second: CountryProfit,
}

impl ProfitComparison {
    /// Compare both totals; a country that was not found counts as zero.
    pub fn outcome(&self) -> ComparisonOutcome {
        let a = self.first.total.profit_or_zero();
        let b = self.second.total.profit_or_zero();
        if a > b {
            ComparisonOutcome::FirstHigher { by: a - b }
        } else if b > a {
            ComparisonOutcome::SecondHigher { by: b - a }
        } else {
            ComparisonOutcome::Equal
        }
    }
}

/// Total profit of two countries, computed chunk-wise and summed.
pub fn compare_profit(
    dataset: &DataSet,
    first: &str,
    second: &str,
    options: &ExecutionOptions,
) -> EngineResult<ProfitComparison> {
    let (first, second) = (first.trim(), second.trim());
    let engine = ExecutionEngine::new(options.clone())?;

    let partials = engine.map_partitions(&dataset.records, |chunk| {
        let mut a = GroupTally::default();
        let mut b = GroupTally::default();
        for (country, profit) in chunk.rows.iter().filter_map(|r| r.profit_key()) {
            if country == first {
                a.add(profit);
            }
            if country == second {
                b.add(profit);
            }
        }
        Ok((a, b))
    })?;

    let (a, b) = merge::unzip_partials(partials);
    let a = merge::sum_reduce(a)?;
    let b = merge::sum_reduce(b)?;

    Ok(ProfitComparison {
        first: CountryProfit {
            country: first.to_string(),
            total: CountryTotal::from_tally(a),
        },
        second: CountryProfit {
            country: second.to_string(),
            total: CountryTotal::from_tally(b),
        },
    })
}

/// Average, extremes and total of profit per order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ProfitSummary {
    pub orders: usize,
    pub total: f64,
    pub min: Option<f64>,
    pub max: Option<f64>,
    /// Zero when there are no orders.
    pub average: f64,
    /// `false`: mean of per-chunk means. `true`: total / orders.
    pub weighted: bool,
}

/// Average profit per order.
///
/// With `weighted == false` this reproduces the legacy behavior: each non-empty chunk's mean
/// counts equally regardless of chunk size. With `weighted == true` the result is the true mean.
pub fn average_profit_per_order(
    dataset: &DataSet,
    weighted: bool,
    options: &ExecutionOptions,
) -> EngineResult<ProfitSummary> {
    let engine = ExecutionEngine::new(options.clone())?;
    let partials = engine.map_partitions(&dataset.records, |chunk| {
        let stats = column_stats(chunk.rows, NumericColumn::TotalProfit);
        if let Some(avg) = stats.mean() {
            log::debug!(
                "chunk {}: orders={} total={} avg={avg} min={:?} max={:?}",
                chunk.index,
                stats.count,
                stats.sum,
                stats.min,
                stats.max
            );
        }
        Ok(stats)
    })?;

    let summary = merge::chunk_average_reduce(partials, weighted)?;
    Ok(ProfitSummary {
        orders: summary.stats.count,
        total: summary.stats.sum,
        min: summary.stats.min,
        max: summary.stats.max,
        average: summary.average.unwrap_or(0.0),
        weighted,
    })
}

/// Profit margin of one order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemMargin {
    pub item_type: String,
    /// `total_profit / total_revenue`.
    pub margin: f64,
}

/// Profit margin per row, in dataset order.
///
/// A row without item type or profit, or with missing or zero revenue, fails its chunk.
pub fn profit_margin(dataset: &DataSet, options: &ExecutionOptions) -> EngineResult<Vec<ItemMargin>> {
    let engine = ExecutionEngine::new(options.clone())?;
    let partials = engine.map_partitions(&dataset.records, |chunk| {
        let mut out = FilteredRows::default();
        for (offset, r) in chunk.rows.iter().enumerate() {
            let row = chunk.start_row + offset;
            let invalid = |message: &str| ChunkError::InvalidRow {
                row,
                message: message.to_string(),
            };
            let item_type = r.item_type.get().ok_or_else(|| invalid("missing item type"))?;
            let profit = r.total_profit.value().ok_or_else(|| invalid("missing total profit"))?;
            let revenue = r
                .total_revenue
                .value()
                .ok_or_else(|| invalid("missing total revenue"))?;
            if revenue == 0.0 {
                return Err(invalid("total revenue is zero"));
            }
            out.rows.push(ItemMargin {
                item_type: item_type.clone(),
                margin: profit / revenue,
            });
        }
        Ok(out)
    })?;

    Ok(merge::concat_reduce(partials)?.rows)
}

/// Average profit per order for every country, keyed and sorted by trimmed country name.
///
/// Chunks report `(sum, count)` per country; the division happens after the merge so the
/// average is weighted by row count, not by chunk count.
pub fn average_profit_by_country(
    dataset: &DataSet,
    options: &ExecutionOptions,
) -> EngineResult<BTreeMap<String, f64>> {
    let engine = ExecutionEngine::new(options.clone())?;
    let partials = engine.map_partitions(&dataset.records, |chunk| {
        let mut groups: BTreeMap<String, GroupTally> = BTreeMap::new();
        for (country, profit) in chunk.rows.iter().filter_map(|r| r.profit_key()) {
            groups.entry(country.to_string()).or_default().add(profit);
        }
        Ok(groups)
    })?;

    Ok(merge::grouped_sum_reduce(partials)?
        .into_iter()
        .filter(|(_, t)| t.rows > 0)
        .map(|(country, t)| (country, t.profit / t.rows as f64))
        .collect())
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegionProfit {
    pub region: String,
    pub profit: f64,
}

/// Total profit per region, highest first (ties by region name).
///
/// Rows without a region or a profit value are skipped.
pub fn profit_by_region(dataset: &DataSet, options: &ExecutionOptions) -> EngineResult<Vec<RegionProfit>> {
    let engine = ExecutionEngine::new(options.clone())?;
    let partials = engine.map_partitions(&dataset.records, |chunk| {
        let mut groups: BTreeMap<String, f64> = BTreeMap::new();
        for r in chunk.rows {
            if let (Some(region), Some(profit)) = (r.region.get(), r.total_profit.value()) {
                *groups.entry(region.trim().to_string()).or_insert(0.0) += profit;
            }
        }
        Ok(groups)
    })?;

    let totals = merge::grouped_sum_reduce(partials)?;
    Ok(merge::top_n(totals, usize::MAX)
        .into_iter()
        .map(|(region, profit)| RegionProfit { region, profit })
        .collect())
}
