//! Column reductions over a slice of [`crate::types::Record`]s.
//!
//! These run inside a single chunk. Cross-chunk merging lives in [`super::merge`].

use std::ops::AddAssign;

use crate::types::Record;

/// Numeric columns of a [`Record`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumericColumn {
    UnitsSold,
    UnitPrice,
    UnitCost,
    TotalRevenue,
    TotalProfit,
}

impl NumericColumn {
    /// Parsed value of this column, if present.
    pub fn get(self, record: &Record) -> Option<f64> {
        match self {
            Self::UnitsSold => record.units_sold.value(),
            Self::UnitPrice => record.unit_price.value(),
            Self::UnitCost => record.unit_cost.value(),
            Self::TotalRevenue => record.total_revenue.value(),
            Self::TotalProfit => record.total_profit.value(),
        }
    }
}

/// Count, sum and extremes of one column. Missing and invalid cells are ignored.
///
/// The default value is the merge identity.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ColumnStats {
    pub count: usize,
    pub sum: f64,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl ColumnStats {
    pub fn push(&mut self, v: f64) {
        self.count += 1;
        self.sum += v;
        self.min = Some(self.min.map_or(v, |m| m.min(v)));
        self.max = Some(self.max.map_or(v, |m| m.max(v)));
    }

    /// Mean of the observed values; `None` when nothing was observed.
    pub fn mean(&self) -> Option<f64> {
        (self.count > 0).then(|| self.sum / self.count as f64)
    }
}

impl AddAssign for ColumnStats {
    fn add_assign(&mut self, other: Self) {
        self.count += other.count;
        self.sum += other.sum;
        self.min = match (self.min, other.min) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };
        self.max = match (self.max, other.max) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        };
    }
}

/// Collect [`ColumnStats`] for `column` over `records`.
pub fn column_stats(records: &[Record], column: NumericColumn) -> ColumnStats {
    records
        .iter()
        .filter_map(|r| column.get(r))
        .fold(ColumnStats::default(), |mut acc, v| {
            acc.push(v);
            acc
        })
}
