//! Reducers: pure folds over per-chunk partial results.
//!
//! Every reducer first checks that it received exactly one partial per chunk, in chunk order,
//! commutative merges included.

use std::collections::BTreeMap;
use std::ops::AddAssign;

use crate::error::{EngineError, EngineResult};
use crate::execution::Partial;

use super::reduce::ColumnStats;

/// Rows that survived a per-chunk filter, plus how many were dropped.
#[derive(Debug, Clone, PartialEq)]
pub struct FilteredRows<T> {
    pub rows: Vec<T>,
    pub rejected: usize,
}

impl<T> Default for FilteredRows<T> {
    fn default() -> Self {
        Self {
            rows: Vec::new(),
            rejected: 0,
        }
    }
}

/// Merged [`ColumnStats`] plus the average chosen by the weighting policy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AverageSummary {
    pub stats: ColumnStats,
    /// `None` when no chunk observed a value.
    pub average: Option<f64>,
    pub weighted: bool,
}

/// Fail unless `partials[i].chunk_index == i` for every `i`.
pub fn ensure_ordered<P>(partials: &[Partial<P>]) -> EngineResult<()> {
    for (position, p) in partials.iter().enumerate() {
        if p.chunk_index != position {
            return Err(EngineError::merge(format!(
                "expected partial for chunk {position}, found chunk {}",
                p.chunk_index
            )));
        }
    }
    Ok(())
}

/// Split paired partials into two partial sequences with the same chunk indexes.
pub fn unzip_partials<A, B>(partials: Vec<Partial<(A, B)>>) -> (Vec<Partial<A>>, Vec<Partial<B>>) {
    partials
        .into_iter()
        .map(|p| {
            let (a, b) = p.value;
            (
                Partial {
                    chunk_index: p.chunk_index,
                    value: a,
                },
                Partial {
                    chunk_index: p.chunk_index,
                    value: b,
                },
            )
        })
        .unzip()
}

/// Sum scalar partials.
pub fn sum_reduce<V>(partials: Vec<Partial<V>>) -> EngineResult<V>
where
    V: AddAssign + Default,
{
    ensure_ordered(&partials)?;
    Ok(partials.into_iter().fold(V::default(), |mut acc, p| {
        acc += p.value;
        acc
    }))
}

/// Concatenate filtered chunk rows in chunk order and total the rejected counts.
pub fn concat_reduce<T>(partials: Vec<Partial<FilteredRows<T>>>) -> EngineResult<FilteredRows<T>> {
    ensure_ordered(&partials)?;
    let capacity = partials.iter().map(|p| p.value.rows.len()).sum();
    let mut out = FilteredRows {
        rows: Vec::with_capacity(capacity),
        rejected: 0,
    };
    for p in partials {
        out.rows.extend(p.value.rows);
        out.rejected += p.value.rejected;
    }
    Ok(out)
}

/// Merge keyed partials by adding values for keys seen in several chunks.
pub fn grouped_sum_reduce<K, V>(partials: Vec<Partial<BTreeMap<K, V>>>) -> EngineResult<BTreeMap<K, V>>
where
    K: Ord,
    V: AddAssign + Default,
{
    ensure_ordered(&partials)?;
    let mut out = BTreeMap::new();
    for p in partials {
        for (k, v) in p.value {
            *out.entry(k).or_insert_with(V::default) += v;
        }
    }
    Ok(out)
}

/// Merge per-chunk ranked candidate lists into a global top-`n` per group.
///
/// Scores of the same label coming from different chunks are added, then every group is
/// re-sorted by score descending (ties by label ascending) and truncated to `n`.
pub fn grouped_top_n_merge<K, L>(
    partials: Vec<Partial<BTreeMap<K, Vec<(L, f64)>>>>,
    n: usize,
) -> EngineResult<BTreeMap<K, Vec<(L, f64)>>>
where
    K: Ord,
    L: Ord,
{
    ensure_ordered(&partials)?;
    let mut totals: BTreeMap<K, BTreeMap<L, f64>> = BTreeMap::new();
    for p in partials {
        for (group, candidates) in p.value {
            let group_totals = totals.entry(group).or_default();
            for (label, score) in candidates {
                *group_totals.entry(label).or_insert(0.0) += score;
            }
        }
    }
    Ok(totals
        .into_iter()
        .map(|(group, labels)| (group, top_n(labels, n)))
        .collect())
}

/// Rank `(label, score)` pairs by score descending, label ascending, and keep `n`.
pub fn top_n<L: Ord>(scores: impl IntoIterator<Item = (L, f64)>, n: usize) -> Vec<(L, f64)> {
    let mut ranked: Vec<(L, f64)> = scores.into_iter().collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked.truncate(n);
    ranked
}

/// Merge per-chunk stats and compute an average.
///
/// Unweighted: the mean of each non-empty chunk's mean, every chunk counting equally whatever
/// its size. Weighted: total sum over total count, the true global mean.
pub fn chunk_average_reduce(partials: Vec<Partial<ColumnStats>>, weighted: bool) -> EngineResult<AverageSummary> {
    ensure_ordered(&partials)?;
    let chunk_means: Vec<f64> = partials.iter().filter_map(|p| p.value.mean()).collect();

    let mut stats = ColumnStats::default();
    for p in partials {
        stats += p.value;
    }

    let average = if weighted {
        stats.mean()
    } else if chunk_means.is_empty() {
        None
    } else {
        Some(chunk_means.iter().sum::<f64>() / chunk_means.len() as f64)
    };

    Ok(AverageSummary {
        stats,
        average,
        weighted,
    })
}
