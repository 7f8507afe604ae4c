/// Ranking Module
///
/// Builds the full ordered ranking for one metric from a snapshot of every
/// player record, then serves page slices and the caller's own position.
///
/// # Ordering
/// 1. metric value, descending
/// 2. display name, ascending (byte-wise)
/// 3. record id, ascending
///
/// Ids are unique, so the order is total and independent of input order.
/// Page tokens hold positional offsets into exactly this order.
pub mod cache;

pub use cache::{RankingCache, RankingSnapshot};

use crate::models::{PlayerRecord, RankedEntry};
use crate::services::metric::MetricDefinition;
use serde_json::Value;
use std::cmp::Ordering;

/// Coerce a stored field to a rankable number.
///
/// Finite numbers pass through, numeric strings are parsed, everything else is `0`.
pub fn sanitize_metric_value(value: &Value) -> f64 {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match parsed {
        // -0.0 would sort below 0.0 under total_cmp
        Some(v) if v.is_finite() && v != 0.0 => v,
        _ => 0.0,
    }
}

/// Leaderboard comparator; `Less` means `a` ranks ahead of `b`.
pub fn compare_entries(a: &RankedEntry, b: &RankedEntry) -> Ordering {
    b.value
        .total_cmp(&a.value)
        .then_with(|| a.record.display_name.cmp(&b.record.display_name))
        .then_with(|| a.record.id.cmp(&b.record.id))
}

/// Rank every record by `metric`. Records missing the field rank with `0`.
pub fn rank_records(metric: &MetricDefinition, records: Vec<PlayerRecord>) -> Vec<RankedEntry> {
    let mut entries: Vec<RankedEntry> = records
        .into_iter()
        .map(|record| RankedEntry {
            rank: 0,
            value: record.metric_value(&metric.field),
            record,
        })
        .collect();

    entries.sort_by(compare_entries);

    for (position, entry) in entries.iter_mut().enumerate() {
        entry.rank = position as u64 + 1;
    }

    entries
}

#[derive(Debug, PartialEq)]
pub struct PageSlice<'a> {
    pub entries: &'a [RankedEntry],
    /// Offset of the following page; `None` at the end of the ranking
    pub next_offset: Option<u64>,
}

/// Contiguous slice `[offset, offset + page_size)` clamped to the ranking.
pub fn slice_page(ranking: &[RankedEntry], offset: u64, page_size: u32) -> PageSlice<'_> {
    let total = ranking.len() as u64;
    let end = offset.saturating_add(u64::from(page_size));
    let start = offset.min(total) as usize;
    let stop = end.min(total) as usize;

    PageSlice {
        entries: &ranking[start..stop],
        next_offset: (end < total).then_some(end),
    }
}

pub fn find_viewer<'a>(ranking: &'a [RankedEntry], caller_id: &str) -> Option<&'a RankedEntry> {
    ranking.iter().find(|entry| entry.record.id == caller_id)
}
