// ============================================
// Recommended Clan Pool
// ============================================
//
// Periodically materializes a shuffled sample of healthy, open clans so
// readers do not repeat the filtered query.
//
// Data Flow:
// 1. Scheduler (or an admin call) triggers rebuild()
// 2. Filtered, capped candidate query against the clan store
// 3. Requirements normalized, order shuffled (Fisher-Yates)
// 4. Whole pool written as one document, replacing the previous one
// 5. Readers get the latest document verbatim until the next rebuild

pub mod shuffle;

pub use shuffle::shuffle_entries;

use crate::error::{AppError, Result};
use crate::models::{CandidateFilter, CandidatePool, PoolEntry, RebuildSummary};
use crate::store::{ClanStore, PoolSnapshotStore};
use crate::utils::with_timeout;
use chrono::Utc;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Join requirement as a non-negative integer; anything unusable is `0`.
pub fn normalize_requirement(value: &Value) -> u64 {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match parsed {
        Some(v) if v.is_finite() && v >= 0.0 => v.floor() as u64,
        _ => 0,
    }
}

pub struct PoolBuilder {
    clans: Arc<dyn ClanStore>,
    snapshots: Arc<dyn PoolSnapshotStore>,
    filter: CandidateFilter,
    store_timeout: Duration,
    /// Also serializes rebuilds within this process
    rng: Mutex<StdRng>,
}

impl PoolBuilder {
    pub fn new(
        clans: Arc<dyn ClanStore>,
        snapshots: Arc<dyn PoolSnapshotStore>,
        filter: CandidateFilter,
        store_timeout: Duration,
    ) -> Self {
        Self {
            clans,
            snapshots,
            filter,
            store_timeout,
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Replace the random source, e.g. with a seeded generator in tests
    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = Mutex::new(rng);
        self
    }

    pub fn with_seed(self, seed: u64) -> Self {
        self.with_rng(StdRng::seed_from_u64(seed))
    }

    /// Query, normalize, shuffle and persist a fresh pool.
    pub async fn rebuild(&self) -> Result<RebuildSummary> {
        let mut rng = self.rng.lock().await;
        let started = Instant::now();

        let candidates =
            with_timeout(self.store_timeout, self.clans.query_candidates(&self.filter)).await?;

        let mut entries: Vec<PoolEntry> = candidates
            .into_iter()
            .take(self.filter.limit)
            .map(|candidate| PoolEntry {
                requirement: normalize_requirement(&candidate.requirement),
                id: candidate.id,
            })
            .collect();

        debug!(candidates = entries.len(), "Shuffling pool candidates");
        shuffle_entries(&mut entries, &mut *rng);

        let pool = CandidatePool::new(Utc::now(), entries);
        with_timeout(self.store_timeout, self.snapshots.write_pool(&pool)).await?;

        info!(
            processed = pool.pool_size,
            limit = self.filter.limit,
            duration_ms = started.elapsed().as_millis() as u64,
            "Rebuilt recommended clan pool"
        );

        Ok(RebuildSummary {
            processed: pool.pool_size,
        })
    }

    /// Latest materialized pool; stale between rebuilds.
    pub async fn get_pool(&self) -> Result<CandidatePool> {
        with_timeout(self.store_timeout, self.snapshots.read_pool())
            .await?
            .ok_or_else(|| {
                AppError::FailedPrecondition("Recommendation pool not ready.".to_string())
            })
    }
}
