// ============================================
// Ranking Snapshot Cache
// ============================================
//
// Optional read-through cache of full rankings keyed by metric name.
//
// Invalidation policy:
// - Disabled (default): every request re-reads all records and re-sorts.
// - Enabled: a snapshot lives for exactly `ttl` after it was computed and is
//   then dropped; nothing else invalidates it. Page tokens issued from one
//   snapshot stay positionally consistent while it lives. Across snapshots
//   they are as stable as the underlying record set.

use crate::error::{AppError, Result};
use crate::models::RankedEntry;
use chrono::{DateTime, Utc};
use moka::future::Cache;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// One computed ranking
#[derive(Debug, Clone)]
pub struct RankingSnapshot {
    pub metric: String,
    pub computed_at: DateTime<Utc>,
    pub entries: Vec<RankedEntry>,
}

pub struct RankingCache {
    cache: Option<Cache<String, Arc<RankingSnapshot>>>,
}

impl Default for RankingCache {
    fn default() -> Self {
        Self::disabled()
    }
}

impl RankingCache {
    pub fn disabled() -> Self {
        Self { cache: None }
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        let cache = Cache::builder()
            // one snapshot per registered metric
            .max_capacity(64)
            .time_to_live(ttl)
            .build();

        Self { cache: Some(cache) }
    }

    pub fn from_ttl(ttl: Option<Duration>) -> Self {
        ttl.map(Self::with_ttl).unwrap_or_default()
    }

    /// Return the live snapshot for `metric`, computing it on a miss.
    ///
    /// Concurrent misses for the same metric share one computation. Failed
    /// computations are not cached.
    pub async fn get_or_compute<F, Fut>(&self, metric: &str, compute: F) -> Result<Arc<RankingSnapshot>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<RankingSnapshot>>,
    {
        let Some(cache) = &self.cache else {
            return compute().await.map(Arc::new);
        };

        cache
            .try_get_with(metric.to_string(), async move {
                debug!(metric = %metric, "Ranking cache miss");
                compute().await.map(Arc::new)
            })
            .await
            .map_err(|err: Arc<AppError>| (*err).clone())
    }

    pub async fn invalidate(&self, metric: &str) {
        if let Some(cache) = &self.cache {
            cache.invalidate(metric).await;
        }
    }
}
