// ============================================
// Recommended Pool Rebuild Job
// ============================================
//
// Rebuilds the recommended clan pool on a fixed interval (hourly by
// default), or once when POOL_RUN_ONCE=true.
//
// A failed run is logged and counted; the next tick runs as scheduled.
// Nothing is retried inside a run.
//
// Usage:
//   POOL_REBUILD_INTERVAL_SECS=3600 leaderboard-service

use crate::config::PoolConfig;
use crate::error::Result;
use crate::models::RebuildSummary;
use crate::services::PoolBuilder;
use chrono::{DateTime, Utc};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::MissedTickBehavior;
use tracing::{error, info};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct PoolRebuildConfig {
    pub interval: Duration,
    pub run_once: bool,
}

impl Default for PoolRebuildConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(3600),
            run_once: false,
        }
    }
}

impl From<&PoolConfig> for PoolRebuildConfig {
    fn from(config: &PoolConfig) -> Self {
        Self {
            interval: config.rebuild_interval(),
            run_once: config.run_once,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PoolJobStats {
    pub started_at: Option<DateTime<Utc>>,
    pub runs: u32,
    pub succeeded: u32,
    pub failed: u32,
    pub last_processed: Option<usize>,
}

pub struct PoolRebuildJob {
    builder: Arc<PoolBuilder>,
    config: PoolRebuildConfig,
}

impl PoolRebuildJob {
    pub fn new(builder: Arc<PoolBuilder>, config: PoolRebuildConfig) -> Self {
        Self { builder, config }
    }

    /// Single rebuild with a run id for log correlation
    pub async fn run_once(&self) -> Result<RebuildSummary> {
        let run_id = Uuid::new_v4();
        let started = Instant::now();
        info!(run_id = %run_id, "Starting recommended pool rebuild");

        match self.builder.rebuild().await {
            Ok(summary) => {
                info!(
                    run_id = %run_id,
                    processed = summary.processed,
                    duration_ms = started.elapsed().as_millis() as u64,
                    "Recommended pool rebuild completed"
                );
                Ok(summary)
            }
            Err(e) => {
                error!(run_id = %run_id, kind = e.kind(), error = %e, "Recommended pool rebuild failed");
                Err(e)
            }
        }
    }

    /// Run on the configured schedule until `shutdown` resolves.
    ///
    /// The first rebuild happens immediately.
    pub async fn run_until<S>(&self, shutdown: S) -> PoolJobStats
    where
        S: Future<Output = ()>,
    {
        let mut stats = PoolJobStats {
            started_at: Some(Utc::now()),
            ..Default::default()
        };

        let mut ticker = tokio::time::interval(self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => {
                    info!(runs = stats.runs, "Pool rebuild job shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    stats.runs += 1;
                    match self.run_once().await {
                        Ok(summary) => {
                            stats.succeeded += 1;
                            stats.last_processed = Some(summary.processed);
                        }
                        Err(_) => stats.failed += 1,
                    }

                    if self.config.run_once {
                        break;
                    }

                    info!(
                        interval_secs = self.config.interval.as_secs(),
                        "Sleeping until next pool rebuild"
                    );
                }
            }
        }

        stats
    }
}
