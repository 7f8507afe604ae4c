use crate::error::{AppError, Result};
use crate::models::{
    LeaderboardRequest, LeaderboardResponse, RebuildSummary, RecommendedPoolResponse,
    RefreshSummary,
};
use crate::services::{LeaderboardService, PoolBuilder};
use std::sync::Arc;
use tracing::{info, warn};

/// Caller identity must already be verified upstream; blank counts as absent.
pub fn require_caller(caller_id: Option<&str>) -> Result<&str> {
    caller_id
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .ok_or_else(AppError::unauthenticated)
}

/// Operations exposed to whatever transport fronts this service.
#[derive(Clone)]
pub struct LeaderboardApi {
    leaderboard: Arc<LeaderboardService>,
    pool: Arc<PoolBuilder>,
}

impl LeaderboardApi {
    pub fn new(leaderboard: LeaderboardService, pool: PoolBuilder) -> Self {
        Self {
            leaderboard: Arc::new(leaderboard),
            pool: Arc::new(pool),
        }
    }

    pub fn pool_builder(&self) -> Arc<PoolBuilder> {
        self.pool.clone()
    }

    pub async fn get_leaderboard(
        &self,
        caller_id: Option<&str>,
        request: LeaderboardRequest,
    ) -> Result<LeaderboardResponse> {
        let caller_id = require_caller(caller_id)?;

        self.leaderboard
            .get_leaderboard(caller_id, &request)
            .await
            .inspect_err(|err| {
                warn!(caller_id = %caller_id, kind = err.kind(), error = %err, "GetLeaderboard failed")
            })
    }

    /// On-demand ranking refresh for signed-in callers
    pub async fn refresh_leaderboard(&self, caller_id: Option<&str>) -> Result<RefreshSummary> {
        let caller_id = require_caller(caller_id)?;
        info!(caller_id = %caller_id, "RefreshLeaderboard requested");

        self.leaderboard.refresh().await.inspect_err(|err| {
            warn!(caller_id = %caller_id, kind = err.kind(), error = %err, "RefreshLeaderboard failed")
        })
    }

    pub async fn get_recommended_pool(
        &self,
        caller_id: Option<&str>,
    ) -> Result<RecommendedPoolResponse> {
        let caller_id = require_caller(caller_id)?;
        let pool = self.pool.get_pool().await?;

        info!(
            caller_id = %caller_id,
            pool_size = pool.pool_size,
            "Served recommended clan pool"
        );

        Ok(RecommendedPoolResponse {
            updated_at: pool.updated_at.map(|ts| ts.timestamp_millis()),
            pool: pool.entries,
        })
    }

    /// Administrative / scheduled trigger
    pub async fn rebuild_recommended_pool(&self) -> Result<RebuildSummary> {
        info!("RebuildRecommendedPool requested");
        self.pool.rebuild().await
    }
}
