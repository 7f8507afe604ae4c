use crate::error::Result;
use crate::models::{
    LeaderboardEntry, LeaderboardRequest, LeaderboardResponse, LegacyPlayer, PlayerSummary,
    RankedEntry, RefreshSummary, ViewerEntry,
};
use crate::services::metric::{MetricDefinition, MetricRegistry};
use crate::services::pagination::{PageSizePolicy, PageTokenCodec};
use crate::services::ranking::{find_viewer, rank_records, slice_page, RankingCache, RankingSnapshot};
use crate::store::PlayerStore;
use crate::utils::{operation_watermark, with_timeout};
use chrono::Utc;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// GetLeaderboard: metric resolution, ranking, page slicing, viewer lookup.
///
/// Holds no per-request state; the ranking cache is the only shared value
/// and is disabled unless configured.
pub struct LeaderboardService {
    players: Arc<dyn PlayerStore>,
    registry: Arc<MetricRegistry>,
    page_sizes: PageSizePolicy,
    cache: RankingCache,
    store_timeout: Duration,
}

impl LeaderboardService {
    pub fn new(
        players: Arc<dyn PlayerStore>,
        registry: Arc<MetricRegistry>,
        page_sizes: PageSizePolicy,
        store_timeout: Duration,
    ) -> Self {
        Self {
            players,
            registry,
            page_sizes,
            cache: RankingCache::disabled(),
            store_timeout,
        }
    }

    pub fn with_cache(mut self, cache: RankingCache) -> Self {
        self.cache = cache;
        self
    }

    pub async fn get_leaderboard(
        &self,
        caller_id: &str,
        request: &LeaderboardRequest,
    ) -> Result<LeaderboardResponse> {
        let metric = self
            .registry
            .resolve(request.metric.as_deref(), request.legacy_type)?;
        let page_size = self.page_sizes.resolve(request.page_size.or(request.limit))?;
        let offset = PageTokenCodec::decode(&metric.name, request.page_token.as_deref())?;

        let snapshot = self.ranking_snapshot(metric).await?;
        let total_players = snapshot.entries.len();

        let page = slice_page(&snapshot.entries, offset, page_size);
        let next_page_token = page
            .next_offset
            .map(|next| PageTokenCodec::encode(&metric.name, next));
        let entries: Vec<LeaderboardEntry> = page.entries.iter().map(to_entry).collect();

        let viewer = self
            .resolve_viewer(metric, &snapshot.entries, caller_id)
            .await?;

        let updated_at = snapshot.computed_at.timestamp_millis();
        let watermark = operation_watermark(&json!({
            "metric": metric.name,
            "updatedAt": updated_at,
            "version": "inline",
        }));

        info!(
            caller_id = %caller_id,
            metric = %metric.name,
            offset,
            page_size,
            returned = entries.len(),
            total_players,
            has_next = next_page_token.is_some(),
            "Served leaderboard page"
        );

        Ok(LeaderboardResponse {
            metric: metric.name.clone(),
            updated_at,
            players: entries.iter().map(LegacyPlayer::from).collect(),
            entries,
            next_page_token,
            caller_rank: viewer.as_ref().and_then(|v| v.rank),
            viewer,
            watermark,
            leaderboard_type: metric.legacy_type,
            total_players,
        })
    }

    /// Drop every cached ranking and recompute one per registered metric.
    ///
    /// With the cache disabled this only confirms the store can be ranked.
    pub async fn refresh(&self) -> Result<RefreshSummary> {
        let mut metrics = Vec::with_capacity(self.registry.definitions().len());
        let mut total_players = 0;
        let mut updated_at = 0;

        for metric in self.registry.definitions() {
            self.cache.invalidate(&metric.name).await;
            let snapshot = self.ranking_snapshot(metric).await?;

            total_players = snapshot.entries.len();
            updated_at = updated_at.max(snapshot.computed_at.timestamp_millis());
            metrics.push(metric.name.clone());
        }

        info!(
            metrics = metrics.len(),
            total_players,
            "Refreshed leaderboard rankings"
        );

        Ok(RefreshSummary {
            ok: true,
            metrics,
            total_players,
            updated_at,
        })
    }

    /// Full ranking for `metric`, from the cache when enabled.
    pub async fn ranking_snapshot(&self, metric: &MetricDefinition) -> Result<Arc<RankingSnapshot>> {
        self.cache
            .get_or_compute(&metric.name, move || async move {
                let records =
                    with_timeout(self.store_timeout, self.players.fetch_all_players()).await?;
                let entries = rank_records(metric, records);
                debug!(metric = %metric.name, ranked = entries.len(), "Computed ranking");

                Ok(RankingSnapshot {
                    metric: metric.name.clone(),
                    computed_at: Utc::now(),
                    entries,
                })
            })
            .await
    }

    /// Ranked position when present; otherwise an unranked entry from a
    /// direct lookup, or nothing when the caller has no record.
    async fn resolve_viewer(
        &self,
        metric: &MetricDefinition,
        ranking: &[RankedEntry],
        caller_id: &str,
    ) -> Result<Option<ViewerEntry>> {
        if let Some(entry) = find_viewer(ranking, caller_id) {
            return Ok(Some(ViewerEntry {
                rank: Some(entry.rank),
                value: entry.value,
                player: PlayerSummary::from_record(&entry.record, None),
            }));
        }

        let Some(record) =
            with_timeout(self.store_timeout, self.players.fetch_player(caller_id)).await?
        else {
            return Ok(None);
        };

        debug!(caller_id = %caller_id, "Caller missing from ranking, using direct lookup");

        let clan = match record.clan_ref() {
            Some(clan_id) => {
                with_timeout(self.store_timeout, self.players.fetch_clan_summary(clan_id)).await?
            }
            None => None,
        };

        Ok(Some(ViewerEntry {
            rank: None,
            value: record.metric_value(&metric.field),
            player: PlayerSummary::from_record(&record, clan),
        }))
    }
}

fn to_entry(entry: &RankedEntry) -> LeaderboardEntry {
    LeaderboardEntry {
        rank: entry.rank,
        value: entry.value,
        player: PlayerSummary::from_record(&entry.record, None),
    }
}
