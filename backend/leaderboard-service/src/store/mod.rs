//! Record store adapter
//!
//! The ranking and pool paths only see these traits. Reads are point-in-time
//! snapshots; the pool document is replaced wholesale on every write.

mod memory;
mod redis_store;

pub use memory::InMemoryStore;
pub use redis_store::RedisStore;

use crate::models::{
    CandidateFilter, CandidatePool, ClanCandidate, ClanDocument, ClanSummary, PlayerRecord,
};
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait PlayerStore: Send + Sync {
    /// Every player record visible to ranking
    async fn fetch_all_players(&self) -> StoreResult<Vec<PlayerRecord>>;

    /// Direct lookup; may find records the full scan does not
    async fn fetch_player(&self, id: &str) -> StoreResult<Option<PlayerRecord>>;

    async fn fetch_clan_summary(&self, clan_id: &str) -> StoreResult<Option<ClanSummary>>;
}

#[async_trait]
pub trait ClanStore: Send + Sync {
    async fn query_candidates(&self, filter: &CandidateFilter) -> StoreResult<Vec<ClanCandidate>>;
}

#[async_trait]
pub trait PoolSnapshotStore: Send + Sync {
    /// Replace the stored pool in one atomic write
    async fn write_pool(&self, pool: &CandidatePool) -> StoreResult<()>;

    async fn read_pool(&self) -> StoreResult<Option<CandidatePool>>;
}

/// A clan's identity: its own non-blank `clanId` when present, else the
/// storage key it was found under. Candidate ids and clan summary lookups
/// both go through this.
pub(crate) fn clan_identity<'a>(key: &'a str, clan: &'a ClanDocument) -> &'a str {
    clan.clan_id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .unwrap_or(key)
}

/// Summary of `clan` if its identity is `clan_id`
pub(crate) fn summarize_clan(
    key: &str,
    clan: &ClanDocument,
    clan_id: &str,
) -> Option<ClanSummary> {
    (clan_identity(key, clan) == clan_id).then(|| ClanSummary {
        id: clan_id.to_string(),
        name: clan.name.clone(),
    })
}

/// Apply `filter` to `(key, document)` rows: equality on status/type,
/// inclusive member band, ordered by member count then id, capped at `limit`.
pub(crate) fn select_candidates<I>(rows: I, filter: &CandidateFilter) -> Vec<ClanCandidate>
where
    I: IntoIterator<Item = (String, ClanDocument)>,
{
    let mut matched: Vec<(u32, String, ClanDocument)> = rows
        .into_iter()
        .filter(|(_, clan)| filter.matches(clan))
        .map(|(key, clan)| {
            let id = clan_identity(&key, &clan).to_string();
            (clan.stats.members, id, clan)
        })
        .collect();

    matched.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)));
    matched.truncate(filter.limit);

    matched
        .into_iter()
        .map(|(_, id, clan)| ClanCandidate {
            id,
            requirement: clan.minimum_trophies,
        })
        .collect()
}
