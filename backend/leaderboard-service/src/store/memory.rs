use super::{
    select_candidates, summarize_clan, ClanStore, PlayerStore, PoolSnapshotStore, StoreResult,
};
use crate::models::{
    CandidateFilter, CandidatePool, ClanCandidate, ClanDocument, ClanSummary, PlayerRecord,
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Process-local store for tests and single-node runs.
///
/// Reads clone under a read lock, so each call observes one consistent view.
/// The pool is swapped as a whole `Arc`.
#[derive(Default)]
pub struct InMemoryStore {
    players: RwLock<HashMap<String, PlayerRecord>>,
    /// Reachable by id only, not by the full scan (an index that lags writes)
    unlisted_players: RwLock<HashMap<String, PlayerRecord>>,
    clans: RwLock<HashMap<String, ClanDocument>>,
    pool: RwLock<Option<Arc<CandidatePool>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn with_players(players: impl IntoIterator<Item = PlayerRecord>) -> Self {
        let store = Self::new();
        for player in players {
            store.upsert_player(player).await;
        }
        store
    }

    pub async fn upsert_player(&self, player: PlayerRecord) {
        self.players.write().await.insert(player.id.clone(), player);
    }

    pub async fn insert_unlisted_player(&self, player: PlayerRecord) {
        self.unlisted_players
            .write()
            .await
            .insert(player.id.clone(), player);
    }

    pub async fn remove_player(&self, id: &str) -> Option<PlayerRecord> {
        self.players.write().await.remove(id)
    }

    pub async fn upsert_clan(&self, key: impl Into<String>, clan: ClanDocument) {
        self.clans.write().await.insert(key.into(), clan);
    }

    pub async fn clear_pool(&self) {
        *self.pool.write().await = None;
    }
}

#[async_trait]
impl PlayerStore for InMemoryStore {
    async fn fetch_all_players(&self) -> StoreResult<Vec<PlayerRecord>> {
        Ok(self.players.read().await.values().cloned().collect())
    }

    async fn fetch_player(&self, id: &str) -> StoreResult<Option<PlayerRecord>> {
        if let Some(player) = self.players.read().await.get(id) {
            return Ok(Some(player.clone()));
        }
        Ok(self.unlisted_players.read().await.get(id).cloned())
    }

    async fn fetch_clan_summary(&self, clan_id: &str) -> StoreResult<Option<ClanSummary>> {
        let clans = self.clans.read().await;

        // Keyed lookup first, then a scan for documents carrying their own id
        let direct = clans
            .get(clan_id)
            .and_then(|clan| summarize_clan(clan_id, clan, clan_id));
        Ok(direct.or_else(|| {
            clans
                .iter()
                .find_map(|(key, clan)| summarize_clan(key, clan, clan_id))
        }))
    }
}

#[async_trait]
impl ClanStore for InMemoryStore {
    async fn query_candidates(&self, filter: &CandidateFilter) -> StoreResult<Vec<ClanCandidate>> {
        let rows: Vec<(String, ClanDocument)> = self
            .clans
            .read()
            .await
            .iter()
            .map(|(key, clan)| (key.clone(), clan.clone()))
            .collect();
        Ok(select_candidates(rows, filter))
    }
}

#[async_trait]
impl PoolSnapshotStore for InMemoryStore {
    async fn write_pool(&self, pool: &CandidatePool) -> StoreResult<()> {
        let next = Arc::new(pool.clone());
        *self.pool.write().await = Some(next);
        Ok(())
    }

    async fn read_pool(&self) -> StoreResult<Option<CandidatePool>> {
        let current = self.pool.read().await.clone();
        Ok(current.map(|pool| pool.as_ref().clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ClanStats, PoolEntry};
    use chrono::Utc;

    #[tokio::test]
    async fn test_unlisted_player_only_visible_to_point_lookup() {
        let store = InMemoryStore::with_players(vec![PlayerRecord::new("a", "A")]).await;
        store
            .insert_unlisted_player(PlayerRecord::new("ghost", "Ghost"))
            .await;

        let all = store.fetch_all_players().await.unwrap();
        assert_eq!(all.len(), 1);
        assert!(store.fetch_player("ghost").await.unwrap().is_some());
        assert!(store.fetch_player("nobody").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_clan_summary_lookup() {
        let store = InMemoryStore::new();
        store
            .upsert_clan(
                "c1",
                ClanDocument {
                    name: "Speedsters".into(),
                    stats: ClanStats { members: 20 },
                    ..Default::default()
                },
            )
            .await;

        let summary = store.fetch_clan_summary("c1").await.unwrap().unwrap();
        assert_eq!(summary.name, "Speedsters");
        assert!(store.fetch_clan_summary("c2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_clan_summary_uses_embedded_id() {
        let store = InMemoryStore::new();
        store
            .upsert_clan(
                "storage-key",
                ClanDocument {
                    clan_id: Some("c7".into()),
                    name: "Drifters".into(),
                    ..Default::default()
                },
            )
            .await;

        let summary = store.fetch_clan_summary("c7").await.unwrap().unwrap();
        assert_eq!(summary.id, "c7");
        assert_eq!(summary.name, "Drifters");
        assert!(store.fetch_clan_summary("storage-key").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_pool_write_replaces_previous() {
        let store = InMemoryStore::new();
        assert!(store.read_pool().await.unwrap().is_none());

        let first = CandidatePool::new(
            Utc::now(),
            vec![
                PoolEntry { id: "a".into(), requirement: 1 },
                PoolEntry { id: "b".into(), requirement: 2 },
            ],
        );
        store.write_pool(&first).await.unwrap();

        let second = CandidatePool::new(Utc::now(), vec![PoolEntry { id: "c".into(), requirement: 3 }]);
        store.write_pool(&second).await.unwrap();

        assert_eq!(store.read_pool().await.unwrap(), Some(second));
    }
}
