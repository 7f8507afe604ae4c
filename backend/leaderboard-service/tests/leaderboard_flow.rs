use async_trait::async_trait;
use leaderboard_service::{
    models::{CandidateFilter, ClanSummary, LeaderboardRequest, PlayerRecord},
    services::{PageSizePolicy, PageTokenCodec, RankingCache},
    store::{InMemoryStore, PlayerStore, StoreError, StoreResult},
    LeaderboardApi, LeaderboardService, MetricRegistry, PoolBuilder,
};
use mockall::mock;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

// ============================================
// Test Helpers
// ============================================

mock! {
    pub Players {}

    #[async_trait]
    impl PlayerStore for Players {
        async fn fetch_all_players(&self) -> StoreResult<Vec<PlayerRecord>>;
        async fn fetch_player(&self, id: &str) -> StoreResult<Option<PlayerRecord>>;
        async fn fetch_clan_summary(&self, clan_id: &str) -> StoreResult<Option<ClanSummary>>;
    }
}

/// Answers every call after `delay`
struct SlowPlayers {
    delay: Duration,
}

#[async_trait]
impl PlayerStore for SlowPlayers {
    async fn fetch_all_players(&self) -> StoreResult<Vec<PlayerRecord>> {
        tokio::time::sleep(self.delay).await;
        Ok(Vec::new())
    }

    async fn fetch_player(&self, _id: &str) -> StoreResult<Option<PlayerRecord>> {
        tokio::time::sleep(self.delay).await;
        Ok(None)
    }

    async fn fetch_clan_summary(&self, _clan_id: &str) -> StoreResult<Option<ClanSummary>> {
        tokio::time::sleep(self.delay).await;
        Ok(None)
    }
}

fn player(id: &str, name: &str, trophies: i64) -> PlayerRecord {
    PlayerRecord::new(id, name).with_stat("trophies", trophies)
}

fn service(players: Arc<dyn PlayerStore>, timeout: Duration) -> LeaderboardService {
    LeaderboardService::new(
        players,
        Arc::new(MetricRegistry::standard()),
        PageSizePolicy::default(),
        timeout,
    )
}

async fn api_with(players: Vec<PlayerRecord>) -> (LeaderboardApi, Arc<InMemoryStore>) {
    api_with_cache(players, RankingCache::disabled()).await
}

async fn api_with_cache(
    players: Vec<PlayerRecord>,
    cache: RankingCache,
) -> (LeaderboardApi, Arc<InMemoryStore>) {
    let store = Arc::new(InMemoryStore::with_players(players).await);
    let pool = PoolBuilder::new(
        store.clone(),
        store.clone(),
        CandidateFilter {
            status: "active".into(),
            join_type: "anyone can join".into(),
            min_members: 15,
            max_members: 45,
            limit: 2_000,
        },
        Duration::from_secs(1),
    );
    let leaderboard = service(store.clone(), Duration::from_secs(1)).with_cache(cache);
    let api = LeaderboardApi::new(leaderboard, pool);
    (api, store)
}

fn page(size: f64, token: Option<String>) -> LeaderboardRequest {
    LeaderboardRequest {
        page_size: Some(size),
        page_token: token,
        ..Default::default()
    }
}

// ============================================
// GetLeaderboard
// ============================================

#[tokio::test]
async fn test_tie_break_and_two_page_walk() {
    let (api, _) = api_with(vec![
        player("a", "A", 50),
        player("b", "B", 50),
        player("c", "C", 75),
    ])
    .await;

    let first = api.get_leaderboard(Some("a"), page(2.0, None)).await.unwrap();
    let got: Vec<(u64, &str, f64)> = first
        .entries
        .iter()
        .map(|e| (e.rank, e.player.uid.as_str(), e.value))
        .collect();
    assert_eq!(got, vec![(1, "c", 75.0), (2, "a", 50.0)]);
    assert!(first.next_page_token.is_some());
    assert_eq!(first.viewer.as_ref().and_then(|v| v.rank), Some(2));

    let second = api
        .get_leaderboard(Some("a"), page(2.0, first.next_page_token.clone()))
        .await
        .unwrap();
    let got: Vec<(u64, &str)> = second
        .entries
        .iter()
        .map(|e| (e.rank, e.player.uid.as_str()))
        .collect();
    assert_eq!(got, vec![(3, "b")]);
    assert_eq!(second.next_page_token, None);
}

#[tokio::test]
async fn test_page_walk_covers_every_record_once() {
    let players: Vec<PlayerRecord> = (0..23)
        .map(|i| player(&format!("p{i:02}"), &format!("Player {i:02}"), (i % 5) * 10))
        .collect();
    let (api, _) = api_with(players).await;

    for size in [1.0, 2.0, 5.0, 7.0, 23.0, 100.0] {
        let mut seen = Vec::new();
        let mut token = None;
        loop {
            let resp = api.get_leaderboard(Some("p00"), page(size, token)).await.unwrap();
            assert!(resp.entries.len() <= size as usize);
            seen.extend(resp.entries.iter().map(|e| (e.rank, e.value, e.player.uid.clone())));
            token = resp.next_page_token;
            if token.is_none() {
                break;
            }
        }

        let ranks: Vec<u64> = seen.iter().map(|(rank, _, _)| *rank).collect();
        assert_eq!(ranks, (1..=23).collect::<Vec<u64>>(), "page size {size}");

        let ids: HashSet<&String> = seen.iter().map(|(_, _, id)| id).collect();
        assert_eq!(ids.len(), 23);

        assert!(seen.windows(2).all(|w| w[0].1 >= w[1].1));
    }
}

#[tokio::test]
async fn test_exact_multiple_has_no_trailing_token() {
    let (api, _) = api_with((0..4).map(|i| player(&format!("p{i}"), "P", i)).collect()).await;

    let first = api.get_leaderboard(Some("p0"), page(2.0, None)).await.unwrap();
    let second = api
        .get_leaderboard(Some("p0"), page(2.0, first.next_page_token))
        .await
        .unwrap();
    assert_eq!(second.entries.len(), 2);
    assert_eq!(second.next_page_token, None);
}

#[tokio::test]
async fn test_token_past_end_returns_empty_page() {
    let (api, _) = api_with(vec![player("a", "A", 1)]).await;
    let resp = api
        .get_leaderboard(Some("a"), page(10.0, Some(PageTokenCodec::encode("trophies", 50))))
        .await
        .unwrap();
    assert!(resp.entries.is_empty());
    assert_eq!(resp.next_page_token, None);
}

#[tokio::test]
async fn test_token_rejected_for_other_metric() {
    let (api, _) = api_with(vec![player("a", "A", 1), player("b", "B", 2)]).await;

    let first = api.get_leaderboard(Some("a"), page(1.0, None)).await.unwrap();
    let request = LeaderboardRequest {
        metric: Some("totalWins".into()),
        ..page(1.0, first.next_page_token)
    };

    let err = api.get_leaderboard(Some("a"), request).await.unwrap_err();
    assert_eq!(err.kind(), "invalid-argument");
    assert_eq!(err.to_string(), "Invalid pageToken.");
}

#[tokio::test]
async fn test_garbage_token_and_bad_inputs() {
    let (api, _) = api_with(vec![player("a", "A", 1)]).await;

    let err = api
        .get_leaderboard(Some("a"), page(10.0, Some("%%%".into())))
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Invalid pageToken.");

    let err = api
        .get_leaderboard(
            Some("a"),
            LeaderboardRequest {
                metric: Some("kills".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "invalid-argument");

    for size in [0.0, 101.0, -3.0] {
        let err = api.get_leaderboard(Some("a"), page(size, None)).await.unwrap_err();
        assert_eq!(err.to_string(), "pageSize must be between 1 and 100.");
    }
}

#[tokio::test]
async fn test_missing_caller_is_unauthenticated() {
    let (api, _) = api_with(vec![player("a", "A", 1)]).await;

    for caller in [None, Some(""), Some("  ")] {
        let err = api
            .get_leaderboard(caller, LeaderboardRequest::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "unauthenticated");
    }
}

#[tokio::test]
async fn test_removed_player_leaves_ranking() {
    let (api, store) = api_with(vec![player("a", "A", 10), player("b", "B", 20)]).await;

    let removed = store.remove_player("b").await;
    assert!(removed.is_some());

    let resp = api
        .get_leaderboard(Some("b"), LeaderboardRequest::default())
        .await
        .unwrap();
    assert_eq!(resp.total_players, 1);
    assert_eq!(resp.entries[0].player.uid, "a");
    assert_eq!(resp.entries[0].rank, 1);
    assert!(resp.viewer.is_none());
}

#[tokio::test]
async fn test_response_serializes_wire_field_names() {
    let (api, _) = api_with(vec![player("a", "A", 3)]).await;
    let resp = api
        .get_leaderboard(Some("a"), LeaderboardRequest::default())
        .await
        .unwrap();

    let json = serde_json::to_value(&resp).unwrap();
    assert_eq!(json["metric"], "trophies");
    assert_eq!(json["leaderboardType"], 1);
    assert_eq!(json["you"]["rank"], 1);
    assert_eq!(json["callerRank"], 1);
    assert!(json["pageToken"].is_null());
    assert_eq!(json["players"][0]["uid"], "a");
}

// ============================================
// RefreshLeaderboard
// ============================================

#[tokio::test]
async fn test_refresh_exposes_records_written_after_cached_page() {
    let cache = RankingCache::with_ttl(Duration::from_secs(300));
    let (api, store) = api_with_cache(vec![player("a", "A", 10), player("b", "B", 20)], cache).await;

    let cached = api.get_leaderboard(Some("a"), page(10.0, None)).await.unwrap();
    assert_eq!(cached.total_players, 2);

    store.upsert_player(player("late", "Late", 99)).await;

    let stale = api.get_leaderboard(Some("a"), page(10.0, None)).await.unwrap();
    assert_eq!(stale.total_players, 2);

    let summary = api.refresh_leaderboard(Some("a")).await.unwrap();
    assert!(summary.ok);
    assert_eq!(summary.total_players, 3);
    assert_eq!(summary.metrics.len(), 3);

    let fresh = api.get_leaderboard(Some("a"), page(10.0, None)).await.unwrap();
    assert_eq!(fresh.total_players, 3);
    assert_eq!(fresh.entries[0].player.uid, "late");
    assert_eq!(fresh.viewer.as_ref().and_then(|v| v.rank), Some(3));
}

#[tokio::test]
async fn test_refresh_requires_caller() {
    let (api, _) = api_with(vec![player("a", "A", 1)]).await;

    let err = api.refresh_leaderboard(None).await.unwrap_err();
    assert_eq!(err.kind(), "unauthenticated");
}

// ============================================
// Store failures
// ============================================

#[tokio::test]
async fn test_store_failure_surfaces_as_unavailable() {
    let mut players = MockPlayers::new();
    players
        .expect_fetch_all_players()
        .times(1)
        .returning(|| Err(StoreError::Unavailable("connection refused by 10.0.0.5".into())));

    let service = service(Arc::new(players), Duration::from_secs(1));
    let err = service
        .get_leaderboard("a", &LeaderboardRequest::default())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "unavailable");
    assert_eq!(err.to_string(), "Record store unavailable.");
}

#[tokio::test]
async fn test_invalid_request_never_touches_store() {
    // No expectations: any store call panics the mock
    let service = service(Arc::new(MockPlayers::new()), Duration::from_secs(1));

    let err = service
        .get_leaderboard("a", &page(0.0, None))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "invalid-argument");
}

#[tokio::test]
async fn test_viewer_lookup_failure_fails_request() {
    let mut players = MockPlayers::new();
    players
        .expect_fetch_all_players()
        .returning(|| Ok(vec![player("a", "A", 1)]));
    players
        .expect_fetch_player()
        .returning(|_| Err(StoreError::Unavailable("replica lag".into())));

    let service = service(Arc::new(players), Duration::from_secs(1));
    let err = service
        .get_leaderboard("ghost", &LeaderboardRequest::default())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "unavailable");
}

#[tokio::test]
async fn test_slow_store_times_out() {
    let slow = SlowPlayers {
        delay: Duration::from_secs(5),
    };
    let service = service(Arc::new(slow), Duration::from_millis(20));

    let err = service
        .get_leaderboard("a", &LeaderboardRequest::default())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "unavailable");
}
