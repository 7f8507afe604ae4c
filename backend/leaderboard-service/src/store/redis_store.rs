// ============================================
// Redis-backed record store
// ============================================
//
// Keys:
// - {prefix}:players                 - Hash of player id -> profile JSON
// - {prefix}:clans                   - Hash of clan id -> clan JSON
// - {prefix}:system:recommended_clans - String holding the pool document
//
// HGETALL is a single command, so a full player scan is a point-in-time read.
// The pool is written with one SET, so readers see the old or the new
// document, never a mix.

use super::{
    select_candidates, summarize_clan, ClanStore, PlayerStore, PoolSnapshotStore, StoreResult,
};
use crate::models::{
    CandidateFilter, CandidatePool, ClanCandidate, ClanDocument, ClanSummary, PlayerRecord,
};
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;
use tracing::{debug, warn};

#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
    key_prefix: String,
}

impl RedisStore {
    const PLAYERS_KEY_SUFFIX: &'static str = ":players";
    const CLANS_KEY_SUFFIX: &'static str = ":clans";
    const POOL_KEY_SUFFIX: &'static str = ":system:recommended_clans";

    pub fn new(conn: ConnectionManager, key_prefix: &str) -> Self {
        Self {
            conn,
            key_prefix: key_prefix.to_string(),
        }
    }

    pub async fn connect(url: &str, key_prefix: &str) -> StoreResult<Self> {
        let client = redis::Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self::new(conn, key_prefix))
    }

    fn players_key(&self) -> String {
        format!("{}{}", self.key_prefix, Self::PLAYERS_KEY_SUFFIX)
    }

    fn clans_key(&self) -> String {
        format!("{}{}", self.key_prefix, Self::CLANS_KEY_SUFFIX)
    }

    fn pool_key(&self) -> String {
        format!("{}{}", self.key_prefix, Self::POOL_KEY_SUFFIX)
    }
}

/// Only rows that are not JSON objects are dropped. A missing or non-string
/// `id` is replaced by the hash field; display fields decode leniently.
fn decode_player(key: &str, raw: &str) -> Option<PlayerRecord> {
    let mut value: Value = match serde_json::from_str(raw) {
        Ok(v) => v,
        Err(e) => {
            warn!(player_id = %key, error = %e, "Skipping undecodable player row");
            return None;
        }
    };
    let Some(obj) = value.as_object_mut() else {
        warn!(player_id = %key, "Skipping player row that is not an object");
        return None;
    };
    if !obj.get("id").is_some_and(Value::is_string) {
        obj.insert("id".to_string(), Value::String(key.to_string()));
    }
    decode_row("player", key, value)
}

fn decode_row<T: DeserializeOwned>(kind: &'static str, key: &str, value: Value) -> Option<T> {
    match serde_json::from_value(value) {
        Ok(row) => Some(row),
        Err(e) => {
            warn!(kind, key = %key, error = %e, "Skipping undecodable row");
            None
        }
    }
}

fn decode_clan(key: &str, raw: &str) -> Option<ClanDocument> {
    let value = match serde_json::from_str(raw) {
        Ok(v) => v,
        Err(e) => {
            warn!(clan_id = %key, error = %e, "Skipping undecodable clan row");
            return None;
        }
    };
    decode_row("clan", key, value)
}

#[async_trait]
impl PlayerStore for RedisStore {
    async fn fetch_all_players(&self) -> StoreResult<Vec<PlayerRecord>> {
        let mut conn = self.conn.clone();
        let rows: HashMap<String, String> = conn.hgetall(self.players_key()).await?;

        let players: Vec<PlayerRecord> = rows
            .iter()
            .filter_map(|(key, raw)| decode_player(key, raw))
            .collect();

        debug!(
            rows = rows.len(),
            decoded = players.len(),
            "Fetched player snapshot"
        );

        Ok(players)
    }

    async fn fetch_player(&self, id: &str) -> StoreResult<Option<PlayerRecord>> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn.hget(self.players_key(), id).await?;
        Ok(raw.and_then(|raw| decode_player(id, &raw)))
    }

    async fn fetch_clan_summary(&self, clan_id: &str) -> StoreResult<Option<ClanSummary>> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn.hget(self.clans_key(), clan_id).await?;

        let direct = raw
            .and_then(|raw| decode_clan(clan_id, &raw))
            .and_then(|clan| summarize_clan(clan_id, &clan, clan_id));
        if direct.is_some() {
            return Ok(direct);
        }

        // Documents may carry their own id under a different hash field
        debug!(clan_id = %clan_id, "Clan not found by key, scanning embedded ids");
        let rows: HashMap<String, String> = conn.hgetall(self.clans_key()).await?;
        Ok(rows.iter().find_map(|(key, raw)| {
            decode_clan(key, raw).and_then(|clan| summarize_clan(key, &clan, clan_id))
        }))
    }
}

#[async_trait]
impl ClanStore for RedisStore {
    async fn query_candidates(&self, filter: &CandidateFilter) -> StoreResult<Vec<ClanCandidate>> {
        let mut conn = self.conn.clone();
        let rows: HashMap<String, String> = conn.hgetall(self.clans_key()).await?;

        let docs = rows
            .into_iter()
            .filter_map(|(key, raw)| decode_clan(&key, &raw).map(|clan| (key, clan)));

        Ok(select_candidates(docs, filter))
    }
}

#[async_trait]
impl PoolSnapshotStore for RedisStore {
    async fn write_pool(&self, pool: &CandidatePool) -> StoreResult<()> {
        let json = serde_json::to_string(pool)?;
        let mut conn = self.conn.clone();
        let _: () = conn.set(self.pool_key(), json).await?;
        Ok(())
    }

    async fn read_pool(&self) -> StoreResult<Option<CandidatePool>> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn.get(self.pool_key()).await?;

        match raw {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }
}
