use crate::services::pool::normalize_requirement;
use crate::services::ranking::sanitize_metric_value;
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

fn default_avatar_id() -> u32 {
    1
}

fn default_level() -> u32 {
    1
}

// Profile rows are written by several clients and are loosely typed. Display
// attributes fall back to their defaults instead of failing the whole row.

fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => s,
        _ => String::new(),
    })
}

fn lenient_opt_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => Some(s),
        _ => None,
    })
}

/// Whole number from a JSON number or numeric string
fn lenient_count(value: &Value) -> Option<u32> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match parsed {
        Some(v) if v.is_finite() && v >= 0.0 && v <= f64::from(u32::MAX) => Some(v.floor() as u32),
        _ => None,
    }
}

fn lenient_avatar_id<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(lenient_count(&value).unwrap_or_else(default_avatar_id))
}

fn lenient_level<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(lenient_count(&value).unwrap_or_else(default_level))
}

/// Player profile as read from the record store.
///
/// Metric fields (`trophies`, `careerCoins`, ...) are not typed here: the
/// metric registry decides which storage field a ranking reads, so they are
/// kept in `stats` verbatim.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PlayerRecord {
    pub id: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub display_name: String,
    #[serde(default = "default_avatar_id", deserialize_with = "lenient_avatar_id")]
    pub avatar_id: u32,
    #[serde(default = "default_level", deserialize_with = "lenient_level")]
    pub level: u32,
    #[serde(
        default,
        deserialize_with = "lenient_opt_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub clan_id: Option<String>,
    #[serde(flatten)]
    pub stats: Map<String, Value>,
}

impl PlayerRecord {
    pub fn new(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            avatar_id: default_avatar_id(),
            level: default_level(),
            clan_id: None,
            stats: Map::new(),
        }
    }

    /// Builder-style stat setter, mostly for fixtures
    pub fn with_stat(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.stats.insert(field.to_string(), value.into());
        self
    }

    pub fn with_clan(mut self, clan_id: impl Into<String>) -> Self {
        self.clan_id = Some(clan_id.into());
        self
    }

    /// Sanitized numeric value of a storage field; missing or non-numeric is `0`.
    pub fn metric_value(&self, field: &str) -> f64 {
        self.stats
            .get(field)
            .map(sanitize_metric_value)
            .unwrap_or(0.0)
    }

    /// Clan reference, if present and non-blank
    pub fn clan_ref(&self) -> Option<&str> {
        self.clan_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ClanSummary {
    pub id: String,
    pub name: String,
}

/// Caller-visible projection of a player record
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PlayerSummary {
    pub uid: String,
    pub display_name: String,
    pub avatar_id: u32,
    pub level: u32,
    pub trophies: f64,
    pub clan: Option<ClanSummary>,
}

impl PlayerSummary {
    pub fn from_record(record: &PlayerRecord, clan: Option<ClanSummary>) -> Self {
        Self {
            uid: record.id.clone(),
            display_name: record.display_name.clone(),
            avatar_id: record.avatar_id,
            level: record.level,
            trophies: record.metric_value("trophies"),
            clan,
        }
    }
}

/// One position in a computed ranking. Never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedEntry {
    pub rank: u64,
    pub value: f64,
    pub record: PlayerRecord,
}

// ============================================
// Clan candidates & recommended pool
// ============================================

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ClanStats {
    #[serde(default)]
    pub members: u32,
}

/// Clan row as stored in the candidate source
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ClanDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clan_id: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub status: String,
    #[serde(default, rename = "type")]
    pub join_type: String,
    #[serde(default)]
    pub stats: ClanStats,
    #[serde(default)]
    pub minimum_trophies: Value,
}

/// Fixed predicate the pool rebuild queries under
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateFilter {
    pub status: String,
    pub join_type: String,
    pub min_members: u32,
    pub max_members: u32,
    pub limit: usize,
}

impl CandidateFilter {
    pub fn matches(&self, clan: &ClanDocument) -> bool {
        clan.status == self.status
            && clan.join_type == self.join_type
            && clan.stats.members >= self.min_members
            && clan.stats.members <= self.max_members
    }
}

/// Raw candidate returned by the store; `requirement` is normalized by the pool builder.
#[derive(Debug, Clone, PartialEq)]
pub struct ClanCandidate {
    pub id: String,
    pub requirement: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PoolEntry {
    pub id: String,
    #[serde(rename = "req")]
    pub requirement: u64,
}

/// Materialized recommendation pool, stored as a single document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", from = "RawCandidatePool")]
pub struct CandidatePool {
    pub updated_at: Option<DateTime<Utc>>,
    pub pool_size: usize,
    #[serde(rename = "pool")]
    pub entries: Vec<PoolEntry>,
}

impl CandidatePool {
    pub fn new(updated_at: DateTime<Utc>, entries: Vec<PoolEntry>) -> Self {
        Self {
            updated_at: Some(updated_at),
            pool_size: entries.len(),
            entries,
        }
    }
}

/// Lenient read shape: stored pools may predate the current writer.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawCandidatePool {
    #[serde(default)]
    updated_at: Value,
    #[serde(default)]
    pool: Value,
}

impl From<RawCandidatePool> for CandidatePool {
    fn from(raw: RawCandidatePool) -> Self {
        let entries = normalize_pool_entries(&raw.pool);
        Self {
            updated_at: parse_timestamp(&raw.updated_at),
            pool_size: entries.len(),
            entries,
        }
    }
}

fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|dt| dt.with_timezone(&Utc)),
        Value::Number(n) => n
            .as_i64()
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single()),
        _ => None,
    }
}

/// Entries without a string `id` are dropped; `req` falls back to `minimumTrophies`.
fn normalize_pool_entries(input: &Value) -> Vec<PoolEntry> {
    let Some(items) = input.as_array() else {
        return Vec::new();
    };

    items
        .iter()
        .filter_map(|item| {
            let obj = item.as_object()?;
            let id = obj.get("id")?.as_str()?;
            if id.is_empty() {
                return None;
            }
            let raw_req = obj
                .get("req")
                .filter(|v| !v.is_null())
                .or_else(|| obj.get("minimumTrophies"))
                .unwrap_or(&Value::Null);
            Some(PoolEntry {
                id: id.to_string(),
                requirement: normalize_requirement(raw_req),
            })
        })
        .collect()
}

// ============================================
// Request / response shapes
// ============================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardRequest {
    #[serde(default)]
    pub metric: Option<String>,
    /// Legacy numeric leaderboard type, accepted for older clients
    #[serde(default, rename = "type")]
    pub legacy_type: Option<f64>,
    #[serde(default)]
    pub page_size: Option<f64>,
    /// Legacy alias of `page_size`
    #[serde(default)]
    pub limit: Option<f64>,
    #[serde(default)]
    pub page_token: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    pub rank: u64,
    pub value: f64,
    pub player: PlayerSummary,
}

/// The caller's own standing; `rank` is `None` when the caller is unranked.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ViewerEntry {
    pub rank: Option<u64>,
    pub value: f64,
    pub player: PlayerSummary,
}

/// Flat row shape consumed by older clients
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LegacyPlayer {
    pub uid: String,
    pub display_name: String,
    pub avatar_id: u32,
    pub level: u32,
    pub rank: u64,
    pub stat: f64,
}

impl From<&LeaderboardEntry> for LegacyPlayer {
    fn from(entry: &LeaderboardEntry) -> Self {
        Self {
            uid: entry.player.uid.clone(),
            display_name: entry.player.display_name.clone(),
            avatar_id: entry.player.avatar_id,
            level: entry.player.level,
            rank: entry.rank,
            stat: entry.value,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardResponse {
    pub metric: String,
    /// Milliseconds since epoch of the ranking snapshot
    pub updated_at: i64,
    pub entries: Vec<LeaderboardEntry>,
    #[serde(rename = "pageToken")]
    pub next_page_token: Option<String>,
    #[serde(rename = "you")]
    pub viewer: Option<ViewerEntry>,
    pub watermark: String,
    pub leaderboard_type: i64,
    pub total_players: usize,
    pub players: Vec<LegacyPlayer>,
    pub caller_rank: Option<u64>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RecommendedPoolResponse {
    pub updated_at: Option<i64>,
    pub pool: Vec<PoolEntry>,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct RebuildSummary {
    pub processed: usize,
}

/// Result of an on-demand leaderboard refresh
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RefreshSummary {
    pub ok: bool,
    /// Metrics whose rankings were recomputed, in registry order
    pub metrics: Vec<String>,
    pub total_players: usize,
    /// Milliseconds since epoch of the newest recomputed snapshot
    pub updated_at: i64,
}
