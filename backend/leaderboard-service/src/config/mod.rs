use crate::models::CandidateFilter;
use crate::services::pagination::PageSizePolicy;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read environment: {0}")]
    Env(#[from] envy::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub service: ServiceConfig,
    pub redis: RedisConfig,
    pub leaderboard: LeaderboardConfig,
    pub pool: PoolConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    #[serde(default = "default_service_name")]
    pub name: String,
    /// `json` switches the log formatter to JSON lines
    #[serde(default)]
    pub log_format: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    #[serde(default = "default_redis_url")]
    pub url: String,
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LeaderboardConfig {
    #[serde(default = "default_page_min")]
    pub page_min: u32,
    #[serde(default = "default_page_max")]
    pub page_max: u32,
    #[serde(default = "default_page_default")]
    pub page_default: u32,
    #[serde(default = "default_metric")]
    pub default_metric: String,
    /// 0 disables the ranking snapshot cache (full re-sort per request)
    #[serde(default)]
    pub ranking_cache_ttl_secs: u64,
    #[serde(default = "default_store_timeout_ms")]
    pub store_timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PoolConfig {
    #[serde(default = "default_pool_limit")]
    pub limit: usize,
    #[serde(default = "default_min_members")]
    pub healthy_min_members: u32,
    #[serde(default = "default_max_members")]
    pub healthy_max_members: u32,
    #[serde(default = "default_pool_status")]
    pub status: String,
    #[serde(default = "default_pool_join_type")]
    pub join_type: String,
    #[serde(default = "default_rebuild_interval_secs")]
    pub rebuild_interval_secs: u64,
    #[serde(default)]
    pub run_once: bool,
    /// Fixed shuffle seed for reproducible runs; entropy when unset
    #[serde(default)]
    pub shuffle_seed: Option<u64>,
    #[serde(default = "default_store_timeout_ms")]
    pub store_timeout_ms: u64,
}

fn default_service_name() -> String {
    "leaderboard-service".to_string()
}

fn default_redis_url() -> String {
    "redis://localhost:6379".to_string()
}

fn default_key_prefix() -> String {
    "nova".to_string()
}

fn default_page_min() -> u32 {
    1
}

fn default_page_max() -> u32 {
    100
}

fn default_page_default() -> u32 {
    50
}

fn default_metric() -> String {
    "trophies".to_string()
}

fn default_store_timeout_ms() -> u64 {
    5_000
}

fn default_pool_limit() -> usize {
    2_000
}

fn default_min_members() -> u32 {
    15
}

fn default_max_members() -> u32 {
    45
}

fn default_pool_status() -> String {
    "active".to_string()
}

fn default_pool_join_type() -> String {
    "anyone can join".to_string()
}

fn default_rebuild_interval_secs() -> u64 {
    3_600
}

impl Default for LeaderboardConfig {
    fn default() -> Self {
        Self {
            page_min: default_page_min(),
            page_max: default_page_max(),
            page_default: default_page_default(),
            default_metric: default_metric(),
            ranking_cache_ttl_secs: 0,
            store_timeout_ms: default_store_timeout_ms(),
        }
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            limit: default_pool_limit(),
            healthy_min_members: default_min_members(),
            healthy_max_members: default_max_members(),
            status: default_pool_status(),
            join_type: default_pool_join_type(),
            rebuild_interval_secs: default_rebuild_interval_secs(),
            run_once: false,
            shuffle_seed: None,
            store_timeout_ms: default_store_timeout_ms(),
        }
    }
}

impl LeaderboardConfig {
    pub fn page_size_policy(&self) -> PageSizePolicy {
        PageSizePolicy {
            min: self.page_min,
            max: self.page_max,
            default: self.page_default,
        }
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }

    pub fn ranking_cache_ttl(&self) -> Option<Duration> {
        (self.ranking_cache_ttl_secs > 0).then(|| Duration::from_secs(self.ranking_cache_ttl_secs))
    }
}

impl PoolConfig {
    pub fn candidate_filter(&self) -> CandidateFilter {
        CandidateFilter {
            status: self.status.clone(),
            join_type: self.join_type.clone(),
            min_members: self.healthy_min_members,
            max_members: self.healthy_max_members,
            limit: self.limit,
        }
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }

    pub fn rebuild_interval(&self) -> Duration {
        Duration::from_secs(self.rebuild_interval_secs.max(1))
    }
}

impl Config {
    /// Load from the process environment (and `.env` when present).
    ///
    /// Sections are read with prefixes `SERVICE_`, `REDIS_`, `LEADERBOARD_`
    /// and `POOL_`, e.g. `LEADERBOARD_PAGE_MAX=200`.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let config = Config {
            service: envy::prefixed("SERVICE_").from_env()?,
            redis: envy::prefixed("REDIS_").from_env()?,
            leaderboard: envy::prefixed("LEADERBOARD_").from_env()?,
            pool: envy::prefixed("POOL_").from_env()?,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let lb = &self.leaderboard;
        if lb.page_min == 0 || lb.page_min > lb.page_default || lb.page_default > lb.page_max {
            return Err(ConfigError::Invalid(format!(
                "page sizes must satisfy 1 <= min ({}) <= default ({}) <= max ({})",
                lb.page_min, lb.page_default, lb.page_max
            )));
        }
        if self.pool.healthy_min_members > self.pool.healthy_max_members {
            return Err(ConfigError::Invalid(format!(
                "pool member band is empty: min {} > max {}",
                self.pool.healthy_min_members, self.pool.healthy_max_members
            )));
        }
        if self.pool.limit == 0 {
            return Err(ConfigError::Invalid("pool limit must be positive".to_string()));
        }
        Ok(())
    }
}
