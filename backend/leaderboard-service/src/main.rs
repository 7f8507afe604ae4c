use anyhow::Context;
use leaderboard_service::{
    jobs::{PoolRebuildConfig, PoolRebuildJob},
    services::RankingCache,
    store::RedisStore,
    Config, LeaderboardApi, LeaderboardService, MetricRegistry, PoolBuilder,
};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load config before tracing so the log format can be chosen
    let config = Config::from_env().context("Failed to load config")?;
    init_tracing(config.service.log_format.as_deref());

    info!(
        service = %config.service.name,
        key_prefix = %config.redis.key_prefix,
        "Starting leaderboard service"
    );

    let store = Arc::new(
        RedisStore::connect(&config.redis.url, &config.redis.key_prefix)
            .await
            .context("Failed to connect to Redis")?,
    );

    let registry = MetricRegistry::standard_with_default(&config.leaderboard.default_metric)
        .context("Invalid default metric")?;
    info!(
        metrics = ?registry.names().collect::<Vec<_>>(),
        default = %registry.default_metric().name,
        "Metric registry ready"
    );

    let cache_ttl = config.leaderboard.ranking_cache_ttl();
    if let Some(ttl) = cache_ttl {
        info!(ttl_secs = ttl.as_secs(), "Ranking snapshot cache enabled");
    }

    let leaderboard = LeaderboardService::new(
        store.clone(),
        Arc::new(registry),
        config.leaderboard.page_size_policy(),
        config.leaderboard.store_timeout(),
    )
    .with_cache(RankingCache::from_ttl(cache_ttl));

    let mut pool = PoolBuilder::new(
        store.clone(),
        store,
        config.pool.candidate_filter(),
        config.pool.store_timeout(),
    );
    if let Some(seed) = config.pool.shuffle_seed {
        warn!(seed, "Using fixed shuffle seed for the recommended pool");
        pool = pool.with_seed(seed);
    }

    let api = LeaderboardApi::new(leaderboard, pool);

    let job = PoolRebuildJob::new(api.pool_builder(), PoolRebuildConfig::from(&config.pool));
    let stats = job
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "Failed to listen for shutdown signal");
                std::future::pending::<()>().await;
            }
        })
        .await;

    info!(
        runs = stats.runs,
        succeeded = stats.succeeded,
        failed = stats.failed,
        "Leaderboard service stopped"
    );

    Ok(())
}

fn init_tracing(log_format: Option<&str>) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    if log_format.is_some_and(|f| f.eq_ignore_ascii_case("json")) {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer()).init();
    }
}
