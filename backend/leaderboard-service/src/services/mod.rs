pub mod leaderboard;
pub mod metric;
pub mod pagination;
pub mod pool;
pub mod ranking;

pub use leaderboard::LeaderboardService;
pub use metric::{MetricDefinition, MetricRegistry};
pub use pagination::{PageSizePolicy, PageTokenCodec};
pub use pool::PoolBuilder;
pub use ranking::RankingCache;
