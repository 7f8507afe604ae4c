// ============================================
// Background Jobs Module
// ============================================
//
// The recommended clan pool is the only scheduled work. It can be driven by
// this runner or triggered on demand via LeaderboardApi::rebuild_recommended_pool.

pub mod pool_rebuild;

pub use pool_rebuild::{PoolJobStats, PoolRebuildConfig, PoolRebuildJob};
