pub mod api;
pub mod config;
pub mod error;
pub mod jobs;
pub mod models;
pub mod services;
pub mod store;
pub mod utils;

pub use api::LeaderboardApi;
pub use config::Config;
pub use error::{AppError, Result};
pub use services::{LeaderboardService, MetricRegistry, PoolBuilder};
