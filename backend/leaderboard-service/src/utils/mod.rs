// Utility functions for leaderboard-service

pub mod timeout;

pub use timeout::{with_timeout, TimeoutError};

use serde::Serialize;
use sha2::{Digest, Sha256};

/// Hex SHA-256 over the JSON encoding of a response's identifying inputs.
///
/// Clients compare watermarks to tell whether two responses came from the
/// same ranking snapshot.
pub fn operation_watermark<T: Serialize>(inputs: &T) -> String {
    let bytes = serde_json::to_vec(inputs).unwrap_or_default();
    hex::encode(Sha256::digest(&bytes))
}
