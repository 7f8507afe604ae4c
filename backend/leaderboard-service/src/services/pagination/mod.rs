//! Opaque page tokens and page-size validation
//!
//! A token is base64url(JSON `{"metric", "offset"}`). It only decodes under
//! the metric it was issued for: an offset into one ordering means nothing in
//! another.

use crate::error::{AppError, Result};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

const INVALID_TOKEN_MESSAGE: &str = "Invalid pageToken.";

#[derive(Serialize)]
struct TokenPayloadRef<'a> {
    metric: &'a str,
    offset: u64,
}

#[derive(Deserialize)]
struct TokenPayload {
    metric: String,
    offset: u64,
}

/// Internal rejection reason; callers only ever see `Invalid pageToken.`
#[derive(Debug, Error)]
enum TokenRejection {
    #[error("not base64url: {0}")]
    Encoding(#[from] base64::DecodeError),

    #[error("bad payload: {0}")]
    Payload(#[from] serde_json::Error),

    #[error("issued for metric {actual}, expected {expected}")]
    MetricMismatch { expected: String, actual: String },
}

pub struct PageTokenCodec;

impl PageTokenCodec {
    pub fn encode(metric: &str, offset: u64) -> String {
        let payload = TokenPayloadRef { metric, offset };
        // Serializing a &str and a u64 cannot fail
        let json = serde_json::to_vec(&payload).unwrap_or_default();
        URL_SAFE_NO_PAD.encode(json)
    }

    /// Absent or empty token means the first page.
    pub fn decode(expected_metric: &str, token: Option<&str>) -> Result<u64> {
        let Some(token) = token.filter(|t| !t.is_empty()) else {
            return Ok(0);
        };

        Self::try_decode(expected_metric, token).map_err(|reason| {
            debug!(reason = %reason, "Rejected page token");
            AppError::invalid_argument(INVALID_TOKEN_MESSAGE)
        })
    }

    fn try_decode(expected_metric: &str, token: &str) -> std::result::Result<u64, TokenRejection> {
        let bytes = URL_SAFE_NO_PAD.decode(token.trim_end_matches('='))?;
        let payload: TokenPayload = serde_json::from_slice(&bytes)?;
        if payload.metric != expected_metric {
            return Err(TokenRejection::MetricMismatch {
                expected: expected_metric.to_string(),
                actual: payload.metric,
            });
        }
        Ok(payload.offset)
    }
}

/// Bounds applied to caller-requested page sizes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageSizePolicy {
    pub min: u32,
    pub max: u32,
    pub default: u32,
}

impl Default for PageSizePolicy {
    fn default() -> Self {
        Self {
            min: 1,
            max: 100,
            default: 50,
        }
    }
}

impl PageSizePolicy {
    /// Absent → default; out of range → InvalidArgument; fractional sizes are floored.
    pub fn resolve(&self, raw: Option<f64>) -> Result<u32> {
        let Some(value) = raw else {
            return Ok(self.default);
        };
        if !value.is_finite() || value < f64::from(self.min) || value > f64::from(self.max) {
            return Err(AppError::invalid_argument(format!(
                "pageSize must be between {} and {}.",
                self.min, self.max
            )));
        }
        Ok(value.floor() as u32)
    }
}
