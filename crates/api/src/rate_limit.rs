//! Rate Limiting Middleware using GCRA Algorithm
//!
//! Limits `/lab` requests per peer IP with tower_governor. The Generic Cell
//! Rate Algorithm needs no background task to replenish quota.

use governor::middleware::StateInformationMiddleware;
use serde::Deserialize;
use std::sync::Arc;
use tower_governor::governor::GovernorConfigBuilder;
use tower_governor::key_extractor::PeerIpKeyExtractor;

use crate::error::ApiError;

/// Governor config with X-RateLimit-* headers enabled
pub type DefaultGovernorConfig =
    tower_governor::governor::GovernorConfig<PeerIpKeyExtractor, StateInformationMiddleware>;

/// Rate limiting configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Apply the limiter to the /lab routes
    pub enabled: bool,
    /// Seconds between quota replenishments
    pub per_second: u64,
    /// Burst size (max requests that can be made immediately)
    pub burst_size: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            per_second: 2,
            burst_size: 5,
        }
    }
}

/// Build the governor config for `GovernorLayer`.
///
/// Peer IPs come from `ConnectInfo<SocketAddr>`, so the router must be served
/// with `into_make_service_with_connect_info::<SocketAddr>()`.
pub fn create_governor_config(config: &RateLimitConfig) -> Result<Arc<DefaultGovernorConfig>, ApiError> {
    let governor = GovernorConfigBuilder::default()
        .per_second(config.per_second)
        .burst_size(config.burst_size)
        .use_headers()
        .finish()
        .ok_or_else(|| {
            ApiError::Config("rate_limit.per_second and rate_limit.burst_size must be non-zero".to_string())
        })?;

    Ok(Arc::new(governor))
}
