//! Per-client-address rate limiting
//!
//! In-memory keyed limiter over the client address, applied to the API
//! boundary. The window and budget come from configuration.

use std::net::IpAddr;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};

use crate::config::RateLimitConfig;
use crate::error::{Error, Result};
use crate::state::AppState;

/// Keyed limiter shared across requests
#[derive(Clone)]
pub struct ClientRateLimit {
    limiter: Arc<DefaultKeyedRateLimiter<IpAddr>>,
}

impl ClientRateLimit {
    pub fn new(config: &RateLimitConfig) -> Self {
        let max = NonZeroU32::new(config.max_requests.max(1)).unwrap_or(NonZeroU32::MIN);
        let window = Duration::from_secs(config.window_secs.max(1));
        let replenish = window / max.get();
        let quota = Quota::with_period(replenish)
            .unwrap_or_else(|| Quota::per_hour(max))
            .allow_burst(max);
        Self {
            limiter: Arc::new(RateLimiter::keyed(quota)),
        }
    }

    /// Spend one request from the client's budget
    pub fn check(&self, client: IpAddr) -> Result<()> {
        self.limiter
            .check_key(&client)
            .map_err(|_| Error::RateLimitExceeded)
    }
}

/// Middleware applying the limiter to every request it wraps
pub async fn rate_limit(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response> {
    let client = client_address(request.headers());
    state.rate_limit().check(client)?;
    Ok(next.run(request).await)
}

/// Best-effort client address: forwarded headers first, loopback otherwise.
fn client_address(headers: &HeaderMap) -> IpAddr {
    headers
        .get("x-forwarded-for")
        .or_else(|| headers.get("x-real-ip"))
        .and_then(|v| v.to_str().ok())
        .and_then(|raw| raw.split(',').next())
        .and_then(|raw| raw.trim().parse().ok())
        .unwrap_or(IpAddr::from([127, 0, 0, 1]))
}
