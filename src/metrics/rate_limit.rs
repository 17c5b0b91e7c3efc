//! Per-address request limiting for the `/api` routes
//!
//! A keyed token bucket: each client address may spend its whole window's
//! allowance at once, then regains one request per `window / limit`.

use crate::config::HttpSettings;
use axum::{
    extract::{ConnectInfo, Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::clock::{Clock, DefaultClock};
use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Tracked addresses above which idle buckets are dropped
const RETAIN_THRESHOLD: usize = 10_000;

pub struct ApiRateLimiter {
    limiter: DefaultKeyedRateLimiter<IpAddr>,
    clock: DefaultClock,
}

impl ApiRateLimiter {
    /// `requests` per `window` for each address.
    ///
    /// `None` when the window is too short to replenish a single request.
    pub fn new(requests: NonZeroU32, window: Duration) -> Option<Self> {
        let period = window.checked_div(requests.get())?;
        let quota = Quota::with_period(period)?.allow_burst(requests);

        Some(Self {
            limiter: RateLimiter::keyed(quota),
            clock: DefaultClock::default(),
        })
    }

    /// Limiter described by `settings`, or `None` when limiting is off
    pub fn from_settings(settings: &HttpSettings) -> Option<Self> {
        let requests = NonZeroU32::new(settings.api_rate_limit)?;
        Self::new(requests, settings.api_rate_window())
    }

    /// `Ok` when `address` may proceed, otherwise the wait before it may
    pub fn check(&self, address: IpAddr) -> Result<(), Duration> {
        if self.limiter.len() > RETAIN_THRESHOLD {
            self.limiter.retain_recent();
        }

        self.limiter
            .check_key(&address)
            .map_err(|not_until| not_until.wait_time_from(self.clock.now()))
    }

    pub fn tracked_addresses(&self) -> usize {
        self.limiter.len()
    }
}

/// Middleware rejecting callers that exceeded their allowance with `429`
pub async fn limit_api_requests(
    State(limiter): State<Arc<ApiRateLimiter>>,
    request: Request,
    next: Next,
) -> Response {
    let address = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(peer)| peer.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED));

    match limiter.check(address) {
        Ok(()) => next.run(request).await,
        Err(wait) => {
            debug!(
                "Rate limit exceeded - address: {}, path: {}, retry in {:?}",
                address,
                request.uri().path(),
                wait
            );
            (
                StatusCode::TOO_MANY_REQUESTS,
                [(header::RETRY_AFTER, wait.as_secs().max(1).to_string())],
                "Too many requests from this IP, please try again later.",
            )
                .into_response()
        }
    }
}
