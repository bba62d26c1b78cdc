//! Per-client sliding-window request limiting.
//!
//! State is process-local and lost on restart. Each client address keeps the
//! instants of its recent requests; a request is refused once more than
//! `max_requests` fall inside the trailing window.

use crate::error::AppError;
use crate::state::AppState;
use axum::extract::{ConnectInfo, Request, State};
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::Response;
use dashmap::DashMap;
use std::collections::VecDeque;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use typed_builder::TypedBuilder;

/// Paths that are never limited.
pub const EXEMPT_PATHS: [&str; 2] = ["/healthz", "/robots.txt"];

const FORWARDED_FOR: &str = "x-forwarded-for";

#[derive(Debug, Clone, TypedBuilder)]
pub struct RateLimitConfig {
    #[builder(default = Duration::from_secs(60))]
    pub window: Duration,
    #[builder(default = 120)]
    pub max_requests: usize,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

#[derive(Debug)]
pub struct RateLimiter {
    config: RateLimitConfig,
    clients: DashMap<IpAddr, VecDeque<Instant>>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            clients: DashMap::new(),
        }
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Records a request from `ip`. Returns the seconds to wait when refused.
    pub fn check(&self, ip: IpAddr) -> Result<(), u64> {
        self.check_at(ip, Instant::now())
    }

    pub(crate) fn check_at(&self, ip: IpAddr, now: Instant) -> Result<(), u64> {
        let mut requests = self.clients.entry(ip).or_default();
        self.evict(&mut requests, now);

        // Refused requests are not recorded.
        if requests.len() < self.config.max_requests {
            requests.push_back(now);
            return Ok(());
        }

        let retry_after = requests
            .front()
            .map(|oldest| (*oldest + self.config.window).saturating_duration_since(now))
            .unwrap_or(self.config.window);
        Err(retry_after.as_secs_f64().ceil().max(1.0) as u64)
    }

    fn evict(&self, requests: &mut VecDeque<Instant>, now: Instant) {
        let Some(window_start) = now.checked_sub(self.config.window) else {
            return;
        };
        while requests.front().is_some_and(|at| *at < window_start) {
            requests.pop_front();
        }
    }

    /// Drops clients with no request inside the window. Returns how many.
    pub fn prune(&self) -> usize {
        self.prune_at(Instant::now())
    }

    pub(crate) fn prune_at(&self, now: Instant) -> usize {
        let before = self.clients.len();
        self.clients.retain(|_, requests| {
            self.evict(requests, now);
            !requests.is_empty()
        });
        before.saturating_sub(self.clients.len())
    }

    pub fn tracked_clients(&self) -> usize {
        self.clients.len()
    }
}

/// Spawns a task that periodically prunes idle clients until `cancel` fires.
pub fn spawn_pruner(
    limiter: Arc<RateLimiter>,
    interval: Duration,
    cancel: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("rate limit pruner shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    let pruned = limiter.prune();
                    if pruned > 0 {
                        debug!(pruned, remaining = limiter.tracked_clients(), "pruned idle clients");
                    }
                }
            }
        }
    })
}

/// The first valid address in `X-Forwarded-For`, else the peer address.
pub fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> IpAddr {
    headers
        .get(FORWARDED_FOR)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .and_then(|first| first.trim().parse::<IpAddr>().ok())
        .or_else(|| peer.map(|addr| addr.ip()))
        .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED))
}

pub async fn rate_limit(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    if EXEMPT_PATHS.contains(&request.uri().path()) {
        return Ok(next.run(request).await);
    }

    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let ip = client_ip(request.headers(), peer);

    if let Err(retry_after) = state.rate_limiter().check(ip) {
        debug!(client = %ip, retry_after, "rate limited");
        return Err(AppError::RateLimited { retry_after });
    }

    Ok(next.run(request).await)
}
