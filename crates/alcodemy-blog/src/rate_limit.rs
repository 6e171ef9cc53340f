// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Per-route request quotas, keyed by client IP address. Every limited route gets its own
//! buckets, so exhausting the login quota does not affect reading posts.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::num::NonZeroU32;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{ConnectInfo, Request, State};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::MethodRouter;
use governor::clock::{Clock, DefaultClock};
use governor::middleware::NoOpMiddleware;
use governor::state::keyed::DefaultKeyedStateStore;
use governor::{Quota, RateLimiter};
use tracing::debug;

use crate::error::ApiError;

/// How many requests a client may make to one route within a window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouteQuota {
    pub window_minutes: u64,
    pub max: u32,
}

impl RouteQuota {
    pub const fn new(window_minutes: u64, max: u32) -> Self {
        Self {
            window_minutes,
            max,
        }
    }

    /// The full allowance is available up front and refills evenly over the window.
    fn quota(&self) -> Option<Quota> {
        let max = NonZeroU32::new(self.max)?;
        let window = Duration::from_secs(self.window_minutes.max(1) * 60);
        Some(Quota::with_period(window / self.max)?.allow_burst(max))
    }
}

/// Checks between sweeps of buckets that have fully refilled.
const PRUNE_EVERY: u64 = 1024;

type KeyedLimiter<C> =
    RateLimiter<IpAddr, DefaultKeyedStateStore<IpAddr>, C, NoOpMiddleware<<C as Clock>::Instant>>;

struct RouteLimiter<C: Clock = DefaultClock> {
    limiter: KeyedLimiter<C>,
    window_minutes: u64,
    checks: AtomicU64,
}

impl<C: Clock> RouteLimiter<C> {
    fn new(quota: Quota, window_minutes: u64, clock: &C) -> Self {
        Self {
            limiter: RateLimiter::new(quota, DefaultKeyedStateStore::default(), clock),
            window_minutes,
            checks: AtomicU64::new(0),
        }
    }

    /// Takes one cell from `client`'s bucket. Every [PRUNE_EVERY] checks, clients whose buckets
    /// are full again are forgotten so the map tracks recent clients only.
    fn admit(&self, client: IpAddr) -> bool {
        if (self.checks.fetch_add(1, Ordering::Relaxed) + 1) % PRUNE_EVERY == 0 {
            self.prune();
        }
        self.limiter.check_key(&client).is_ok()
    }

    fn prune(&self) {
        let before = self.limiter.len();
        self.limiter.retain_recent();
        self.limiter.shrink_to_fit();
        debug!(before, after = self.limiter.len(), "Pruned rate limit buckets");
    }
}

/// Attaches quotas to routes when limiting is enabled, and leaves routes untouched otherwise.
#[derive(Debug, Clone, Copy)]
pub struct RateLimits {
    enabled: bool,
}

impl RateLimits {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    pub fn apply<S>(&self, quota: RouteQuota, route: MethodRouter<S>) -> MethodRouter<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        if !self.enabled {
            return route;
        }
        let Some(q) = quota.quota() else {
            return route;
        };

        let limiter = Arc::new(RouteLimiter::new(
            q,
            quota.window_minutes,
            &DefaultClock::default(),
        ));
        route.layer(middleware::from_fn_with_state(limiter, enforce))
    }
}

async fn enforce(
    State(limiter): State<Arc<RouteLimiter>>,
    request: Request,
    next: Next,
) -> Response {
    let client = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED));

    if !limiter.admit(client) {
        debug!(%client, path = %request.uri().path(), "Rate limit exceeded");
        return ApiError::RateLimited {
            minutes: limiter.window_minutes,
        }
        .into_response();
    }

    next.run(request).await
}
