// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::extract::DefaultBodyLimit;
use axum::http::{header, HeaderValue, Method};
use axum::routing::get;
use axum::Router;
use prometheus::Registry;
use tap::Pipe;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::auth::{Credentials, Sessions};
use crate::config::BlogConfig;
use crate::error::ApiError;
use crate::mailer::{LogMailer, Mailer};
use crate::media::Media;
use crate::metrics_layer::RequestMetricsLayer;
use crate::oauth::{FixedIdentities, IdentityProvider};
use crate::rate_limit::RateLimits;
use crate::store::BlogStore;
use crate::summary::Summarizer;

pub mod auth;
pub mod config;
pub mod error;
mod extract;
mod handlers;
pub mod mailer;
pub mod media;
pub mod metrics;
pub mod metrics_layer;
pub mod oauth;
mod rate_limit;
pub mod store;
pub mod summary;
pub mod telemetry;
pub mod types;

/// Headroom on top of the largest accepted upload for the rest of a multipart body.
const BODY_SLACK_BYTES: usize = 64 * 1024;

/// Everything a request handler can reach. Cheap to clone: all shared parts sit behind `Arc`s.
#[derive(Clone)]
pub struct BlogService {
    pub(crate) store: Arc<dyn BlogStore>,
    pub(crate) sessions: Sessions,
    pub(crate) credentials: Credentials,
    pub(crate) media: Media,
    pub(crate) mailer: Arc<dyn Mailer>,
    pub(crate) summarizer: Arc<Summarizer>,
    pub(crate) identity: Arc<dyn IdentityProvider>,
    pub(crate) config: Arc<BlogConfig>,
    registry: Option<Registry>,
}

impl BlogService {
    /// A service that logs outgoing mail, summarises with excerpts and rejects every Google
    /// credential until the corresponding `with_*` call replaces them.
    pub fn new(
        config: BlogConfig,
        store: Arc<dyn BlogStore>,
        media: Media,
        jwt_secret: &[u8],
    ) -> Self {
        Self {
            store,
            sessions: Sessions::new(jwt_secret, config.token_ttl),
            credentials: Credentials::new(config.bcrypt_cost),
            media,
            mailer: Arc::new(LogMailer),
            summarizer: Arc::new(Summarizer::disabled()),
            identity: Arc::new(FixedIdentities::default()),
            config: Arc::new(config),
            registry: None,
        }
    }

    pub fn with_mailer(&mut self, mailer: Arc<dyn Mailer>) {
        self.mailer = mailer;
    }

    pub fn with_summarizer(&mut self, summarizer: Summarizer) {
        self.summarizer = Arc::new(summarizer);
    }

    pub fn with_identity_provider(&mut self, identity: Arc<dyn IdentityProvider>) {
        self.identity = identity;
    }

    /// Record request counts and latencies into `registry`.
    pub fn with_metrics(&mut self, registry: Registry) {
        self.registry = Some(registry);
    }

    pub fn config(&self) -> &BlogConfig {
        &self.config
    }

    pub fn into_router(self) -> Router {
        let limits = RateLimits::new(self.config.rate_limits.enabled);
        let body_limit = self.config.max_upload_bytes + BODY_SLACK_BYTES;
        let cors = cors_layer(&self.config);
        let registry = self.registry.clone();

        Router::new()
            .nest("/api/v1", handlers::router(limits))
            .route("/ping", get(handlers::ping))
            .fallback(route_not_found)
            .with_state(self)
            .layer(DefaultBodyLimit::max(body_limit))
            .pipe(|router| {
                if let Some(registry) = registry {
                    router.layer(RequestMetricsLayer::new(&registry))
                } else {
                    router
                }
            })
            .layer(cors)
            .layer(TraceLayer::new_for_http())
    }

    /// Serve until ctrl-c, then let in-flight requests finish.
    pub async fn start_service(self, socket_address: SocketAddr) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(socket_address)
            .await
            .with_context(|| format!("cannot bind {socket_address}"))?;
        info!("Blog API listening on {}", listener.local_addr()?);

        axum::serve(
            listener,
            self.into_router()
                .into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")
    }
}

async fn route_not_found() -> ApiError {
    ApiError::not_found("Route not found")
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}

/// The frontend is the only allowed origin, and it may send the session cookie.
fn cors_layer(config: &BlogConfig) -> CorsLayer {
    let origin = config.frontend_url.origin().ascii_serialization();
    let layer = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true);

    match HeaderValue::from_str(&origin) {
        Ok(origin) => layer.allow_origin(origin),
        Err(_) => layer,
    }
}
