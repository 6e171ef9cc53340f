// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use std::{
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};

use axum::extract::MatchedPath;
use futures::Future;
use http::{Request, Response, StatusCode};
use prometheus::{HistogramTimer, Registry};
use tower::{Layer, Service, ServiceExt};
use tracing::{debug, info, warn};

use crate::metrics::RequestMetrics;

/// Tower Layer for tracking metrics in Prometheus related to number, success-rate and latency of
/// requests running through service. Requests are labelled by their route template rather than
/// the concrete path, so ids do not explode the label space.
#[derive(Clone)]
pub struct RequestMetricsLayer {
    metrics: Arc<RequestMetrics>,
}

#[derive(Clone)]
pub struct RequestMetricsService<Inner> {
    inner: Inner,
    metrics: Arc<RequestMetrics>,
}

pub struct RequestMetricsFuture<Res, Err> {
    future: Pin<Box<dyn Future<Output = Result<Res, Err>> + Send>>,
}

struct MetricsGuard {
    timer: Option<HistogramTimer>,
    metrics: Arc<RequestMetrics>,
    path: String,
}

impl RequestMetricsLayer {
    pub fn new(registry: &Registry) -> Self {
        Self {
            metrics: Arc::new(RequestMetrics::new(registry)),
        }
    }
}

impl<Inner> Layer<Inner> for RequestMetricsLayer {
    type Service = RequestMetricsService<Inner>;
    fn layer(&self, inner: Inner) -> Self::Service {
        RequestMetricsService {
            inner,
            metrics: self.metrics.clone(),
        }
    }
}

impl<Inner, ReqBody, ResBody> Service<Request<ReqBody>> for RequestMetricsService<Inner>
where
    Inner: Service<Request<ReqBody>, Response = Response<ResBody>> + Clone + Send + 'static,
    Inner::Future: Send,
    Inner::Error: Send,
    ReqBody: Send + 'static,
    ResBody: Send + 'static,
{
    type Response = Inner::Response;
    type Error = Inner::Error;
    type Future = RequestMetricsFuture<Self::Response, Self::Error>;

    fn poll_ready(&mut self, ctx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(ctx)
    }

    fn call(&mut self, req: Request<ReqBody>) -> Self::Future {
        let path = req
            .extensions()
            .get::<MatchedPath>()
            .map(|p| p.as_str().to_owned())
            .unwrap_or_else(|| "unmatched".to_owned());
        let metrics = MetricsGuard::new(self.metrics.clone(), &path);
        let inner = self.inner.clone();

        let future = Box::pin(async move {
            let resp = inner.oneshot(req).await;
            match &resp {
                Ok(resp) if !resp.status().is_success() => metrics.failed(resp.status()),
                Ok(_) => metrics.succeeded(),
                Err(_) => metrics.failed(StatusCode::INTERNAL_SERVER_ERROR),
            }

            resp
        });

        RequestMetricsFuture { future }
    }
}

impl<Res, Err> Future for RequestMetricsFuture<Res, Err> {
    type Output = Result<Res, Err>;
    fn poll(mut self: Pin<&mut Self>, ctx: &mut Context<'_>) -> Poll<Self::Output> {
        Future::poll(self.future.as_mut(), ctx)
    }
}

impl MetricsGuard {
    fn new(metrics: Arc<RequestMetrics>, path: &str) -> Self {
        metrics
            .total_requests_received
            .with_label_values(&[path])
            .inc();
        metrics
            .current_requests_in_flight
            .with_label_values(&[path])
            .inc();
        MetricsGuard {
            timer: Some(
                metrics
                    .process_latency
                    .with_label_values(&[path])
                    .start_timer(),
            ),
            metrics,
            path: path.to_string(),
        }
    }

    fn succeeded(mut self) {
        if let Some(timer) = self.timer.take() {
            let elapsed = timer.stop_and_record();
            self.metrics
                .total_requests_succeeded
                .with_label_values(&[&self.path])
                .inc();
            debug!(
                "Request succeeded for path {} in {:.2}s",
                self.path, elapsed
            );
        }
    }

    fn failed(mut self, status: StatusCode) {
        if let Some(timer) = self.timer.take() {
            let elapsed = timer.stop_and_record();
            self.metrics
                .total_requests_failed
                .with_label_values(&[&self.path, status.as_str()])
                .inc();

            if status.is_server_error() {
                warn!(
                    "Request failed for path {} in {:.2}s with status: {}",
                    self.path, elapsed, status
                );
            } else {
                debug!(
                    "Request rejected for path {} in {:.2}s with status: {}",
                    self.path, elapsed, status
                );
            }
        }
    }
}

impl Drop for MetricsGuard {
    fn drop(&mut self) {
        self.metrics
            .current_requests_in_flight
            .with_label_values(&[&self.path])
            .dec();

        // Request was still in flight when the guard was dropped, implying the client disconnected.
        if let Some(timer) = self.timer.take() {
            let elapsed = timer.stop_and_record();
            self.metrics
                .total_requests_disconnected
                .with_label_values(&[&self.path])
                .inc();
            info!(
                "Request disconnected for path {} in {:.2}s",
                self.path, elapsed
            );
        }
    }
}
