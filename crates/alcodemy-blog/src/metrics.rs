// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use std::net::SocketAddr;

use alcodemy_pg_db::Db;
use axum::{extract::Extension, http::StatusCode, routing::get, Router};
use prometheus::core::{Collector, Desc};
use prometheus::proto::{Counter, Gauge, Metric, MetricFamily, MetricType};
use prometheus::{
    register_histogram_vec_with_registry, register_int_counter_vec_with_registry,
    register_int_gauge_vec_with_registry, HistogramVec, IntCounterVec, IntGaugeVec, Registry,
    TextEncoder,
};
use tracing::info;

/// Metrics relevant to the requests coming into the service
#[derive(Clone, Debug)]
pub struct RequestMetrics {
    pub(crate) total_requests_received: IntCounterVec,
    pub(crate) total_requests_succeeded: IntCounterVec,
    pub(crate) total_requests_failed: IntCounterVec,
    pub(crate) total_requests_disconnected: IntCounterVec,
    pub(crate) current_requests_in_flight: IntGaugeVec,
    pub(crate) process_latency: HistogramVec,
}

const LATENCY_SEC_BUCKETS: &[f64] = &[
    0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1., 2.5, 5., 10., 20., 30., 60.,
];

impl RequestMetrics {
    pub fn new(registry: &Registry) -> Self {
        Self {
            total_requests_received: register_int_counter_vec_with_registry!(
                "total_requests_received",
                "Total number of requests received by the blog API",
                &["path"],
                registry,
            )
            .unwrap(),
            total_requests_succeeded: register_int_counter_vec_with_registry!(
                "total_requests_succeeded",
                "Total number of requests answered with a success status",
                &["path"],
                registry,
            )
            .unwrap(),
            total_requests_failed: register_int_counter_vec_with_registry!(
                "total_requests_failed",
                "Total number of requests answered with an error status",
                &["path", "status"],
                registry,
            )
            .unwrap(),
            total_requests_disconnected: register_int_counter_vec_with_registry!(
                "total_requests_disconnected",
                "Total number of requests where the client disconnected before the service \
                 returned a response",
                &["path"],
                registry,
            )
            .unwrap(),
            current_requests_in_flight: register_int_gauge_vec_with_registry!(
                "current_requests_in_flight",
                "Current number of requests being processed",
                &["path"],
                registry,
            )
            .unwrap(),
            process_latency: register_histogram_vec_with_registry!(
                "process_latency",
                "Latency of processing a request",
                &["path"],
                LATENCY_SEC_BUCKETS.to_vec(),
                registry,
            )
            .unwrap(),
        }
    }
}

/// Reports the state of the database connection pool each time the registry is gathered.
pub struct DbConnectionStatsCollector {
    db: Db,
    desc: Vec<Desc>,
}

impl DbConnectionStatsCollector {
    pub fn new(prefix: Option<&str>, db: Db) -> Self {
        let prefix = prefix.unwrap_or("db");
        let name = |n| format!("{prefix}_{n}");

        let desc = vec![
            desc(
                name("connections"),
                "Number of connections currently being managed by the pool",
            ),
            desc(
                name("idle_connections"),
                "Number of idle connections in the pool",
            ),
            desc(name("connect_direct"), "Connections that did not have to wait"),
            desc(name("connect_waited"), "Connections that had to wait"),
            desc(
                name("connect_timed_out"),
                "Connections that timed out waiting for a connection",
            ),
            desc(
                name("connections_created"),
                "Connections that have been created in the pool",
            ),
        ];

        Self { db, desc }
    }
}

impl Collector for DbConnectionStatsCollector {
    fn desc(&self) -> Vec<&Desc> {
        self.desc.iter().collect()
    }

    fn collect(&self) -> Vec<MetricFamily> {
        let state = self.db.state();
        let stats = state.statistics;

        vec![
            family(&self.desc[0], MetricType::GAUGE, state.connections as f64),
            family(&self.desc[1], MetricType::GAUGE, state.idle_connections as f64),
            family(&self.desc[2], MetricType::COUNTER, stats.get_direct as f64),
            family(&self.desc[3], MetricType::COUNTER, stats.get_waited as f64),
            family(&self.desc[4], MetricType::COUNTER, stats.get_timed_out as f64),
            family(
                &self.desc[5],
                MetricType::COUNTER,
                stats.connections_created as f64,
            ),
        ]
    }
}

fn desc(name: String, help: &str) -> Desc {
    Desc::new(name, help.to_owned(), vec![], Default::default())
        .expect("Bad metric description")
}

fn family(desc: &Desc, kind: MetricType, value: f64) -> MetricFamily {
    let mut m = Metric::default();
    if kind == MetricType::GAUGE {
        let mut g = Gauge::default();
        g.set_value(value);
        m.set_gauge(g);
    } else {
        let mut c = Counter::default();
        c.set_value(value);
        m.set_counter(c);
    }

    let mut mf = MetricFamily::new();
    mf.mut_metric().push(m);
    mf.set_name(desc.fq_name.clone());
    mf.set_help(desc.help.clone());
    mf.set_field_type(kind);
    mf
}

async fn metrics(Extension(registry): Extension<Registry>) -> (StatusCode, String) {
    let metrics_families = registry.gather();
    match TextEncoder.encode_to_string(&metrics_families) {
        Ok(metrics) => (StatusCode::OK, metrics),
        Err(error) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("unable to encode metrics: {error}"),
        ),
    }
}

/// Serve the contents of `registry` on `/metrics` at `address`, in the background.
pub fn start_prometheus_server(address: SocketAddr, registry: Registry) {
    let app = Router::new()
        .route("/metrics", get(metrics))
        .layer(Extension(registry));

    tokio::spawn(async move {
        info!("Serving metrics on {address}");
        match tokio::net::TcpListener::bind(address).await {
            Ok(listener) => {
                if let Err(e) = axum::serve(listener, app).await {
                    tracing::error!("Metrics server stopped: {e}");
                }
            }
            Err(e) => tracing::error!("Failed to bind metrics address {address}: {e}"),
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn registry_renders_request_metrics() {
        let registry = Registry::new();
        let metrics = RequestMetrics::new(&registry);
        metrics
            .total_requests_received
            .with_label_values(&["/ping"])
            .inc();

        let (status, body) = super::metrics(Extension(registry)).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("total_requests_received{path=\"/ping\"} 1"));
    }

    #[cfg(feature = "pg_integration")]
    #[tokio::test]
    async fn pool_state_is_exported() {
        use alcodemy_pg_db::temp::TempDb;
        use alcodemy_pg_db::DbArgs;

        let temp_db = TempDb::new().unwrap();
        let url = temp_db.database().url().clone();
        let db = Db::new(url, DbArgs::default()).await.unwrap();
        drop(db.connect().await.unwrap());

        let registry = Registry::new();
        registry
            .register(Box::new(DbConnectionStatsCollector::new(Some("blog_db"), db)))
            .unwrap();

        let (status, body) = super::metrics(Extension(registry)).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("# TYPE blog_db_connections gauge"));
        assert!(body.contains("blog_db_connections 1"));
        assert!(body.contains("blog_db_connections_created 1"));
        assert!(body.contains("blog_db_connect_timed_out 0"));
    }
}
