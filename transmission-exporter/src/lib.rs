//! # transmission-exporter: Prometheus metrics for a Transmission daemon
//!
//! The exporter polls a Transmission daemon over its JSON RPC interface and republishes the
//! daemon's state as a pull-based Prometheus snapshot. Every scrape of the metrics endpoint runs
//! each collector once; there is no background polling, buffering or retention.
//!
//! ## Architecture
//!
//! - [`transmission`]: the RPC client and the [`TransmissionApi`](transmission::TransmissionApi)
//!   seam the collectors depend on. Units are normalized at this boundary.
//! - [`collectors`]: the [`PortStatusCollector`](collectors::PortStatusCollector), which re-tests
//!   port reachability at most once per configured interval, the
//!   [`SessionCollector`](collectors::SessionCollector), which snapshots session settings and
//!   directory capacity on every scrape, and the
//!   [`SessionStatsCollector`](collectors::SessionStatsCollector) for live transfer activity.
//!   All of them feed an [`Exporter`](collectors::Exporter).
//! - [`config`], [`errors`], [`telemetry`]: the ambient plumbing.
//!
//! ## Failure model
//!
//! A scrape never fails because the daemon is unreachable. Collectors log remote errors and
//! degrade to fewer or older series: the port status keeps its last good value, a failed
//! free-space probe retracts its series, and a failed session or stats fetch skips that
//! collector's families for that scrape.
//!
//! ## Concurrency
//!
//! Scrapes may arrive concurrently. Each collector serializes its own `collect` behind an async
//! mutex, so the throttling state and the label bookkeeping are read-modify-written atomically.
//! The RPC client is shared by all collectors and is safe for concurrent use.
pub mod collectors;
pub mod config;
pub mod errors;
pub mod telemetry;
pub mod transmission;
pub mod types;

#[cfg(test)]
mod test_utils;

use axum::{
    Router,
    extract::State,
    http::header,
    response::{Html, IntoResponse},
    routing::get,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::{Level, debug, info, instrument};

pub use config::Config;

use crate::collectors::{Exporter, PortStatusCollector, SessionCollector, SessionStatsCollector};
use crate::transmission::{TransmissionApi, TransmissionClient};

/// State shared by the HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    pub exporter: Arc<Exporter>,
    pub config: Config,
}

/// Register every collector against one shared daemon client.
pub fn build_exporter(client: Arc<dyn TransmissionApi>, config: &Config) -> errors::Result<Exporter> {
    let mut exporter = Exporter::new();
    exporter.register(Arc::new(SessionCollector::new(client.clone(), config.scrape_timeout)?))?;
    exporter.register(Arc::new(SessionStatsCollector::new(client.clone(), config.scrape_timeout)?))?;
    exporter.register(Arc::new(PortStatusCollector::new(
        client,
        config.port_check_interval,
        config.scrape_timeout,
    )?))?;
    Ok(exporter)
}

#[instrument(skip_all)]
async fn metrics(State(state): State<AppState>) -> errors::Result<impl IntoResponse> {
    let body = state.exporter.render().await?;
    Ok(([(header::CONTENT_TYPE, prometheus::TEXT_FORMAT)], body))
}

async fn healthz() -> &'static str {
    "OK"
}

async fn landing(State(state): State<AppState>) -> Html<String> {
    Html(format!(
        "<html><head><title>Transmission Exporter</title></head><body>\
         <h1>Transmission Exporter</h1><p><a href=\"{path}\">Metrics</a></p></body></html>",
        path = state.config.metrics_path
    ))
}

/// Build the HTTP router: metrics, health check and a landing page.
pub fn build_router(state: AppState) -> Router {
    let metrics_path = state.config.metrics_path.clone();

    Router::new()
        .route(&metrics_path, get(metrics))
        .route("/healthz", get(healthz))
        .route("/", get(landing))
        .with_state(state)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::DEBUG))
                .on_response(DefaultOnResponse::new().level(Level::DEBUG)),
        )
}

/// The running exporter: configuration plus the router serving it.
pub struct Application {
    router: Router,
    config: Config,
}

impl Application {
    pub fn new(config: Config) -> anyhow::Result<Self> {
        debug!("Starting exporter with configuration: {:#?}", config);

        let client = TransmissionClient::new(
            &config.transmission.url,
            config.transmission.credentials(),
            config.transmission.request_timeout,
        )?;
        info!("Polling Transmission at {}", client.endpoint());

        Self::with_client(config, Arc::new(client))
    }

    /// Build the application around an already constructed daemon client.
    pub fn with_client(config: Config, client: Arc<dyn TransmissionApi>) -> anyhow::Result<Self> {
        let exporter = build_exporter(client, &config)?;
        let state = AppState {
            exporter: Arc::new(exporter),
            config: config.clone(),
        };

        Ok(Self {
            router: build_router(state),
            config,
        })
    }

    /// Convert application into a test server (for tests)
    #[cfg(test)]
    pub fn into_test_server(self) -> axum_test::TestServer {
        axum_test::TestServer::new(self.router).expect("Failed to create test server")
    }

    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let bind_addr = self.config.bind_address();
        let listener = TcpListener::bind(&bind_addr).await?;
        info!(
            "Exporter listening on http://{}{} (port checks every {})",
            bind_addr,
            self.config.metrics_path,
            humantime::format_duration(self.config.port_check_interval)
        );

        axum::serve(listener, self.router).with_graceful_shutdown(shutdown).await?;

        info!("Exporter stopped");
        Ok(())
    }
}
