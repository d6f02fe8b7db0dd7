//! Prometheus metrics exporter for TP-Link Tapo smart plugs.
//!
//! Two ways to use it:
//!
//! - Multi-target: point Prometheus at `/scrape?target=<host>`. Every request
//!   logs in to that device and returns its metrics.
//! - Polling: pass `--target` one or more times. The exporter polls those
//!   devices in the background and serves the latest values on `/metrics`.

use std::{net::SocketAddr, sync::Arc, time::Duration};

use axum::{
    Router,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use clap::Parser;
use futures::future::join_all;
use prometheus_client::{encoding::text::encode, registry::Registry};
use serde::Deserialize;
use tapo_core::{Credentials, Device, DeviceConfig};
use tokio::sync::RwLock;
use tracing::{debug, error, info};

mod collector;
mod metrics;

use metrics::{DeviceMetrics, PollerMetrics};

fn parse_duration(arg: &str) -> Result<Duration, std::num::ParseIntError> {
    let seconds = arg.parse()?;
    Ok(Duration::from_secs(seconds))
}

/// Prometheus metrics exporter for TP-Link Tapo smart plugs.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// HTTP listen address
    #[arg(long, default_value = "0.0.0.0:9235")]
    listen: SocketAddr,

    /// TP-Link cloud account email
    #[arg(short = 'u', long, env = "TAPO_EMAIL")]
    email: String,

    /// TP-Link cloud account password
    #[arg(long, env = "TAPO_PASSWORD", hide_env_values = true)]
    password: String,

    /// Per-request device timeout in seconds
    #[arg(long, value_parser = parse_duration, default_value = "2")]
    timeout: Duration,

    /// Device polling interval in seconds (with --target)
    #[arg(long, value_parser = parse_duration, default_value = "15")]
    scrape_interval: Duration,

    /// Device address to poll in the background.
    /// Can be specified multiple times.
    #[arg(long = "target", value_name = "HOST")]
    targets: Vec<String>,
}

/// Shared application state
struct AppState {
    registry: RwLock<Registry>,
    credentials: Credentials,
    timeout: Duration,
}

#[derive(Deserialize)]
struct ScrapeParams {
    target: Option<String>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize tracing
    if cli.verbose {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::INFO)
            .init();
    }

    let credentials = Credentials::new(cli.email.clone(), cli.password.clone());
    if credentials.is_incomplete() {
        eprintln!("Error: TAPO_EMAIL and TAPO_PASSWORD must not be empty");
        std::process::exit(1);
    }

    // Create metrics registry
    let mut registry = Registry::default();
    let device_metrics = DeviceMetrics::new(&mut registry);
    let poller_metrics = PollerMetrics::new(&mut registry);

    let state = Arc::new(AppState {
        registry: RwLock::new(registry),
        credentials: credentials.clone(),
        timeout: cli.timeout,
    });

    if !cli.targets.is_empty() {
        let devices = cli
            .targets
            .iter()
            .map(|target| {
                Device::new(
                    DeviceConfig::new(target.clone(), credentials.clone()).with_timeout(cli.timeout),
                )
            })
            .collect();

        tokio::spawn(poll_devices(
            devices,
            device_metrics,
            poller_metrics,
            cli.scrape_interval,
        ));
    }

    // Build HTTP router
    let app = Router::new()
        .route("/", get(index_handler))
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .route("/scrape", get(scrape_handler))
        .with_state(state);

    info!("Starting tapo-exporter on {}", cli.listen);
    if cli.targets.is_empty() {
        info!("Mode: multi-target (use /scrape?target=<host>)");
    } else {
        info!(
            "Mode: polling {} devices every {}s",
            cli.targets.len(),
            cli.scrape_interval.as_secs()
        );
        for target in &cli.targets {
            info!("  - {}", target);
        }
    }

    let listener = match tokio::net::TcpListener::bind(cli.listen).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Could not bind {}: {}", cli.listen, e);
            eprintln!("Error: Could not bind {}: {}", cli.listen, e);
            std::process::exit(1);
        }
    };

    if let Err(e) = axum::serve(listener, app).await {
        error!("Server error: {}", e);
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Background task that polls devices at regular intervals
async fn poll_devices(
    mut devices: Vec<Device>,
    metrics: DeviceMetrics,
    poller: PollerMetrics,
    interval: Duration,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;
        debug!("Starting device poll cycle");

        let start = std::time::Instant::now();

        let results = join_all(
            devices
                .iter_mut()
                .map(|device| collector::scrape(device, &metrics)),
        )
        .await;
        let online = results.iter().filter(|ok| **ok).count();

        let duration = start.elapsed();
        poller.set_poll(duration, devices.len(), online);
        debug!(
            "Poll cycle completed in {:?} ({}/{} online)",
            duration,
            online,
            devices.len()
        );
    }
}

/// Index page handler
async fn index_handler() -> impl IntoResponse {
    let html = r#"<!DOCTYPE html>
<html>
<head>
    <title>Tapo Exporter</title>
</head>
<body>
    <h1>Tapo Exporter</h1>
    <p>Prometheus metrics exporter for TP-Link Tapo smart plugs.</p>
    <ul>
        <li><a href="/metrics">Metrics</a></li>
        <li><a href="/scrape?target=192.168.1.100">Scrape a device</a></li>
        <li><a href="/health">Health</a></li>
    </ul>
</body>
</html>"#;

    (StatusCode::OK, [("content-type", "text/html")], html)
}

/// Health check handler
async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// Metrics handler - returns Prometheus exposition format
async fn metrics_handler(State(state): State<Arc<AppState>>) -> Response {
    let registry = state.registry.read().await;
    encode_response(&registry)
}

/// Scrape handler - collects one device into a fresh registry
async fn scrape_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ScrapeParams>,
) -> Response {
    let Some(target) = params.target.filter(|t| !t.is_empty()) else {
        return (
            StatusCode::BAD_REQUEST,
            "'target' parameter must be specified",
        )
            .into_response();
    };

    let mut registry = Registry::default();
    let metrics = DeviceMetrics::new(&mut registry);

    let config = DeviceConfig::new(target, state.credentials.clone()).with_timeout(state.timeout);
    let mut device = Device::new(config);
    collector::scrape(&mut device, &metrics).await;

    encode_response(&registry)
}

fn encode_response(registry: &Registry) -> Response {
    let mut buffer = String::new();

    match encode(&mut buffer, registry) {
        Ok(()) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            buffer,
        )
            .into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            [("content-type", "text/plain; charset=utf-8")],
            format!("Error encoding metrics: {}", e),
        )
            .into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> Arc<AppState> {
        Arc::new(AppState {
            registry: RwLock::new(Registry::default()),
            credentials: Credentials::new("user@example.com", "secret"),
            timeout: Duration::from_millis(100),
        })
    }

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::try_parse_from([
            "tapo-exporter",
            "-u",
            "user@example.com",
            "--password",
            "pw",
        ])
        .unwrap();
        assert_eq!(cli.listen, "0.0.0.0:9235".parse().unwrap());
        assert_eq!(cli.timeout, Duration::from_secs(2));
        assert_eq!(cli.scrape_interval, Duration::from_secs(15));
        assert!(cli.targets.is_empty());
    }

    #[test]
    fn test_cli_multiple_targets() {
        let cli = Cli::try_parse_from([
            "tapo-exporter",
            "-u",
            "user@example.com",
            "--password",
            "pw",
            "--target",
            "10.0.0.5",
            "--target",
            "10.0.0.6:8080",
            "--timeout",
            "5",
        ])
        .unwrap();
        assert_eq!(cli.targets, vec!["10.0.0.5", "10.0.0.6:8080"]);
        assert_eq!(cli.timeout, Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_scrape_requires_target() {
        let response = scrape_handler(State(state()), Query(ScrapeParams { target: None })).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = scrape_handler(
            State(state()),
            Query(ScrapeParams {
                target: Some(String::new()),
            }),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_scrape_unreachable_target_reports_offline() {
        // Nothing listens on this port.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        drop(listener);

        let response = scrape_handler(
            State(state()),
            Query(ScrapeParams {
                target: Some(addr.clone()),
            }),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(text.contains(&format!(r#"tapo_online{{target="{}"}} 0"#, addr)));
    }
}
