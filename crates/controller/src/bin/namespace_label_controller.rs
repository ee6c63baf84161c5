/*
 * 5D Labs Namespace Label Controller - Controller Service
 * Copyright (C) 2025 5D Labs
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU Affero General Public License as published
 * by the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
 * GNU Affero General Public License for more details.
 *
 * You should have received a copy of the GNU Affero General Public License
 * along with this program. If not, see <https://www.gnu.org/licenses/>.
 */

//! Controller Service - Kubernetes Controller for `NamespaceLabel` CRDs
//!
//! This service:
//! - Watches namespaces and `NamespaceLabel` custom resources
//! - Keeps each namespace's labels in sync with the intents declared in it
//! - Provides health and readiness endpoints

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use axum::{extract::State, http::StatusCode, response::Json, routing::get, Router};
use clap::Parser;
use kube::CustomResourceExt;
use namespace_label_controller::tasks::config::{ControllerConfig, LogFormat};
use namespace_label_controller::tasks::run_label_controller;
use namespace_label_controller::NamespaceLabel;
use serde_json::{json, Value};
use tokio::signal;
use tower::ServiceBuilder;
use tower_http::{
    timeout::TimeoutLayer,
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{error, info, warn, Level};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_CONFIG_PATH: &str = "/config/config.yaml";

#[derive(Parser, Debug)]
#[command(name = "namespace-label-controller", version, about)]
struct Cli {
    /// Path to the controller configuration file
    #[arg(long, env = "CONTROLLER_CONFIG_PATH", default_value = DEFAULT_CONFIG_PATH)]
    config: String,

    /// Print the NamespaceLabel CRD as YAML and exit
    #[arg(long)]
    crd: bool,
}

#[derive(Clone)]
struct AppState {
    controller_running: Arc<AtomicBool>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if cli.crd {
        let crd = serde_yaml::to_string(&NamespaceLabel::crd())
            .context("Failed to serialize CRD")?;
        println!("{crd}");
        return Ok(());
    }

    let (controller_config, config_warning) = load_controller_config(&cli.config);
    init_tracing(controller_config.logging.format);
    if let Some(warning) = config_warning {
        warn!("{}", warning);
    }

    info!(
        "Starting 5D Labs Namespace Label Controller v{}",
        env!("CARGO_PKG_VERSION")
    );

    controller_config
        .validate()
        .context("Invalid controller configuration")?;
    let controller_config = Arc::new(controller_config);

    let client = kube::Client::try_default().await?;
    info!("Connected to Kubernetes cluster");

    let controller_running = Arc::new(AtomicBool::new(true));

    // Start the controller in the background
    let controller_handle = {
        let client = client.clone();
        let config = controller_config.clone();
        let running = controller_running.clone();
        tokio::spawn(async move {
            if let Err(e) = run_label_controller(client, config).await {
                error!("Controller error: {}", e);
            }
            running.store(false, Ordering::SeqCst);
        })
    };

    let state = AppState { controller_running };

    let app = Router::new()
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .layer(
            ServiceBuilder::new()
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(DefaultMakeSpan::new().level(Level::DEBUG))
                        .on_request(DefaultOnRequest::new().level(Level::DEBUG))
                        .on_response(DefaultOnResponse::new().level(Level::DEBUG)),
                )
                .layer(TimeoutLayer::new(Duration::from_secs(10))),
        )
        .with_state(state);

    let bind_address = controller_config.server.bind_address.as_str();
    let listener = tokio::net::TcpListener::bind(bind_address).await?;
    info!("Controller HTTP server listening on {}", bind_address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    controller_handle.abort();
    info!("Controller service stopped");

    Ok(())
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

/// Load the configuration, falling back to defaults. Runs before tracing is set up, so
/// any problem is returned for logging afterwards.
fn load_controller_config(config_path: &str) -> (ControllerConfig, Option<String>) {
    if !Path::new(config_path).exists() {
        return (
            ControllerConfig::default(),
            Some(format!(
                "No configuration found at {config_path}. Using defaults."
            )),
        );
    }

    match ControllerConfig::from_mounted_file(config_path) {
        Ok(cfg) => (cfg, None),
        Err(err) => (
            ControllerConfig::default(),
            Some(format!(
                "Failed to load configuration from {config_path}: {err}. Using defaults."
            )),
        ),
    }
}

async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": "namespace-label-controller",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

async fn readiness_check(State(state): State<AppState>) -> Result<Json<Value>, StatusCode> {
    if !state.controller_running.load(Ordering::SeqCst) {
        return Err(StatusCode::SERVICE_UNAVAILABLE);
    }

    Ok(Json(json!({
        "status": "ready",
        "service": "namespace-label-controller",
        "version": env!("CARGO_PKG_VERSION")
    })))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received Ctrl+C, shutting down gracefully");
        },
        () = terminate => {
            info!("Received SIGTERM, shutting down gracefully");
        },
    }
}
