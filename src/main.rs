// Main entry point - Dependency injection and server setup
mod domain;
mod application;
mod infrastructure;
mod presentation;

use std::{net::SocketAddr, sync::Arc};
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use crate::application::data_stream::DataStreamService;
use crate::application::offload::OffloadCoordinator;
use crate::application::pipeline::TransformPipeline;
use crate::infrastructure::config::load_engine_config;
use crate::presentation::app_state::AppState;
use crate::presentation::handlers::{
    append_point, clear_points, get_dataset, health_check, live_stream, next_point, reset_stream, start_stream,
    stop_stream, stream_points, transform,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Load configuration
    let config = load_engine_config()?;

    // Offload coordinator owns the transform worker
    let coordinator = Arc::new(OffloadCoordinator::new(config.offload.clone()));
    let pipeline = TransformPipeline::new(coordinator.clone(), config.render.chart_width);

    // Live stream seeded with the initial dataset
    let stream_service = DataStreamService::new(config.generator, &config.stream)?;
    if config.stream.autostart {
        stream_service.start_streaming();
    }

    // Create application state
    let state = Arc::new(AppState {
        stream_service: stream_service.clone(),
        pipeline,
        generator_state: config.generator,
    });

    // Build router (presentation layer)
    // Responses are compressed in our own builders, so no CompressionLayer here.
    let router = Router::new()
        .route("/healthz", get(health_check))
        .route("/api/data", get(get_dataset).post(next_point))
        .route(
            "/api/stream/points",
            get(stream_points).post(append_point).delete(clear_points),
        )
        .route("/api/stream/start", post(start_stream))
        .route("/api/stream/stop", post(stop_stream))
        .route("/api/stream/reset", post(reset_stream))
        .route("/api/stream/live", get(live_stream))
        .route("/api/transform", post(transform))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    // Start server
    let addr: SocketAddr = config.server.bind.parse()?;
    tracing::info!("Starting signal-stream service on {}", addr);

    axum::serve(tokio::net::TcpListener::bind(addr).await?, router)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    stream_service.stop_streaming();
    coordinator.dispose();
    tracing::info!("shutdown complete");

    Ok(())
}
