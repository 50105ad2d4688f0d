// HTTP request handlers
use crate::application::pipeline::TransformRequest;
use crate::domain::error::{validate_count, validate_timestamp, ValidationError};
use crate::domain::generator::{Generator, POINT_SPACING_MS};
use crate::domain::point::Point;
use crate::infrastructure::chunked_stream::stream_from_receiver;
use crate::infrastructure::http_response::{accepts_brotli, json_response, json_response_with_status};
use crate::presentation::app_state::AppState;
use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

const DEFAULT_DATASET_COUNT: i64 = 1000;
const MAX_DATASET_COUNT: i64 = 10_000;

#[derive(Deserialize)]
pub struct CountQuery {
    pub count: Option<i64>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct NextPointBody {
    pub previous_timestamp: Option<f64>,
}

#[derive(Deserialize, Default)]
pub struct ResetBody {
    pub count: Option<f64>,
}

#[derive(Serialize)]
struct DatasetResponse {
    data: Vec<Point>,
    count: usize,
    timestamp: i64,
}

#[derive(Serialize)]
struct PointResponse {
    data: Point,
    timestamp: i64,
}

#[derive(Serialize)]
struct StreamStatus {
    streaming: bool,
    count: usize,
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

async fn respond<T: Serialize>(data: &T, compress: bool) -> Response {
    match json_response(data, compress).await {
        Ok(response) => response,
        Err(status) => status.into_response(),
    }
}

async fn reject(error: ValidationError, compress: bool) -> Response {
    tracing::warn!("rejecting request: {}", error);
    let body = json!({ "error": error.to_string() });
    match json_response_with_status(StatusCode::BAD_REQUEST, &body, compress).await {
        Ok(response) => response,
        Err(status) => status.into_response(),
    }
}

fn stream_status(state: &AppState) -> StreamStatus {
    StreamStatus {
        streaming: state.stream_service.is_streaming(),
        count: state.stream_service.len(),
    }
}

/// Health check endpoint
pub async fn health_check() -> &'static str {
    "ok"
}

/// Fresh dataset from a new generator (count clamped to 1..=10000)
pub async fn get_dataset(
    Query(query): Query<CountQuery>,
    headers: HeaderMap,
    State(state): State<Arc<AppState>>,
) -> Response {
    let compress = accepts_brotli(&headers);
    let count = query
        .count
        .unwrap_or(DEFAULT_DATASET_COUNT)
        .clamp(1, MAX_DATASET_COUNT);

    let mut generator = Generator::new(state.generator_state);
    match generator.generate_initial_dataset(count) {
        Ok(data) => {
            let body = DatasetResponse {
                count: data.len(),
                data,
                timestamp: now_ms(),
            };
            respond(&body, compress).await
        }
        Err(e) => reject(e, compress).await,
    }
}

/// Next point after `previousTimestamp`, or at the current time
pub async fn next_point(
    headers: HeaderMap,
    State(state): State<Arc<AppState>>,
    body: Option<Json<NextPointBody>>,
) -> Response {
    let compress = accepts_brotli(&headers);
    let Json(body) = body.unwrap_or_default();
    let mut generator = Generator::new(state.generator_state);

    let point = match body.previous_timestamp {
        Some(raw) => validate_timestamp(raw)
            .and_then(|previous| generator.generate_point(previous.saturating_add(POINT_SPACING_MS), None)),
        None => generator.generate_next_point(None),
    };

    match point {
        Ok(data) => {
            respond(
                &PointResponse {
                    data,
                    timestamp: now_ms(),
                },
                compress,
            )
            .await
        }
        Err(e) => reject(e, compress).await,
    }
}

/// Current contents of the live window
pub async fn stream_points(headers: HeaderMap, State(state): State<Arc<AppState>>) -> Response {
    let data = state.stream_service.snapshot();
    let body = DatasetResponse {
        count: data.len(),
        data,
        timestamp: now_ms(),
    };
    respond(&body, accepts_brotli(&headers)).await
}

pub async fn clear_points(State(state): State<Arc<AppState>>) -> Response {
    state.stream_service.clear();
    Json(stream_status(&state)).into_response()
}

/// Append a caller-supplied point; the stream continues from it
pub async fn append_point(
    headers: HeaderMap,
    State(state): State<Arc<AppState>>,
    Json(point): Json<Point>,
) -> Response {
    let compress = accepts_brotli(&headers);
    if point.timestamp < 0 {
        return reject(ValidationError::InvalidTimestamp(point.timestamp as f64), compress).await;
    }
    state.stream_service.add_point(point);
    respond(&stream_status(&state), compress).await
}

pub async fn start_stream(State(state): State<Arc<AppState>>) -> Response {
    state.stream_service.start_streaming();
    Json(stream_status(&state)).into_response()
}

pub async fn stop_stream(State(state): State<Arc<AppState>>) -> Response {
    state.stream_service.stop_streaming();
    Json(stream_status(&state)).into_response()
}

/// Regenerate the live window
pub async fn reset_stream(
    headers: HeaderMap,
    State(state): State<Arc<AppState>>,
    body: Option<Json<ResetBody>>,
) -> Response {
    let compress = accepts_brotli(&headers);
    let Json(body) = body.unwrap_or_default();
    let raw = body.count.unwrap_or(DEFAULT_DATASET_COUNT as f64);

    // Counts past i64 are still valid; the generator clamps them.
    let result = validate_count(raw)
        .and_then(|count| state.stream_service.reset(i64::try_from(count).unwrap_or(i64::MAX)));
    match result {
        Ok(_) => respond(&stream_status(&state), compress).await,
        Err(e) => reject(e, compress).await,
    }
}

/// Chunked stream of newly generated points
pub async fn live_stream(headers: HeaderMap, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let rx = state.stream_service.subscribe();
    stream_from_receiver(rx, accepts_brotli(&headers))
}

/// Filter / aggregate / decimate the live window and attach indicators
pub async fn transform(
    headers: HeaderMap,
    State(state): State<Arc<AppState>>,
    Json(request): Json<TransformRequest>,
) -> Response {
    let points: Arc<[Point]> = state.stream_service.snapshot().into();
    let view = state.pipeline.run(points, &request).await;
    respond(&view, accepts_brotli(&headers)).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::data_stream::DataStreamService;
    use crate::application::offload::OffloadCoordinator;
    use crate::application::pipeline::TransformPipeline;
    use crate::domain::generator::GeneratorState;
    use crate::infrastructure::config::{OffloadSettings, StreamSettings};
    use axum::body::to_bytes;
    use serde_json::Value;

    fn state() -> Arc<AppState> {
        let settings = StreamSettings {
            initial_count: 20,
            autostart: false,
            ..Default::default()
        };
        let coordinator = Arc::new(OffloadCoordinator::new(OffloadSettings::default()));
        Arc::new(AppState {
            stream_service: DataStreamService::new(GeneratorState::default(), &settings).unwrap(),
            pipeline: TransformPipeline::new(coordinator, 800),
            generator_state: GeneratorState::default(),
        })
    }

    async fn body_json(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health_check() {
        assert_eq!(health_check().await, "ok");
    }

    #[tokio::test]
    async fn test_get_dataset_clamps_count() {
        let response = get_dataset(Query(CountQuery { count: Some(50_000) }), HeaderMap::new(), State(state())).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["count"], 10_000);

        let response = get_dataset(Query(CountQuery { count: Some(0) }), HeaderMap::new(), State(state())).await;
        assert_eq!(body_json(response).await["count"], 1);
    }

    #[tokio::test]
    async fn test_next_point_continues_previous_timestamp() {
        let body = NextPointBody {
            previous_timestamp: Some(1000.0),
        };
        let response = next_point(HeaderMap::new(), State(state()), Some(Json(body))).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["data"]["timestamp"], 1100);
    }

    #[tokio::test]
    async fn test_next_point_rejects_invalid_timestamp() {
        let body = NextPointBody {
            previous_timestamp: Some(-10.0),
        };
        let response = next_point(HeaderMap::new(), State(state()), Some(Json(body))).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(body_json(response).await["error"].is_string());
    }

    #[tokio::test]
    async fn test_reset_stream_validates_count() {
        let app = state();
        let ok = reset_stream(HeaderMap::new(), State(app.clone()), Some(Json(ResetBody { count: Some(42.0) }))).await;
        assert_eq!(ok.status(), StatusCode::OK);
        assert_eq!(body_json(ok).await["count"], 42);

        let bad = reset_stream(HeaderMap::new(), State(app), Some(Json(ResetBody { count: Some(1.5) }))).await;
        assert_eq!(bad.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_reset_stream_clamps_oversized_count() {
        let app = state();
        let response = reset_stream(HeaderMap::new(), State(app.clone()), Some(Json(ResetBody { count: Some(1e19) }))).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(app.stream_service.len(), 10_000);
    }

    #[tokio::test]
    async fn test_append_point_extends_window() {
        let app = state();
        let point = Point::new(5_000, 12.5);
        let response = append_point(HeaderMap::new(), State(app.clone()), Json(point.clone())).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["count"], 21);
        assert_eq!(app.stream_service.snapshot().last(), Some(&point));

        let bad = append_point(HeaderMap::new(), State(app), Json(Point::new(-1, 1.0))).await;
        assert_eq!(bad.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_transform_over_live_window() {
        let request: TransformRequest = serde_json::from_value(serde_json::json!({
            "maxPoints": 5,
            "emaPeriod": 3,
            "movingAveragePeriod": 3
        }))
        .unwrap();
        let response = transform(HeaderMap::new(), State(state()), Json(request)).await;
        let view = body_json(response).await;

        assert_eq!(view["totalPoints"], 20);
        assert_eq!(view["points"].as_array().unwrap().len(), 5);
        assert_eq!(view["ema"].as_array().unwrap().len(), 20);
        assert_eq!(view["movingAverage"].as_array().unwrap().len(), 18);
    }
}
