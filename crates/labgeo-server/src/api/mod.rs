mod labs;
mod location;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::State,
    http::{header, HeaderName, Method, StatusCode},
    response::IntoResponse,
    routing::get,
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use labgeo_core::{AppConfig, Lab};
use labgeo_locate::LocationCache;
use serde::Serialize;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::middleware::{request_id, RequestId};

const MAX_NEARBY_LIMIT: usize = 100;

#[derive(Clone)]
pub struct AppState {
    pub labs: Arc<Vec<Lab>>,
    pub cache: Arc<LocationCache>,
    /// Cached locations older than this are not used as a ranking origin.
    pub location_max_age: Duration,
    pub default_limit: usize,
}

impl AppState {
    #[must_use]
    pub fn new(labs: Vec<Lab>, cache: LocationCache, config: &AppConfig) -> Self {
        Self {
            labs: Arc::new(labs),
            cache: Arc::new(cache),
            location_max_age: Duration::from_secs(config.location_max_age_secs),
            default_limit: config.nearby_default_limit,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub data: T,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
pub struct ResponseMeta {
    pub request_id: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: ErrorBody,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
struct HealthData {
    status: &'static str,
    labs: usize,
}

impl ResponseMeta {
    pub(super) fn new(request_id: String) -> Self {
        Self {
            request_id,
            timestamp: Utc::now(),
        }
    }
}

impl ApiError {
    pub fn new(
        request_id: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            error: ErrorBody {
                code: code.into(),
                message: message.into(),
            },
            meta: ResponseMeta::new(request_id.into()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = match self.error.code.as_str() {
            "not_found" => StatusCode::NOT_FOUND,
            "bad_request" | "validation_error" | "location_required" => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(self)).into_response()
    }
}

pub(super) fn normalize_limit(limit: Option<usize>, default: usize) -> usize {
    limit.unwrap_or(default).clamp(1, MAX_NEARBY_LIMIT)
}

/// Cache access runs on the blocking pool because `FileStore` uses `std::fs`.
pub(super) fn map_join_error(request_id: &str, error: &tokio::task::JoinError) -> ApiError {
    tracing::error!(error = %error, "cache task failed");
    ApiError::new(request_id, "internal_error", "location cache unavailable")
}

fn build_cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, HeaderName::from_static("x-request-id")])
}

pub fn build_app(state: AppState) -> Router {
    Router::new()
        .route("/api/v1/health", get(health))
        .route("/api/v1/labs/nearby", get(labs::list_nearby_labs))
        .route(
            "/api/v1/location",
            get(location::get_location).delete(location::clear_location),
        )
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(build_cors())
                .layer(axum::middleware::from_fn(request_id)),
        )
        .with_state(state)
}

async fn health(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> impl IntoResponse {
    Json(ApiResponse {
        data: HealthData {
            status: "ok",
            labs: state.labs.len(),
        },
        meta: ResponseMeta::new(req_id.0),
    })
}
