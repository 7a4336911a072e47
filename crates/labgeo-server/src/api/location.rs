use std::sync::Arc;

use axum::{extract::State, http::StatusCode, Extension, Json};
use labgeo_core::{now_epoch_millis, ResolvedLocation};
use serde::Serialize;

use crate::middleware::RequestId;

use super::{map_join_error, ApiError, ApiResponse, AppState, ResponseMeta};

#[derive(Debug, Serialize)]
pub(super) struct CurrentLocationData {
    pub location: ResolvedLocation,
    pub age_secs: i64,
    pub fresh: bool,
}

pub(super) async fn get_location(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Result<Json<ApiResponse<CurrentLocationData>>, ApiError> {
    let cache = Arc::clone(&state.cache);
    let location = tokio::task::spawn_blocking(move || cache.load())
        .await
        .map_err(|e| map_join_error(&req_id.0, &e))?
        .ok_or_else(|| ApiError::new(req_id.0.clone(), "not_found", "no location cached"))?;

    let now = now_epoch_millis();
    let data = CurrentLocationData {
        age_secs: location.age_millis(now) / 1000,
        fresh: location.is_fresh(now, state.location_max_age),
        location,
    };

    Ok(Json(ApiResponse {
        data,
        meta: ResponseMeta::new(req_id.0),
    }))
}

pub(super) async fn clear_location(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Result<StatusCode, ApiError> {
    let cache = Arc::clone(&state.cache);
    tokio::task::spawn_blocking(move || cache.clear())
        .await
        .map_err(|e| map_join_error(&req_id.0, &e))?
        .map_err(|e| {
            tracing::error!(error = %e, "failed to clear cached location");
            ApiError::new(req_id.0.clone(), "internal_error", "failed to clear cached location")
        })?;
    Ok(StatusCode::NO_CONTENT)
}
