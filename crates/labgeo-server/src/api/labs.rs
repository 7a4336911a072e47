use std::sync::Arc;

use axum::{
    extract::{Query, State},
    Extension, Json,
};
use labgeo_core::{format_distance, now_epoch_millis, rank, within_radius, Coordinate, Lab};
use serde::{Deserialize, Serialize};

use crate::middleware::RequestId;

use super::{map_join_error, normalize_limit, ApiError, ApiResponse, AppState, ResponseMeta};

#[derive(Debug, Deserialize)]
pub(super) struct NearbyParams {
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub radius_km: Option<f64>,
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub(super) enum OriginSource {
    Query,
    Cached,
}

#[derive(Debug, Serialize)]
pub(super) struct NearbyLabItem {
    pub id: String,
    pub name: String,
    pub address: Option<String>,
    pub city: Option<String>,
    pub phone: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub tests: Vec<String>,
    pub distance_km: Option<f64>,
    pub distance_label: Option<String>,
}

#[derive(Debug, Serialize)]
pub(super) struct NearbyLabsData {
    pub origin: Coordinate,
    pub origin_source: OriginSource,
    pub labs: Vec<NearbyLabItem>,
}

async fn resolve_origin(
    state: &AppState,
    params: &NearbyParams,
    request_id: &str,
) -> Result<(Coordinate, OriginSource), ApiError> {
    match (params.lat, params.lng) {
        (Some(lat), Some(lng)) => Coordinate::new(lat, lng)
            .map(|origin| (origin, OriginSource::Query))
            .map_err(|e| ApiError::new(request_id, "validation_error", e.to_string())),
        (None, None) => {
            let cache = Arc::clone(&state.cache);
            let max_age = state.location_max_age;
            let cached =
                tokio::task::spawn_blocking(move || cache.load_fresh(now_epoch_millis(), max_age))
                    .await
                    .map_err(|e| map_join_error(request_id, &e))?;
            cached
                .map(|location| (location.coordinate, OriginSource::Cached))
                .ok_or_else(|| {
                    ApiError::new(
                        request_id,
                        "location_required",
                        "pass lat and lng, or acquire a location first",
                    )
                })
        }
        _ => Err(ApiError::new(
            request_id,
            "validation_error",
            "lat and lng must be given together",
        )),
    }
}

pub(super) async fn list_nearby_labs(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(params): Query<NearbyParams>,
) -> Result<Json<ApiResponse<NearbyLabsData>>, ApiError> {
    let (origin, origin_source) = resolve_origin(&state, &params, &req_id.0).await?;

    if let Some(radius_km) = params.radius_km {
        if !radius_km.is_finite() || radius_km < 0.0 {
            return Err(ApiError::new(
                req_id.0,
                "validation_error",
                "radius_km must be a non-negative number",
            ));
        }
    }

    let mut ranked = rank(&origin, state.labs.iter());
    if let Some(radius_km) = params.radius_km {
        ranked = within_radius(ranked, radius_km);
    }
    ranked.truncate(normalize_limit(params.limit, state.default_limit));

    tracing::debug!(
        origin = %origin,
        source = ?origin_source,
        results = ranked.len(),
        "ranked nearby labs"
    );

    let labs = ranked
        .into_iter()
        .map(|r| to_item(r.entity, r.distance_km))
        .collect();

    Ok(Json(ApiResponse {
        data: NearbyLabsData {
            origin,
            origin_source,
            labs,
        },
        meta: ResponseMeta::new(req_id.0),
    }))
}

fn to_item(lab: &Lab, distance_km: Option<f64>) -> NearbyLabItem {
    NearbyLabItem {
        id: lab.id.clone(),
        name: lab.name.clone(),
        address: lab.address.clone(),
        city: lab.city.clone(),
        phone: lab.phone.clone(),
        latitude: lab.latitude,
        longitude: lab.longitude,
        tests: lab.tests.clone(),
        distance_km,
        distance_label: distance_km.map(format_distance),
    }
}
