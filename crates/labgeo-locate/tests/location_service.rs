//! End-to-end tests for `LocationService`: acquire → resolve → cache.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, OnceLock, Weak};
use std::time::Duration;

use futures::future::BoxFuture;
use labgeo_core::{Lab, PermissionState, ResolvedLocation};
use labgeo_locate::cache::LOCATION_KEY;
use labgeo_locate::geocoder::FALLBACK_CITY;
use labgeo_locate::{
    AcquireOptions, FileStore, FixedPlatform, GeolocationAcquirer, GeolocationError,
    KeyValueStore, LocateError, LocationCache, LocationPlatform, LocationService, MemoryStore,
    PlatformError, PositionRequest, RawPosition, ReverseGeocoder,
};
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Platform whose first request is slow and whose later requests answer at once.
struct SlowThenFastPlatform {
    calls: AtomicU32,
}

impl LocationPlatform for SlowThenFastPlatform {
    fn is_supported(&self) -> bool {
        true
    }

    fn permission_state(&self) -> BoxFuture<'_, PermissionState> {
        Box::pin(async { PermissionState::Granted })
    }

    fn current_position<'a>(
        &'a self,
        _request: &'a PositionRequest,
    ) -> BoxFuture<'a, Result<RawPosition, PlatformError>> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        Box::pin(async move {
            if call == 0 {
                tokio::time::sleep(Duration::from_millis(500)).await;
                Ok(RawPosition {
                    latitude: 19.0760,
                    longitude: 72.8777,
                    accuracy_meters: None,
                })
            } else {
                Ok(RawPosition {
                    latitude: 22.3072,
                    longitude: 73.1812,
                    accuracy_meters: Some(8.0),
                })
            }
        })
    }
}

struct DeniedPlatform;

impl LocationPlatform for DeniedPlatform {
    fn is_supported(&self) -> bool {
        true
    }

    fn permission_state(&self) -> BoxFuture<'_, PermissionState> {
        Box::pin(async { PermissionState::Denied })
    }

    fn current_position<'a>(
        &'a self,
        _request: &'a PositionRequest,
    ) -> BoxFuture<'a, Result<RawPosition, PlatformError>> {
        panic!("a denied permission must never be prompted");
    }
}

/// Reports a denial, but cancels the owning service while answering, as if a
/// newer refresh had started in the meantime.
#[derive(Default)]
struct DeniedAfterCancelPlatform {
    service: OnceLock<Weak<LocationService>>,
}

impl LocationPlatform for DeniedAfterCancelPlatform {
    fn is_supported(&self) -> bool {
        true
    }

    fn permission_state(&self) -> BoxFuture<'_, PermissionState> {
        Box::pin(async move {
            if let Some(service) = self.service.get().and_then(Weak::upgrade) {
                service.cancel();
            }
            PermissionState::Denied
        })
    }

    fn current_position<'a>(
        &'a self,
        _request: &'a PositionRequest,
    ) -> BoxFuture<'a, Result<RawPosition, PlatformError>> {
        panic!("a denied permission must never be prompted");
    }
}

struct HangingPlatform;

impl LocationPlatform for HangingPlatform {
    fn is_supported(&self) -> bool {
        true
    }

    fn permission_state(&self) -> BoxFuture<'_, PermissionState> {
        Box::pin(async { PermissionState::Granted })
    }

    fn current_position<'a>(
        &'a self,
        _request: &'a PositionRequest,
    ) -> BoxFuture<'a, Result<RawPosition, PlatformError>> {
        Box::pin(std::future::pending::<Result<RawPosition, PlatformError>>())
    }
}

fn options() -> AcquireOptions {
    AcquireOptions {
        timeout_ms: 5_000,
        fallback_to_approximate: false,
        ..AcquireOptions::default()
    }
}

async fn geocoder_server(status: u16) -> MockServer {
    let server = MockServer::start().await;
    let template = if status == 200 {
        ResponseTemplate::new(200).set_body_json(json!({
            "locality": "Alkapuri",
            "city": "Vadodara",
            "principalSubdivision": "Gujarat",
            "countryName": "India",
            "postcode": "390007"
        }))
    } else {
        ResponseTemplate::new(status)
    };
    Mock::given(method("GET"))
        .and(path("/reverse"))
        .respond_with(template)
        .mount(&server)
        .await;
    server
}

fn geocoder(server: &MockServer) -> ReverseGeocoder {
    ReverseGeocoder::with_base_url(&format!("{}/reverse", server.uri()), 5, "labgeo-test")
        .expect("geocoder construction should not fail")
}

fn service(
    platform: Arc<dyn LocationPlatform>,
    server: &MockServer,
    store: Arc<dyn KeyValueStore>,
) -> LocationService {
    LocationService::new(
        GeolocationAcquirer::new(platform),
        geocoder(server),
        LocationCache::new(store),
        options(),
    )
}

#[tokio::test]
async fn fallback_location_is_cached_and_loads_back_exactly() {
    let server = geocoder_server(500).await;
    let store = Arc::new(MemoryStore::new());
    let svc = service(
        Arc::new(FixedPlatform::new(22.3072, 73.1812, None)),
        &server,
        store.clone(),
    );

    let update = svc.refresh().await.expect("refresh should succeed");
    assert!(update.is_degraded());
    assert_eq!(update.location.city, FALLBACK_CITY);
    assert_eq!(update.location.coordinate.latitude(), 22.3072);
    assert_eq!(update.location.coordinate.longitude(), 73.1812);

    let loaded = LocationCache::new(store).load();
    assert_eq!(loaded, Some(update.location.clone()));
    assert_eq!(svc.current(), Some(update.location));
    assert!(svc.permission_granted());
}

#[tokio::test]
async fn resolved_location_survives_restart() {
    let server = geocoder_server(200).await;
    let dir = tempfile::tempdir().unwrap();
    let cache_path = dir.path().join("location.json");

    let first = service(
        Arc::new(FixedPlatform::new(22.3072, 73.1812, Some(15.0))),
        &server,
        Arc::new(FileStore::new(&cache_path)),
    );
    let update = first.refresh().await.unwrap();
    assert!(!update.is_degraded());
    assert_eq!(update.location.city, "Vadodara");

    let restarted = service(
        Arc::new(FixedPlatform::new(0.0, 0.0, None)),
        &server,
        Arc::new(FileStore::new(&cache_path)),
    );
    assert_eq!(restarted.current(), Some(update.location));
}

#[tokio::test]
async fn permission_denied_clears_cache() {
    let server = geocoder_server(200).await;
    let store = Arc::new(MemoryStore::new());
    let stale: ResolvedLocation = serde_json::from_value(json!({
        "coordinate": { "latitude": 22.0, "longitude": 73.0 },
        "address": "Old place",
        "city": "Old city",
        "state": "Gujarat",
        "country": "India",
        "postalCode": "",
        "acquiredAtEpochMillis": 1
    }))
    .unwrap();
    LocationCache::new(store.clone()).save(stale).unwrap();

    let svc = service(Arc::new(DeniedPlatform), &server, store.clone());
    assert!(svc.current().is_some(), "cache should prime current location");

    let err = svc.refresh().await.unwrap_err();
    assert!(matches!(
        err,
        LocateError::Geolocation(GeolocationError::PermissionDenied)
    ));
    assert!(svc.current().is_none());
    assert_eq!(store.get(LOCATION_KEY).unwrap(), None);
    assert!(!svc.permission_granted());
}

#[tokio::test]
async fn superseded_denial_keeps_cache() {
    let server = geocoder_server(200).await;
    let store = Arc::new(MemoryStore::new());
    let kept: ResolvedLocation = serde_json::from_value(json!({
        "coordinate": { "latitude": 22.0, "longitude": 73.0 },
        "address": "Kept place",
        "city": "Vadodara",
        "state": "Gujarat",
        "country": "India",
        "postalCode": "390007",
        "acquiredAtEpochMillis": 1
    }))
    .unwrap();
    LocationCache::new(store.clone()).save(kept.clone()).unwrap();

    let platform = Arc::new(DeniedAfterCancelPlatform::default());
    let svc = Arc::new(service(platform.clone(), &server, store.clone()));
    assert!(platform.service.set(Arc::downgrade(&svc)).is_ok());

    let err = svc.refresh().await.unwrap_err();

    assert!(matches!(err, LocateError::Cancelled), "got {err:?}");
    assert_eq!(svc.current(), Some(kept.clone()));
    assert_eq!(LocationCache::new(store).load(), Some(kept));
}

#[tokio::test]
async fn newer_refresh_cancels_older_one() {
    let server = geocoder_server(200).await;
    let store = Arc::new(MemoryStore::new());
    let svc = service(
        Arc::new(SlowThenFastPlatform {
            calls: AtomicU32::new(0),
        }),
        &server,
        store.clone(),
    );

    let (older, newer) = tokio::join!(svc.refresh(), async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        svc.refresh().await
    });

    assert!(matches!(older, Err(LocateError::Cancelled)), "got {older:?}");
    let newer = newer.expect("newer refresh should complete");
    assert_eq!(newer.location.coordinate.latitude(), 22.3072);

    let cached = LocationCache::new(store).load().unwrap();
    assert_eq!(cached.coordinate.latitude(), 22.3072);
}

#[tokio::test]
async fn cancel_commits_nothing() {
    let server = geocoder_server(200).await;
    let store = Arc::new(MemoryStore::new());
    let svc = service(Arc::new(HangingPlatform), &server, store.clone());

    let (result, ()) = tokio::join!(svc.refresh(), async {
        tokio::time::sleep(Duration::from_millis(30)).await;
        svc.cancel();
    });

    assert!(matches!(result, Err(LocateError::Cancelled)));
    assert!(svc.current().is_none());
    assert_eq!(store.get(LOCATION_KEY).unwrap(), None);
}

#[tokio::test]
async fn clear_forgets_location() {
    let server = geocoder_server(200).await;
    let store = Arc::new(MemoryStore::new());
    let svc = service(
        Arc::new(FixedPlatform::new(22.3072, 73.1812, None)),
        &server,
        store.clone(),
    );
    svc.refresh().await.unwrap();

    svc.clear().unwrap();
    assert!(svc.current().is_none());
    assert!(!svc.permission_granted());
    assert!(LocationCache::new(store).load().is_none());
}

#[tokio::test]
async fn rank_nearby_uses_current_location() {
    let server = geocoder_server(200).await;
    let svc = service(
        Arc::new(FixedPlatform::new(22.3072, 73.1812, None)),
        &server,
        Arc::new(MemoryStore::new()),
    );

    let labs = vec![
        Lab {
            id: "mumbai".into(),
            name: "Mumbai Central Lab".into(),
            address: None,
            city: Some("Mumbai".into()),
            phone: None,
            latitude: Some(19.0760),
            longitude: Some(72.8777),
            tests: vec![],
        },
        Lab {
            id: "alkapuri".into(),
            name: "Alkapuri Diagnostics".into(),
            address: None,
            city: Some("Vadodara".into()),
            phone: None,
            latitude: Some(22.3082),
            longitude: Some(73.1822),
            tests: vec!["CBC".into()],
        },
    ];

    assert!(svc.rank_nearby(&labs).is_none(), "no location yet");

    svc.refresh().await.unwrap();
    let ranked = svc.rank_nearby(&labs).expect("location is known");
    assert_eq!(ranked[0].entity.id, "alkapuri");
    assert!(ranked[0].distance_km.unwrap() < 0.2);
    assert!(svc.current_fresh(Duration::from_secs(600)).is_some());
}
