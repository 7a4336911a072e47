//! `locate` and `location` command handlers.

use std::sync::Arc;
use std::time::Duration;

use labgeo_core::{now_epoch_millis, AppConfig, ResolvedLocation};
use labgeo_locate::{
    permission_guidance, AcquireOptions, ClientPlatform, FileStore, FixedPlatform,
    GeolocationAcquirer, GeolocationError, IpLocator, LocateError, LocationCache,
    LocationPlatform, LocationService, ReverseGeocoder, UnsupportedPlatform,
};

pub(crate) fn open_cache(config: &AppConfig) -> LocationCache {
    LocationCache::new(Arc::new(FileStore::new(&config.cache_path)))
}

/// Wire a `LocationService` from configuration.
///
/// A host without a location API gets `UnsupportedPlatform`, so only the
/// IP-based approximate source can produce a fix.
pub(crate) fn build_service(
    config: &AppConfig,
    platform: Arc<dyn LocationPlatform>,
    no_fallback: bool,
) -> anyhow::Result<LocationService> {
    let geocoder = ReverseGeocoder::with_base_url(
        &config.geocoder_url,
        config.geocoder_timeout_secs,
        &config.user_agent,
    )?;

    let mut acquirer = GeolocationAcquirer::new(platform);
    if let Some(url) = &config.ip_locator_url {
        let locator = IpLocator::new(url, config.geocoder_timeout_secs, &config.user_agent)?;
        acquirer = acquirer.with_approximate(Arc::new(locator));
    }

    let mut options = AcquireOptions::from_app_config(config);
    if no_fallback {
        options.fallback_to_approximate = false;
    }

    Ok(LocationService::new(
        acquirer,
        geocoder,
        open_cache(config),
        options,
    ))
}

/// Acquire a location, resolve it and cache it.
///
/// `fix` is `(latitude, longitude, accuracy_meters)` when the caller already
/// knows where the device is.
///
/// # Errors
///
/// Returns an error if no coordinate could be acquired or the cache write fails.
pub(crate) async fn run_locate(
    config: &AppConfig,
    fix: Option<(f64, f64, Option<f64>)>,
    no_fallback: bool,
) -> anyhow::Result<()> {
    let platform: Arc<dyn LocationPlatform> = match fix {
        Some((lat, lng, accuracy)) => Arc::new(FixedPlatform::new(lat, lng, accuracy)),
        None => Arc::new(UnsupportedPlatform),
    };
    let service = build_service(config, platform, no_fallback)?;

    let update = match service.refresh().await {
        Ok(update) => update,
        Err(LocateError::Geolocation(err)) => {
            tracing::warn!(
                error = %err,
                retriable = err.is_retriable(),
                "location acquisition failed"
            );
            eprintln!("{}", err.user_message());
            if err == GeolocationError::PermissionDenied {
                eprintln!("{}", permission_guidance(ClientPlatform::current()));
            }
            anyhow::bail!("location unavailable: {err}");
        }
        Err(err) => return Err(err.into()),
    };

    tracing::debug!(
        city = %update.location.city,
        degraded = update.is_degraded(),
        cache = %config.cache_path.display(),
        "location cached"
    );
    if let Some(reason) = &update.fallback_reason {
        eprintln!("warning: place lookup failed ({reason}); showing coordinates only");
    }
    print_location(&update.location);
    Ok(())
}

pub(crate) fn run_location_show(config: &AppConfig) {
    let Some(location) = open_cache(config).load() else {
        println!("no cached location; run `labgeo-cli locate` first");
        return;
    };

    print_location(&location);
    let max_age = Duration::from_secs(config.location_max_age_secs);
    if !location.is_fresh(now_epoch_millis(), max_age) {
        println!("(stale: older than {}s)", config.location_max_age_secs);
    }
}

/// # Errors
///
/// Returns an error if the cache file cannot be rewritten.
pub(crate) fn run_location_clear(config: &AppConfig) -> anyhow::Result<()> {
    open_cache(config).clear()?;
    tracing::info!(cache = %config.cache_path.display(), "cached location cleared");
    println!("cached location cleared");
    Ok(())
}

fn print_location(location: &ResolvedLocation) {
    for line in describe_location(location) {
        println!("{line}");
    }
}

pub(crate) fn describe_location(location: &ResolvedLocation) -> Vec<String> {
    let mut lines = vec![
        format!("Address:     {}", location.address),
        format!("City:        {}", location.city),
        format!("State:       {}", location.state),
        format!("Country:     {}", location.country),
    ];
    if !location.postal_code.is_empty() {
        lines.push(format!("Postal code: {}", location.postal_code));
    }
    let coordinate = &location.coordinate;
    lines.push(match coordinate.accuracy_meters() {
        Some(accuracy) => format!("Coordinate:  {coordinate} (±{accuracy:.0} m)"),
        None => format!("Coordinate:  {coordinate}"),
    });
    if let Some(at) = location.acquired_at() {
        lines.push(format!("Acquired:    {}", at.format("%Y-%m-%d %H:%M:%S UTC")));
    }
    lines
}
