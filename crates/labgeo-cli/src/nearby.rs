//! `nearby` command handler.

use std::time::Duration;

use labgeo_core::{
    format_distance, load_labs, now_epoch_millis, rank, within_radius, AppConfig, Coordinate, Lab,
    RankedEntity,
};

use crate::locate::open_cache;

#[derive(Debug)]
pub(crate) struct NearbyQuery {
    pub(crate) origin: Option<(f64, f64)>,
    pub(crate) radius_km: Option<f64>,
    pub(crate) limit: usize,
    pub(crate) test: Option<String>,
}

/// Print labs ordered by distance from the query origin or the cached location.
///
/// # Errors
///
/// Returns an error if no origin is available, the origin is out of range, or
/// the lab directory cannot be loaded.
pub(crate) fn run_nearby(config: &AppConfig, query: &NearbyQuery) -> anyhow::Result<()> {
    let origin = match query.origin {
        Some((lat, lng)) => Coordinate::new(lat, lng)?,
        None => {
            let max_age = Duration::from_secs(config.location_max_age_secs);
            open_cache(config)
                .load_fresh(now_epoch_millis(), max_age)
                .map(|location| location.coordinate)
                .ok_or_else(|| {
                    anyhow::anyhow!(
                        "no recent location; run `labgeo-cli locate` or pass --lat/--lng"
                    )
                })?
        }
    };

    let labs = load_labs(&config.labs_path)?.labs;
    let ranked = select_nearby(&origin, &labs, query);

    if ranked.is_empty() {
        println!("no labs found near {origin}");
        return Ok(());
    }

    println!("{:<10}{:<32}CITY", "DISTANCE", "LAB");
    for line in ranked.iter().map(format_ranked_line) {
        println!("{line}");
    }
    Ok(())
}

pub(crate) fn select_nearby<'a>(
    origin: &Coordinate,
    labs: &'a [Lab],
    query: &NearbyQuery,
) -> Vec<RankedEntity<&'a Lab>> {
    let needle = query.test.as_deref().map(str::to_lowercase);
    let candidates = labs.iter().filter(|lab| match &needle {
        Some(needle) => lab
            .tests
            .iter()
            .any(|t| t.to_lowercase().contains(needle.as_str())),
        None => true,
    });

    let mut ranked = rank(origin, candidates);
    if let Some(radius_km) = query.radius_km {
        ranked = within_radius(ranked, radius_km);
    }
    ranked.truncate(query.limit);
    ranked
}

pub(crate) fn format_ranked_line(ranked: &RankedEntity<&Lab>) -> String {
    let distance = ranked
        .distance_km
        .map_or_else(|| "-".to_string(), format_distance);
    let city = ranked.entity.city.as_deref().unwrap_or("-");
    format!("{distance:<10}{:<32}{city}", ranked.entity.name)
}
