//! Proximity ranking of service points around an origin.
//!
//! Entities without coordinates are kept and sorted after every entity that
//! has a distance, in their original relative order. The sort is stable, so
//! equal distances keep input order and repeated calls are deterministic.

use std::cmp::Ordering;

use serde::Serialize;

use crate::distance::distance_km;
use crate::geo::Coordinate;

/// Anything that may carry a latitude/longitude pair.
pub trait Locatable {
    fn latitude(&self) -> Option<f64>;
    fn longitude(&self) -> Option<f64>;

    /// Both components as a validated [`Coordinate`]; `None` when either is
    /// missing or out of range.
    fn coordinate(&self) -> Option<Coordinate> {
        Coordinate::new(self.latitude()?, self.longitude()?).ok()
    }
}

impl<T: Locatable + ?Sized> Locatable for &T {
    fn latitude(&self) -> Option<f64> {
        (**self).latitude()
    }

    fn longitude(&self) -> Option<f64> {
        (**self).longitude()
    }
}

/// An entity annotated with its distance from the ranking origin.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedEntity<T> {
    pub entity: T,
    /// `None` iff the entity lacked a valid latitude/longitude pair.
    pub distance_km: Option<f64>,
}

/// Annotate every entity with its distance from `origin` and sort ascending.
#[must_use]
pub fn rank<T, I>(origin: &Coordinate, entities: I) -> Vec<RankedEntity<T>>
where
    T: Locatable,
    I: IntoIterator<Item = T>,
{
    let mut ranked: Vec<RankedEntity<T>> = entities
        .into_iter()
        .map(|entity| {
            let distance = entity.coordinate().map(|c| distance_km(origin, &c));
            RankedEntity {
                entity,
                distance_km: distance,
            }
        })
        .collect();

    ranked.sort_by(|a, b| compare_distance(a.distance_km, b.distance_km));
    ranked
}

/// Keep only ranked entries that are known to lie within `max_km`.
#[must_use]
pub fn within_radius<T>(ranked: Vec<RankedEntity<T>>, max_km: f64) -> Vec<RankedEntity<T>> {
    ranked
        .into_iter()
        .filter(|r| r.distance_km.is_some_and(|d| d <= max_km))
        .collect()
}

/// Rank and truncate to the `limit` nearest entries.
#[must_use]
pub fn nearest<T, I>(origin: &Coordinate, entities: I, limit: usize) -> Vec<RankedEntity<T>>
where
    T: Locatable,
    I: IntoIterator<Item = T>,
{
    let mut ranked = rank(origin, entities);
    ranked.truncate(limit);
    ranked
}

fn compare_distance(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => x.total_cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
