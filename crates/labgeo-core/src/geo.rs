//! Geographic value types shared by the acquisition, caching and ranking layers.
//!
//! A [`Coordinate`] can only be built from in-range values, so "unknown" is
//! always expressed as `Option<Coordinate>` and never as a `0,0` sentinel.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum CoordinateError {
    #[error("latitude {0} is outside [-90, 90]")]
    Latitude(f64),

    #[error("longitude {0} is outside [-180, 180]")]
    Longitude(f64),

    #[error("accuracy {0} must be a non-negative number of metres")]
    Accuracy(f64),
}

/// A validated latitude/longitude pair with an optional accuracy radius.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawCoordinate", rename_all = "camelCase")]
pub struct Coordinate {
    latitude: f64,
    longitude: f64,
    accuracy_meters: Option<f64>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawCoordinate {
    latitude: f64,
    longitude: f64,
    #[serde(default)]
    accuracy_meters: Option<f64>,
}

impl TryFrom<RawCoordinate> for Coordinate {
    type Error = CoordinateError;

    fn try_from(raw: RawCoordinate) -> Result<Self, Self::Error> {
        let coordinate = Self::new(raw.latitude, raw.longitude)?;
        match raw.accuracy_meters {
            Some(meters) => coordinate.with_accuracy(meters),
            None => Ok(coordinate),
        }
    }
}

impl Coordinate {
    /// Builds a coordinate, rejecting out-of-range or non-finite values.
    ///
    /// # Errors
    ///
    /// Returns [`CoordinateError::Latitude`] or [`CoordinateError::Longitude`]
    /// when a component is outside its valid range.
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, CoordinateError> {
        if !(-90.0..=90.0).contains(&latitude) {
            return Err(CoordinateError::Latitude(latitude));
        }
        if !(-180.0..=180.0).contains(&longitude) {
            return Err(CoordinateError::Longitude(longitude));
        }
        Ok(Self {
            latitude,
            longitude,
            accuracy_meters: None,
        })
    }

    /// Returns a copy carrying the given accuracy radius in metres.
    ///
    /// # Errors
    ///
    /// Returns [`CoordinateError::Accuracy`] for negative or non-finite values.
    pub fn with_accuracy(self, meters: f64) -> Result<Self, CoordinateError> {
        if !meters.is_finite() || meters < 0.0 {
            return Err(CoordinateError::Accuracy(meters));
        }
        Ok(Self {
            accuracy_meters: Some(meters),
            ..self
        })
    }

    #[must_use]
    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    #[must_use]
    pub fn longitude(&self) -> f64 {
        self.longitude
    }

    #[must_use]
    pub fn accuracy_meters(&self) -> Option<f64> {
        self.accuracy_meters
    }
}

impl std::fmt::Display for Coordinate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.4}, {:.4}", self.latitude, self.longitude)
    }
}

/// Last known authorization decision for location access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionState {
    Granted,
    Denied,
    Prompt,
    Unsupported,
}

impl std::fmt::Display for PermissionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PermissionState::Granted => write!(f, "granted"),
            PermissionState::Denied => write!(f, "denied"),
            PermissionState::Prompt => write!(f, "prompt"),
            PermissionState::Unsupported => write!(f, "unsupported"),
        }
    }
}

/// A coordinate enriched with a place description and acquisition time.
///
/// Each acquisition produces a new value; cached values are replaced
/// wholesale, never patched field by field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedLocation {
    pub coordinate: Coordinate,
    pub address: String,
    pub city: String,
    pub state: String,
    pub country: String,
    pub postal_code: String,
    pub acquired_at_epoch_millis: i64,
}

impl ResolvedLocation {
    /// Milliseconds elapsed since acquisition, clamped at zero for clock skew.
    #[must_use]
    pub fn age_millis(&self, now_epoch_millis: i64) -> i64 {
        now_epoch_millis
            .saturating_sub(self.acquired_at_epoch_millis)
            .max(0)
    }

    /// Whether the location is younger than `max_age` at `now_epoch_millis`.
    #[must_use]
    pub fn is_fresh(&self, now_epoch_millis: i64, max_age: Duration) -> bool {
        let max_age_ms = i64::try_from(max_age.as_millis()).unwrap_or(i64::MAX);
        self.age_millis(now_epoch_millis) <= max_age_ms
    }

    #[must_use]
    pub fn acquired_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.acquired_at_epoch_millis)
    }
}

/// Current wall-clock time in epoch milliseconds.
#[must_use]
pub fn now_epoch_millis() -> i64 {
    Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vadodara() -> Coordinate {
        Coordinate::new(22.3072, 73.1812).unwrap()
    }

    #[test]
    fn coordinate_rejects_out_of_range_latitude() {
        assert_eq!(
            Coordinate::new(90.5, 0.0),
            Err(CoordinateError::Latitude(90.5))
        );
    }

    #[test]
    fn coordinate_rejects_out_of_range_longitude() {
        assert_eq!(
            Coordinate::new(0.0, -180.01),
            Err(CoordinateError::Longitude(-180.01))
        );
    }

    #[test]
    fn coordinate_rejects_nan() {
        assert!(Coordinate::new(f64::NAN, 0.0).is_err());
        assert!(Coordinate::new(0.0, f64::INFINITY).is_err());
    }

    #[test]
    fn coordinate_accepts_boundaries() {
        assert!(Coordinate::new(-90.0, -180.0).is_ok());
        assert!(Coordinate::new(90.0, 180.0).is_ok());
    }

    #[test]
    fn with_accuracy_rejects_negative() {
        assert!(vadodara().with_accuracy(-1.0).is_err());
        let c = vadodara().with_accuracy(12.5).unwrap();
        assert_eq!(c.accuracy_meters(), Some(12.5));
    }

    #[test]
    fn coordinate_deserialize_validates_ranges() {
        let ok: Coordinate =
            serde_json::from_str(r#"{"latitude":22.3072,"longitude":73.1812}"#).unwrap();
        assert_eq!(ok, vadodara());

        let bad = serde_json::from_str::<Coordinate>(r#"{"latitude":123.0,"longitude":0.0}"#);
        assert!(bad.is_err(), "out-of-range latitude must not deserialize");
    }

    #[test]
    fn resolved_location_serializes_camel_case() {
        let loc = ResolvedLocation {
            coordinate: vadodara().with_accuracy(20.0).unwrap(),
            address: "Alkapuri, Vadodara".to_string(),
            city: "Vadodara".to_string(),
            state: "Gujarat".to_string(),
            country: "India".to_string(),
            postal_code: "390007".to_string(),
            acquired_at_epoch_millis: 1_700_000_000_000,
        };
        let json = serde_json::to_value(&loc).unwrap();
        assert_eq!(json["postalCode"], "390007");
        assert_eq!(json["acquiredAtEpochMillis"], 1_700_000_000_000_i64);
        assert_eq!(json["coordinate"]["accuracyMeters"], 20.0);

        let back: ResolvedLocation = serde_json::from_value(json).unwrap();
        assert_eq!(back, loc);
    }

    #[test]
    fn freshness_uses_injected_window() {
        let loc = ResolvedLocation {
            coordinate: vadodara(),
            address: String::new(),
            city: String::new(),
            state: String::new(),
            country: String::new(),
            postal_code: String::new(),
            acquired_at_epoch_millis: 1_000_000,
        };
        let five_min = Duration::from_secs(300);
        let ten_min = Duration::from_secs(600);
        let now = 1_000_000 + 7 * 60 * 1000;
        assert!(!loc.is_fresh(now, five_min));
        assert!(loc.is_fresh(now, ten_min));
        // Clock went backwards: age clamps to zero.
        assert_eq!(loc.age_millis(0), 0);
    }
}
