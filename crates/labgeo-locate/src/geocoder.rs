//! Reverse geocoding: coordinate to place description.
//!
//! One HTTP attempt per call, no retries. Any lookup failure degrades to a
//! [`GeocodeOutcome::Fallback`] carrying placeholder text; only explicit
//! cancellation produces no location at all.

use std::time::Duration;

use labgeo_core::{now_epoch_millis, Coordinate, ResolvedLocation};
use reqwest::{Client, Url};
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use crate::error::GeocodeError;

pub const DEFAULT_GEOCODER_URL: &str = labgeo_core::config::DEFAULT_GEOCODER_URL;

pub const FALLBACK_CITY: &str = "Unknown city";
pub const FALLBACK_STATE: &str = "Unknown state";
pub const FALLBACK_COUNTRY: &str = "Unknown country";

/// Result of a reverse-geocoding attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum GeocodeOutcome {
    /// The lookup succeeded.
    Resolved(ResolvedLocation),
    /// The lookup failed; `location` holds the input coordinate and placeholders.
    Fallback {
        location: ResolvedLocation,
        reason: String,
    },
    Cancelled,
}

impl GeocodeOutcome {
    /// The location carried by this outcome, if any.
    #[must_use]
    pub fn location(&self) -> Option<&ResolvedLocation> {
        match self {
            GeocodeOutcome::Resolved(location) | GeocodeOutcome::Fallback { location, .. } => {
                Some(location)
            }
            GeocodeOutcome::Cancelled => None,
        }
    }
}

/// Place fields returned by the lookup endpoint.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct PlaceResponse {
    locality: Option<String>,
    city: Option<String>,
    principal_subdivision: Option<String>,
    country_name: Option<String>,
    postcode: Option<String>,
}

impl PlaceResponse {
    fn into_location(self, coordinate: Coordinate, acquired_at: i64) -> ResolvedLocation {
        let locality = non_empty(self.locality);
        let city = non_empty(self.city);
        let state = non_empty(self.principal_subdivision);
        let country = non_empty(self.country_name);

        let mut parts: Vec<&str> = Vec::new();
        for part in [&locality, &city, &state, &country].into_iter().flatten() {
            if !parts.contains(&part.as_str()) {
                parts.push(part);
            }
        }
        let address = if parts.is_empty() {
            coordinate.to_string()
        } else {
            parts.join(", ")
        };

        ResolvedLocation {
            coordinate,
            address,
            city: city
                .or(locality)
                .unwrap_or_else(|| FALLBACK_CITY.to_string()),
            state: state.unwrap_or_else(|| FALLBACK_STATE.to_string()),
            country: country.unwrap_or_else(|| FALLBACK_COUNTRY.to_string()),
            postal_code: non_empty(self.postcode).unwrap_or_default(),
            acquired_at_epoch_millis: acquired_at,
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// The degraded location used when the lookup fails.
#[must_use]
pub fn fallback_location(coordinate: Coordinate, acquired_at: i64) -> ResolvedLocation {
    ResolvedLocation {
        coordinate,
        address: coordinate.to_string(),
        city: FALLBACK_CITY.to_string(),
        state: FALLBACK_STATE.to_string(),
        country: FALLBACK_COUNTRY.to_string(),
        postal_code: String::new(),
        acquired_at_epoch_millis: acquired_at,
    }
}

/// HTTP reverse-geocoding client.
///
/// Use [`ReverseGeocoder::new`] for the default provider or
/// [`ReverseGeocoder::with_base_url`] to point at another provider or a mock
/// server.
pub struct ReverseGeocoder {
    client: Client,
    base_url: Url,
}

impl ReverseGeocoder {
    /// # Errors
    ///
    /// Returns [`GeocodeError::Http`] if the `reqwest::Client` cannot be built.
    pub fn new(timeout_secs: u64, user_agent: &str) -> Result<Self, GeocodeError> {
        Self::with_base_url(DEFAULT_GEOCODER_URL, timeout_secs, user_agent)
    }

    /// # Errors
    ///
    /// Returns [`GeocodeError::Http`] if the `reqwest::Client` cannot be built,
    /// or [`GeocodeError::InvalidBaseUrl`] if `base_url` does not parse.
    pub fn with_base_url(
        base_url: &str,
        timeout_secs: u64,
        user_agent: &str,
    ) -> Result<Self, GeocodeError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(5))
            .user_agent(user_agent)
            .build()?;

        let base_url = Url::parse(base_url).map_err(|e| GeocodeError::InvalidBaseUrl {
            url: base_url.to_string(),
            reason: e.to_string(),
        })?;

        Ok(Self { client, base_url })
    }

    /// Resolve `coordinate` into a place description.
    ///
    /// Never fails: lookup errors produce [`GeocodeOutcome::Fallback`], and a
    /// fired `cancel` token produces [`GeocodeOutcome::Cancelled`].
    pub async fn resolve(
        &self,
        coordinate: Coordinate,
        cancel: &CancellationToken,
    ) -> GeocodeOutcome {
        let acquired_at = now_epoch_millis();

        let result = tokio::select! {
            biased;
            () = cancel.cancelled() => return GeocodeOutcome::Cancelled,
            result = self.lookup(&coordinate) => result,
        };

        match result {
            Ok(place) => GeocodeOutcome::Resolved(place.into_location(coordinate, acquired_at)),
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    latitude = coordinate.latitude(),
                    longitude = coordinate.longitude(),
                    "reverse geocoding failed, using fallback place"
                );
                GeocodeOutcome::Fallback {
                    location: fallback_location(coordinate, acquired_at),
                    reason: e.to_string(),
                }
            }
        }
    }

    fn build_url(&self, coordinate: &Coordinate) -> Url {
        let mut url = self.base_url.clone();
        url.query_pairs_mut()
            .append_pair("latitude", &coordinate.latitude().to_string())
            .append_pair("longitude", &coordinate.longitude().to_string())
            .append_pair("localityLanguage", "en");
        url
    }

    async fn lookup(&self, coordinate: &Coordinate) -> Result<PlaceResponse, GeocodeError> {
        let url = self.build_url(coordinate);
        let response = self.client.get(url.clone()).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(GeocodeError::UnexpectedStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| GeocodeError::Deserialize {
            context: url.to_string(),
            source: e,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coord() -> Coordinate {
        Coordinate::new(22.3072, 73.1812).unwrap()
    }

    #[test]
    fn build_url_appends_coordinates() {
        let geocoder =
            ReverseGeocoder::with_base_url("https://geo.example.com/reverse", 5, "test").unwrap();
        let url = geocoder.build_url(&coord());
        assert_eq!(
            url.as_str(),
            "https://geo.example.com/reverse?latitude=22.3072&longitude=73.1812&localityLanguage=en"
        );
    }

    #[test]
    fn invalid_base_url_is_rejected() {
        let result = ReverseGeocoder::with_base_url("not a url", 5, "test");
        assert!(matches!(result, Err(GeocodeError::InvalidBaseUrl { .. })));
    }

    #[test]
    fn place_city_falls_back_to_locality() {
        let place = PlaceResponse {
            locality: Some("Alkapuri".into()),
            city: Some(String::new()),
            principal_subdivision: Some("Gujarat".into()),
            country_name: Some("India".into()),
            postcode: None,
        };
        let loc = place.into_location(coord(), 7);
        assert_eq!(loc.city, "Alkapuri");
        assert_eq!(loc.address, "Alkapuri, Gujarat, India");
        assert_eq!(loc.postal_code, "");
        assert_eq!(loc.acquired_at_epoch_millis, 7);
    }

    #[test]
    fn place_address_skips_duplicate_parts() {
        let place = PlaceResponse {
            locality: Some("Vadodara".into()),
            city: Some("Vadodara".into()),
            principal_subdivision: Some("Gujarat".into()),
            country_name: Some("India".into()),
            postcode: Some("390007".into()),
        };
        let loc = place.into_location(coord(), 0);
        assert_eq!(loc.address, "Vadodara, Gujarat, India");
        assert_eq!(loc.postal_code, "390007");
    }

    #[test]
    fn empty_place_uses_placeholders() {
        let loc = PlaceResponse::default().into_location(coord(), 0);
        assert_eq!(loc.city, FALLBACK_CITY);
        assert_eq!(loc.state, FALLBACK_STATE);
        assert_eq!(loc.country, FALLBACK_COUNTRY);
        assert_eq!(loc.address, "22.3072, 73.1812");
    }

    #[test]
    fn fallback_location_keeps_coordinate() {
        let loc = fallback_location(coord(), 42);
        assert_eq!(loc.coordinate, coord());
        assert_eq!(loc.city, FALLBACK_CITY);
        assert_eq!(loc.acquired_at_epoch_millis, 42);
    }
}
