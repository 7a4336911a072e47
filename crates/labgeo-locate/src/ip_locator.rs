//! Approximate location from the caller's public IP address.

use std::time::Duration;

use futures::future::BoxFuture;
use labgeo_core::PermissionState;
use reqwest::{Client, Url};
use serde::Deserialize;

use crate::error::GeocodeError;
use crate::platform::{LocationPlatform, PlatformError, PositionRequest, RawPosition};

pub const DEFAULT_IP_LOCATOR_URL: &str = labgeo_core::config::DEFAULT_IP_LOCATOR_URL;

#[derive(Debug, Deserialize)]
struct IpLocation {
    latitude: Option<f64>,
    longitude: Option<f64>,
}

/// City-level position source backed by an IP geolocation endpoint.
///
/// Needs no device permission, so it reports `Granted` and is only used as
/// the approximate fallback of a [`crate::GeolocationAcquirer`].
pub struct IpLocator {
    client: Client,
    url: Url,
}

impl IpLocator {
    /// # Errors
    ///
    /// Returns [`GeocodeError::Http`] if the `reqwest::Client` cannot be built,
    /// or [`GeocodeError::InvalidBaseUrl`] if `url` does not parse.
    pub fn new(url: &str, timeout_secs: u64, user_agent: &str) -> Result<Self, GeocodeError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(5))
            .user_agent(user_agent)
            .build()?;
        let url = Url::parse(url).map_err(|e| GeocodeError::InvalidBaseUrl {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self { client, url })
    }

    async fn locate(&self) -> Result<RawPosition, PlatformError> {
        let unavailable =
            |message: String| PlatformError::new(PlatformError::POSITION_UNAVAILABLE, message);

        let response = self
            .client
            .get(self.url.clone())
            .send()
            .await
            .map_err(|e| unavailable(format!("IP lookup failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(unavailable(format!("IP lookup returned HTTP {status}")));
        }

        let body: IpLocation = response
            .json()
            .await
            .map_err(|e| unavailable(format!("IP lookup returned malformed JSON: {e}")))?;

        match (body.latitude, body.longitude) {
            (Some(latitude), Some(longitude)) => Ok(RawPosition {
                latitude,
                longitude,
                accuracy_meters: None,
            }),
            _ => Err(unavailable(
                "IP lookup response had no coordinates".to_string(),
            )),
        }
    }
}

impl LocationPlatform for IpLocator {
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
        Box::pin(self.locate())
    }
}
