//! The seam between the acquirer and whatever actually knows where the device is.

use futures::future::BoxFuture;
use labgeo_core::{Coordinate, CoordinateError, PermissionState};
use thiserror::Error;

/// Parameters forwarded to the platform with each position request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PositionRequest {
    pub enable_high_accuracy: bool,
    pub timeout_ms: u64,
    /// The platform may answer with a cached fix no older than this.
    pub maximum_age_ms: u64,
}

/// A position fix as reported by the platform, before validation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawPosition {
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy_meters: Option<f64>,
}

impl RawPosition {
    pub(crate) fn into_coordinate(self) -> Result<Coordinate, CoordinateError> {
        let coordinate = Coordinate::new(self.latitude, self.longitude)?;
        match self.accuracy_meters {
            Some(meters) => coordinate.with_accuracy(meters),
            None => Ok(coordinate),
        }
    }
}

/// Error reported by the platform location API.
///
/// `code` follows the W3C geolocation numbering: 1 permission denied,
/// 2 position unavailable, 3 timeout. Anything else is unknown.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("platform geolocation error {code}: {message}")]
pub struct PlatformError {
    pub code: u16,
    pub message: String,
}

impl PlatformError {
    pub const PERMISSION_DENIED: u16 = 1;
    pub const POSITION_UNAVAILABLE: u16 = 2;
    pub const TIMEOUT: u16 = 3;

    pub fn new(code: u16, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// A source of device position fixes.
pub trait LocationPlatform: Send + Sync {
    /// Whether the platform has any location capability at all.
    fn is_supported(&self) -> bool;

    /// The platform's current authorization decision. Must not prompt.
    fn permission_state(&self) -> BoxFuture<'_, PermissionState>;

    /// Request one position fix. May prompt when permission is `Prompt`.
    fn current_position<'a>(
        &'a self,
        request: &'a PositionRequest,
    ) -> BoxFuture<'a, Result<RawPosition, PlatformError>>;
}

/// A platform that always reports the same fix, e.g. one supplied on the
/// command line by a device that already knows its position.
#[derive(Debug, Clone)]
pub struct FixedPlatform {
    position: RawPosition,
}

impl FixedPlatform {
    #[must_use]
    pub fn new(latitude: f64, longitude: f64, accuracy_meters: Option<f64>) -> Self {
        Self {
            position: RawPosition {
                latitude,
                longitude,
                accuracy_meters,
            },
        }
    }
}

impl LocationPlatform for FixedPlatform {
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
        let position = self.position;
        Box::pin(async move { Ok(position) })
    }
}

/// A platform with no location hardware or API.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnsupportedPlatform;

impl LocationPlatform for UnsupportedPlatform {
    fn is_supported(&self) -> bool {
        false
    }

    fn permission_state(&self) -> BoxFuture<'_, PermissionState> {
        Box::pin(async { PermissionState::Unsupported })
    }

    fn current_position<'a>(
        &'a self,
        _request: &'a PositionRequest,
    ) -> BoxFuture<'a, Result<RawPosition, PlatformError>> {
        Box::pin(async {
            Err(PlatformError::new(
                PlatformError::POSITION_UNAVAILABLE,
                "no location capability",
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_position_validates_ranges() {
        let raw = RawPosition {
            latitude: 91.0,
            longitude: 0.0,
            accuracy_meters: None,
        };
        assert!(raw.into_coordinate().is_err());
    }

    #[test]
    fn raw_position_keeps_accuracy() {
        let raw = RawPosition {
            latitude: 22.3072,
            longitude: 73.1812,
            accuracy_meters: Some(35.0),
        };
        let c = raw.into_coordinate().unwrap();
        assert_eq!(c.accuracy_meters(), Some(35.0));
    }

    #[tokio::test]
    async fn fixed_platform_reports_its_fix() {
        let platform = FixedPlatform::new(22.3072, 73.1812, Some(5.0));
        let request = PositionRequest {
            enable_high_accuracy: true,
            timeout_ms: 1000,
            maximum_age_ms: 0,
        };
        assert_eq!(platform.permission_state().await, PermissionState::Granted);
        let pos = platform.current_position(&request).await.unwrap();
        assert_eq!(pos.latitude, 22.3072);
        assert_eq!(pos.accuracy_meters, Some(5.0));
    }
}
