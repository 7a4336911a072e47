use thiserror::Error;

/// Why a location acquisition did not produce a coordinate.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GeolocationError {
    /// The platform has no location capability.
    #[error("location services are not supported on this device")]
    Unsupported,

    /// The user or OS declined location access.
    #[error("location permission was denied")]
    PermissionDenied,

    #[error("position unavailable: {0}")]
    PositionUnavailable(String),

    #[error("no position fix within {timeout_ms} ms")]
    Timeout { timeout_ms: u64 },

    #[error("unknown geolocation error: {0}")]
    Unknown(String),

    /// Superseded by a newer request or cancelled by the caller.
    #[error("location request was cancelled")]
    Cancelled,
}

impl GeolocationError {
    /// `true` for transient failures that are safe to retry on user request.
    ///
    /// `PermissionDenied` needs an out-of-band settings change and
    /// `Unsupported` needs a capability change, so neither is retriable.
    #[must_use]
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            GeolocationError::PositionUnavailable(_)
                | GeolocationError::Timeout { .. }
                | GeolocationError::Unknown(_)
        )
    }

    /// Whether a coarse approximate source may stand in after this failure.
    pub(crate) fn allows_approximate_fallback(&self) -> bool {
        matches!(self, GeolocationError::Unsupported) || self.is_retriable()
    }

    /// Short message suitable for showing to the person using the app.
    #[must_use]
    pub fn user_message(&self) -> &'static str {
        match self {
            GeolocationError::Unsupported => "Location is not available on this device.",
            GeolocationError::PermissionDenied => {
                "Location access is turned off. Enable it in your settings to find labs near you."
            }
            GeolocationError::PositionUnavailable(_) => {
                "We couldn't determine your location. Please try again."
            }
            GeolocationError::Timeout { .. } => {
                "Finding your location took too long. Please try again."
            }
            GeolocationError::Unknown(_) => "Something went wrong while getting your location.",
            GeolocationError::Cancelled => "Location request cancelled.",
        }
    }
}

/// Failures from the persisted key-value storage.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage I/O error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize stored value: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Failures of the reverse-geocoding lookup.
///
/// These never reach callers of [`crate::ReverseGeocoder::resolve`] as errors;
/// they become the reason attached to a fallback outcome.
#[derive(Debug, Error)]
pub enum GeocodeError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected HTTP status {status} from {url}")]
    UnexpectedStatus { status: u16, url: String },

    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid base URL '{url}': {reason}")]
    InvalidBaseUrl { url: String, reason: String },
}

/// Errors surfaced by [`crate::LocationService::refresh`].
#[derive(Debug, Error)]
pub enum LocateError {
    #[error(transparent)]
    Geolocation(GeolocationError),

    #[error("location refresh was cancelled")]
    Cancelled,

    #[error("failed to persist location: {0}")]
    Storage(#[from] StoreError),
}

impl From<GeolocationError> for LocateError {
    fn from(err: GeolocationError) -> Self {
        match err {
            GeolocationError::Cancelled => LocateError::Cancelled,
            other => LocateError::Geolocation(other),
        }
    }
}
