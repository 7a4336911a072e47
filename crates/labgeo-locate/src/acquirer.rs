//! One-shot device location acquisition with bounded wait and typed failure.

use std::sync::Arc;
use std::time::Duration;

use labgeo_core::{Coordinate, PermissionState};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::GeolocationError;
use crate::platform::{LocationPlatform, PlatformError, PositionRequest};

/// Options recognised by [`GeolocationAcquirer::acquire`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AcquireOptions {
    /// Trade battery and time for precision.
    pub enable_high_accuracy: bool,
    /// Upper bound on the wait for a fix.
    pub timeout_ms: u64,
    /// The platform may return a cached fix no older than this.
    pub max_cached_age_ms: u64,
    /// Accept the approximate source when the precise one fails or is missing.
    pub fallback_to_approximate: bool,
}

impl Default for AcquireOptions {
    fn default() -> Self {
        Self {
            enable_high_accuracy: true,
            timeout_ms: 10_000,
            max_cached_age_ms: 300_000,
            fallback_to_approximate: true,
        }
    }
}

impl AcquireOptions {
    #[must_use]
    pub fn from_app_config(config: &labgeo_core::AppConfig) -> Self {
        Self {
            enable_high_accuracy: config.geolocation_high_accuracy,
            timeout_ms: config.geolocation_timeout_ms,
            max_cached_age_ms: config.geolocation_max_cached_age_ms,
            fallback_to_approximate: config.geolocation_fallback_to_approximate,
        }
    }

    fn position_request(self) -> PositionRequest {
        PositionRequest {
            enable_high_accuracy: self.enable_high_accuracy,
            timeout_ms: self.timeout_ms,
            maximum_age_ms: self.max_cached_age_ms,
        }
    }
}

/// Wraps a [`LocationPlatform`] with a permission check and a bounded,
/// cancellable position request.
///
/// Persists nothing; callers decide what to do with the coordinate.
pub struct GeolocationAcquirer {
    platform: Arc<dyn LocationPlatform>,
    approximate: Option<Arc<dyn LocationPlatform>>,
}

impl GeolocationAcquirer {
    #[must_use]
    pub fn new(platform: Arc<dyn LocationPlatform>) -> Self {
        Self {
            platform,
            approximate: None,
        }
    }

    /// Adds a coarse source used when `fallback_to_approximate` is set.
    #[must_use]
    pub fn with_approximate(mut self, source: Arc<dyn LocationPlatform>) -> Self {
        self.approximate = Some(source);
        self
    }

    /// Obtain one fresh coordinate.
    ///
    /// A denied permission fails immediately without issuing a position
    /// request. Otherwise the platform request is raced against `cancel` and
    /// a deadline `options.timeout_ms` from now. The approximate fallback
    /// shares that deadline.
    ///
    /// # Errors
    ///
    /// Returns the classified [`GeolocationError`]; `Cancelled` when `cancel`
    /// fires first.
    pub async fn acquire(
        &self,
        options: &AcquireOptions,
        cancel: &CancellationToken,
    ) -> Result<Coordinate, GeolocationError> {
        if cancel.is_cancelled() {
            return Err(GeolocationError::Cancelled);
        }
        let deadline = Instant::now() + Duration::from_millis(options.timeout_ms);

        let precise = self.acquire_precise(options, deadline, cancel).await;
        let err = match precise {
            Ok(coordinate) => return Ok(coordinate),
            Err(err) => err,
        };

        let fallback = match &self.approximate {
            Some(source) if options.fallback_to_approximate && err.allows_approximate_fallback() => {
                source
            }
            _ => return Err(err),
        };

        tracing::info!(error = %err, "precise location failed, trying approximate source");
        match request_position(fallback.as_ref(), options, deadline, cancel).await {
            Ok(coordinate) => Ok(coordinate),
            Err(GeolocationError::Cancelled) => Err(GeolocationError::Cancelled),
            Err(fallback_err) => {
                tracing::warn!(
                    error = %fallback_err,
                    "approximate location also failed"
                );
                Err(err)
            }
        }
    }

    async fn acquire_precise(
        &self,
        options: &AcquireOptions,
        deadline: Instant,
        cancel: &CancellationToken,
    ) -> Result<Coordinate, GeolocationError> {
        if !self.platform.is_supported() {
            return Err(GeolocationError::Unsupported);
        }

        let permission = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(GeolocationError::Cancelled),
            state = self.platform.permission_state() => state,
        };

        match permission {
            PermissionState::Denied => {
                tracing::debug!("location permission denied, not prompting");
                return Err(GeolocationError::PermissionDenied);
            }
            PermissionState::Unsupported => return Err(GeolocationError::Unsupported),
            PermissionState::Granted | PermissionState::Prompt => {}
        }

        request_position(self.platform.as_ref(), options, deadline, cancel).await
    }
}

async fn request_position(
    platform: &dyn LocationPlatform,
    options: &AcquireOptions,
    deadline: Instant,
    cancel: &CancellationToken,
) -> Result<Coordinate, GeolocationError> {
    let request = options.position_request();

    let outcome = tokio::select! {
        biased;
        () = cancel.cancelled() => return Err(GeolocationError::Cancelled),
        result = tokio::time::timeout_at(deadline, platform.current_position(&request)) => result,
    };

    match outcome {
        Err(_elapsed) => Err(GeolocationError::Timeout {
            timeout_ms: options.timeout_ms,
        }),
        Ok(Err(platform_err)) => Err(classify(&platform_err, options.timeout_ms)),
        Ok(Ok(raw)) => raw
            .into_coordinate()
            .map_err(|e| GeolocationError::PositionUnavailable(format!("invalid fix: {e}"))),
    }
}

/// Map a platform error code onto the acquisition error taxonomy.
pub(crate) fn classify(err: &PlatformError, timeout_ms: u64) -> GeolocationError {
    match err.code {
        PlatformError::PERMISSION_DENIED => GeolocationError::PermissionDenied,
        PlatformError::POSITION_UNAVAILABLE => {
            GeolocationError::PositionUnavailable(err.message.clone())
        }
        PlatformError::TIMEOUT => GeolocationError::Timeout { timeout_ms },
        _ => GeolocationError::Unknown(err.message.clone()),
    }
}
