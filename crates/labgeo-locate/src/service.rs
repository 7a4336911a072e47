//! The location service: one instance per process, passed to consumers.
//!
//! Runs acquire → resolve → save as one cancellable sequence. Starting a new
//! refresh cancels the outstanding one, and a cancelled sequence commits
//! nothing to the cache.

use std::sync::{PoisonError, RwLock};
use std::time::Duration;

use labgeo_core::{now_epoch_millis, rank, Locatable, RankedEntity, ResolvedLocation};

use crate::acquirer::{AcquireOptions, GeolocationAcquirer};
use crate::cache::LocationCache;
use crate::error::{GeolocationError, LocateError};
use crate::geocoder::{GeocodeOutcome, ReverseGeocoder};
use crate::slot::TaskSlot;

/// A freshly committed location.
#[derive(Debug, Clone, PartialEq)]
pub struct LocationUpdate {
    pub location: ResolvedLocation,
    /// Why the place text is a placeholder, when reverse geocoding failed.
    pub fallback_reason: Option<String>,
}

impl LocationUpdate {
    #[must_use]
    pub fn is_degraded(&self) -> bool {
        self.fallback_reason.is_some()
    }
}

pub struct LocationService {
    acquirer: GeolocationAcquirer,
    geocoder: ReverseGeocoder,
    cache: LocationCache,
    options: AcquireOptions,
    slot: TaskSlot,
    current: RwLock<Option<ResolvedLocation>>,
}

impl LocationService {
    /// Builds the service and primes the current location from the cache.
    #[must_use]
    pub fn new(
        acquirer: GeolocationAcquirer,
        geocoder: ReverseGeocoder,
        cache: LocationCache,
        options: AcquireOptions,
    ) -> Self {
        let current = cache.load();
        if let Some(location) = &current {
            tracing::debug!(
                city = %location.city,
                acquired_at = location.acquired_at_epoch_millis,
                "restored cached location"
            );
        }
        Self {
            acquirer,
            geocoder,
            cache,
            options,
            slot: TaskSlot::new(),
            current: RwLock::new(current),
        }
    }

    /// Acquire, reverse-geocode and persist a new current location.
    ///
    /// Cancels any refresh still in flight on this service.
    ///
    /// # Errors
    ///
    /// - [`LocateError::Geolocation`] when no coordinate could be acquired;
    ///   on `PermissionDenied` the cache is cleared first, unless the refresh
    ///   was already superseded.
    /// - [`LocateError::Cancelled`] when superseded or cancelled.
    /// - [`LocateError::Storage`] when the cache write fails.
    pub async fn refresh(&self) -> Result<LocationUpdate, LocateError> {
        let ticket = self.slot.begin();

        let coordinate = match self.acquirer.acquire(&self.options, ticket.token()).await {
            Ok(coordinate) => coordinate,
            Err(GeolocationError::PermissionDenied) => {
                if !ticket.is_current() {
                    return Err(LocateError::Cancelled);
                }
                self.forget();
                return Err(GeolocationError::PermissionDenied.into());
            }
            Err(err) => return Err(err.into()),
        };

        let (location, fallback_reason) =
            match self.geocoder.resolve(coordinate, ticket.token()).await {
                GeocodeOutcome::Resolved(location) => (location, None),
                GeocodeOutcome::Fallback { location, reason } => (location, Some(reason)),
                GeocodeOutcome::Cancelled => return Err(LocateError::Cancelled),
            };

        let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
        if !ticket.is_current() {
            return Err(LocateError::Cancelled);
        }
        let stored = self.cache.save(location)?;
        if let Err(e) = self.cache.record_permission_granted() {
            tracing::warn!(error = %e, "failed to record location permission grant");
        }
        *current = Some(stored.clone());
        drop(current);

        tracing::info!(
            city = %stored.city,
            latitude = stored.coordinate.latitude(),
            longitude = stored.coordinate.longitude(),
            degraded = fallback_reason.is_some(),
            "location updated"
        );

        Ok(LocationUpdate {
            location: stored,
            fallback_reason,
        })
    }

    /// Cancel the outstanding refresh, if any.
    pub fn cancel(&self) {
        self.slot.cancel();
    }

    #[must_use]
    pub fn current(&self) -> Option<ResolvedLocation> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// The current location if it is younger than `max_age`.
    #[must_use]
    pub fn current_fresh(&self, max_age: Duration) -> Option<ResolvedLocation> {
        let now = now_epoch_millis();
        self.current().filter(|l| l.is_fresh(now, max_age))
    }

    #[must_use]
    pub fn permission_granted(&self) -> bool {
        self.cache.permission_granted()
    }

    /// Forget the location on explicit user request.
    ///
    /// # Errors
    ///
    /// Returns [`LocateError::Storage`] if the cache cannot be cleared.
    pub fn clear(&self) -> Result<(), LocateError> {
        self.slot.cancel();
        self.cache.clear()?;
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = None;
        Ok(())
    }

    /// Rank `entities` around the current location; `None` without one.
    pub fn rank_nearby<T, I>(&self, entities: I) -> Option<Vec<RankedEntity<T>>>
    where
        T: Locatable,
        I: IntoIterator<Item = T>,
    {
        self.current()
            .map(|location| rank(&location.coordinate, entities))
    }

    fn forget(&self) {
        if let Err(e) = self.cache.clear() {
            tracing::warn!(error = %e, "failed to clear location cache after denial");
        }
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = None;
    }
}
