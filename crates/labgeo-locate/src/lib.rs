//! Device location acquisition, reverse geocoding and location caching.
//!
//! [`LocationService`] ties the pieces together: a [`GeolocationAcquirer`]
//! produces a coordinate, a [`ReverseGeocoder`] describes it, and a
//! [`LocationCache`] persists the result across restarts.

pub mod acquirer;
pub mod cache;
pub mod error;
pub mod geocoder;
pub mod guidance;
pub mod ip_locator;
pub mod platform;
pub mod service;
pub mod slot;

pub use acquirer::{AcquireOptions, GeolocationAcquirer};
pub use cache::{FileStore, KeyValueStore, LocationCache, MemoryStore};
pub use error::{GeocodeError, GeolocationError, LocateError, StoreError};
pub use geocoder::{GeocodeOutcome, ReverseGeocoder};
pub use guidance::{permission_guidance, ClientPlatform};
pub use ip_locator::IpLocator;
pub use platform::{
    FixedPlatform, LocationPlatform, PlatformError, PositionRequest, RawPosition,
    UnsupportedPlatform,
};
pub use service::{LocationService, LocationUpdate};
pub use slot::{SlotTicket, TaskSlot};
