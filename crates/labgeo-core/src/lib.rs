//! Domain types, distance math, ranking and configuration for `labgeo`.

pub mod app_config;
pub mod config;
pub mod distance;
pub mod geo;
pub mod labs;
pub mod ranking;

use thiserror::Error;

pub use app_config::{AppConfig, Environment};
pub use config::{load_app_config, load_app_config_from_env};
pub use distance::{distance_km, format_distance, EARTH_RADIUS_KM};
pub use geo::{now_epoch_millis, Coordinate, CoordinateError, PermissionState, ResolvedLocation};
pub use labs::{load_labs, parse_labs, Lab, LabsFile};
pub use ranking::{nearest, rank, within_radius, Locatable, RankedEntity};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },

    #[error("failed to read labs file {path}: {source}")]
    LabsFileIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse labs file: {0}")]
    LabsFileParse(#[source] serde_yaml::Error),

    #[error("labs validation failed: {0}")]
    Validation(String),
}
