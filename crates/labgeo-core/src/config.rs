use crate::app_config::{AppConfig, Environment};
use crate::ConfigError;

pub const DEFAULT_GEOCODER_URL: &str = "https://api.bigdatacloud.net/data/reverse-geocode-client";
pub const DEFAULT_IP_LOCATOR_URL: &str = "https://ipapi.co/json/";

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if a value is present but invalid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if a value is present but invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// Decoupled from the real environment so tests can drive it with a `HashMap`.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::net::SocketAddr;
    use std::path::PathBuf;

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let invalid = |var: &str, reason: String| ConfigError::InvalidEnvVar {
        var: var.to_string(),
        reason,
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        or_default(var, default)
            .parse::<u64>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_usize = |var: &str, default: &str| -> Result<usize, ConfigError> {
        or_default(var, default)
            .parse::<usize>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_bool = |var: &str, default: bool| -> Result<bool, ConfigError> {
        match lookup(var) {
            Err(_) => Ok(default),
            Ok(raw) => match raw.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => Ok(true),
                "0" | "false" | "no" | "off" => Ok(false),
                other => Err(invalid(var, format!("expected a boolean, got '{other}'"))),
            },
        }
    };

    let env = parse_environment(&or_default("LABGEO_ENV", "development"))?;

    let bind_addr = or_default("LABGEO_BIND_ADDR", "0.0.0.0:3000")
        .parse::<SocketAddr>()
        .map_err(|e| invalid("LABGEO_BIND_ADDR", e.to_string()))?;
    let log_level = or_default("LABGEO_LOG_LEVEL", "info");
    let labs_path = PathBuf::from(or_default("LABGEO_LABS_PATH", "./config/labs.yaml"));
    let cache_path = PathBuf::from(or_default("LABGEO_CACHE_PATH", "./.labgeo/location.json"));
    let user_agent = or_default("LABGEO_USER_AGENT", "labgeo/0.1 (lab-finder)");

    let geocoder_url = or_default("LABGEO_GEOCODER_URL", DEFAULT_GEOCODER_URL);
    let geocoder_timeout_secs = parse_u64("LABGEO_GEOCODER_TIMEOUT_SECS", "10")?;

    let ip_locator_url = match lookup("LABGEO_IP_LOCATOR_URL") {
        Ok(v) if v.trim().is_empty() => None,
        Ok(v) => Some(v),
        Err(_) => Some(DEFAULT_IP_LOCATOR_URL.to_string()),
    };

    let geolocation_timeout_ms = parse_u64("LABGEO_GEOLOCATION_TIMEOUT_MS", "10000")?;
    let geolocation_max_cached_age_ms =
        parse_u64("LABGEO_GEOLOCATION_MAX_CACHED_AGE_MS", "300000")?;
    let geolocation_high_accuracy = parse_bool("LABGEO_GEOLOCATION_HIGH_ACCURACY", true)?;
    let geolocation_fallback_to_approximate =
        parse_bool("LABGEO_GEOLOCATION_FALLBACK_TO_APPROXIMATE", true)?;

    let location_max_age_secs = parse_u64("LABGEO_LOCATION_MAX_AGE_SECS", "600")?;
    let nearby_default_limit = parse_usize("LABGEO_NEARBY_DEFAULT_LIMIT", "20")?;

    Ok(AppConfig {
        env,
        bind_addr,
        log_level,
        labs_path,
        cache_path,
        user_agent,
        geocoder_url,
        geocoder_timeout_secs,
        ip_locator_url,
        geolocation_timeout_ms,
        geolocation_max_cached_age_ms,
        geolocation_high_accuracy,
        geolocation_fallback_to_approximate,
        location_max_age_secs,
        nearby_default_limit,
    })
}

/// Parse a string into an `Environment` variant.
fn parse_environment(s: &str) -> Result<Environment, ConfigError> {
    match s {
        "development" => Ok(Environment::Development),
        "test" => Ok(Environment::Test),
        "production" => Ok(Environment::Production),
        other => Err(ConfigError::InvalidEnvVar {
            var: "LABGEO_ENV".to_string(),
            reason: format!("unknown environment '{other}'"),
        }),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
