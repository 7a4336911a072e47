use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub env: Environment,
    pub bind_addr: SocketAddr,
    pub log_level: String,
    pub labs_path: PathBuf,
    /// JSON file backing the persisted location cache.
    pub cache_path: PathBuf,
    pub user_agent: String,
    pub geocoder_url: String,
    pub geocoder_timeout_secs: u64,
    /// Approximate (IP-based) location endpoint; `None` disables the fallback source.
    pub ip_locator_url: Option<String>,
    pub geolocation_timeout_ms: u64,
    pub geolocation_max_cached_age_ms: u64,
    pub geolocation_high_accuracy: bool,
    pub geolocation_fallback_to_approximate: bool,
    /// Cached locations older than this are treated as stale by consumers.
    pub location_max_age_secs: u64,
    pub nearby_default_limit: usize,
}
