//! Re-enable instructions shown after a location permission denial.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientPlatform {
    Android,
    Ios,
    MacOs,
    Windows,
    Linux,
    /// Anything we cannot identify; browser-level instructions apply.
    Browser,
}

impl ClientPlatform {
    /// The platform this binary was compiled for.
    #[must_use]
    pub fn current() -> Self {
        if cfg!(target_os = "android") {
            ClientPlatform::Android
        } else if cfg!(target_os = "ios") {
            ClientPlatform::Ios
        } else if cfg!(target_os = "macos") {
            ClientPlatform::MacOs
        } else if cfg!(target_os = "windows") {
            ClientPlatform::Windows
        } else if cfg!(target_os = "linux") {
            ClientPlatform::Linux
        } else {
            ClientPlatform::Browser
        }
    }

    /// Best-effort detection from an HTTP `User-Agent` header.
    #[must_use]
    pub fn from_user_agent(user_agent: &str) -> Self {
        let ua = user_agent.to_ascii_lowercase();
        // iPad/iPhone agents also mention "mac os x", so check iOS first.
        if ua.contains("android") {
            ClientPlatform::Android
        } else if ua.contains("iphone") || ua.contains("ipad") {
            ClientPlatform::Ios
        } else if ua.contains("mac os x") || ua.contains("macintosh") {
            ClientPlatform::MacOs
        } else if ua.contains("windows") {
            ClientPlatform::Windows
        } else if ua.contains("linux") {
            ClientPlatform::Linux
        } else {
            ClientPlatform::Browser
        }
    }
}

/// Steps for turning location access back on.
#[must_use]
pub fn permission_guidance(platform: ClientPlatform) -> &'static str {
    match platform {
        ClientPlatform::Android => {
            "Open Settings > Location and turn on \"Use location\", then allow location for this app or your browser under Settings > Apps > Permissions."
        }
        ClientPlatform::Ios => {
            "Open Settings > Privacy & Security > Location Services, turn it on, and set this app or Safari Websites to \"While Using the App\"."
        }
        ClientPlatform::MacOs => {
            "Open System Settings > Privacy & Security > Location Services and enable it for this app or your browser."
        }
        ClientPlatform::Windows => {
            "Open Settings > Privacy & security > Location, turn on Location services, and allow apps or your browser to access it."
        }
        ClientPlatform::Linux => {
            "Enable location services in your desktop privacy settings (GeoClue), then allow location for this app or your browser."
        }
        ClientPlatform::Browser => {
            "Click the lock icon next to the address bar, set Location to \"Allow\", and reload the page."
        }
    }
}
