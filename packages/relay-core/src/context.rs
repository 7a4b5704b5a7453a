//! Network identity of the relay as seen by the speakers.
//!
//! Speakers fetch clips from, and deliver GENA events to, the relay's HTTP
//! server, so every URL handed to them is built from the advertised host
//! and port held by [`NetworkContext`].

use std::sync::Arc;

/// Host and port that speakers use to reach this process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkContext {
    advertise_host: String,
    port: u16,
}

impl NetworkContext {
    /// Uses a configured host name or IP address.
    ///
    /// # Arguments
    ///
    /// * `port` - HTTP port the relay listens on.
    /// * `advertise_host` - Host Sonos speakers can reach us at.
    #[must_use]
    pub fn explicit(port: u16, advertise_host: impl Into<String>) -> Self {
        Self {
            advertise_host: advertise_host.into(),
            port,
        }
    }

    /// Detects the local IP address to advertise.
    ///
    /// # Errors
    ///
    /// Returns an error if no local address can be determined.
    pub fn auto_detect(port: u16, ip_detector: Arc<dyn IpDetector>) -> Result<Self, NetworkError> {
        let ip = ip_detector.detect()?;
        log::info!("[Bootstrap] Auto-detected advertise address {}", ip);
        Ok(Self::explicit(port, ip))
    }

    /// Explicit host when configured, otherwise auto-detection.
    pub fn resolve(
        port: u16,
        advertise_host: Option<&str>,
        ip_detector: Arc<dyn IpDetector>,
    ) -> Result<Self, NetworkError> {
        match advertise_host.map(str::trim).filter(|h| !h.is_empty()) {
            Some(host) => Ok(Self::explicit(port, host)),
            None => Self::auto_detect(port, ip_detector),
        }
    }

    #[must_use]
    pub fn port(&self) -> u16 {
        self.port
    }

    #[must_use]
    pub fn advertise_host(&self) -> &str {
        &self.advertise_host
    }

    #[must_use]
    pub fn url_builder(&self) -> UrlBuilder {
        UrlBuilder::new(self.advertise_host.clone(), self.port)
    }
}

/// Strategy for finding the address speakers can reach.
pub trait IpDetector: Send + Sync {
    fn detect(&self) -> Result<String, NetworkError>;
}

/// Default IP detector using the system's network interfaces.
#[derive(Debug, Clone, Default)]
pub struct LocalIpDetector;

impl LocalIpDetector {
    #[must_use]
    pub fn arc() -> Arc<dyn IpDetector> {
        Arc::new(Self)
    }
}

impl IpDetector for LocalIpDetector {
    fn detect(&self) -> Result<String, NetworkError> {
        local_ip_address::local_ip()
            .map(|ip| ip.to_string())
            .map_err(|e| NetworkError::Detection(e.to_string()))
    }
}

/// Errors that can occur while determining the advertised address.
#[derive(Debug, thiserror::Error)]
pub enum NetworkError {
    #[error("Failed to detect local IP: {0}")]
    Detection(String),
}

/// Builds the URLs handed to speakers.
pub struct UrlBuilder {
    host: String,
    port: u16,
}

impl UrlBuilder {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Base URL, e.g. `http://192.168.1.100:8080`.
    #[must_use]
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }

    /// URL of a cached clip.
    #[must_use]
    pub fn audio_url(&self, id: &str) -> String {
        format!("{}/audio/{}.wav", self.base_url(), id)
    }

    /// GENA callback URL for AVTransport NOTIFY requests.
    #[must_use]
    pub fn gena_callback_url(&self) -> String {
        format!("{}/sonos/gena", self.base_url())
    }
}
