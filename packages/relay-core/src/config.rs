//! Relay configuration.
//!
//! [`Config`] holds every tunable the core needs. The server binary builds
//! it from a YAML file, environment variables and CLI flags; tests build it
//! with struct-update syntax over [`Config::default`].

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// How incoming clips are routed to a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackMode {
    /// Clips queue behind each other as notifications.
    #[default]
    Queue,
    /// A new clip pre-empts whatever the room is playing.
    Interrupt,
}

impl std::str::FromStr for PlaybackMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "queue" => Ok(Self::Queue),
            "interrupt" => Ok(Self::Interrupt),
            other => Err(format!(
                "invalid playback mode '{}' (expected queue or interrupt)",
                other
            )),
        }
    }
}

/// MQTT broker connection settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MqttConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub client_id: String,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: 1883,
            username: None,
            password: None,
            client_id: crate::protocol_constants::SERVICE_ID.to_string(),
        }
    }
}

/// Configuration for the relay.
///
/// All fields have defaults except the broker host and the site map,
/// which the server validates before bootstrapping.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    // Server
    /// Port of the HTTP server speakers fetch clips from.
    pub http_port: u16,
    /// Host advertised to speakers. Auto-detected when absent.
    pub advertise_host: Option<String>,

    // Bus
    pub mqtt: MqttConfig,
    /// Voice assistant site id to Sonos room name.
    pub site_rooms: BTreeMap<String, String>,

    // Playback
    /// Volume applied to every device while a clip plays (0-100).
    pub volume: u8,
    pub playback_mode: PlaybackMode,
    /// Freeze rooms on hotword detection and thaw them when the dialogue ends.
    pub hotword: bool,
    /// Delay between a dialogue ending and the room thawing (ms).
    pub thaw_grace_ms: u64,

    // Discovery
    /// How long SSDP listens for speaker responses (ms).
    pub scan_window_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http_port: 8080,
            advertise_host: None,
            mqtt: MqttConfig::default(),
            site_rooms: BTreeMap::new(),
            volume: 30,
            playback_mode: PlaybackMode::Queue,
            hotword: false,
            thaw_grace_ms: 1000,
            scan_window_ms: 10_000,
        }
    }
}

impl Config {
    #[must_use]
    pub fn scan_window(&self) -> Duration {
        Duration::from_millis(self.scan_window_ms)
    }

    #[must_use]
    pub fn thaw_grace(&self) -> Duration {
        Duration::from_millis(self.thaw_grace_ms)
    }

    /// Checks the values bootstrap cannot work without.
    ///
    /// # Errors
    ///
    /// Returns a description of the first invalid value.
    pub fn validate(&self) -> Result<(), String> {
        if self.mqtt.host.trim().is_empty() {
            return Err("MQTT host is not configured".to_string());
        }
        if self.site_rooms.is_empty() {
            return Err("site to room map is empty".to_string());
        }
        if self.volume > 100 {
            return Err(format!("volume must be 0-100, got {}", self.volume));
        }
        if self.scan_window_ms == 0 {
            return Err("scan window must be > 0".to_string());
        }
        Ok(())
    }
}

/// Parses `site=Room` pairs separated by commas.
///
/// Entries and both sides of each pair are trimmed; empty entries and
/// pairs with an empty side are ignored.
#[must_use]
pub fn parse_site_room_map(raw: &str) -> BTreeMap<String, String> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .filter_map(|entry| {
            let mut parts = entry.split('=').map(str::trim);
            let site = parts.next()?;
            let room = parts.next()?;
            (!site.is_empty() && !room.is_empty()).then(|| (site.to_string(), room.to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn site_room_map_trims_and_skips_bad_entries() {
        let map = parse_site_room_map("a=Kitchen, b = Living Room,,bad, =x, y=");

        assert_eq!(map.len(), 2);
        assert_eq!(map.get("a").map(String::as_str), Some("Kitchen"));
        assert_eq!(map.get("b").map(String::as_str), Some("Living Room"));
    }

    #[test]
    fn site_room_map_of_empty_string_is_empty() {
        assert!(parse_site_room_map("").is_empty());
        assert!(parse_site_room_map(" , ").is_empty());
    }

    #[test]
    fn defaults_match_deployment_defaults() {
        let config = Config::default();
        assert_eq!(config.http_port, 8080);
        assert_eq!(config.mqtt.port, 1883);
        assert_eq!(config.volume, 30);
        assert_eq!(config.scan_window(), Duration::from_secs(10));
        assert_eq!(config.playback_mode, PlaybackMode::Queue);
        assert!(!config.hotword);
    }

    #[test]
    fn validate_requires_broker_and_sites() {
        let mut config = Config::default();
        assert!(config.validate().is_err());

        config.mqtt.host = "broker".into();
        assert!(config.validate().unwrap_err().contains("site"));

        config.site_rooms = parse_site_room_map("default=Kitchen");
        assert!(config.validate().is_ok());

        config.volume = 101;
        assert!(config.validate().is_err());
    }

    #[test]
    fn playback_mode_parses_case_insensitively() {
        assert_eq!("Interrupt".parse::<PlaybackMode>(), Ok(PlaybackMode::Interrupt));
        assert_eq!(" queue ".parse::<PlaybackMode>(), Ok(PlaybackMode::Queue));
        assert!("loud".parse::<PlaybackMode>().is_err());
    }

    #[test]
    fn partial_yaml_style_deserialization_keeps_defaults() {
        let config: Config =
            serde_json::from_str(r#"{"mqtt":{"host":"broker"},"playback_mode":"interrupt"}"#)
                .unwrap();
        assert_eq!(config.mqtt.host, "broker");
        assert_eq!(config.mqtt.port, 1883);
        assert_eq!(config.playback_mode, PlaybackMode::Interrupt);
        assert_eq!(config.http_port, 8080);
    }
}
