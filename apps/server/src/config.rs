//! Server configuration.
//!
//! Supports loading from YAML files with environment variable overrides.
//! The environment names match existing relay deployments.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use sonos_relay_core::{parse_site_room_map, Config, MqttConfig, PlaybackMode};

/// Server configuration loaded from YAML with environment overrides.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Port speakers fetch clips from.
    /// Override: `HTTP_PORT`
    pub http_port: u16,

    /// Host or IP advertised to speakers. Auto-detected when absent.
    /// Override: `HTTP_HOST`
    pub http_host: Option<String>,

    /// Override: `MQTT_HOST`
    pub mqtt_host: Option<String>,
    /// Override: `MQTT_PORT`
    pub mqtt_port: u16,
    /// Override: `MQTT_USERNAME`
    pub mqtt_username: Option<String>,
    /// Override: `MQTT_PASSWORD`
    pub mqtt_password: Option<String>,

    /// Voice assistant site id to Sonos room name.
    /// Override: `SNIPS_SITE_TO_SONOS_ROOM_MAP` (`site=Room,site2=Room 2`)
    pub site_rooms: BTreeMap<String, String>,

    /// Override: `SONOS_VOLUME`
    pub volume: u8,

    /// Override: `SONOS_SCAN_WINDOW` (ms)
    pub scan_window_ms: u64,

    pub playback_mode: PlaybackMode,
    pub hotword: bool,
    pub thaw_grace_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        let core = Config::default();
        Self {
            http_port: core.http_port,
            http_host: None,
            mqtt_host: None,
            mqtt_port: core.mqtt.port,
            mqtt_username: None,
            mqtt_password: None,
            site_rooms: BTreeMap::new(),
            volume: core.volume,
            scan_window_ms: core.scan_window_ms,
            playback_mode: core.playback_mode,
            hotword: core.hotword,
            thaw_grace_ms: core.thaw_grace_ms,
        }
    }
}

impl ServerConfig {
    /// Loads configuration from a YAML file, then applies environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = if let Some(path) = path {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            serde_yaml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?
        } else {
            Self::default()
        };

        config.apply_env_overrides(|name| std::env::var(name).ok());
        Ok(config)
    }

    /// Applies overrides from `lookup`. Unparseable numbers are ignored.
    fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(host) = var("MQTT_HOST") {
            self.mqtt_host = Some(host);
        }
        if let Some(port) = var("MQTT_PORT").and_then(|v| v.trim().parse().ok()) {
            self.mqtt_port = port;
        }
        if let Some(username) = var("MQTT_USERNAME") {
            self.mqtt_username = Some(username);
        }
        if let Some(password) = var("MQTT_PASSWORD") {
            self.mqtt_password = Some(password);
        }
        if let Some(host) = var("HTTP_HOST") {
            self.http_host = Some(host);
        }
        if let Some(port) = var("HTTP_PORT").and_then(|v| v.trim().parse().ok()) {
            self.http_port = port;
        }
        if let Some(map) = var("SNIPS_SITE_TO_SONOS_ROOM_MAP") {
            self.site_rooms = parse_site_room_map(&map);
        }
        if let Some(volume) = var("SONOS_VOLUME").and_then(|v| v.trim().parse().ok()) {
            self.volume = volume;
        }
        if let Some(window) = var("SONOS_SCAN_WINDOW").and_then(|v| v.trim().parse().ok()) {
            self.scan_window_ms = window;
        }
    }

    /// Converts to the core `Config`, rejecting settings the relay cannot start without.
    pub fn to_core_config(&self) -> Result<Config> {
        let Some(mqtt_host) = self.mqtt_host.clone().filter(|h| !h.trim().is_empty()) else {
            bail!("Missing MQTT broker host. Set MQTT_HOST or mqtt_host in the config file.");
        };
        if self.site_rooms.is_empty() {
            bail!(
                "Missing site to room map. Set SNIPS_SITE_TO_SONOS_ROOM_MAP \
                 (e.g. default=Living Room) or site_rooms in the config file."
            );
        }

        let config = Config {
            http_port: self.http_port,
            advertise_host: self.http_host.clone(),
            mqtt: MqttConfig {
                host: mqtt_host,
                port: self.mqtt_port,
                username: self.mqtt_username.clone(),
                password: self.mqtt_password.clone(),
                ..MqttConfig::default()
            },
            site_rooms: self.site_rooms.clone(),
            volume: self.volume,
            playback_mode: self.playback_mode,
            hotword: self.hotword,
            thaw_grace_ms: self.thaw_grace_ms,
            scan_window_ms: self.scan_window_ms,
        };
        if let Err(reason) = config.validate() {
            bail!("Invalid configuration: {}", reason);
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn environment_uses_deployment_variable_names() {
        let mut config = ServerConfig::default();
        config.apply_env_overrides(env(&[
            ("MQTT_HOST", "broker.lan"),
            ("MQTT_PORT", "1884"),
            ("HTTP_HOST", "192.168.1.5"),
            ("HTTP_PORT", "9090"),
            ("SNIPS_SITE_TO_SONOS_ROOM_MAP", "default=Living Room, kitchen=Kitchen"),
            ("SONOS_VOLUME", "45"),
            ("SONOS_SCAN_WINDOW", "5000"),
        ]));

        let core = config.to_core_config().unwrap();
        assert_eq!(core.mqtt.host, "broker.lan");
        assert_eq!(core.mqtt.port, 1884);
        assert_eq!(core.advertise_host.as_deref(), Some("192.168.1.5"));
        assert_eq!(core.http_port, 9090);
        assert_eq!(core.site_rooms.len(), 2);
        assert_eq!(core.volume, 45);
        assert_eq!(core.scan_window_ms, 5000);
    }

    #[test]
    fn bad_numbers_keep_defaults() {
        let mut config = ServerConfig::default();
        config.apply_env_overrides(env(&[("SONOS_VOLUME", "loud"), ("HTTP_PORT", "")]));
        assert_eq!(config.volume, 30);
        assert_eq!(config.http_port, 8080);
    }

    #[test]
    fn missing_broker_or_sites_is_rejected() {
        let config = ServerConfig::default();
        let err = config.to_core_config().unwrap_err().to_string();
        assert!(err.contains("MQTT_HOST"));

        let mut config = ServerConfig::default();
        config.apply_env_overrides(env(&[("MQTT_HOST", "broker")]));
        let err = config.to_core_config().unwrap_err().to_string();
        assert!(err.contains("SNIPS_SITE_TO_SONOS_ROOM_MAP"));
    }

    #[test]
    fn yaml_file_is_loaded() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "mqtt_host: broker\nsite_rooms:\n  default: Kitchen\nplayback_mode: interrupt\nhotword: true"
        )
        .unwrap();

        let mut config: ServerConfig =
            serde_yaml::from_str(&std::fs::read_to_string(file.path()).unwrap()).unwrap();
        config.apply_env_overrides(env(&[]));
        let core = config.to_core_config().unwrap();

        assert_eq!(core.playback_mode, PlaybackMode::Interrupt);
        assert!(core.hotword);
        assert_eq!(core.site_rooms.get("default").map(String::as_str), Some("Kitchen"));
        assert_eq!(core.http_port, 8080);
    }
}
