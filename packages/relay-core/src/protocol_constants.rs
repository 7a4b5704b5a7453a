//! Fixed protocol constants that should NOT be changed.
//!
//! These values are defined by external specifications (UPnP, GENA, Hermes,
//! MQTT) or by what Sonos speakers tolerate.

// ─────────────────────────────────────────────────────────────────────────────
// GENA (UPnP General Event Notification Architecture)
// ─────────────────────────────────────────────────────────────────────────────

/// GENA subscription timeout requested from speaker (seconds).
pub const GENA_SUBSCRIPTION_TIMEOUT_SECS: u64 = 3600;

/// Time before subscription expiry to trigger renewal (seconds).
pub const GENA_RENEWAL_BUFFER_SECS: u64 = 300;

/// Interval between subscription renewal checks (seconds).
pub const GENA_RENEWAL_CHECK_SECS: u64 = 60;

// ─────────────────────────────────────────────────────────────────────────────
// HTTP/SOAP
// ─────────────────────────────────────────────────────────────────────────────

/// Timeout for SOAP HTTP requests (seconds).
pub const SOAP_TIMEOUT_SECS: u64 = 10;

/// Maximum size of GENA notification body (bytes).
pub const MAX_GENA_BODY_SIZE: usize = 64 * 1024;

// ─────────────────────────────────────────────────────────────────────────────
// Hermes / MQTT
// ─────────────────────────────────────────────────────────────────────────────

/// Clip length assumed when a WAV header cannot be parsed (ms).
pub const FALLBACK_CLIP_LENGTH_MS: u64 = 10_000;

/// MQTT keep-alive interval (seconds).
pub const MQTT_KEEP_ALIVE_SECS: u64 = 30;

/// Delay before polling the MQTT event loop again after an error (seconds).
pub const MQTT_RECONNECT_BACKOFF_SECS: u64 = 5;

/// Capacity of the MQTT client's request channel.
pub const MQTT_CHANNEL_CAPACITY: usize = 100;

/// Largest inbound MQTT packet accepted (bytes). Spoken responses are WAV blobs.
pub const MQTT_MAX_PACKET_SIZE: usize = 16 * 1024 * 1024;

// ─────────────────────────────────────────────────────────────────────────────
// Application Identity
// ─────────────────────────────────────────────────────────────────────────────

/// Application name used in protocol data (DIDL-Lite metadata).
pub const APP_NAME: &str = "Sonos Relay";

/// Service identifier reported by the health endpoint and used as MQTT client id.
pub const SERVICE_ID: &str = "sonos-relay";
