//! Sonos domain types returned by the device capability interface.

use serde::Serialize;
use thiserror::Error;

// ─────────────────────────────────────────────────────────────────────────────
// Transport State
// ─────────────────────────────────────────────────────────────────────────────

/// Playback transport state as reported by the AVTransport service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TransportState {
    Playing,
    #[serde(rename = "PAUSED_PLAYBACK")]
    Paused,
    Stopped,
    Transitioning,
    /// `NO_MEDIA_PRESENT` and anything else Sonos may report.
    Other,
}

impl TransportState {
    /// Whether a snapshot taken in this state should resume playback on restore.
    #[must_use]
    pub fn is_playing(&self) -> bool {
        matches!(self, Self::Playing | Self::Transitioning)
    }
}

impl std::fmt::Display for TransportState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Playing => write!(f, "Playing"),
            Self::Paused => write!(f, "Paused"),
            Self::Stopped => write!(f, "Stopped"),
            Self::Transitioning => write!(f, "Transitioning"),
            Self::Other => write!(f, "Other"),
        }
    }
}

/// Error returned when parsing an empty transport state string.
#[derive(Debug, Clone, Error)]
#[error("empty transport state")]
pub struct ParseTransportStateError;

impl std::str::FromStr for TransportState {
    type Err = ParseTransportStateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "" => Err(ParseTransportStateError),
            "PLAYING" => Ok(Self::Playing),
            "PAUSED_PLAYBACK" | "PAUSED" => Ok(Self::Paused),
            "STOPPED" => Ok(Self::Stopped),
            "TRANSITIONING" => Ok(Self::Transitioning),
            _ => Ok(Self::Other),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Media / Position
// ─────────────────────────────────────────────────────────────────────────────

/// The transport URI currently loaded on a speaker (`GetMediaInfo`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaInfo {
    pub current_uri: String,
    pub current_uri_metadata: String,
}

/// Track position within the current transport URI (`GetPositionInfo`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionInfo {
    /// 1-based queue index; 0 when the source has no tracks (radio, line-in).
    pub track: u32,
    pub track_duration: String,
    pub track_uri: String,
    /// Elapsed time in `H:MM:SS` form.
    pub rel_time: String,
    pub rel_time_ms: u64,
}

impl PositionInfo {
    /// Parses a `H:MM:SS` (optionally `H:MM:SS.mmm`) time into milliseconds.
    ///
    /// Returns 0 for `NOT_IMPLEMENTED` and other malformed values.
    #[must_use]
    pub fn parse_time_to_ms(time: &str) -> u64 {
        let parts: Vec<&str> = time.trim().split(':').collect();
        if parts.len() != 3 {
            return 0;
        }
        let hours: u64 = parts[0].parse().unwrap_or(0);
        let minutes: u64 = parts[1].parse().unwrap_or(0);
        let (secs, millis) = match parts[2].split_once('.') {
            Some((s, ms)) => (s.parse().unwrap_or(0u64), ms.parse().unwrap_or(0u64)),
            None => (parts[2].parse().unwrap_or(0), 0),
        };
        ((hours * 60 + minutes) * 60 + secs) * 1000 + millis
    }
}

/// Arguments for `SetAVTransportURI`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportUri {
    pub uri: String,
    pub metadata: String,
    /// When false, playback is started right after the URI is set.
    pub only_set_uri: bool,
}

// ─────────────────────────────────────────────────────────────────────────────
// Zone Groups
// ─────────────────────────────────────────────────────────────────────────────

/// A playable speaker found in the zone group topology.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ZoneGroupMember {
    /// Unique identifier in RINCON_xxxxx format.
    pub uuid: String,
    pub ip: String,
    /// User-configured room name.
    pub zone_name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_state_parses_upnp_values() {
        assert_eq!("PLAYING".parse::<TransportState>().unwrap(), TransportState::Playing);
        assert_eq!(
            "PAUSED_PLAYBACK".parse::<TransportState>().unwrap(),
            TransportState::Paused
        );
        assert_eq!("STOPPED".parse::<TransportState>().unwrap(), TransportState::Stopped);
        assert_eq!(
            "NO_MEDIA_PRESENT".parse::<TransportState>().unwrap(),
            TransportState::Other
        );
        assert!("".parse::<TransportState>().is_err());
    }

    #[test]
    fn playing_and_transitioning_count_as_playing() {
        assert!(TransportState::Playing.is_playing());
        assert!(TransportState::Transitioning.is_playing());
        assert!(!TransportState::Paused.is_playing());
        assert!(!TransportState::Stopped.is_playing());
        assert!(!TransportState::Other.is_playing());
    }

    #[test]
    fn parse_time_to_ms_handles_common_formats() {
        assert_eq!(PositionInfo::parse_time_to_ms("0:00:00"), 0);
        assert_eq!(PositionInfo::parse_time_to_ms("0:01:05"), 65_000);
        assert_eq!(PositionInfo::parse_time_to_ms("1:00:00"), 3_600_000);
        assert_eq!(PositionInfo::parse_time_to_ms("0:00:02.500"), 2_500);
        assert_eq!(PositionInfo::parse_time_to_ms("NOT_IMPLEMENTED"), 0);
    }
}
