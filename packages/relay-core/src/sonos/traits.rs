//! Device capability interface.
//!
//! The room coordinator only ever talks to speakers through [`SonosDevice`],
//! which keeps it independent of SOAP and lets tests drive it with in-memory
//! devices.

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::sonos::soap::SoapResult;
use crate::sonos::types::{MediaInfo, PositionInfo, TransportState, TransportUri};

/// Control surface of a single playback device.
#[async_trait]
pub trait SonosDevice: Send + Sync {
    /// Stable identifier used in logs (IP address for real speakers).
    fn id(&self) -> &str;

    /// Current speaker volume (0-100).
    async fn get_volume(&self) -> SoapResult<u8>;

    /// Sets the speaker volume (values above 100 are clamped).
    async fn set_volume(&self, volume: u8) -> SoapResult<()>;

    async fn get_current_state(&self) -> SoapResult<TransportState>;

    async fn get_media_info(&self) -> SoapResult<MediaInfo>;

    async fn get_position_info(&self) -> SoapResult<PositionInfo>;

    /// Loads a transport URI, then starts playback unless `only_set_uri` is set.
    async fn set_av_transport_uri(&self, request: &TransportUri) -> SoapResult<()>;

    /// Jumps to a 1-based track in the current queue.
    async fn select_track(&self, track: u32) -> SoapResult<()>;

    /// Seeks within the current track to a `H:MM:SS` position.
    async fn seek(&self, rel_time: &str) -> SoapResult<()>;

    async fn play(&self) -> SoapResult<()>;

    async fn pause(&self) -> SoapResult<()>;

    /// Subscribes to "playback stopped" events, fired once per playback episode.
    ///
    /// Only events emitted after the call are delivered.
    fn playback_stopped(&self) -> broadcast::Receiver<()>;
}
