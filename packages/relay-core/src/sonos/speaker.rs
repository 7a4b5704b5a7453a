//! SOAP-backed [`SonosDevice`] implementation for a single Sonos speaker.

use std::fmt;

use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::Client;
use tokio::sync::broadcast;

use crate::sonos::retry::with_retry;
use crate::sonos::services::SonosService;
use crate::sonos::soap::{SoapError, SoapRequest, SoapResult};
use crate::sonos::traits::SonosDevice;
use crate::sonos::types::{MediaInfo, PositionInfo, TransportState, TransportUri};
use crate::sonos::utils::extract_xml_text;

/// Capacity of the per-speaker "playback stopped" channel.
const STOPPED_CHANNEL_CAPACITY: usize = 16;

/// A Sonos speaker controlled over UPnP/SOAP.
///
/// Transport state changes arrive from GENA notifications via
/// [`SonosSpeaker::report_transport_state`]; a transition into `STOPPED`
/// is rebroadcast to [`SonosDevice::playback_stopped`] subscribers.
pub struct SonosSpeaker {
    client: Client,
    ip: String,
    uuid: String,
    last_state: Mutex<Option<TransportState>>,
    stopped_tx: broadcast::Sender<()>,
}

impl fmt::Debug for SonosSpeaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SonosSpeaker")
            .field("ip", &self.ip)
            .field("uuid", &self.uuid)
            .finish_non_exhaustive()
    }
}

impl SonosSpeaker {
    /// Creates a speaker handle.
    ///
    /// # Arguments
    /// * `client` - Shared HTTP client for SOAP requests
    /// * `ip` - Speaker IP address
    /// * `uuid` - RINCON identifier from the zone group topology
    #[must_use]
    pub fn new(client: Client, ip: impl Into<String>, uuid: impl Into<String>) -> Self {
        let (stopped_tx, _) = broadcast::channel(STOPPED_CHANNEL_CAPACITY);
        Self {
            client,
            ip: ip.into(),
            uuid: uuid.into(),
            last_state: Mutex::new(None),
            stopped_tx,
        }
    }

    #[must_use]
    pub fn ip(&self) -> &str {
        &self.ip
    }

    #[must_use]
    pub fn uuid(&self) -> &str {
        &self.uuid
    }

    /// Records a transport state reported by an AVTransport event.
    ///
    /// Returns true if this report produced a "playback stopped" event.
    pub fn report_transport_state(&self, state: TransportState) -> bool {
        let previous = self.last_state.lock().replace(state);
        let stopped = state == TransportState::Stopped && previous != Some(TransportState::Stopped);
        if stopped {
            log::debug!("[Sonos] {} playback stopped", self.ip);
            // No receivers is fine: nobody is waiting on this speaker
            let _ = self.stopped_tx.send(());
        }
        stopped
    }

    fn request<'a>(&'a self, service: SonosService, action: &'a str) -> SoapRequest<'a> {
        SoapRequest::new(&self.client, &self.ip, service, action)
    }
}

#[async_trait]
impl SonosDevice for SonosSpeaker {
    fn id(&self) -> &str {
        &self.ip
    }

    async fn get_volume(&self) -> SoapResult<u8> {
        let response = self
            .request(SonosService::RenderingControl, "GetVolume")
            .instance_id()
            .arg("Channel", "Master")
            .send()
            .await?;

        let volume = extract_xml_text(&response, "CurrentVolume").ok_or(SoapError::Parse)?;
        volume.trim().parse().map_err(|_| SoapError::Parse)
    }

    async fn set_volume(&self, volume: u8) -> SoapResult<()> {
        let clamped = volume.min(100);
        self.request(SonosService::RenderingControl, "SetVolume")
            .instance_id()
            .arg("Channel", "Master")
            .arg("DesiredVolume", clamped.to_string())
            .send()
            .await?;
        Ok(())
    }

    async fn get_current_state(&self) -> SoapResult<TransportState> {
        let response = self
            .request(SonosService::AVTransport, "GetTransportInfo")
            .instance_id()
            .send()
            .await?;

        extract_xml_text(&response, "CurrentTransportState")
            .and_then(|s| s.parse().ok())
            .ok_or(SoapError::Parse)
    }

    async fn get_media_info(&self) -> SoapResult<MediaInfo> {
        let response = self
            .request(SonosService::AVTransport, "GetMediaInfo")
            .instance_id()
            .send()
            .await?;

        Ok(MediaInfo {
            current_uri: extract_xml_text(&response, "CurrentURI").unwrap_or_default(),
            current_uri_metadata: extract_xml_text(&response, "CurrentURIMetaData")
                .unwrap_or_default(),
        })
    }

    async fn get_position_info(&self) -> SoapResult<PositionInfo> {
        let response = self
            .request(SonosService::AVTransport, "GetPositionInfo")
            .instance_id()
            .send()
            .await?;

        let rel_time = extract_xml_text(&response, "RelTime").unwrap_or_default();
        Ok(PositionInfo {
            track: extract_xml_text(&response, "Track")
                .and_then(|t| t.trim().parse().ok())
                .unwrap_or(0),
            track_duration: extract_xml_text(&response, "TrackDuration").unwrap_or_default(),
            track_uri: extract_xml_text(&response, "TrackURI").unwrap_or_default(),
            rel_time_ms: PositionInfo::parse_time_to_ms(&rel_time),
            rel_time,
        })
    }

    async fn set_av_transport_uri(&self, request: &TransportUri) -> SoapResult<()> {
        with_retry("SetAVTransportURI", || {
            self.request(SonosService::AVTransport, "SetAVTransportURI")
                .instance_id()
                .arg("CurrentURI", request.uri.clone())
                .arg("CurrentURIMetaData", request.metadata.clone())
                .send()
        })
        .await?;

        log::info!("[Sonos] {} transport URI set to {}", self.ip, request.uri);

        if request.only_set_uri {
            return Ok(());
        }
        self.play().await
    }

    async fn select_track(&self, track: u32) -> SoapResult<()> {
        let target = track.to_string();
        with_retry("Seek(TRACK_NR)", || {
            self.request(SonosService::AVTransport, "Seek")
                .instance_id()
                .arg("Unit", "TRACK_NR")
                .arg("Target", target.clone())
                .send()
        })
        .await?;
        Ok(())
    }

    async fn seek(&self, rel_time: &str) -> SoapResult<()> {
        with_retry("Seek(REL_TIME)", || {
            self.request(SonosService::AVTransport, "Seek")
                .instance_id()
                .arg("Unit", "REL_TIME")
                .arg("Target", rel_time)
                .send()
        })
        .await?;
        Ok(())
    }

    async fn play(&self) -> SoapResult<()> {
        with_retry("Play", || {
            self.request(SonosService::AVTransport, "Play")
                .instance_id()
                .arg("Speed", "1")
                .send()
        })
        .await?;
        Ok(())
    }

    async fn pause(&self) -> SoapResult<()> {
        with_retry("Pause", || {
            self.request(SonosService::AVTransport, "Pause")
                .instance_id()
                .send()
        })
        .await?;
        Ok(())
    }

    fn playback_stopped(&self) -> broadcast::Receiver<()> {
        self.stopped_tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn speaker() -> SonosSpeaker {
        SonosSpeaker::new(Client::new(), "192.168.1.10", "RINCON_1")
    }

    #[test]
    fn stopped_fires_only_on_transition_into_stopped() {
        let speaker = speaker();
        let mut rx = speaker.playback_stopped();

        assert!(!speaker.report_transport_state(TransportState::Playing));
        assert!(speaker.report_transport_state(TransportState::Stopped));
        assert!(!speaker.report_transport_state(TransportState::Stopped));
        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());

        assert!(!speaker.report_transport_state(TransportState::Transitioning));
        assert!(speaker.report_transport_state(TransportState::Stopped));
        assert!(rx.try_recv().is_ok());
    }

    #[test]
    fn first_report_of_stopped_counts_as_transition() {
        let speaker = speaker();
        assert!(speaker.report_transport_state(TransportState::Stopped));
    }

    #[test]
    fn id_is_ip() {
        let speaker = speaker();
        assert_eq!(speaker.id(), "192.168.1.10");
        assert_eq!(speaker.uuid(), "RINCON_1");
    }
}
