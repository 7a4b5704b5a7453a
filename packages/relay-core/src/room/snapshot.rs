//! Capture and replay of a device's restorable playback state.

use crate::sonos::soap::SoapResult;
use crate::sonos::traits::SonosDevice;
use crate::sonos::types::{MediaInfo, PositionInfo, TransportUri};

/// What a device was doing when a room froze.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceSnapshot {
    pub volume: u8,
    /// Playing or transitioning at capture time.
    pub was_playing: bool,
    pub media: MediaInfo,
    pub position: PositionInfo,
}

impl DeviceSnapshot {
    /// Queries the device's state, volume, media and position in that order.
    pub async fn take(device: &dyn SonosDevice) -> SoapResult<Self> {
        let state = device.get_current_state().await?;
        let volume = device.get_volume().await?;
        let media = device.get_media_info().await?;
        let position = device.get_position_info().await?;

        log::debug!(
            "[Snapshot] {}: state={} volume={} uri={} track={} at {}",
            device.id(),
            state,
            volume,
            media.current_uri,
            position.track,
            position.rel_time
        );

        Ok(Self {
            volume,
            was_playing: state.is_playing(),
            media,
            position,
        })
    }

    /// Replays the snapshot onto `device`, field by field.
    ///
    /// A failing field is logged and skipped; the remaining fields are still
    /// attempted. Returns true if every attempted call succeeded.
    pub async fn restore(&self, device: &dyn SonosDevice) -> bool {
        let id = device.id();
        let mut clean = true;

        if let Err(e) = device.set_volume(self.volume).await {
            log::warn!("[Snapshot] {}: failed to restore volume: {}", id, e);
            clean = false;
        }

        // An empty URI is re-applied too, so the clip does not stay loaded
        let request = TransportUri {
            uri: self.media.current_uri.clone(),
            metadata: self.media.current_uri_metadata.clone(),
            only_set_uri: true,
        };
        if let Err(e) = device.set_av_transport_uri(&request).await {
            log::warn!("[Snapshot] {}: failed to restore transport URI: {}", id, e);
            clean = false;
        }

        if self.position.track > 0 {
            if let Err(e) = device.select_track(self.position.track).await {
                log::warn!("[Snapshot] {}: failed to select track {}: {}", id, self.position.track, e);
                clean = false;
            }
            if let Err(e) = device.seek(&self.position.rel_time).await {
                log::warn!("[Snapshot] {}: failed to seek to {}: {}", id, self.position.rel_time, e);
                clean = false;
            }
        }

        if self.was_playing {
            if let Err(e) = device.play().await {
                log::warn!("[Snapshot] {}: failed to resume playback: {}", id, e);
                clean = false;
            }
        }

        log::debug!("[Snapshot] {}: restored (clean={})", id, clean);
        clean
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::room::mock::{Call, MockDevice};
    use crate::sonos::types::TransportState;

    #[tokio::test]
    async fn take_then_restore_leaves_device_unchanged() {
        let device = MockDevice::new("kitchen-1");
        device.set_state(|s| {
            s.volume = 35;
            s.transport = TransportState::Playing;
            s.uri = "x-rincon-queue:RINCON_1#0".into();
            s.metadata = "<DIDL-Lite/>".into();
            s.track = 3;
            s.rel_time = "0:01:23".into();
        });
        let before = device.state();

        let snapshot = DeviceSnapshot::take(&device).await.unwrap();
        assert!(snapshot.was_playing);
        assert!(snapshot.restore(&device).await);

        let after = device.state();
        assert_eq!(after.volume, before.volume);
        assert_eq!(after.uri, before.uri);
        assert_eq!(after.metadata, before.metadata);
        assert_eq!(after.track, before.track);
        assert_eq!(after.rel_time, before.rel_time);
        assert_eq!(after.transport, TransportState::Playing);
    }

    #[tokio::test]
    async fn transitioning_counts_as_playing() {
        let device = MockDevice::new("d");
        device.set_state(|s| s.transport = TransportState::Transitioning);
        assert!(DeviceSnapshot::take(&device).await.unwrap().was_playing);

        device.set_state(|s| s.transport = TransportState::Paused);
        assert!(!DeviceSnapshot::take(&device).await.unwrap().was_playing);
    }

    #[tokio::test]
    async fn restore_skips_track_and_seek_without_track_and_play_when_paused() {
        let device = MockDevice::new("d");
        device.set_state(|s| {
            s.transport = TransportState::Paused;
            s.uri = "x-sonosapi-stream:radio".into();
            s.track = 0;
        });
        let snapshot = DeviceSnapshot::take(&device).await.unwrap();
        device.clear_calls();

        snapshot.restore(&device).await;
        let calls = device.calls();
        assert!(!calls.iter().any(|c| matches!(c, Call::SelectTrack(_) | Call::Seek(_))));
        assert!(!calls.contains(&Call::Play));
        assert!(calls.contains(&Call::SetUri {
            uri: "x-sonosapi-stream:radio".into(),
            only_set_uri: true
        }));
    }

    #[tokio::test]
    async fn failing_field_does_not_block_the_rest() {
        let device = MockDevice::new("d");
        device.set_state(|s| {
            s.transport = TransportState::Playing;
            s.uri = "x-rincon-queue:RINCON_1#0".into();
            s.track = 2;
            s.rel_time = "0:00:10".into();
        });
        let snapshot = DeviceSnapshot::take(&device).await.unwrap();
        device.clear_calls();
        device.fail_on(Call::SetVolume(snapshot.volume));

        assert!(!snapshot.restore(&device).await);
        let calls = device.calls();
        assert!(calls.contains(&Call::SelectTrack(2)));
        assert!(calls.contains(&Call::Seek("0:00:10".into())));
        assert!(calls.contains(&Call::Play));
    }

    #[tokio::test]
    async fn take_propagates_query_failures() {
        let device = MockDevice::new("d");
        device.fail_on(Call::GetVolume);
        assert!(DeviceSnapshot::take(&device).await.is_err());
    }

    #[tokio::test]
    async fn empty_uri_is_still_reapplied() {
        let device = MockDevice::new("d");
        let snapshot = DeviceSnapshot::take(&device).await.unwrap();
        device.set_state(|s| s.uri = "http://10.0.0.2:8080/audio/req-1.wav".into());
        device.clear_calls();

        assert!(snapshot.restore(&device).await);
        assert!(device.calls().contains(&Call::SetUri {
            uri: String::new(),
            only_set_uri: true
        }));
        assert_eq!(device.state().uri, "");
    }
}
