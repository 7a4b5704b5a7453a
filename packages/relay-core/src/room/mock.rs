//! In-memory [`SonosDevice`] for room tests.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::broadcast;

use crate::sonos::soap::{SoapError, SoapResult};
use crate::sonos::traits::SonosDevice;
use crate::sonos::types::{MediaInfo, PositionInfo, TransportState, TransportUri};

/// Shared, ordered log of calls across devices and callbacks.
pub type Journal = Arc<Mutex<Vec<String>>>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    GetState,
    GetVolume,
    GetMediaInfo,
    GetPositionInfo,
    SetVolume(u8),
    SetUri { uri: String, only_set_uri: bool },
    SelectTrack(u32),
    Seek(String),
    Play,
    Pause,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockState {
    pub volume: u8,
    pub transport: TransportState,
    pub uri: String,
    pub metadata: String,
    pub track: u32,
    pub rel_time: String,
}

impl Default for MockState {
    fn default() -> Self {
        Self {
            volume: 25,
            transport: TransportState::Stopped,
            uri: String::new(),
            metadata: String::new(),
            track: 0,
            rel_time: "0:00:00".into(),
        }
    }
}

pub struct MockDevice {
    id: String,
    state: Arc<Mutex<MockState>>,
    calls: Mutex<Vec<Call>>,
    failures: Mutex<Vec<Call>>,
    journal: Option<Journal>,
    stopped_tx: broadcast::Sender<()>,
    play_for: Mutex<Option<Duration>>,
}

impl MockDevice {
    pub fn new(id: &str) -> Self {
        let (stopped_tx, _) = broadcast::channel(8);
        Self {
            id: id.to_string(),
            state: Arc::new(Mutex::new(MockState::default())),
            calls: Mutex::new(Vec::new()),
            failures: Mutex::new(Vec::new()),
            journal: None,
            stopped_tx,
            play_for: Mutex::new(None),
        }
    }

    pub fn with_journal(mut self, journal: &Journal) -> Self {
        self.journal = Some(Arc::clone(journal));
        self
    }

    /// Clips started with `only_set_uri = false` report "stopped" after `duration`.
    pub fn stops_after(self, duration: Duration) -> Self {
        *self.play_for.lock() = Some(duration);
        self
    }

    pub fn set_state(&self, f: impl FnOnce(&mut MockState)) {
        f(&mut self.state.lock());
    }

    pub fn state(&self) -> MockState {
        self.state.lock().clone()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    pub fn count(&self, call: &Call) -> usize {
        self.calls.lock().iter().filter(|c| *c == call).count()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }

    pub fn fail_on(&self, call: Call) {
        self.failures.lock().push(call);
    }

    pub fn emit_stopped(&self) {
        self.state.lock().transport = TransportState::Stopped;
        let _ = self.stopped_tx.send(());
    }

    fn record(&self, call: Call) -> SoapResult<()> {
        if let Some(journal) = &self.journal {
            journal.lock().push(format!("{}:{:?}", self.id, call));
        }
        let fail = self.failures.lock().contains(&call);
        self.calls.lock().push(call);
        if fail {
            Err(SoapError::fault("mock failure"))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl SonosDevice for MockDevice {
    fn id(&self) -> &str {
        &self.id
    }

    async fn get_volume(&self) -> SoapResult<u8> {
        self.record(Call::GetVolume)?;
        Ok(self.state.lock().volume)
    }

    async fn set_volume(&self, volume: u8) -> SoapResult<()> {
        self.record(Call::SetVolume(volume))?;
        self.state.lock().volume = volume.min(100);
        Ok(())
    }

    async fn get_current_state(&self) -> SoapResult<TransportState> {
        self.record(Call::GetState)?;
        Ok(self.state.lock().transport)
    }

    async fn get_media_info(&self) -> SoapResult<MediaInfo> {
        self.record(Call::GetMediaInfo)?;
        let state = self.state.lock();
        Ok(MediaInfo {
            current_uri: state.uri.clone(),
            current_uri_metadata: state.metadata.clone(),
        })
    }

    async fn get_position_info(&self) -> SoapResult<PositionInfo> {
        self.record(Call::GetPositionInfo)?;
        let state = self.state.lock();
        Ok(PositionInfo {
            track: state.track,
            track_duration: "0:03:00".into(),
            track_uri: state.uri.clone(),
            rel_time: state.rel_time.clone(),
            rel_time_ms: PositionInfo::parse_time_to_ms(&state.rel_time),
        })
    }

    async fn set_av_transport_uri(&self, request: &TransportUri) -> SoapResult<()> {
        self.record(Call::SetUri {
            uri: request.uri.clone(),
            only_set_uri: request.only_set_uri,
        })?;
        {
            let mut state = self.state.lock();
            state.uri = request.uri.clone();
            state.metadata = request.metadata.clone();
            state.track = 0;
            state.rel_time = "0:00:00".into();
            state.transport = if request.only_set_uri {
                TransportState::Stopped
            } else {
                TransportState::Playing
            };
        }

        let play_for = *self.play_for.lock();
        if let (false, Some(duration)) = (request.only_set_uri, play_for) {
            let state = Arc::clone(&self.state);
            let tx = self.stopped_tx.clone();
            tokio::spawn(async move {
                tokio::time::sleep(duration).await;
                state.lock().transport = TransportState::Stopped;
                let _ = tx.send(());
            });
        }
        Ok(())
    }

    async fn select_track(&self, track: u32) -> SoapResult<()> {
        self.record(Call::SelectTrack(track))?;
        self.state.lock().track = track;
        Ok(())
    }

    async fn seek(&self, rel_time: &str) -> SoapResult<()> {
        self.record(Call::Seek(rel_time.to_string()))?;
        self.state.lock().rel_time = rel_time.to_string();
        Ok(())
    }

    async fn play(&self) -> SoapResult<()> {
        self.record(Call::Play)?;
        self.state.lock().transport = TransportState::Playing;
        Ok(())
    }

    async fn pause(&self) -> SoapResult<()> {
        self.record(Call::Pause)?;
        self.state.lock().transport = TransportState::Paused;
        Ok(())
    }

    fn playback_stopped(&self) -> broadcast::Receiver<()> {
        self.stopped_tx.subscribe()
    }
}
