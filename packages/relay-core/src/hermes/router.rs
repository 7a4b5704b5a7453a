//! Routes Hermes messages to room operations.
//!
//! [`EventRouter::dispatch`] does the short, order-sensitive part of each
//! message inline (parsing, caching, enqueueing, taking an interrupting
//! clip's turn) and spawns whatever waits on speakers, so the caller can
//! feed messages in arrival order.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use serde::Deserialize;

use super::topics::{self, HermesTopic};
use super::{BusPublisher, RouterError};
use crate::audio::{wav, AudioCache};
use crate::config::{Config, PlaybackMode};
use crate::protocol_constants::FALLBACK_CLIP_LENGTH_MS;
use crate::room::{AudioSession, Room, RoomRegistry};
use crate::runtime::{TaskSpawner, TokioSpawner};

/// Dialogue payloads only matter for the site they concern.
#[derive(Debug, Deserialize)]
struct SitePayload {
    #[serde(rename = "siteId")]
    site_id: String,
}

/// Turns bus messages into room operations.
pub struct EventRouter {
    rooms: RoomRegistry,
    cache: Arc<AudioCache>,
    publisher: Arc<dyn BusPublisher>,
    spawner: TokioSpawner,
    site_rooms: BTreeMap<String, String>,
    volume: u8,
    mode: PlaybackMode,
    hotword: bool,
    thaw_grace: Duration,
}

impl EventRouter {
    /// Creates a router spawning onto the current Tokio runtime.
    ///
    /// # Panics
    ///
    /// Panics if called outside of a Tokio runtime context.
    pub fn new(
        config: &Config,
        rooms: RoomRegistry,
        cache: Arc<AudioCache>,
        publisher: Arc<dyn BusPublisher>,
    ) -> Self {
        Self {
            rooms,
            cache,
            publisher,
            spawner: TokioSpawner::current(),
            site_rooms: config.site_rooms.clone(),
            volume: config.volume,
            mode: config.playback_mode,
            hotword: config.hotword,
            thaw_grace: config.thaw_grace(),
        }
    }

    /// Topic filters the bus connection should subscribe to.
    #[must_use]
    pub fn subscriptions(&self) -> Vec<&'static str> {
        topics::subscription_filters(self.hotword)
    }

    /// Handles one inbound message.
    ///
    /// Sites without a room mapping and rooms that were not discovered are
    /// logged and dropped without an error.
    ///
    /// # Errors
    ///
    /// Returns [`RouterError::UnknownTopic`] for topics outside the Hermes set
    /// and [`RouterError::MalformedPayload`] for unreadable dialogue payloads.
    pub fn dispatch(&self, topic: &str, payload: &[u8]) -> Result<(), RouterError> {
        match HermesTopic::parse(topic) {
            Some(HermesTopic::PlayBytes {
                site_id,
                request_id,
            }) => {
                self.play_bytes(&site_id, &request_id, payload);
                Ok(())
            }
            Some(HermesTopic::HotwordDetected) => self.hotword_detected(topic, payload),
            Some(HermesTopic::SessionEnded) => self.session_ended(topic, payload),
            None => Err(RouterError::UnknownTopic(topic.to_string())),
        }
    }

    fn resolve_room(&self, site_id: &str) -> Option<Arc<Room>> {
        let Some(room_name) = self.site_rooms.get(site_id) else {
            log::warn!("[Router] No Sonos room defined for site \"{}\"", site_id);
            return None;
        };
        let room = self.rooms.get(room_name);
        if room.is_none() {
            log::warn!(
                "[Router] No Sonos devices found for room \"{}\" (site \"{}\")",
                room_name,
                site_id
            );
        }
        room
    }

    fn play_bytes(&self, site_id: &str, request_id: &str, payload: &[u8]) {
        let Some(room) = self.resolve_room(site_id) else {
            return;
        };

        let length_ms = wav::duration_ms(payload).unwrap_or_else(|e| {
            log::warn!(
                "[Router] Could not read length of {}: {}; assuming {} ms",
                request_id,
                e,
                FALLBACK_CLIP_LENGTH_MS
            );
            FALLBACK_CLIP_LENGTH_MS
        });
        let uri = self
            .cache
            .store(request_id, Bytes::copy_from_slice(payload));
        log::info!(
            "[Router] Received {} ms of audio for site \"{}\" -> {}",
            length_ms,
            site_id,
            room.name()
        );

        let session = AudioSession::new(uri, length_ms)
            .with_volume(self.volume)
            .on_finished(self.play_finished_callback(site_id, request_id));

        match self.mode {
            PlaybackMode::Queue => {
                room.play_notification(session, &self.spawner);
            }
            PlaybackMode::Interrupt => {
                // Take the clip's turn now so bus order decides pre-emption
                let play = room.play_audio(session);
                self.spawner.spawn(async move {
                    play.await;
                });
            }
        }
    }

    /// Drops the cached clip and announces `playFinished` for it.
    fn play_finished_callback(
        &self,
        site_id: &str,
        request_id: &str,
    ) -> impl FnOnce(bool) + Send + 'static {
        let cache = Arc::clone(&self.cache);
        let publisher = Arc::clone(&self.publisher);
        let spawner = self.spawner.clone();
        let topic = topics::play_finished(site_id);
        let request_id = request_id.to_string();
        let body = serde_json::json!({ "id": request_id, "siteId": site_id }).to_string();

        move |cancelled| {
            cache.remove(&request_id);
            if cancelled {
                log::debug!("[Router] {} was pre-empted", request_id);
            }
            spawner.spawn(async move {
                publisher.publish(&topic, body.into_bytes()).await;
            });
        }
    }

    fn site_room(&self, topic: &str, payload: &[u8]) -> Result<Option<Arc<Room>>, RouterError> {
        let parsed: SitePayload =
            serde_json::from_slice(payload).map_err(|e| RouterError::MalformedPayload {
                topic: topic.to_string(),
                reason: e.to_string(),
            })?;
        Ok(self.resolve_room(&parsed.site_id))
    }

    fn hotword_detected(&self, topic: &str, payload: &[u8]) -> Result<(), RouterError> {
        if !self.hotword {
            log::debug!("[Router] Ignoring hotword, freezing is disabled");
            return Ok(());
        }
        if let Some(room) = self.site_room(topic, payload)? {
            log::info!("[Router] Hotword detected, freezing {}", room.name());
            self.spawner.spawn(async move { room.freeze().await });
        }
        Ok(())
    }

    fn session_ended(&self, topic: &str, payload: &[u8]) -> Result<(), RouterError> {
        if !self.hotword {
            return Ok(());
        }
        if let Some(room) = self.site_room(topic, payload)? {
            let grace = self.thaw_grace;
            log::info!("[Router] Dialogue ended, thawing {} in {:?}", room.name(), grace);
            self.spawner.spawn(async move {
                tokio::time::sleep(grace).await;
                room.thaw().await;
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::wav::build_wav;
    use crate::context::NetworkContext;
    use crate::room::mock::{Call, MockDevice};
    use crate::room::RoomStatus;
    use crate::sonos::traits::SonosDevice;
    use crate::sonos::types::TransportState;
    use async_trait::async_trait;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct RecordingPublisher {
        sent: Mutex<Vec<(String, serde_json::Value)>>,
    }

    #[async_trait]
    impl BusPublisher for RecordingPublisher {
        async fn publish(&self, topic: &str, payload: Vec<u8>) {
            let value = serde_json::from_slice(&payload).unwrap();
            self.sent.lock().push((topic.to_string(), value));
        }
    }

    struct Fixture {
        router: EventRouter,
        device: Arc<MockDevice>,
        cache: Arc<AudioCache>,
        publisher: Arc<RecordingPublisher>,
        room: Arc<Room>,
    }

    fn fixture(device: MockDevice, config: Config) -> Fixture {
        let device = Arc::new(device);
        let mut rooms = RoomRegistry::new();
        let room = rooms.insert(Room::new(
            "Kitchen",
            vec![Arc::clone(&device) as Arc<dyn SonosDevice>],
        ));
        let cache = Arc::new(AudioCache::new(NetworkContext::explicit(8080, "10.0.0.2")));
        let publisher = Arc::new(RecordingPublisher::default());
        let config = Config {
            site_rooms: crate::config::parse_site_room_map("kitchen=Kitchen,attic=Attic"),
            ..config
        };
        let router = EventRouter::new(
            &config,
            rooms,
            Arc::clone(&cache),
            Arc::clone(&publisher) as Arc<dyn BusPublisher>,
        );
        Fixture {
            router,
            device,
            cache,
            publisher,
            room,
        }
    }

    fn one_second_clip() -> Vec<u8> {
        build_wav(16000, 1, 32000, false)
    }

    #[tokio::test(start_paused = true)]
    async fn queued_clip_plays_then_reports_finished() {
        let f = fixture(
            MockDevice::new("kitchen-1").stops_after(Duration::from_millis(1000)),
            Config::default(),
        );

        f.router
            .dispatch("hermes/audioServer/kitchen/playBytes/req-1", &one_second_clip())
            .unwrap();
        assert_eq!(f.cache.len(), 1);

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(
            f.device.count(&Call::SetUri {
                uri: "http://10.0.0.2:8080/audio/req-1.wav".into(),
                only_set_uri: false,
            }),
            1
        );
        assert_eq!(f.device.count(&Call::SetVolume(30)), 1);
        assert!(f.publisher.sent.lock().is_empty());

        tokio::time::sleep(Duration::from_secs(3)).await;
        assert!(f.cache.is_empty());
        let sent = f.publisher.sent.lock().clone();
        assert_eq!(
            sent,
            vec![(
                "hermes/audioServer/kitchen/playFinished".to_string(),
                serde_json::json!({ "id": "req-1", "siteId": "kitchen" }),
            )]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn unreadable_wav_falls_back_to_ten_seconds() {
        let f = fixture(MockDevice::new("kitchen-1"), Config::default());

        f.router
            .dispatch("hermes/audioServer/kitchen/playBytes/req-2", b"not a wav")
            .unwrap();

        tokio::time::sleep(Duration::from_secs(9)).await;
        assert!(f.publisher.sent.lock().is_empty());
        assert_eq!(f.cache.len(), 1);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(f.publisher.sent.lock().len(), 1);
        assert!(f.cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn unmapped_site_and_missing_room_are_dropped() {
        let f = fixture(MockDevice::new("kitchen-1"), Config::default());

        f.router
            .dispatch("hermes/audioServer/garage/playBytes/a", &one_second_clip())
            .unwrap();
        f.router
            .dispatch("hermes/audioServer/attic/playBytes/b", &one_second_clip())
            .unwrap();
        tokio::time::sleep(Duration::from_secs(15)).await;

        assert!(f.cache.is_empty());
        assert!(f.device.calls().is_empty());
        assert!(f.publisher.sent.lock().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn foreign_topic_is_an_error() {
        let f = fixture(MockDevice::new("kitchen-1"), Config::default());
        assert!(matches!(
            f.router.dispatch("hermes/tts/say", b"{}"),
            Err(RouterError::UnknownTopic(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn interrupt_mode_pre_empts_the_running_clip() {
        let f = fixture(
            MockDevice::new("kitchen-1").stops_after(Duration::from_millis(1000)),
            Config {
                playback_mode: PlaybackMode::Interrupt,
                ..Config::default()
            },
        );

        let long_clip = build_wav(16000, 1, 32000 * 5, false);
        f.router
            .dispatch("hermes/audioServer/kitchen/playBytes/first", &long_clip)
            .unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        f.router
            .dispatch("hermes/audioServer/kitchen/playBytes/second", &one_second_clip())
            .unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        // The first clip is released as soon as the second takes over
        let ids: Vec<_> = f
            .publisher
            .sent
            .lock()
            .iter()
            .map(|(_, body)| body["id"].clone())
            .collect();
        assert_eq!(ids, vec![serde_json::json!("first")]);

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(f.publisher.sent.lock().len(), 2);
        assert!(f.cache.is_empty());
        assert_eq!(f.room.status(), RoomStatus::Idle);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn interrupting_clips_keep_bus_order_across_workers() {
        for run in 0..100 {
            let f = fixture(
                MockDevice::new("kitchen-1").stops_after(Duration::from_millis(5)),
                Config {
                    playback_mode: PlaybackMode::Interrupt,
                    ..Config::default()
                },
            );

            f.router
                .dispatch("hermes/audioServer/kitchen/playBytes/first", &one_second_clip())
                .unwrap();
            f.router
                .dispatch("hermes/audioServer/kitchen/playBytes/second", &one_second_clip())
                .unwrap();

            tokio::time::timeout(Duration::from_secs(5), async {
                while f.publisher.sent.lock().len() < 2 {
                    tokio::time::sleep(Duration::from_millis(1)).await;
                }
            })
            .await
            .unwrap_or_else(|_| panic!("run {run}: both clips should be reported"));

            let clips: Vec<String> = f
                .device
                .calls()
                .into_iter()
                .filter_map(|call| match call {
                    Call::SetUri {
                        uri,
                        only_set_uri: false,
                    } => Some(uri),
                    _ => None,
                })
                .collect();
            assert_eq!(
                clips.last().map(String::as_str),
                Some("http://10.0.0.2:8080/audio/second.wav"),
                "run {run}: {clips:?}"
            );
        }
    }

    #[tokio::test(start_paused = true)]
    async fn hotword_freezes_and_session_end_thaws_after_grace() {
        let device = MockDevice::new("kitchen-1");
        device.set_state(|s| s.transport = TransportState::Playing);
        let f = fixture(
            device,
            Config {
                hotword: true,
                thaw_grace_ms: 500,
                ..Config::default()
            },
        );
        assert_eq!(f.router.subscriptions().len(), 3);

        f.router
            .dispatch("hermes/hotword/default/detected", br#"{"siteId":"kitchen"}"#)
            .unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(f.room.status(), RoomStatus::Frozen);
        assert_eq!(f.device.count(&Call::Pause), 1);

        f.router
            .dispatch("hermes/dialogueManager/sessionEnded", br#"{"siteId":"kitchen"}"#)
            .unwrap();
        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(f.room.status(), RoomStatus::Frozen);

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(f.room.status(), RoomStatus::Idle);
        assert_eq!(f.device.count(&Call::Play), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn hotword_is_ignored_when_disabled() {
        let f = fixture(MockDevice::new("kitchen-1"), Config::default());

        f.router
            .dispatch("hermes/hotword/default/detected", br#"{"siteId":"kitchen"}"#)
            .unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(f.room.status(), RoomStatus::Idle);
        assert!(f.device.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn malformed_dialogue_payload_is_reported() {
        let f = fixture(
            MockDevice::new("kitchen-1"),
            Config {
                hotword: true,
                ..Config::default()
            },
        );

        let result = f
            .router
            .dispatch("hermes/dialogueManager/sessionEnded", b"{\"site\":1}");
        assert!(matches!(
            result,
            Err(RouterError::MalformedPayload { ref topic, .. }) if topic == "hermes/dialogueManager/sessionEnded"
        ));
    }
}
