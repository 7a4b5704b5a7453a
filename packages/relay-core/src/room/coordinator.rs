//! Per-room playback coordination.
//!
//! A [`Room`] drives all of its devices in lockstep. Every state-changing
//! phase (freeze, thaw, the device-control part of `play_audio`, and a whole
//! notification drain) runs while holding the room's operation guard, a FIFO
//! async mutex that also owns the freeze snapshots. Waiting for a clip to end
//! happens outside the guard so a newer clip can pre-empt it.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::{watch, Mutex};

use super::session::{AudioSession, SessionHandle, SessionOutcome};
use super::snapshot::DeviceSnapshot;
use crate::runtime::TaskSpawner;
use crate::sonos::didl::clip_metadata;
use crate::sonos::traits::SonosDevice;
use crate::sonos::types::TransportUri;

/// Extra wait past a clip's length before `play_audio` gives up on "stopped".
const PLAYBACK_GRACE: Duration = Duration::from_millis(1000);

/// Extra wait past a notification's length before moving to the next one.
const NOTIFICATION_GRACE: Duration = Duration::from_millis(250);

/// Pause after the notification queue empties, before restoring devices.
const SETTLE_DELAY: Duration = Duration::from_millis(250);

/// Freeze/thaw lifecycle of a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomStatus {
    Idle,
    Freezing,
    Frozen,
    Thawing,
}

impl std::fmt::Display for RoomStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Freezing => write!(f, "freezing"),
            Self::Frozen => write!(f, "frozen"),
            Self::Thawing => write!(f, "thawing"),
        }
    }
}

/// State owned by the operation guard.
#[derive(Default)]
struct FreezeState {
    /// One slot per device; `None` where the snapshot could not be taken.
    snapshots: Vec<Option<DeviceSnapshot>>,
    /// Set when `play_audio` froze the room itself and must thaw it afterwards.
    auto_thaw: bool,
    /// Sequence number of the newest `play_audio` call that reached the devices.
    latest_audio: u64,
}

#[derive(Default)]
struct NotificationQueue {
    entries: VecDeque<Arc<AudioSession>>,
    draining: bool,
}

/// A named group of devices operated in lockstep.
pub struct Room {
    name: String,
    devices: Vec<Arc<dyn SonosDevice>>,
    guard: Mutex<FreezeState>,
    status: watch::Sender<RoomStatus>,
    current: watch::Sender<Option<Arc<AudioSession>>>,
    queue: parking_lot::Mutex<NotificationQueue>,
    /// Last sequence number handed out by `play_audio`.
    audio_seq: AtomicU64,
}

impl std::fmt::Debug for Room {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Room")
            .field("name", &self.name)
            .field("devices", &self.devices.len())
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}

impl Room {
    pub fn new(name: impl Into<String>, devices: Vec<Arc<dyn SonosDevice>>) -> Self {
        let (status, _) = watch::channel(RoomStatus::Idle);
        let (current, _) = watch::channel(None);
        Self {
            name: name.into(),
            devices,
            guard: Mutex::new(FreezeState::default()),
            status,
            current,
            queue: parking_lot::Mutex::new(NotificationQueue::default()),
            audio_seq: AtomicU64::new(0),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn devices(&self) -> &[Arc<dyn SonosDevice>] {
        &self.devices
    }

    #[must_use]
    pub fn status(&self) -> RoomStatus {
        *self.status.borrow()
    }

    /// Receiver that observes every status transition.
    pub fn subscribe_status(&self) -> watch::Receiver<RoomStatus> {
        self.status.subscribe()
    }

    /// The session currently playing through `play_audio`, if any.
    #[must_use]
    pub fn current_session(&self) -> Option<Arc<AudioSession>> {
        self.current.borrow().clone()
    }

    fn set_status(&self, status: RoomStatus) {
        let previous = self.status.send_replace(status);
        log::info!("[Room] {}: {} -> {}", self.name, previous, status);
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Freeze / Thaw
    // ─────────────────────────────────────────────────────────────────────────

    /// Snapshots every device and pauses the ones that were playing.
    ///
    /// Resolves once the room is frozen. Freezing a frozen room logs an
    /// error and leaves the existing snapshots untouched.
    pub async fn freeze(&self) {
        let mut state = self.guard.lock().await;
        if self.status() == RoomStatus::Frozen {
            log::error!("[Room] {}: cannot freeze already frozen room", self.name);
            if state.auto_thaw {
                // An explicit freeze now owns the frozen window; wait for its thaw
                state.auto_thaw = false;
            }
            return;
        }
        self.freeze_locked(&mut state).await;
    }

    /// Restores every device from its snapshot once no session is playing.
    ///
    /// Resolves once the room is idle again. Thawing a room that is not
    /// frozen logs an error and does nothing.
    pub async fn thaw(&self) {
        let mut state = self.guard.lock().await;
        if self.status() != RoomStatus::Frozen {
            log::error!("[Room] {}: cannot thaw room that is not frozen", self.name);
            return;
        }
        self.thaw_locked(&mut state).await;
    }

    async fn freeze_locked(&self, state: &mut FreezeState) {
        self.set_status(RoomStatus::Freezing);
        // Capture before pausing: pausing first would lose "was playing"
        state.snapshots = self.take_snapshots().await;
        self.pause_playing(&state.snapshots).await;
        self.set_status(RoomStatus::Frozen);
    }

    async fn thaw_locked(&self, state: &mut FreezeState) {
        self.set_status(RoomStatus::Thawing);
        self.wait_until_no_session().await;

        let snapshots = std::mem::take(&mut state.snapshots);
        state.auto_thaw = false;
        self.restore_snapshots(&snapshots).await;
        self.set_status(RoomStatus::Idle);
    }

    async fn wait_until_no_session(&self) {
        let mut rx = self.current.subscribe();
        if rx.borrow().is_some() {
            log::info!("[Room] {}: waiting for current audio to finish", self.name);
        }
        // The sender lives as long as the room, so this only ends on None
        let _ = rx.wait_for(Option::is_none).await;
    }

    async fn take_snapshots(&self) -> Vec<Option<DeviceSnapshot>> {
        join_all(self.devices.iter().map(|device| async move {
            match DeviceSnapshot::take(device.as_ref()).await {
                Ok(snapshot) => Some(snapshot),
                Err(e) => {
                    log::warn!(
                        "[Room] {}: snapshot of {} failed, it will not be restored: {}",
                        self.name,
                        device.id(),
                        e
                    );
                    None
                }
            }
        }))
        .await
    }

    async fn pause_playing(&self, snapshots: &[Option<DeviceSnapshot>]) {
        let pauses = self
            .devices
            .iter()
            .zip(snapshots)
            .filter(|(_, snapshot)| snapshot.as_ref().is_some_and(|s| s.was_playing))
            .map(|(device, _)| async move {
                if let Err(e) = device.pause().await {
                    log::warn!("[Room] {}: failed to pause {}: {}", self.name, device.id(), e);
                }
            });
        join_all(pauses).await;
    }

    async fn restore_snapshots(&self, snapshots: &[Option<DeviceSnapshot>]) {
        let restores = self
            .devices
            .iter()
            .zip(snapshots)
            .filter_map(|(device, snapshot)| {
                snapshot.as_ref().map(|s| s.restore(device.as_ref()))
            });
        let clean = join_all(restores).await.into_iter().filter(|ok| *ok).count();
        log::info!(
            "[Room] {}: restored {}/{} device(s) cleanly",
            self.name,
            clean,
            self.devices.len()
        );
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Interrupting playback
    // ─────────────────────────────────────────────────────────────────────────

    /// Plays `session` on every device, pre-empting any session already playing.
    ///
    /// The clip's place in line is taken when this is called, not when the
    /// returned future first runs: a clip that reaches the room after a later
    /// call has already started is cancelled without touching the devices.
    ///
    /// An idle room is frozen first and thawed again once the last clip of
    /// that implicit freeze ends. Resolves with the session's outcome.
    pub fn play_audio(
        self: &Arc<Self>,
        session: AudioSession,
    ) -> impl Future<Output = SessionOutcome> + Send + 'static {
        let seq = self.audio_seq.fetch_add(1, Ordering::AcqRel) + 1;
        let room = Arc::clone(self);
        async move { room.play_audio_in_turn(Arc::new(session), seq).await }
    }

    async fn play_audio_in_turn(&self, session: Arc<AudioSession>, seq: u64) -> SessionOutcome {
        let handle = session.handle();

        let receivers = {
            let mut state = self.guard.lock().await;
            if seq < state.latest_audio {
                log::info!(
                    "[Room] {}: dropping {}, a newer clip already started",
                    self.name,
                    session.uri()
                );
                session.finish(true);
                return handle.outcome().await;
            }
            state.latest_audio = seq;

            if self.status() == RoomStatus::Idle {
                log::info!("[Room] {}: freezing before playback", self.name);
                self.freeze_locked(&mut state).await;
                state.auto_thaw = true;
            }

            let previous = self.current.borrow().clone();
            if let Some(previous) = previous {
                if previous.finish(true) {
                    log::info!("[Room] {}: cancelled {}", self.name, previous.uri());
                }
            }
            self.current.send_replace(Some(Arc::clone(&session)));

            log::info!("[Room] {}: playing {}", self.name, session.uri());
            self.start_on_devices(&session).await
        };

        let limit = Duration::from_millis(session.length_ms()) + PLAYBACK_GRACE;
        tokio::select! {
            _ = self.await_devices(receivers, limit) => {}
            _ = handle.clone().outcome() => {}
        }

        session.finish(false);
        self.current.send_if_modified(|current| {
            let is_this = current
                .as_ref()
                .is_some_and(|c| Arc::ptr_eq(c, &session));
            if is_this {
                *current = None;
            }
            is_this
        });

        self.end_implicit_freeze().await;
        handle.outcome().await
    }

    async fn end_implicit_freeze(&self) {
        let mut state = self.guard.lock().await;
        let pending = state.auto_thaw
            && self.status() == RoomStatus::Frozen
            && self.current.borrow().is_none();
        if pending {
            self.thaw_locked(&mut state).await;
        }
    }

    /// Sets volume and transport URI on every device concurrently.
    ///
    /// Returns one "stopped" receiver per device, subscribed after the URI
    /// was set; `None` where starting the clip failed.
    async fn start_on_devices(
        &self,
        session: &AudioSession,
    ) -> Vec<Option<broadcast::Receiver<()>>> {
        let request = TransportUri {
            uri: session.uri().to_string(),
            metadata: clip_metadata(session.uri()),
            only_set_uri: false,
        };
        let request = &request;

        join_all(self.devices.iter().map(|device| async move {
            if let Some(volume) = session.volume() {
                if let Err(e) = device.set_volume(volume).await {
                    log::warn!("[Room] {}: failed to set volume on {}: {}", self.name, device.id(), e);
                }
            }
            match device.set_av_transport_uri(request).await {
                Ok(()) => Some(device.playback_stopped()),
                Err(e) => {
                    log::warn!("[Room] {}: failed to start clip on {}: {}", self.name, device.id(), e);
                    None
                }
            }
        }))
        .await
    }

    /// Waits until each device reports "stopped" or `limit` elapses.
    async fn await_devices(&self, receivers: Vec<Option<broadcast::Receiver<()>>>, limit: Duration) {
        let waits = self
            .devices
            .iter()
            .zip(receivers)
            .filter_map(|(device, rx)| rx.map(|rx| (device, rx)))
            .map(|(device, mut rx)| async move {
                match tokio::time::timeout(limit, wait_stopped(&mut rx)).await {
                    Ok(()) => log::debug!("[Room] {}: {} stopped", self.name, device.id()),
                    Err(_) => log::debug!(
                        "[Room] {}: {} did not report stop within {:?}",
                        self.name,
                        device.id(),
                        limit
                    ),
                }
            });
        join_all(waits).await;
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Notification queue
    // ─────────────────────────────────────────────────────────────────────────

    /// Queues `session` to play after every notification queued before it.
    ///
    /// The first notification of a burst snapshots and pauses the room; the
    /// room is restored once, after the queue runs dry. The drain for a new
    /// burst runs on `spawner`.
    pub fn play_notification(
        self: &Arc<Self>,
        session: AudioSession,
        spawner: &impl TaskSpawner,
    ) -> SessionHandle {
        let session = Arc::new(session);
        let handle = session.handle();

        let start_drain = {
            let mut queue = self.queue.lock();
            queue.entries.push_back(session);
            !std::mem::replace(&mut queue.draining, true)
        };

        if start_drain {
            let room = Arc::clone(self);
            spawner.spawn(async move { room.drain_notifications().await });
        }
        handle
    }

    fn next_notification(&self) -> Option<Arc<AudioSession>> {
        self.queue.lock().entries.pop_front()
    }

    /// Ends the drain unless entries arrived meanwhile.
    fn release_drain_if_empty(&self) -> bool {
        let mut queue = self.queue.lock();
        if queue.entries.is_empty() {
            queue.draining = false;
            true
        } else {
            false
        }
    }

    async fn drain_notifications(&self) {
        let _state = self.guard.lock().await;

        // A frozen room is already paused and will be restored by its thaw
        let snapshots = if self.status() == RoomStatus::Frozen {
            None
        } else {
            let snapshots = self.take_snapshots().await;
            self.pause_playing(&snapshots).await;
            Some(snapshots)
        };

        let mut played = 0usize;
        loop {
            while let Some(entry) = self.next_notification() {
                log::info!("[Room] {}: notification {}", self.name, entry.uri());
                let receivers = self.start_on_devices(&entry).await;
                let limit = Duration::from_millis(entry.length_ms()) + NOTIFICATION_GRACE;
                self.await_devices(receivers, limit).await;
                entry.finish(false);
                played += 1;
            }
            tokio::time::sleep(SETTLE_DELAY).await;
            if self.release_drain_if_empty() {
                break;
            }
        }

        if let Some(snapshots) = snapshots {
            self.restore_snapshots(&snapshots).await;
        }
        log::info!("[Room] {}: played {} notification(s)", self.name, played);
    }
}

async fn wait_stopped(rx: &mut broadcast::Receiver<()>) {
    loop {
        match rx.recv().await {
            Ok(()) | Err(RecvError::Lagged(_)) => return,
            // Device handle gone; only the timeout can end the wait
            Err(RecvError::Closed) => return std::future::pending().await,
        }
    }
}
