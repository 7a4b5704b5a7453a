//! GENA subscription lifecycle for speaker transport events.
//!
//! Every room speaker gets one AVTransport subscription. NOTIFY requests
//! arriving at the relay's callback endpoint are routed back to the owning
//! [`SonosSpeaker`] by SID, which is how "playback stopped" events reach the
//! room coordinator.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use futures::future::join_all;
use reqwest::Client;
use thiserror::Error;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::protocol_constants::{GENA_RENEWAL_BUFFER_SECS, GENA_RENEWAL_CHECK_SECS};
use crate::sonos::gena_client::GenaClient;
use crate::sonos::gena_parser::parse_transport_state;
use crate::sonos::services::SonosService;
use crate::sonos::speaker::SonosSpeaker;

/// Errors raised by GENA subscription requests.
#[derive(Debug, Error)]
pub enum GenaError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Subscription failed with status {0}")]
    SubscriptionFailed(u16),

    #[error("Renewal failed with status {0}")]
    RenewalFailed(u16),

    #[error("Speaker response did not include a SID header")]
    MissingSid,
}

/// Convenient Result alias for GENA operations.
pub type GenaResult<T> = Result<T, GenaError>;

struct Subscription {
    speaker: Arc<SonosSpeaker>,
    expires_at: Instant,
}

/// Owns the AVTransport subscriptions of all managed speakers.
pub struct GenaSubscriptionManager {
    client: GenaClient,
    callback_url: String,
    subscriptions: DashMap<String, Subscription>,
}

impl GenaSubscriptionManager {
    /// Creates a manager whose subscriptions deliver NOTIFY to `callback_url`.
    pub fn new(client: Client, callback_url: impl Into<String>) -> Self {
        Self {
            client: GenaClient::new(client),
            callback_url: callback_url.into(),
            subscriptions: DashMap::new(),
        }
    }

    /// Number of live subscriptions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }

    /// Subscribes to AVTransport events of a single speaker.
    pub async fn subscribe(&self, speaker: Arc<SonosSpeaker>) -> GenaResult<()> {
        let granted = self
            .client
            .subscribe(speaker.ip(), SonosService::AVTransport, &self.callback_url)
            .await?;

        log::info!(
            "[GENA] Subscribed to {} on {} (SID {}, {}s)",
            SonosService::AVTransport.name(),
            speaker.ip(),
            granted.sid,
            granted.timeout_secs
        );
        self.insert(granted.sid, speaker, granted.timeout_secs);
        Ok(())
    }

    /// Subscribes every speaker concurrently. Failures are logged, not fatal:
    /// an unsubscribed speaker still plays, its waits just end by timeout.
    ///
    /// Returns the number of successful subscriptions.
    pub async fn subscribe_all(&self, speakers: &[Arc<SonosSpeaker>]) -> usize {
        let results = join_all(speakers.iter().map(|s| self.subscribe(Arc::clone(s)))).await;
        let mut ok = 0;
        for (speaker, result) in speakers.iter().zip(results) {
            match result {
                Ok(()) => ok += 1,
                Err(e) => log::warn!("[GENA] Failed to subscribe to {}: {}", speaker.ip(), e),
            }
        }
        ok
    }

    fn insert(&self, sid: String, speaker: Arc<SonosSpeaker>, timeout_secs: u64) {
        self.subscriptions.insert(
            sid,
            Subscription {
                speaker,
                expires_at: Instant::now() + Duration::from_secs(timeout_secs),
            },
        );
    }

    /// Dispatches a NOTIFY body to the speaker owning `sid`.
    ///
    /// Returns false if the SID is unknown.
    pub fn handle_notify(&self, sid: &str, body: &str) -> bool {
        let Some(speaker) = self.subscriptions.get(sid).map(|s| Arc::clone(&s.speaker)) else {
            log::warn!("[GENA] NOTIFY for unknown SID {}", sid);
            return false;
        };

        if let Some(state) = parse_transport_state(body) {
            log::debug!("[GENA] {} transport state {}", speaker.ip(), state);
            speaker.report_transport_state(state);
        }
        true
    }

    /// Renews every subscription that expires within the renewal buffer.
    ///
    /// A subscription the speaker refuses to renew is replaced by a fresh one.
    pub async fn renew_expiring(&self) {
        let deadline = Instant::now() + Duration::from_secs(GENA_RENEWAL_BUFFER_SECS);
        let expiring: Vec<(String, Arc<SonosSpeaker>)> = self
            .subscriptions
            .iter()
            .filter(|entry| entry.expires_at <= deadline)
            .map(|entry| (entry.key().clone(), Arc::clone(&entry.speaker)))
            .collect();

        for (sid, speaker) in expiring {
            match self
                .client
                .renew(speaker.ip(), SonosService::AVTransport, &sid)
                .await
            {
                Ok(timeout_secs) => {
                    if let Some(mut sub) = self.subscriptions.get_mut(&sid) {
                        sub.expires_at = Instant::now() + Duration::from_secs(timeout_secs);
                    }
                    log::debug!("[GENA] Renewed {} on {}", sid, speaker.ip());
                }
                Err(e) => {
                    log::warn!("[GENA] Renewal of {} on {} failed: {}", sid, speaker.ip(), e);
                    self.subscriptions.remove(&sid);
                    if let Err(e) = self.subscribe(Arc::clone(&speaker)).await {
                        log::warn!("[GENA] Resubscribe to {} failed: {}", speaker.ip(), e);
                    }
                }
            }
        }
    }

    /// Periodically renews subscriptions until `cancel` fires.
    pub async fn run_renewal_loop(self: Arc<Self>, cancel: CancellationToken) {
        let mut interval = tokio::time::interval(Duration::from_secs(GENA_RENEWAL_CHECK_SECS));
        interval.tick().await;
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = interval.tick() => self.renew_expiring().await,
            }
        }
        log::debug!("[GENA] Renewal loop stopped");
    }

    /// Cancels every subscription. Speakers that do not answer are dropped anyway.
    pub async fn unsubscribe_all(&self) {
        let subscriptions: Vec<(String, Arc<SonosSpeaker>)> = self
            .subscriptions
            .iter()
            .map(|entry| (entry.key().clone(), Arc::clone(&entry.speaker)))
            .collect();
        self.subscriptions.clear();

        let client = &self.client;
        let results = join_all(subscriptions.iter().map(|(sid, speaker)| {
            client.unsubscribe(speaker.ip(), SonosService::AVTransport, sid)
        }))
        .await;

        let failed = results.iter().filter(|ok| !**ok).count();
        log::info!(
            "[GENA] Unsubscribed {} subscription(s), {} failed",
            subscriptions.len(),
            failed
        );
    }
}
