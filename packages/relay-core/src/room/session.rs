//! A single playback request with an exactly-once outcome.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use tokio::sync::watch;

/// How a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOutcome {
    /// Devices reported playback stopped, or the wait timed out.
    Finished,
    /// Pre-empted by a newer session before it finished.
    Cancelled,
}

impl SessionOutcome {
    #[must_use]
    pub fn is_cancelled(self) -> bool {
        self == Self::Cancelled
    }
}

type FinishCallback = Box<dyn FnOnce(bool) + Send>;

/// One clip to play on every device of a room.
///
/// [`finish`](Self::finish) is idempotent: the first call records the
/// outcome, runs the completion callback and wakes every [`SessionHandle`];
/// later calls do nothing.
pub struct AudioSession {
    uri: String,
    length_ms: u64,
    volume: Option<u8>,
    finished: AtomicBool,
    on_finished: Mutex<Option<FinishCallback>>,
    outcome: watch::Sender<Option<SessionOutcome>>,
}

impl fmt::Debug for AudioSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AudioSession")
            .field("uri", &self.uri)
            .field("length_ms", &self.length_ms)
            .field("volume", &self.volume)
            .field("finished", &self.is_finished())
            .finish()
    }
}

impl AudioSession {
    /// Creates a session for `uri` that is expected to play for `length_ms`.
    pub fn new(uri: impl Into<String>, length_ms: u64) -> Self {
        let (outcome, _) = watch::channel(None);
        Self {
            uri: uri.into(),
            length_ms,
            volume: None,
            finished: AtomicBool::new(false),
            on_finished: Mutex::new(None),
            outcome,
        }
    }

    /// Volume applied to every device before the clip starts.
    #[must_use]
    pub fn with_volume(mut self, volume: u8) -> Self {
        self.volume = Some(volume);
        self
    }

    /// Registers the completion callback, invoked with `cancelled`.
    #[must_use]
    pub fn on_finished(self, callback: impl FnOnce(bool) + Send + 'static) -> Self {
        *self.on_finished.lock() = Some(Box::new(callback));
        self
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn length_ms(&self) -> u64 {
        self.length_ms
    }

    pub fn volume(&self) -> Option<u8> {
        self.volume
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Acquire)
    }

    /// Returns a handle that resolves once the session has an outcome.
    #[must_use]
    pub fn handle(&self) -> SessionHandle {
        SessionHandle {
            rx: self.outcome.subscribe(),
        }
    }

    /// Records the outcome. Returns true only for the call that won.
    pub fn finish(&self, cancelled: bool) -> bool {
        if self
            .finished
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }

        let outcome = if cancelled {
            SessionOutcome::Cancelled
        } else {
            SessionOutcome::Finished
        };
        log::debug!("[Room] Session {} {:?}", self.uri, outcome);

        let callback = self.on_finished.lock().take();
        if let Some(callback) = callback {
            callback(cancelled);
        }
        self.outcome.send_replace(Some(outcome));
        true
    }
}

/// Awaitable view of a session's outcome.
#[derive(Clone)]
pub struct SessionHandle {
    rx: watch::Receiver<Option<SessionOutcome>>,
}

impl SessionHandle {
    /// The outcome, if the session already finished.
    #[must_use]
    pub fn try_outcome(&self) -> Option<SessionOutcome> {
        *self.rx.borrow()
    }

    /// Waits for the outcome. A session dropped without finishing counts as cancelled.
    pub async fn outcome(mut self) -> SessionOutcome {
        match self.rx.wait_for(Option::is_some).await {
            Ok(outcome) => outcome.unwrap_or(SessionOutcome::Cancelled),
            Err(_) => SessionOutcome::Cancelled,
        }
    }
}
