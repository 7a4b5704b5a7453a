//! Sonos relay core.
//!
//! Plays voice assistant audio on Sonos rooms: spoken responses arrive as
//! WAV blobs over the Hermes MQTT protocol, are cached and served over HTTP,
//! and are played on every speaker of the mapped room while whatever the
//! room was playing is paused and later restored.
//!
//! # Architecture
//!
//! - [`room`]: per-room coordination (freeze/thaw, interrupting playback,
//!   the notification queue, device snapshots)
//! - [`sonos`]: speaker control over UPnP/SOAP, GENA events and discovery
//! - [`audio`]: the clip cache and WAV inspection
//! - [`api`]: HTTP endpoints speakers talk to
//! - [`hermes`]: Hermes topics, the event router and the MQTT bridge
//! - [`context`]: network identity and URL building
//! - [`config`]: relay configuration
//! - [`error`]: centralized error types
//!
//! # Abstraction Traits
//!
//! - [`SonosDevice`](sonos::SonosDevice): what a room needs from a speaker
//! - [`BusPublisher`](hermes::BusPublisher): outbound bus messages
//! - [`TaskSpawner`](runtime::TaskSpawner): spawning background tasks
//! - [`IpDetector`](context::IpDetector): local IP detection

#![warn(clippy::all)]

pub mod api;
pub mod audio;
pub mod bootstrap;
pub mod config;
pub mod context;
pub mod error;
pub mod hermes;
pub mod protocol_constants;
pub mod room;
pub mod runtime;
pub mod sonos;

pub use config::{parse_site_room_map, Config, MqttConfig, PlaybackMode};
pub use context::{IpDetector, LocalIpDetector, NetworkContext, NetworkError, UrlBuilder};
pub use error::{ErrorCode, RelayError, RelayResult};
pub use runtime::{TaskSpawner, TokioSpawner};

pub use room::{AudioSession, Room, RoomRegistry, RoomStatus, SessionHandle, SessionOutcome};
pub use sonos::{SonosDevice, SonosSpeaker, TransportState};

pub use audio::AudioCache;
pub use hermes::{BusPublisher, EventRouter, MqttBridge, RouterError};

pub use api::{start_server, AppState, ServerError};
pub use bootstrap::{bootstrap, BootstrappedServices};
