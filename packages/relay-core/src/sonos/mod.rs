//! Sonos speaker control over UPnP.
//!
//! - [`traits::SonosDevice`]: the capability interface rooms are built on
//! - [`speaker::SonosSpeaker`]: SOAP implementation of that interface
//! - [`gena`]: AVTransport event subscriptions feeding "playback stopped"
//! - [`discovery`]: SSDP search and zone topology grouping

pub mod didl;
pub mod discovery;
pub mod gena;
mod gena_client;
mod gena_parser;
pub(crate) mod retry;
pub mod services;
pub mod soap;
pub mod speaker;
pub mod traits;
pub mod types;
pub mod utils;
pub mod zone_groups;

pub use gena::{GenaError, GenaResult, GenaSubscriptionManager};
pub use services::SonosService;
pub use soap::{SoapError, SoapResult};
pub use speaker::SonosSpeaker;
pub use traits::SonosDevice;
pub use types::{MediaInfo, PositionInfo, TransportState, TransportUri, ZoneGroupMember};
