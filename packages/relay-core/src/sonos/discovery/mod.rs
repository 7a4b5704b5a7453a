//! Speaker discovery: SSDP search followed by a zone group topology lookup.

mod ssdp;

use std::collections::BTreeMap;
use std::time::Duration;

use reqwest::Client;
use thiserror::Error;

use crate::sonos::types::ZoneGroupMember;
use crate::sonos::zone_groups::{get_zone_group_members, group_by_room};

pub use ssdp::search;

/// Errors that make discovery fail as a whole.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("failed to bind UDP socket: {0}")]
    SocketBind(#[source] std::io::Error),

    #[error("no usable network interfaces found")]
    NoInterfaces,

    #[error("no Sonos speakers answered within {0}ms")]
    NoSpeakers(u64),

    #[error("no speaker returned a zone group topology")]
    Topology,
}

/// Convenient Result alias for discovery.
pub type DiscoveryResult<T> = Result<T, DiscoveryError>;

/// Discovers speakers and groups them into rooms by zone name.
///
/// The topology is requested from each discovered speaker in turn until one
/// answers; any single speaker knows the whole household.
pub async fn discover_rooms(
    client: &Client,
    scan_window: Duration,
) -> DiscoveryResult<BTreeMap<String, Vec<ZoneGroupMember>>> {
    let ips = search(scan_window).await?;
    if ips.is_empty() {
        return Err(DiscoveryError::NoSpeakers(scan_window.as_millis() as u64));
    }
    log::info!("[Discovery] {} speaker(s) answered: {:?}", ips.len(), ips);

    for ip in &ips {
        match get_zone_group_members(client, ip).await {
            Ok(members) if !members.is_empty() => {
                let rooms = group_by_room(members);
                for (name, members) in &rooms {
                    log::info!("[Discovery] Room '{}' with {} speaker(s)", name, members.len());
                }
                return Ok(rooms);
            }
            Ok(_) => log::warn!("[Discovery] {} returned an empty topology", ip),
            Err(e) => log::warn!("[Discovery] Topology request to {} failed: {}", ip, e),
        }
    }
    Err(DiscoveryError::Topology)
}
