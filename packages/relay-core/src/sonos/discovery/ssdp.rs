//! SSDP multicast discovery of Sonos ZonePlayers.
//!
//! One UDP socket per usable IPv4 interface sends M-SEARCH to
//! 239.255.255.250:1900 and listens on the same socket for the unicast
//! replies until the scan window closes.

use std::collections::BTreeSet;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use local_ip_address::list_afinet_netifas;
use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;
use tokio::time::{timeout_at, Instant};

use super::DiscoveryError;
use crate::sonos::utils::extract_ip_from_location;

/// Standard SSDP multicast address and port.
const MULTICAST_ADDR: &str = "239.255.255.250:1900";

/// SSDP search target for Sonos ZonePlayer devices.
const SONOS_SEARCH_TARGET: &str = "urn:schemas-upnp-org:device:ZonePlayer:1";

/// Interface name prefixes for container/VM bridges that never reach speakers.
const VIRTUAL_INTERFACE_PREFIXES: &[&str] = &[
    "lo", "docker", "veth", "br-", "virbr", "vmnet", "vbox", "tun", "tap",
];

/// Delay between repeated M-SEARCH sends within one scan window.
const RESEND_INTERVAL: Duration = Duration::from_secs(2);

fn is_virtual_interface(name: &str) -> bool {
    let name = name.to_ascii_lowercase();
    VIRTUAL_INTERFACE_PREFIXES
        .iter()
        .any(|prefix| name.starts_with(prefix))
}

fn build_msearch_message(mx: u64) -> String {
    format!(
        "M-SEARCH * HTTP/1.1\r\n\
         HOST: 239.255.255.250:1900\r\n\
         MAN: \"ssdp:discover\"\r\n\
         MX: {}\r\n\
         ST: {}\r\n\r\n",
        mx, SONOS_SEARCH_TARGET
    )
}

/// Returns `(name, ip)` for every non-loopback, non-virtual IPv4 interface.
fn usable_interfaces() -> Vec<(String, Ipv4Addr)> {
    list_afinet_netifas()
        .unwrap_or_else(|e| {
            log::warn!("[Discovery] Failed to list network interfaces: {}", e);
            Vec::new()
        })
        .into_iter()
        .filter_map(|(name, addr)| match addr {
            IpAddr::V4(ip) if !ip.is_loopback() && !is_virtual_interface(&name) => Some((name, ip)),
            _ => None,
        })
        .collect()
}

fn create_socket(iface_ip: Ipv4Addr) -> Result<UdpSocket, DiscoveryError> {
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))
        .map_err(DiscoveryError::SocketBind)?;

    if let Err(e) = socket.set_reuse_address(true) {
        log::warn!("[Discovery] Failed to set SO_REUSEADDR on {}: {}", iface_ip, e);
    }
    // UPnP recommends a TTL of 4 for SSDP
    if let Err(e) = socket.set_multicast_ttl_v4(4) {
        log::warn!("[Discovery] Failed to set multicast TTL on {}: {}", iface_ip, e);
    }

    socket
        .set_nonblocking(true)
        .map_err(DiscoveryError::SocketBind)?;
    socket
        .bind(&SocketAddr::new(IpAddr::V4(iface_ip), 0).into())
        .map_err(DiscoveryError::SocketBind)?;

    UdpSocket::from_std(socket.into()).map_err(DiscoveryError::SocketBind)
}

/// Extracts the speaker IP from an SSDP response.
///
/// Prefers the `LOCATION` host and falls back to the datagram source. Returns
/// `None` for responses that are not from a Sonos ZonePlayer.
fn parse_ssdp_response(response: &str, src_ip: IpAddr) -> Option<String> {
    let mut is_sonos = false;
    let mut location_ip = None;

    for line in response.lines() {
        let Some((name, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim();
        if name.eq_ignore_ascii_case("location") {
            location_ip = extract_ip_from_location(value);
        } else if name.eq_ignore_ascii_case("usn") && value.contains("RINCON_") {
            is_sonos = true;
        } else if name.eq_ignore_ascii_case("st") && value == SONOS_SEARCH_TARGET {
            is_sonos = true;
        }
    }

    is_sonos.then(|| location_ip.unwrap_or_else(|| src_ip.to_string()))
}

/// Sends M-SEARCH on all interfaces and collects speaker IPs for `window`.
///
/// Returns the deduplicated, sorted set of IPs that answered.
pub async fn search(window: Duration) -> Result<Vec<String>, DiscoveryError> {
    let mut sockets = Vec::new();
    for (name, ip) in usable_interfaces() {
        match create_socket(ip) {
            Ok(socket) => sockets.push((name, Arc::new(socket))),
            Err(e) => log::warn!("[Discovery] Skipping interface {} ({}): {}", name, ip, e),
        }
    }
    if sockets.is_empty() {
        return Err(DiscoveryError::NoInterfaces);
    }

    log::info!(
        "[Discovery] Searching for speakers on {} interface(s) for {}ms",
        sockets.len(),
        window.as_millis()
    );

    let deadline = Instant::now() + window;
    let msg = build_msearch_message(1);

    let scans = sockets.iter().map(|(name, socket)| {
        let msg = msg.as_bytes();
        async move {
            let send = async {
                loop {
                    if let Err(e) = socket.send_to(msg, MULTICAST_ADDR).await {
                        log::warn!("[Discovery] M-SEARCH on {} failed: {}", name, e);
                    }
                    tokio::time::sleep(RESEND_INTERVAL).await;
                }
            };

            let recv = async {
                let mut found = Vec::new();
                let mut buf = [0u8; 2048];
                loop {
                    match timeout_at(deadline, socket.recv_from(&mut buf)).await {
                        Ok(Ok((len, src))) => {
                            let response = String::from_utf8_lossy(&buf[..len]);
                            if let Some(ip) = parse_ssdp_response(&response, src.ip()) {
                                log::debug!("[Discovery] Speaker {} answered on {}", ip, name);
                                found.push(ip);
                            }
                        }
                        Ok(Err(e)) => {
                            log::warn!("[Discovery] Receive error on {}: {}", name, e)
                        }
                        Err(_) => break,
                    }
                }
                found
            };

            tokio::select! {
                found = recv => found,
                _ = send => Vec::new(),
            }
        }
    });

    let found: BTreeSet<String> = join_all(scans).await.into_iter().flatten().collect();
    Ok(found.into_iter().collect())
}
