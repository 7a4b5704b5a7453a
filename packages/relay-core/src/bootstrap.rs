//! Application bootstrap and dependency wiring.
//!
//! This is the composition root: the single place where the network
//! identity, discovered rooms, HTTP server, GENA subscriptions, event router
//! and MQTT bridge are created and wired together.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use tokio_util::sync::CancellationToken;

use crate::api::{self, AppState};
use crate::audio::AudioCache;
use crate::config::Config;
use crate::context::{LocalIpDetector, NetworkContext};
use crate::error::{RelayError, RelayResult};
use crate::hermes::{BusPublisher, EventRouter, MqttBridge};
use crate::protocol_constants::SOAP_TIMEOUT_SECS;
use crate::room::{Room, RoomRegistry};
use crate::sonos::discovery::discover_rooms;
use crate::sonos::{GenaSubscriptionManager, SonosDevice, SonosSpeaker, ZoneGroupMember};

/// Container for all bootstrapped services.
pub struct BootstrappedServices {
    /// Host and port speakers reach us at.
    pub network: NetworkContext,
    /// Discovered rooms by name.
    pub rooms: RoomRegistry,
    /// Clips waiting to be fetched.
    pub cache: Arc<AudioCache>,
    /// AVTransport event subscriptions.
    pub gena: Arc<GenaSubscriptionManager>,
    /// Routes Hermes messages to rooms.
    pub router: Arc<EventRouter>,
    /// Cancellation token for graceful shutdown.
    pub cancel_token: CancellationToken,
}

impl BootstrappedServices {
    /// Stops background tasks and releases speaker subscriptions.
    pub async fn shutdown(&self) {
        log::info!("[Bootstrap] Beginning graceful shutdown...");
        self.cancel_token.cancel();
        self.gena.unsubscribe_all().await;
        log::info!("[Bootstrap] Shutdown complete");
    }
}

/// Creates the shared HTTP client for all Sonos communication.
fn create_http_client() -> RelayResult<Client> {
    Client::builder()
        .timeout(Duration::from_secs(SOAP_TIMEOUT_SECS))
        .build()
        .map_err(|e| RelayError::Server(format!("Failed to create HTTP client: {}", e)))
}

/// Builds one [`Room`] per zone name from discovered members.
///
/// Returns the registry and every speaker, for GENA subscription.
fn build_rooms(
    client: &Client,
    members: BTreeMap<String, Vec<ZoneGroupMember>>,
) -> (RoomRegistry, Vec<Arc<SonosSpeaker>>) {
    let mut registry = RoomRegistry::new();
    let mut speakers = Vec::new();

    for (name, members) in members {
        let room_speakers: Vec<Arc<SonosSpeaker>> = members
            .into_iter()
            .map(|m| Arc::new(SonosSpeaker::new(client.clone(), m.ip, m.uuid)))
            .collect();
        let devices = room_speakers
            .iter()
            .map(|s| Arc::clone(s) as Arc<dyn SonosDevice>)
            .collect();
        log::info!(
            "[Bootstrap] Room {} with {} speaker(s)",
            name,
            room_speakers.len()
        );
        registry.insert(Room::new(name, devices));
        speakers.extend(room_speakers);
    }
    (registry, speakers)
}

/// Rooms named in the site map that discovery did not find.
fn missing_rooms<'a>(config: &'a Config, rooms: &RoomRegistry) -> Vec<&'a str> {
    config
        .site_rooms
        .values()
        .map(String::as_str)
        .filter(|name| rooms.get(name).is_none())
        .collect()
}

/// Bootstraps all services in dependency order:
///
/// 1. Network identity (configured or auto-detected host)
/// 2. Room discovery (SSDP + zone group topology)
/// 3. HTTP server, bound before any speaker is told our URLs
/// 4. GENA subscriptions and their renewal loop
/// 5. Event router and MQTT bridge
///
/// # Errors
///
/// Returns an error if configuration is invalid, the advertised address
/// cannot be determined, no speakers are found, or the port cannot be bound.
pub async fn bootstrap(config: &Config) -> RelayResult<BootstrappedServices> {
    config.validate().map_err(RelayError::Configuration)?;

    let network = NetworkContext::resolve(
        config.http_port,
        config.advertise_host.as_deref(),
        LocalIpDetector::arc(),
    )?;
    let urls = network.url_builder();
    log::info!("[Bootstrap] Advertising {}", urls.base_url());

    let http_client = create_http_client()?;
    let cancel_token = CancellationToken::new();

    log::info!(
        "[Bootstrap] Discovering Sonos devices... ({}ms)",
        config.scan_window_ms
    );
    let members = discover_rooms(&http_client, config.scan_window()).await?;
    let (rooms, speakers) = build_rooms(&http_client, members);
    for name in missing_rooms(config, &rooms) {
        log::warn!("[Bootstrap] Mapped room \"{}\" was not discovered", name);
    }

    let cache = Arc::new(AudioCache::new(network.clone()));
    let gena = Arc::new(GenaSubscriptionManager::new(
        http_client.clone(),
        urls.gena_callback_url(),
    ));

    let listener = api::bind(network.port())
        .await
        .map_err(|e| RelayError::Server(e.to_string()))?;
    let state = AppState {
        cache: Arc::clone(&cache),
        gena: Arc::clone(&gena),
    };
    let server_cancel = cancel_token.clone();
    tokio::spawn(async move {
        if let Err(e) = api::start_server(listener, state, server_cancel).await {
            log::error!("[Server] {}", e);
        }
    });

    let subscribed = gena.subscribe_all(&speakers).await;
    log::info!(
        "[Bootstrap] Subscribed to {}/{} speaker(s)",
        subscribed,
        speakers.len()
    );
    tokio::spawn(Arc::clone(&gena).run_renewal_loop(cancel_token.clone()));

    let (bridge, eventloop) = MqttBridge::new(&config.mqtt);
    let router = Arc::new(EventRouter::new(
        config,
        rooms.clone(),
        Arc::clone(&cache),
        Arc::new(bridge.clone()) as Arc<dyn BusPublisher>,
    ));
    log::info!(
        "[Bootstrap] Connecting to MQTT broker {}:{}...",
        config.mqtt.host,
        config.mqtt.port
    );
    bridge.spawn_event_loop(eventloop, Arc::clone(&router), cancel_token.clone());

    Ok(BootstrappedServices {
        network,
        rooms,
        cache,
        gena,
        router,
        cancel_token,
    })
}
