//! MQTT connection for the Hermes bus.
//!
//! Subscriptions are (re)issued on every `ConnAck` so they survive broker
//! restarts. Inbound publishes are handed to the router in arrival order.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rumqttc::{AsyncClient, Event, EventLoop, Incoming, MqttOptions, QoS};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::{BusPublisher, EventRouter};
use crate::config::MqttConfig;
use crate::protocol_constants::{
    MQTT_CHANNEL_CAPACITY, MQTT_KEEP_ALIVE_SECS, MQTT_MAX_PACKET_SIZE, MQTT_RECONNECT_BACKOFF_SECS,
};

/// Client half of the MQTT connection.
#[derive(Clone)]
pub struct MqttBridge {
    client: AsyncClient,
}

impl MqttBridge {
    /// Creates the client and the event loop that drives it.
    ///
    /// Nothing touches the network until the event loop is polled.
    pub fn new(config: &MqttConfig) -> (Self, EventLoop) {
        let (client, eventloop) = AsyncClient::new(mqtt_options(config), MQTT_CHANNEL_CAPACITY);
        (Self { client }, eventloop)
    }

    /// Polls the connection until `cancel` fires.
    pub fn spawn_event_loop(
        &self,
        mut eventloop: EventLoop,
        router: Arc<EventRouter>,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        let client = self.client.clone();
        let filters = router.subscriptions();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        log::info!("[MQTT] Event loop shutting down");
                        if let Err(e) = client.try_disconnect() {
                            log::debug!("[MQTT] Disconnect failed: {}", e);
                        }
                        break;
                    }
                    result = eventloop.poll() => match result {
                        Ok(Event::Incoming(Incoming::ConnAck(ack))) => {
                            log::info!("[MQTT] Connected (code: {:?})", ack.code);
                            for filter in &filters {
                                match client.try_subscribe(*filter, QoS::AtMostOnce) {
                                    Ok(()) => log::debug!("[MQTT] Subscribed to {}", filter),
                                    Err(e) => log::error!("[MQTT] Subscribe to {} failed: {}", filter, e),
                                }
                            }
                        }
                        Ok(Event::Incoming(Incoming::Publish(publish))) => {
                            if let Err(e) = router.dispatch(&publish.topic, &publish.payload) {
                                log::warn!("[MQTT] {}", e);
                            }
                        }
                        Ok(Event::Incoming(Incoming::Disconnect)) => {
                            log::warn!("[MQTT] Broker disconnected");
                        }
                        Ok(_) => {}
                        Err(e) => {
                            log::error!("[MQTT] Connection error: {}", e);
                            tokio::select! {
                                _ = cancel.cancelled() => break,
                                _ = tokio::time::sleep(Duration::from_secs(MQTT_RECONNECT_BACKOFF_SECS)) => {}
                            }
                        }
                    }
                }
            }
        })
    }
}

#[async_trait]
impl BusPublisher for MqttBridge {
    async fn publish(&self, topic: &str, payload: Vec<u8>) {
        match self
            .client
            .publish(topic, QoS::AtMostOnce, false, payload)
            .await
        {
            Ok(()) => log::debug!("[MQTT] Published {}", topic),
            Err(e) => log::warn!("[MQTT] Failed to publish {}: {}", topic, e),
        }
    }
}

fn mqtt_options(config: &MqttConfig) -> MqttOptions {
    let mut options = MqttOptions::new(&config.client_id, &config.host, config.port);
    options.set_keep_alive(Duration::from_secs(MQTT_KEEP_ALIVE_SECS));
    options.set_max_packet_size(MQTT_MAX_PACKET_SIZE, MQTT_MAX_PACKET_SIZE);
    if let Some(username) = config.username.as_deref().filter(|u| !u.is_empty()) {
        options.set_credentials(username, config.password.as_deref().unwrap_or_default());
    }
    options
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> MqttConfig {
        MqttConfig {
            host: "broker.lan".into(),
            port: 1884,
            ..MqttConfig::default()
        }
    }

    #[test]
    fn options_carry_broker_and_keep_alive() {
        let options = mqtt_options(&config());
        assert_eq!(options.broker_address(), ("broker.lan".to_string(), 1884));
        assert_eq!(options.keep_alive(), Duration::from_secs(30));
        assert_eq!(options.client_id(), "sonos-relay");
        assert!(options.credentials().is_none());
    }

    #[test]
    fn credentials_are_set_only_with_a_username() {
        let options = mqtt_options(&MqttConfig {
            username: Some("relay".into()),
            password: Some("secret".into()),
            ..config()
        });
        assert_eq!(
            options.credentials(),
            Some(("relay".to_string(), "secret".to_string()))
        );

        let options = mqtt_options(&MqttConfig {
            username: Some(String::new()),
            password: Some("secret".into()),
            ..config()
        });
        assert!(options.credentials().is_none());
    }
}
