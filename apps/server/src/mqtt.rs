//! MQTT notification source.
//!
//! Subscribes to `<prefix>/<stream>` for every configured stream and
//! forwards decoded notifications to the device actor. The rumqttc event
//! loop reconnects on its own; subscriptions are renewed on every ConnAck.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use livecast_core::{topic_for, DeviceActorHandle, StreamNotification};
use rumqttc::{AsyncClient, Event, MqttOptions, Packet, QoS, SubscribeFilter};
use tokio_util::sync::CancellationToken;

const DEFAULT_MQTT_PORT: u16 = 1883;
const KEEP_ALIVE: Duration = Duration::from_secs(30);
const RECONNECT_DELAY: Duration = Duration::from_secs(5);
const REQUEST_CAPACITY: usize = 16;

/// Splits `mqtt://host[:port]` (scheme optional) into host and port.
pub fn broker_address(url: &str) -> Result<(String, u16)> {
    let rest = url.trim();
    let rest = rest.strip_prefix("mqtt://").unwrap_or(rest);
    let rest = rest.trim_end_matches('/');

    let (host, port) = match rest.rsplit_once(':') {
        Some((host, port)) => {
            let port = port
                .parse::<u16>()
                .with_context(|| format!("invalid MQTT port in {:?}", url))?;
            (host, port)
        }
        None => (rest, DEFAULT_MQTT_PORT),
    };

    if host.is_empty() || host.contains('/') {
        bail!("invalid MQTT broker URL {:?}", url);
    }
    Ok((host.to_string(), port))
}

/// One subscription per stream topic.
pub fn subscriptions<'a>(
    prefix: &str,
    streams: impl IntoIterator<Item = &'a str>,
) -> Vec<SubscribeFilter> {
    streams
        .into_iter()
        .map(|stream| SubscribeFilter::new(topic_for(prefix, stream), QoS::AtMostOnce))
        .collect()
}

/// Notification source bound to one broker.
pub struct MqttSource {
    options: MqttOptions,
    filters: Vec<SubscribeFilter>,
}

impl MqttSource {
    pub fn new(url: &str, client_id: &str, filters: Vec<SubscribeFilter>) -> Result<Self> {
        let (host, port) = broker_address(url)?;
        let mut options = MqttOptions::new(client_id, host, port);
        options.set_keep_alive(KEEP_ALIVE);
        Ok(Self { options, filters })
    }

    /// Runs until cancelled or until the actor stops.
    pub async fn run(self, actor: DeviceActorHandle, cancel: CancellationToken) {
        let (client, mut event_loop) = AsyncClient::new(self.options, REQUEST_CAPACITY);

        loop {
            let event = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                event = event_loop.poll() => event,
            };

            match event {
                Ok(Event::Incoming(Packet::ConnAck(_))) => {
                    log::info!("[Mqtt] Connected, subscribing to {} topic(s)", self.filters.len());
                    if let Err(e) = client.try_subscribe_many(self.filters.clone()) {
                        log::error!("[Mqtt] Subscribe failed: {}", e);
                    }
                }
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    let Some(notification) =
                        StreamNotification::decode(&publish.topic, &publish.payload)
                    else {
                        log::debug!("[Mqtt] Ignoring message on {}", publish.topic);
                        continue;
                    };
                    log::info!("[Mqtt] {:?}", notification);
                    if actor.notify(notification).await.is_err() {
                        log::warn!("[Mqtt] Device actor stopped, leaving event loop");
                        break;
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    log::warn!(
                        "[Mqtt] Connection error: {}, retrying in {:?}",
                        e,
                        RECONNECT_DELAY
                    );
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(RECONNECT_DELAY) => {}
                    }
                }
            }
        }

        if let Err(e) = client.try_disconnect() {
            log::debug!("[Mqtt] Disconnect failed: {}", e);
        }
        log::info!("[Mqtt] Stopped");
    }
}
