//! The broker transport on the board, on top of the ESP-IDF MQTT client.
use crate::{
    config::MqttConfig,
    session::{Link, SendError, State, Transport},
};
use anyhow::Context;
use embedded_svc::mqtt::client::{Event, QoS};
use esp_idf_svc::mqtt::client::{EspMqttClient, MqttClientConfiguration};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

const TARGET: &str = "lumiconnect::mqtt";

pub struct EspTransport {
    config: &'static MqttConfig,
    link: Link,
    /// Set from the client's event task when the broker acknowledges (or
    /// drops) the session.
    acked: Arc<AtomicBool>,
    client: Option<EspMqttClient>,
}

impl EspTransport {
    pub fn new(config: &'static MqttConfig, link: Link) -> Self {
        Self {
            config,
            link,
            acked: Arc::new(AtomicBool::new(false)),
            client: None,
        }
    }

    fn start_client(&self) -> anyhow::Result<EspMqttClient> {
        log::info!(target: TARGET, "starting MQTT client for {}", self.config.broker_url);
        let conf = MqttClientConfiguration {
            client_id: Some(self.config.device_id),
            keep_alive_interval: Some(self.config.keep_alive),
            network_timeout: self.config.network_timeout,
            ..Default::default()
        };

        let acked = self.acked.clone();
        let link = self.link.clone();
        EspMqttClient::new(self.config.broker_url, &conf, move |event| match event {
            Ok(Event::Connected(_)) => {
                log::debug!(target: TARGET, "broker acknowledged session");
                acked.store(true, Ordering::Release);
            }
            Ok(Event::Disconnected) => {
                acked.store(false, Ordering::Release);
                if link.report_lost() == State::Connected {
                    log::warn!(target: TARGET, "disconnected from broker");
                }
            }
            Ok(Event::Published(id)) => log::trace!(target: TARGET, "published message {id}"),
            Ok(other) => log::debug!(target: TARGET, "MQTT event: {other:?}"),
            Err(error) => log::warn!(target: TARGET, "MQTT error: {error}"),
        })
        .context("failed to create MQTT client")
    }
}

impl Transport for EspTransport {
    type Error = anyhow::Error;

    /// The first call starts the client, which keeps reconnecting in the
    /// background from then on; every call reports whether the broker has
    /// acknowledged a session yet.
    fn connect(&mut self) -> anyhow::Result<()> {
        if self.client.is_none() {
            self.client = Some(self.start_client()?);
        }

        anyhow::ensure!(
            self.acked.load(Ordering::Acquire),
            "{} has not acknowledged the session yet",
            self.config.broker_url
        );
        Ok(())
    }

    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), SendError<anyhow::Error>> {
        let client = match self.client.as_mut() {
            Some(client) if self.acked.load(Ordering::Acquire) => client,
            _ => {
                return Err(SendError::SessionLost(anyhow::anyhow!(
                    "no session with {}",
                    self.config.broker_url
                )))
            }
        };

        client
            .publish(topic, QoS::AtMostOnce, false, payload)
            .map(|id| log::trace!(target: TARGET, "enqueued message {id} on {topic}"))
            .map_err(|error| SendError::Failed(anyhow::anyhow!("failed to publish: {error}")))
    }
}
