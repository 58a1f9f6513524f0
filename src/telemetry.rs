//! The telemetry loop: once per cycle, either publish a fresh reading or try
//! to get the broker session back.
use crate::{
    config::TelemetryConfig,
    retry::{self, Grace},
    sensor::{LightSensor, Lux},
    session::{Session, Transport},
};
use std::{fmt::Write, thread, time::Duration};

pub const MAX_TOPIC_LEN: usize = 128;
/// `"100000.00"` is the longest payload a valid reading can produce.
pub const MAX_PAYLOAD_LEN: usize = 16;

pub type Topic = heapless::String<MAX_TOPIC_LEN>;
pub type Payload = heapless::String<MAX_PAYLOAD_LEN>;

const TARGET: &str = "lumiconnect::telemetry";

pub struct Agent<S, T> {
    sensor: S,
    session: Session<T>,
    topic: Topic,
    interval: Duration,
    startup_grace: Grace,
}

/// A single message to the broker, built for one publish attempt.
#[derive(Debug)]
pub struct Message<'a> {
    topic: &'a str,
    payload: Payload,
}

/// What a single cycle ended up doing.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Cycle {
    Published(Lux),
    SensorFault,
    PublishFailed,
    Reconnected,
    ReconnectFailed,
}

/// Builds `"{device_id}/{suffix}"`.
pub fn topic(device_id: &str, suffix: &str) -> anyhow::Result<Topic> {
    let mut topic = Topic::new();
    write!(&mut topic, "{device_id}/{suffix}").map_err(|_| {
        anyhow::anyhow!("topic \"{device_id}/{suffix}\" is longer than {MAX_TOPIC_LEN} bytes")
    })?;
    Ok(topic)
}

// === impl Agent ===

impl<S, T> Agent<S, T>
where
    S: LightSensor,
    T: Transport,
{
    pub fn new(sensor: S, session: Session<T>, config: &TelemetryConfig) -> anyhow::Result<Self> {
        let topic = topic(session.device_id(), config.topic_suffix)?;
        log::info!(target: TARGET, "publishing {} readings to {topic}", S::NAME);
        Ok(Self {
            sensor,
            session,
            topic,
            interval: config.interval,
            startup_grace: config.startup_grace,
        })
    }

    /// Opens the first broker session, giving the handshake the startup grace
    /// period to complete.
    ///
    /// Returns whether the session came up. Either way the loop can start:
    /// it keeps reconnecting on its own.
    pub fn start(&mut self) -> bool {
        log::info!(
            target: TARGET,
            "waiting up to {:?} for the MQTT session...",
            self.startup_grace.max_wait()
        );
        let session = &mut self.session;
        let connected = retry::wait_until(self.startup_grace, || match session.connect() {
            Ok(()) => true,
            Err(error) => {
                log::debug!(target: TARGET, "MQTT session not up yet: {error}");
                false
            }
        });

        if connected {
            log::info!(target: TARGET, "MQTT session established");
        } else {
            log::warn!(target: TARGET, "could not connect to the MQTT broker; will keep retrying");
        }
        connected
    }

    /// Runs the loop forever.
    pub fn run(mut self) -> ! {
        loop {
            let cycle = self.cycle();
            log::trace!(target: TARGET, "cycle: {cycle:?}");
            thread::sleep(self.interval);
        }
    }

    /// Runs one cycle, without sleeping afterwards.
    pub fn cycle(&mut self) -> Cycle {
        if self.session.is_connected() {
            self.publish_reading()
        } else {
            self.reconnect()
        }
    }

    fn publish_reading(&mut self) -> Cycle {
        let lux = match self.sensor.read() {
            Ok(lux) => lux,
            Err(fault) => {
                log::warn!(target: TARGET, "failed to read {}: {fault}", S::NAME);
                return Cycle::SensorFault;
            }
        };
        log::info!(target: TARGET, "Illuminance: {lux} lx");

        let message = match Message::new(&self.topic, lux) {
            Ok(message) => message,
            Err(error) => {
                log::warn!(target: TARGET, "{error}");
                return Cycle::PublishFailed;
            }
        };

        match self
            .session
            .publish(message.topic(), message.payload().as_bytes())
        {
            Ok(()) => Cycle::Published(lux),
            Err(error) => {
                log::warn!(target: TARGET, "failed to publish to {}: {error}", self.topic);
                Cycle::PublishFailed
            }
        }
    }

    fn reconnect(&mut self) -> Cycle {
        log::warn!(target: TARGET, "MQTT session is {}; reconnecting...", self.session.state());
        match self.session.connect() {
            Ok(()) => Cycle::Reconnected,
            Err(error) => {
                log::info!(target: TARGET, "reconnect attempt failed: {error}");
                Cycle::ReconnectFailed
            }
        }
    }

    pub fn session(&self) -> &Session<T> {
        &self.session
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }
}

// === impl Message ===

impl<'a> Message<'a> {
    pub fn new(topic: &'a str, lux: Lux) -> anyhow::Result<Self> {
        let mut payload = Payload::new();
        write!(&mut payload, "{lux}")
            .map_err(|_| anyhow::anyhow!("reading {lux} does not fit in a payload"))?;
        Ok(Self { topic, payload })
    }

    pub fn topic(&self) -> &str {
        self.topic
    }

    pub fn payload(&self) -> &str {
        &self.payload
    }
}
