//! Compile-time configuration.
//!
//! Identifiers can be overridden when building the firmware by setting
//! `LUMI_MQTT_BROKER`, `LUMI_DEVICE_ID` and `LUMI_TOPIC_SUFFIX` in the build
//! environment. Wi-Fi credentials are read by the device binary itself.
use crate::retry::Grace;
use std::time::Duration;

macro_rules! env_or {
    ($var:literal, $default:literal) => {
        match option_env!($var) {
            Some(value) => value,
            None => $default,
        }
    };
}

#[derive(Clone, Debug)]
pub struct Config {
    pub wifi: WifiConfig,
    pub mqtt: MqttConfig,
    pub telemetry: TelemetryConfig,
    /// How many times to retry bringing up the light sensor.
    pub sensor_retries: usize,
}

#[derive(Clone, Debug)]
pub struct WifiConfig {
    /// How long to wait for an association and a DHCP lease at startup.
    pub connect_timeout: Duration,
}

#[derive(Clone, Debug)]
pub struct MqttConfig {
    pub broker_url: &'static str,
    /// Doubles as the MQTT client ID and the topic namespace.
    pub device_id: &'static str,
    pub keep_alive: Duration,
    pub network_timeout: Duration,
}

#[derive(Clone, Debug)]
pub struct TelemetryConfig {
    pub topic_suffix: &'static str,
    pub interval: Duration,
    /// How long to wait for the first broker session before starting the
    /// loop anyway.
    pub startup_grace: Grace,
}

pub static CONFIG: Config = Config {
    wifi: WifiConfig {
        connect_timeout: Duration::from_secs(30),
    },
    mqtt: MqttConfig {
        broker_url: env_or!("LUMI_MQTT_BROKER", "mqtt://broker.hivemq.com:1883"),
        device_id: env_or!("LUMI_DEVICE_ID", "lumiconnect"),
        keep_alive: Duration::from_secs(60),
        network_timeout: Duration::from_secs(5),
    },
    telemetry: TelemetryConfig {
        topic_suffix: env_or!("LUMI_TOPIC_SUFFIX", "luz"),
        interval: Duration::from_secs(1),
        startup_grace: Grace::new(20, Duration::from_millis(500)),
    },
    sensor_retries: 5,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cadence_and_grace() {
        assert_eq!(CONFIG.telemetry.interval, Duration::from_secs(1));
        assert_eq!(CONFIG.telemetry.startup_grace.attempts, 20);
        assert_eq!(
            CONFIG.telemetry.startup_grace.delay,
            Duration::from_millis(500)
        );
        assert_eq!(CONFIG.wifi.connect_timeout, Duration::from_secs(30));
    }

    #[test]
    fn identifiers_are_not_empty() {
        assert!(!CONFIG.mqtt.broker_url.is_empty());
        assert!(!CONFIG.mqtt.device_id.is_empty());
        assert!(!CONFIG.telemetry.topic_suffix.is_empty());
        assert!(!CONFIG.telemetry.topic_suffix.starts_with('/'));
    }
}
