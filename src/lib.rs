#![doc = include_str!("../docs/README.md")]
pub mod config;
pub mod logger;
pub mod retry;
pub mod sensor;
pub mod session;
pub mod telemetry;

#[cfg(target_os = "espidf")]
pub mod mqtt;
#[cfg(target_os = "espidf")]
pub mod wifi;

#[cfg(target_os = "espidf")]
pub type I2cBus = shared_bus::BusManager<SharedI2c>;
#[cfg(target_os = "espidf")]
pub type SharedI2c = std::sync::Mutex<esp_idf_hal::i2c::I2cDriver<'static>>;

pub use config::CONFIG;
