#[cfg(target_os = "espidf")]
fn main() -> anyhow::Result<()> {
    device::main()
}

#[cfg(not(target_os = "espidf"))]
fn main() -> anyhow::Result<()> {
    lumiconnect::logger::init()?;
    log::error!("lumiconnect only runs on an ESP32; see docs/README.md for building the firmware");
    anyhow::bail!("unsupported target")
}

#[cfg(target_os = "espidf")]
mod device {
    use anyhow::Context;
    use esp_idf_hal::{
        delay::FreeRtos,
        i2c::{I2cConfig, I2cDriver},
        peripherals::Peripherals,
        prelude::*,
    };
    use esp_idf_svc::{eventloop::EspSystemEventLoop, log::EspLogger, nvs::EspDefaultNvsPartition};
    // If using the `binstart` feature of `esp-idf-sys`, always keep this module
    // imported
    use esp_idf_sys as _;
    use lumiconnect::{mqtt, sensor, session, telemetry, wifi, CONFIG};

    const SSID: &str = env!("WIFI_SSID");
    const PASS: &str = env!("WIFI_PASS");

    pub(super) fn main() -> anyhow::Result<()> {
        // It is necessary to call this function once. Otherwise, some patches to the
        // runtime implemented by esp-idf-sys might not link properly. See
        // https://github.com/esp-rs/esp-idf-template/issues/71
        esp_idf_sys::link_patches();
        EspLogger::initialize_default();

        log::info!("LumiConnect v{}", env!("CARGO_PKG_VERSION"));
        log::info!("initializing hardware and network...");

        let peripherals = Peripherals::take().context("peripherals already taken")?;
        let sysloop =
            EspSystemEventLoop::take().context("failed to initialize system event loop")?;
        let nvs =
            EspDefaultNvsPartition::take().context("failed to initialize non-volatile storage")?;

        // no network, no point in running the loop: both of these are fatal.
        let mut wifi = wifi::initialize(peripherals.modem, &sysloop, nvs)
            .context("failed to initialize WiFi")?;
        wifi::connect_with_credentials(
            &mut wifi,
            &sysloop,
            SSID,
            PASS,
            CONFIG.wifi.connect_timeout,
        )
        .with_context(|| format!("failed to connect to WiFi network {SSID}"))?;

        // the BH1750 supports fast-mode I2C, but 100 kHz is plenty for one
        // reading a second and is kinder to long breakout wires.
        let config = I2cConfig::new().baudrate(100u32.kHz().into());
        let i2c = I2cDriver::new(
            peripherals.i2c0,
            peripherals.pins.gpio5,
            peripherals.pins.gpio6,
            &config,
        )
        .context("constructing I2C driver")?;
        let bus: &'static lumiconnect::I2cBus = shared_bus::new_std!(I2cDriver = i2c)
            .context("bus manager is only initialized once")?;
        log::info!("I2C bus initialized");

        let light = sensor::bringup(
            bus.acquire_i2c(),
            FreeRtos,
            bh1750::Address::Low,
            CONFIG.sensor_retries,
        );

        let link = session::Link::new();
        let transport = mqtt::EspTransport::new(&CONFIG.mqtt, link.clone());
        let session = session::Session::new(transport, link, CONFIG.mqtt.device_id);

        let mut agent = telemetry::Agent::new(light, session, &CONFIG.telemetry)
            .context("failed to configure telemetry")?;
        agent.start();
        agent.run()
    }
}
