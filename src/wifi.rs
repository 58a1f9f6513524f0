use anyhow::Context;
use embedded_svc::wifi::{AuthMethod, ClientConfiguration, Configuration, Wifi};
use esp_idf_hal::{modem::Modem, peripheral::Peripheral};
use esp_idf_svc::{
    eventloop::EspSystemEventLoop,
    netif::{EspNetif, EspNetifWait},
    nvs::EspDefaultNvsPartition,
    ping,
    wifi::{EspWifi, WifiWait},
};

use std::{net::Ipv4Addr, time::Duration};

/// Brings up the radio in station mode. Does not connect to anything yet.
pub fn initialize(
    modem: impl Peripheral<P = Modem> + 'static,
    sysloop: &EspSystemEventLoop,
    nvs: EspDefaultNvsPartition,
) -> anyhow::Result<Box<EspWifi<'static>>> {
    log::info!("bringing up WiFi...");
    let mut wifi = Box::new(
        EspWifi::new(modem, sysloop.clone(), Some(nvs)).context("failed to initialize radio")?,
    );

    wifi.set_configuration(&Configuration::Client(ClientConfiguration::default()))
        .context("failed to enter station mode")?;
    wifi.start().context("failed to start WiFi")?;

    if !WifiWait::new(sysloop)
        .context("failed to create wifi wait")?
        .wait_with_timeout(Duration::from_secs(20), || {
            wifi.is_started().unwrap_or_default()
        })
    {
        anyhow::bail!("WiFi did not start");
    }

    Ok(wifi)
}

/// Joins a WPA2 network and waits (up to `timeout`) for a DHCP lease.
pub fn connect_with_credentials(
    wifi: &mut EspWifi<'static>,
    sysloop: &EspSystemEventLoop,
    ssid: &str,
    pass: &str,
    timeout: Duration,
) -> anyhow::Result<()> {
    log::info!("scanning for access points...");
    let channel = match Wifi::scan(wifi) {
        Ok(aps) => aps.into_iter().find_map(|ap| {
            log::debug!("Found AP: {ap:?}");
            (ap.ssid.as_str() == ssid).then_some(ap.channel)
        }),
        Err(error) => {
            log::warn!("failed to scan for access points: {error}");
            None
        }
    };

    match channel {
        Some(channel) => log::info!("found access point for {ssid} on channel {channel}"),
        None => log::warn!("could not find desired AP SSID {ssid} in scan results"),
    }

    wifi.set_configuration(&Configuration::Client(ClientConfiguration {
        ssid: ssid.parse().map_err(|_| anyhow::anyhow!("ssid too long"))?,
        password: pass
            .parse()
            .map_err(|_| anyhow::anyhow!("password too long"))?,
        auth_method: AuthMethod::WPA2Personal,
        channel,
        ..Default::default()
    }))
    .context("failed to set WiFi configuration")?;

    log::info!("Connecting to {ssid}...");
    wifi.connect()
        .context("failed to connect to WiFi network")?;

    let leased = EspNetifWait::new::<EspNetif>(wifi.sta_netif(), sysloop)
        .context("failed to create wait for STA netif")?
        .wait_with_timeout(timeout, || {
            wifi.is_connected().unwrap_or_default()
                && wifi
                    .sta_netif()
                    .get_ip_info()
                    .map(|info| !info.ip.is_unspecified())
                    .unwrap_or_default()
        });
    anyhow::ensure!(
        leased,
        "WiFi did not connect or did not receive a DHCP lease within {timeout:?}"
    );

    let ip_info = wifi.sta_netif().get_ip_info()?;
    log::info!("Connected to WiFi {ssid}: {ip_info:?}");

    // the gateway answering is a good sign the broker will be reachable, but
    // plenty of networks drop ICMP.
    if let Err(error) = ping(ip_info.subnet.gateway) {
        log::warn!("{error}");
    }

    Ok(())
}

pub fn ping(ip: Ipv4Addr) -> anyhow::Result<()> {
    log::info!("pinging {ip}...");

    let ping_summary = ping::EspPing::default().ping(ip, &Default::default())?;
    if ping_summary.transmitted != ping_summary.received {
        anyhow::bail!("pinging IP {ip} timed out");
    }

    log::info!("pinging {ip} done");

    Ok(())
}
