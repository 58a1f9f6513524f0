// Necessary because of this issue: https://github.com/rust-lang/cargo/issues/9641
fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("cargo:rerun-if-env-changed=LUMI_MQTT_BROKER");
    println!("cargo:rerun-if-env-changed=LUMI_DEVICE_ID");
    println!("cargo:rerun-if-env-changed=LUMI_TOPIC_SUFFIX");
    println!("cargo:rerun-if-env-changed=WIFI_SSID");
    println!("cargo:rerun-if-env-changed=WIFI_PASS");

    // host builds (tests) have no ESP-IDF to link against.
    if std::env::var("CARGO_CFG_TARGET_OS").as_deref() != Ok("espidf") {
        return Ok(());
    }

    embuild::build::CfgArgs::output_propagated("ESP_IDF")?;
    embuild::build::LinkArgs::output_propagated("ESP_IDF")?;
    Ok(())
}
