//! Build-time configuration.
//!
//! Credentials come from environment variables at compile time
//! (`WIFI_SSID`, `WIFI_PASS`, `MQTT_HOST`, `MQTT_USERNAME`, `MQTT_KEY`)
//! so no secret ever lands in the repository.
//!
//! Board wiring (FireBeetle 2 ESP32-E):
//! - GPIO2:  status LED (driven low = on)
//! - GPIO34: battery divider, ADC1 at 11 dB attenuation
//! - GPIO17: DS18B20 one-wire bus, external 4.7k pull-up

pub const WIFI_SSID: &str = match option_env!("WIFI_SSID") {
    Some(v) => v,
    None => "",
};

pub const WIFI_PASS: &str = match option_env!("WIFI_PASS") {
    Some(v) => v,
    None => "",
};

/// Broker address: an IPv4 literal or a hostname to resolve over DNS.
pub const MQTT_HOST: &str = match option_env!("MQTT_HOST") {
    Some(v) => v,
    None => "192.168.1.10",
};

pub const MQTT_PORT: u16 = 1883;

pub const MQTT_CLIENT_ID: &str = "BasementFridge";

pub const MQTT_USERNAME: &str = match option_env!("MQTT_USERNAME") {
    Some(v) => v,
    None => "",
};

pub const MQTT_KEY: &str = match option_env!("MQTT_KEY") {
    Some(v) => v,
    None => "",
};

/// Deep-sleep interval between wake cycles.
pub const SLEEP_MINUTES: u64 = 5;
