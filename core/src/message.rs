//! Outbound MQTT topics and payloads.
//!
//! Topics follow the Home Assistant sensor convention
//! `homeassistant/sensor/{device}/{entity}`. Payloads are built into
//! bounded heapless buffers; a value that does not fit is truncated at
//! the buffer capacity rather than allocated around.

use core::fmt::Write;

use heapless::String;

use crate::model::{BatteryReading, TemperatureReading};

/// Hard cap on a state payload. Realistic readings stay well under it.
pub const PAYLOAD_CAPACITY: usize = 128;

/// Discovery payloads carry entity metadata and need more room.
pub const DISCOVERY_CAPACITY: usize = 256;

pub const DEVICE_ID: &str = "basementfridge";

pub const TEMP_STATE_TOPIC: &str = "homeassistant/sensor/basementfridge/temp";
pub const BATTERY_STATE_TOPIC: &str = "homeassistant/sensor/basementfridge/battery";
pub const TEMP_DISCOVERY_TOPIC: &str = "homeassistant/sensor/basementfridge/temp/config";
pub const BATTERY_DISCOVERY_TOPIC: &str = "homeassistant/sensor/basementfridge/battery/config";

pub type Payload = String<PAYLOAD_CAPACITY>;

/// `{"temperature":<f>,"unit_of_measurement":"F","state_topic":<topic>}`
///
/// Two decimal places always, matching the rounding applied to the
/// reading itself.
pub fn temperature_message(reading: &TemperatureReading) -> Payload {
    let mut payload = Payload::new();
    write!(
        payload,
        "{{\"temperature\":{:.2},\"unit_of_measurement\":\"{}\",\"state_topic\":\"{}\"}}",
        reading.degrees,
        TemperatureReading::UNIT,
        TEMP_STATE_TOPIC
    )
    .ok();
    payload
}

/// `{"voltage":<f>,"unit_of_measurement":"V","state_topic":<topic>}`
pub fn battery_message(reading: &BatteryReading) -> Payload {
    let mut payload = Payload::new();
    write!(
        payload,
        "{{\"voltage\":{:.2},\"unit_of_measurement\":\"{}\",\"state_topic\":\"{}\"}}",
        reading.volts,
        BatteryReading::UNIT,
        BATTERY_STATE_TOPIC
    )
    .ok();
    payload
}

/// Home Assistant auto-discovery config for the temperature entity.
///
/// Discovery is not published by the wake cycle yet; the payloads exist
/// so the cycle can start announcing the entities once the broker side
/// is ready for them.
pub fn temperature_discovery() -> String<DISCOVERY_CAPACITY> {
    let mut payload = String::new();
    write!(
        payload,
        "{{\"name\":\"Basement_Fridge_Temperature\",\"device_class\":\"temperature\",\
         \"state_topic\":\"{}\",\"unique_id\":\"{}_temp\",\
         \"value_template\":\"{{{{ value_json.temperature }}}}\",\
         \"unit_of_measurement\":\"{}\"}}",
        TEMP_STATE_TOPIC,
        DEVICE_ID,
        TemperatureReading::UNIT
    )
    .ok();
    payload
}

/// Home Assistant auto-discovery config for the battery entity.
pub fn battery_discovery() -> String<DISCOVERY_CAPACITY> {
    let mut payload = String::new();
    write!(
        payload,
        "{{\"name\":\"Basement_Fridge_Battery\",\"device_class\":\"voltage\",\
         \"state_topic\":\"{}\",\"unique_id\":\"{}_battery\",\
         \"value_template\":\"{{{{ value_json.voltage }}}}\",\
         \"unit_of_measurement\":\"{}\"}}",
        BATTERY_STATE_TOPIC,
        DEVICE_ID,
        BatteryReading::UNIT
    )
    .ok();
    payload
}
