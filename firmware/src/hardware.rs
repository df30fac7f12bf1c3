//! Board-level implementations of the cycle's capability ports.

use embassy_time::{Duration, Timer};
use esp_hal::analog::adc::{Adc, AdcConfig, AdcPin, Attenuation};
use esp_hal::delay::Delay;
use esp_hal::gpio::{AnyPin, DriveMode, Flex, InputConfig, OutputConfig, Pull};
use esp_hal::peripherals::{ADC1, GPIO34};

use fridgemon_core::traits;

/// Full-scale millivolts of a 12-bit conversion at 11 dB attenuation.
const ADC_FULL_SCALE_MV: u32 = 3300;
const ADC_MAX_COUNT: u32 = 4095;

/// Battery divider on GPIO34 (ADC1). 11 dB attenuation covers the whole
/// expected divider output range.
pub struct BatteryAdc<'a> {
    adc: Adc<'a, ADC1<'a>, esp_hal::Blocking>,
    pin: AdcPin<GPIO34<'a>, ADC1<'a>>,
}

impl<'a> BatteryAdc<'a> {
    pub fn new(adc_periph: ADC1<'a>, battery_gpio: GPIO34<'a>) -> Self {
        let mut adc_config = AdcConfig::new();
        let pin = adc_config.enable_pin(battery_gpio, Attenuation::_11dB);
        let adc = Adc::new(adc_periph, adc_config);

        Self { adc, pin }
    }
}

impl traits::PowerMonitor for BatteryAdc<'_> {
    async fn read_millivolts(&mut self) -> u32 {
        match self.adc.read_oneshot(&mut self.pin) {
            Ok(raw) => u32::from(raw) * ADC_FULL_SCALE_MV / ADC_MAX_COUNT,
            Err(_) => {
                // No validation policy: a failed read publishes as zero.
                log::warn!("battery: ADC read failed, reporting 0 mV");
                0
            }
        }
    }
}

// DS18B20 function commands.
const CMD_SKIP_ROM: u8 = 0xCC;
const CMD_CONVERT_T: u8 = 0x44;
const CMD_READ_SCRATCHPAD: u8 = 0xBE;

/// 12-bit conversions finish within 750 ms per the datasheet.
const CONVERSION_TIMEOUT_MS: u32 = 750;

/// Value reported when the sensor does not answer, matching the usual
/// Dallas driver convention for a disconnected probe (-196.6 F).
pub const DISCONNECTED_F: f32 = -196.6;

/// Bit-banged DS18B20 on a single open-drain line with external pull-up.
///
/// Only one sensor is expected on the bus, so addressing uses SKIP ROM
/// throughout. Bit slots run inside a critical section; the millisecond
/// waits between them are async.
pub struct Ds18b20<'a> {
    pin: Flex<'a>,
    delay: Delay,
}

impl<'a> Ds18b20<'a> {
    pub fn new<P>(bus_gpio: P) -> Self
    where
        P: Into<AnyPin<'a>>,
    {
        let mut pin = Flex::new(bus_gpio.into());
        pin.apply_input_config(&InputConfig::default().with_pull(Pull::Up));
        pin.apply_output_config(&OutputConfig::default().with_drive_mode(DriveMode::OpenDrain));
        pin.set_input_enable(true);
        pin.set_output_enable(true);
        pin.set_high();

        Self {
            pin,
            delay: Delay::new(),
        }
    }

    /// Reset pulse; true when at least one device answers with presence.
    fn reset(&mut self) -> bool {
        self.pin.set_low();
        self.delay.delay_micros(480);

        let presence = critical_section::with(|_| {
            self.pin.set_high();
            self.delay.delay_micros(70);
            !self.pin.is_high()
        });

        self.delay.delay_micros(410);
        presence
    }

    fn write_bit(&mut self, bit: bool) {
        critical_section::with(|_| {
            self.pin.set_low();
            if bit {
                self.delay.delay_micros(6);
                self.pin.set_high();
                self.delay.delay_micros(64);
            } else {
                self.delay.delay_micros(60);
                self.pin.set_high();
                self.delay.delay_micros(10);
            }
        });
    }

    fn read_bit(&mut self) -> bool {
        let bit = critical_section::with(|_| {
            self.pin.set_low();
            self.delay.delay_micros(6);
            self.pin.set_high();
            self.delay.delay_micros(9);
            self.pin.is_high()
        });
        self.delay.delay_micros(55);
        bit
    }

    fn write_byte(&mut self, byte: u8) {
        for i in 0..8 {
            self.write_bit(byte & (1 << i) != 0);
        }
    }

    fn read_byte(&mut self) -> u8 {
        let mut byte = 0u8;
        for i in 0..8 {
            if self.read_bit() {
                byte |= 1 << i;
            }
        }
        byte
    }

    /// Request a conversion and read back the raw 1/16-degree count.
    async fn read_raw(&mut self) -> Result<i16, &'static str> {
        if !self.reset() {
            return Err("no presence pulse");
        }
        self.write_byte(CMD_SKIP_ROM);
        self.write_byte(CMD_CONVERT_T);

        // The sensor answers read slots with 0 while converting.
        let mut waited_ms = 0;
        while !self.read_bit() {
            if waited_ms >= CONVERSION_TIMEOUT_MS {
                return Err("conversion timeout");
            }
            Timer::after(Duration::from_millis(10)).await;
            waited_ms += 10;
        }

        if !self.reset() {
            return Err("presence lost after conversion");
        }
        self.write_byte(CMD_SKIP_ROM);
        self.write_byte(CMD_READ_SCRATCHPAD);

        let lsb = self.read_byte();
        let msb = self.read_byte();
        Ok(i16::from_le_bytes([lsb, msb]))
    }
}

impl traits::TemperatureProbe for Ds18b20<'_> {
    async fn read_fahrenheit(&mut self) -> f32 {
        match self.read_raw().await {
            Ok(raw) => f32::from(raw) / 16.0 * 1.8 + 32.0,
            Err(reason) => {
                log::warn!("ds18b20: {}, reporting sentinel", reason);
                DISCONNECTED_F
            }
        }
    }
}

/// Timer-backed pause for the cycle's polling loops.
pub struct CycleDelay;

impl traits::Delay for CycleDelay {
    async fn delay_ms(&mut self, ms: u32) {
        Timer::after(Duration::from_millis(u64::from(ms))).await;
    }
}
