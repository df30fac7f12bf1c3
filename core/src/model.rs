// Readings produced once per wake cycle, read-only afterward.

/// Round to 2 decimal places without pulling in libm.
pub fn round2(value: f32) -> f32 {
    let scaled = value * 100.0;
    let rounded = if scaled >= 0.0 {
        (scaled + 0.5) as i32
    } else {
        (scaled - 0.5) as i32
    };
    rounded as f32 / 100.0
}

/// Battery measurement taken at cycle start.
pub struct BatteryReading {
    pub millivolts: u32,
    /// Derived volts, already rounded to 2 decimals.
    pub volts: f32,
}

impl BatteryReading {
    pub const UNIT: &'static str = "V";

    /// The board divides the battery voltage by two before the ADC, so
    /// volts = mv / 1000 * 2. The ratio is fixed by the hardware.
    pub fn from_millivolts(millivolts: u32) -> Self {
        let volts = round2(millivolts as f32 / 1000.0 * 2.0);
        Self { millivolts, volts }
    }
}

/// Temperature measurement taken at cycle start.
pub struct TemperatureReading {
    /// Degrees Fahrenheit, already rounded to 2 decimals.
    pub degrees: f32,
}

impl TemperatureReading {
    pub const UNIT: &'static str = "F";

    pub fn fahrenheit(degrees: f32) -> Self {
        Self {
            degrees: round2(degrees),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f32 = 1e-4;

    #[test]
    fn divider_formula_is_mv_over_1000_times_two() {
        // The stated transform, not a "corrected" battery formula.
        let reading = BatteryReading::from_millivolts(3300);
        assert!((reading.volts - 6.6).abs() < EPS);
        assert_eq!(reading.millivolts, 3300);
    }

    #[test]
    fn divider_formula_rounds_to_two_decimals() {
        // 2048 mV -> 4.096 V -> 4.10 V
        let reading = BatteryReading::from_millivolts(2048);
        assert!((reading.volts - 4.1).abs() < EPS);
    }

    #[test]
    fn temperature_rounds_to_two_decimals() {
        assert!((TemperatureReading::fahrenheit(72.344).degrees - 72.34).abs() < EPS);
        assert!((TemperatureReading::fahrenheit(72.346).degrees - 72.35).abs() < EPS);
    }

    #[test]
    fn round2_handles_negative_values() {
        assert!((round2(-196.6) + 196.6).abs() < EPS);
        assert!((round2(-1.239) + 1.24).abs() < EPS);
    }

    #[test]
    fn round2_is_identity_on_round_values() {
        assert!((round2(0.0)).abs() < EPS);
        assert!((round2(25.0) - 25.0).abs() < EPS);
    }
}
