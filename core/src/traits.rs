//! Capability ports between the cycle logic and the hardware

/// Battery voltage monitor behind the board's voltage divider.
#[allow(async_fn_in_trait)]
pub trait PowerMonitor {
    /// Read the divided battery voltage in millivolts.
    ///
    /// Always yields a value; with no hardware attached the reading is
    /// garbage and gets published as-is.
    async fn read_millivolts(&mut self) -> u32;
}

/// Digital temperature sensor with a request-then-read protocol.
#[allow(async_fn_in_trait)]
pub trait TemperatureProbe {
    /// Trigger a conversion and read the result in degrees Fahrenheit.
    ///
    /// Implementations report a sentinel value instead of failing when
    /// the sensor does not answer.
    async fn read_fahrenheit(&mut self) -> f32;
}

/// Station-mode wireless link.
#[allow(async_fn_in_trait)]
pub trait Radio {
    /// Kick off the association with the configured network. Returns
    /// immediately; progress is observed through `is_connected`.
    fn connect(&mut self);

    /// Whether the link is up and an address has been assigned.
    async fn is_connected(&mut self) -> bool;
}

/// Publish/subscribe client over the established network transport.
#[allow(async_fn_in_trait)]
pub trait Broker {
    /// Attempt to establish (or re-establish) the broker session with
    /// the configured client id and credentials.
    async fn connect(&mut self) -> bool;

    /// Whether the session is currently established.
    fn is_connected(&self) -> bool;

    /// Publish one payload. The return value only reflects whether the
    /// call itself succeeded; no delivery confirmation is awaited.
    async fn publish(&mut self, topic: &str, payload: &[u8]) -> bool;
}

/// The cycle's only suspension mechanism: a fixed pause between polls.
#[allow(async_fn_in_trait)]
pub trait Delay {
    async fn delay_ms(&mut self, ms: u32);
}
