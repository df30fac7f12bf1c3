//! Wi-Fi and MQTT ports over esp-radio and embassy-net.

use embassy_net::dns::DnsQueryType;
use embassy_net::tcp::TcpSocket;
use embassy_net::{IpAddress, IpEndpoint, Runner, Stack};
use embassy_time::Duration;
use esp_radio::wifi::{ClientConfig, ModeConfig, WifiController, WifiDevice};
use rust_mqtt::client::client::MqttClient;
use rust_mqtt::client::client_config::{ClientConfig as MqttClientConfig, MqttVersion};
use rust_mqtt::packet::v5::publish_packet::QualityOfService;
use rust_mqtt::utils::rng_generator::CountingRng;

use fridgemon_core::traits;

use crate::config;

/// Drives the network stack; runs for the whole awake phase.
#[embassy_executor::task]
pub async fn net_task(mut runner: Runner<'static, WifiDevice<'static>>) -> ! {
    runner.run().await
}

/// Station-mode radio port: esp-radio controller plus the DHCP-backed
/// embassy-net stack. "Connected" means associated and addressed.
pub struct WifiRadio {
    controller: WifiController<'static>,
    stack: Stack<'static>,
    reported_addr: bool,
}

impl WifiRadio {
    pub fn new(controller: WifiController<'static>, stack: Stack<'static>) -> Self {
        Self {
            controller,
            stack,
            reported_addr: false,
        }
    }
}

impl traits::Radio for WifiRadio {
    fn connect(&mut self) {
        let client = ClientConfig::default()
            .with_ssid(config::WIFI_SSID.into())
            .with_password(config::WIFI_PASS.into());

        if let Err(e) = self.controller.set_config(&ModeConfig::Client(client)) {
            log::error!("wifi: set_config failed: {:?}", e);
            return;
        }
        if let Err(e) = self.controller.start() {
            log::error!("wifi: start failed: {:?}", e);
            return;
        }
        if let Err(e) = self.controller.connect() {
            log::error!("wifi: connect failed: {:?}", e);
        }
    }

    async fn is_connected(&mut self) -> bool {
        let up = self.controller.is_connected().unwrap_or(false) && self.stack.is_config_up();
        if up && !self.reported_addr {
            if let Some(v4) = self.stack.config_v4() {
                log::info!("wifi: address {}", v4.address);
            }
            self.reported_addr = true;
        }
        up
    }
}

/// MQTT broker port backed by rust-mqtt over one TCP socket.
///
/// The socket and client buffers are handed in once; the client is built
/// lazily on the first connect attempt that gets a TCP session, and
/// later attempts re-send CONNECT on the same transport (the cycle's
/// retry loop calls `connect` until the broker accepts).
pub struct MqttBroker {
    stack: Stack<'static>,
    socket: Option<TcpSocket<'static>>,
    write_buf: Option<&'static mut [u8]>,
    recv_buf: Option<&'static mut [u8]>,
    client: Option<MqttClient<'static, TcpSocket<'static>, 5, CountingRng>>,
    connected: bool,
}

impl MqttBroker {
    pub fn new(
        stack: Stack<'static>,
        tcp_rx: &'static mut [u8],
        tcp_tx: &'static mut [u8],
        write_buf: &'static mut [u8],
        recv_buf: &'static mut [u8],
    ) -> Self {
        let mut socket = TcpSocket::new(stack, tcp_rx, tcp_tx);
        socket.set_timeout(Some(Duration::from_secs(10)));

        Self {
            stack,
            socket: Some(socket),
            write_buf: Some(write_buf),
            recv_buf: Some(recv_buf),
            client: None,
            connected: false,
        }
    }

    /// IPv4 literal, or a DNS lookup over the live stack.
    async fn resolve(&self) -> Option<IpEndpoint> {
        if let Ok(addr) = config::MQTT_HOST.parse::<core::net::Ipv4Addr>() {
            return Some(IpEndpoint::new(IpAddress::Ipv4(addr), config::MQTT_PORT));
        }

        match self.stack.dns_query(config::MQTT_HOST, DnsQueryType::A).await {
            Ok(addrs) => addrs
                .first()
                .copied()
                .map(|addr| IpEndpoint::new(addr, config::MQTT_PORT)),
            Err(e) => {
                log::warn!("mqtt: dns lookup for {} failed: {:?}", config::MQTT_HOST, e);
                None
            }
        }
    }

    async fn ensure_client(&mut self) -> bool {
        if self.client.is_some() {
            return true;
        }

        let Some(endpoint) = self.resolve().await else {
            return false;
        };
        let Some(mut socket) = self.socket.take() else {
            return false;
        };

        if let Err(e) = socket.connect(endpoint).await {
            log::debug!("mqtt: tcp connect to {} failed: {:?}", endpoint, e);
            // A timed-out handshake can leave the socket mid-state;
            // reset it so the next retry starts from Closed.
            socket.abort();
            let _ = socket.flush().await;
            self.socket = Some(socket);
            return false;
        }
        log::info!("mqtt: tcp session to {} established", endpoint);

        let (Some(write_buf), Some(recv_buf)) = (self.write_buf.take(), self.recv_buf.take())
        else {
            return false;
        };

        let mut mqtt_config: MqttClientConfig<'static, CountingRng> =
            MqttClientConfig::new(MqttVersion::MQTTv5, CountingRng(20000));
        mqtt_config.add_client_id(config::MQTT_CLIENT_ID);
        if !config::MQTT_USERNAME.is_empty() {
            mqtt_config.add_username(config::MQTT_USERNAME);
            mqtt_config.add_password(config::MQTT_KEY);
        }
        mqtt_config.max_packet_size = 512;

        let write_len = write_buf.len();
        let recv_len = recv_buf.len();
        self.client = Some(MqttClient::new(
            socket,
            write_buf,
            write_len,
            recv_buf,
            recv_len,
            mqtt_config,
        ));
        true
    }
}

impl traits::Broker for MqttBroker {
    async fn connect(&mut self) -> bool {
        if !self.ensure_client().await {
            return false;
        }
        let Some(client) = self.client.as_mut() else {
            return false;
        };

        match client.connect_to_broker().await {
            Ok(()) => {
                self.connected = true;
                true
            }
            Err(reason) => {
                log::debug!("mqtt: broker rejected connect: {:?}", reason);
                false
            }
        }
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    async fn publish(&mut self, topic: &str, payload: &[u8]) -> bool {
        let Some(client) = self.client.as_mut() else {
            return false;
        };

        match client
            .send_message(topic, payload, QualityOfService::QoS0, false)
            .await
        {
            Ok(()) => true,
            Err(reason) => {
                log::warn!("mqtt: publish to {} failed: {:?}", topic, reason);
                false
            }
        }
    }
}
