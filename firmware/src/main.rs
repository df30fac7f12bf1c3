#![no_std]
#![no_main]
// The blink fallback after the deep-sleep call is deliberately
// unreachable in normal operation.
#![allow(unreachable_code)]

extern crate alloc;

use embassy_executor::Spawner;
use embassy_net::StackResources;
use embassy_time::{Duration, Timer};
use esp_backtrace as _;
use esp_hal::clock::CpuClock;
use esp_hal::gpio::{Level, Output, OutputConfig};
use esp_hal::rtc_cntl::{Rtc, sleep::TimerWakeupSource};
use esp_hal::timer::timg::TimerGroup;
use static_cell::StaticCell;

use fridgemon_core::cycle::{CycleOutcome, run_cycle};

mod config;
mod hardware;
mod net;

esp_bootloader_esp_idf::esp_app_desc!();

static RESOURCES: StaticCell<StackResources<4>> = StaticCell::new();
static TCP_RX: StaticCell<[u8; 1024]> = StaticCell::new();
static TCP_TX: StaticCell<[u8; 1024]> = StaticCell::new();
static MQTT_WRITE: StaticCell<[u8; 512]> = StaticCell::new();
static MQTT_RECV: StaticCell<[u8; 512]> = StaticCell::new();

#[esp_rtos::main]
async fn main(spawner: Spawner) {
    esp_println::logger::init_logger_from_env();
    let peripherals = esp_hal::init(esp_hal::Config::default().with_cpu_clock(CpuClock::max()));

    esp_println::println!("=== fridgemon ===");

    // esp-radio needs a heap.
    esp_alloc::heap_allocator!(size: 72 * 1024);

    let timg0 = TimerGroup::new(peripherals.TIMG0);
    esp_rtos::start(timg0.timer0);

    // LED on (driven low) for the whole awake phase.
    let mut led = Output::new(peripherals.GPIO2, Level::Low, OutputConfig::default());

    let mut battery = hardware::BatteryAdc::new(peripherals.ADC1, peripherals.GPIO34);
    let mut probe = hardware::Ds18b20::new(peripherals.GPIO17);

    let radio: &'static _ = match esp_radio::init() {
        Ok(radio) => alloc::boxed::Box::leak(alloc::boxed::Box::new(radio)),
        Err(e) => {
            esp_println::println!("[ERROR] Radio init failed: {:?}", e);
            loop {
                Timer::after(Duration::from_secs(1)).await;
            }
        }
    };
    let (controller, interfaces) =
        match esp_radio::wifi::new(radio, peripherals.WIFI, esp_radio::wifi::Config::default()) {
            Ok(v) => v,
            Err(e) => {
                esp_println::println!("[ERROR] Wi-Fi init failed: {:?}", e);
                loop {
                    Timer::after(Duration::from_secs(1)).await;
                }
            }
        };

    let mut rng = esp_hal::rng::Rng::new();
    let seed = (u64::from(rng.random()) << 32) | u64::from(rng.random());
    let (stack, runner) = embassy_net::new(
        interfaces.sta,
        embassy_net::Config::dhcpv4(Default::default()),
        RESOURCES.init(StackResources::new()),
        seed,
    );
    if let Err(e) = spawner.spawn(net::net_task(runner)) {
        esp_println::println!("[ERROR] Failed to spawn net task: {:?}", e);
    }

    let mut radio_port = net::WifiRadio::new(controller, stack);
    let mut broker = net::MqttBroker::new(
        stack,
        TCP_RX.init([0; 1024]),
        TCP_TX.init([0; 1024]),
        MQTT_WRITE.init([0; 512]),
        MQTT_RECV.init([0; 512]),
    );
    let mut delay = hardware::CycleDelay;

    let outcome = run_cycle(
        &mut battery,
        &mut probe,
        &mut radio_port,
        &mut broker,
        &mut delay,
    )
    .await;

    if outcome == CycleOutcome::RestartRequired {
        esp_println::println!("Restarting: wifi never connected");
        esp_hal::system::software_reset();
    }

    // LED off, then deep sleep. The next cycle starts from power-on;
    // the network and broker sessions die with the power domain.
    led.set_high();
    esp_println::println!(
        "Cycle done ({:?}), sleeping for {} min...",
        outcome,
        config::SLEEP_MINUTES
    );
    Timer::after(Duration::from_secs(1)).await;

    let mut rtc = Rtc::new(peripherals.LPWR);
    let wake = TimerWakeupSource::new(core::time::Duration::from_secs(
        config::SLEEP_MINUTES * 60,
    ));
    rtc.sleep_deep(&[&wake]);

    // Only reachable if the sleep call is skipped or fails: blink as a
    // liveness indicator instead of running another cycle.
    loop {
        led.toggle();
        Timer::after(Duration::from_secs(1)).await;
    }
}
