//! Irrigation controller firmware: main entry point.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                     Adapters (outer ring)                    │
//! │                                                              │
//! │  HardwareAdapter  EepromStore        UdpNetwork              │
//! │  (ValvePort)      (Store + Config)   (NetworkPort, Wi-Fi)    │
//! │  Esp32Uptime      LogEventSink       ChannelControl ◀ console│
//! │                                                              │
//! │  ─────────────── Port Trait Boundary ────────────────        │
//! │                                                              │
//! │  ┌────────────────────────────────────────────────────┐      │
//! │  │        IrrigatorService (pure logic)               │      │
//! │  │  Clock · DutyCycleScheduler · ValveActuator        │      │
//! │  └────────────────────────────────────────────────────┘      │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Single cooperative loop: sync the clock (rate limited), take at most
//! one control command, run the duty cycle when due, feed the watchdog.

use anyhow::{anyhow, Result};
use embedded_hal::delay::DelayNs;
use esp_idf_hal::gpio::{AnyOutputPin, Output, PinDriver};
use esp_idf_hal::peripherals::Peripherals;
use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::wifi::{AuthMethod, ClientConfiguration, Configuration, EspWifi};
use log::{debug, info, warn};

use irrigator::actuator::NUM_VALVES;
use irrigator::adapters::console;
use irrigator::adapters::control::{ChannelControl, CMD_CHANNEL};
use irrigator::adapters::eeprom::EepromStore;
use irrigator::adapters::hardware::HardwareAdapter;
use irrigator::adapters::log_sink::LogEventSink;
use irrigator::adapters::network::UdpNetwork;
use irrigator::adapters::time::Esp32UptimeCounter;
use irrigator::app::service::IrrigatorService;
use irrigator::drivers::solenoid::SolenoidDriver;
use irrigator::drivers::watchdog::Watchdog;
use irrigator::pins;

type Valve = SolenoidDriver<PinDriver<'static, AnyOutputPin, Output>>;

const WIFI_SSID: &str = match option_env!("IRRIGATOR_WIFI_SSID") {
    Some(s) => s,
    None => "",
};
const WIFI_PASSWORD: &str = match option_env!("IRRIGATOR_WIFI_PASSWORD") {
    Some(s) => s,
    None => "",
};

fn output(gpio: i32, label: &'static str) -> Result<Valve> {
    // SAFETY: each GPIO in `pins` is claimed exactly once, here.
    let pin = unsafe { AnyOutputPin::new(gpio) };
    let mut driver = PinDriver::output(pin)?;
    driver.set_low()?;
    Ok(SolenoidDriver::new(driver, label))
}

fn valve_outputs() -> Result<HardwareAdapter<PinDriver<'static, AnyOutputPin, Output>>> {
    let zones: Vec<Valve> = pins::VALVE_GPIOS
        .iter()
        .zip(pins::VALVE_LABELS)
        .map(|(&gpio, label)| output(gpio, label))
        .collect::<Result<_>>()?;
    let zones: [Valve; NUM_VALVES] = zones
        .try_into()
        .map_err(|_| anyhow!("expected {} valve outputs", NUM_VALVES))?;
    let master = output(pins::MASTER_VALVE_GPIO, "master")?;
    Ok(HardwareAdapter::new(zones, master))
}

fn station(peripherals: Peripherals) -> Result<EspWifi<'static>> {
    let sysloop = EspSystemEventLoop::take()?;
    let mut wifi = EspWifi::new(peripherals.modem, sysloop, None)?;

    if WIFI_SSID.is_empty() {
        warn!("Wi-Fi: no SSID compiled in, running isolated");
    }
    wifi.set_configuration(&Configuration::Client(ClientConfiguration {
        ssid: WIFI_SSID
            .try_into()
            .map_err(|_| anyhow!("Wi-Fi SSID longer than 32 bytes"))?,
        password: WIFI_PASSWORD
            .try_into()
            .map_err(|_| anyhow!("Wi-Fi password longer than 64 bytes"))?,
        auth_method: if WIFI_PASSWORD.is_empty() {
            AuthMethod::None
        } else {
            AuthMethod::WPA2Personal
        },
        ..Default::default()
    }))?;
    wifi.start()?;
    Ok(wifi)
}

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  Irrigator v{}                    ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    let peripherals = Peripherals::take()?;
    let watchdog = Watchdog::new();

    // ── 2. Persistent store ───────────────────────────────────
    let mut store = EepromStore::new().map_err(|e| anyhow!("persistent store: {}", e))?;

    // ── 3. Valve outputs (all closed before anything else) ────
    let valves = valve_outputs()?;

    // ── 4. Network ────────────────────────────────────────────
    let mut net = UdpNetwork::new(station(peripherals)?);

    // ── 5. Service ────────────────────────────────────────────
    let mut sink = LogEventSink::new();
    let (sender, mut control) = ChannelControl::new(&CMD_CHANNEL);
    console::spawn(sender)?;
    let mut service = IrrigatorService::boot(
        &mut store,
        Esp32UptimeCounter::new(),
        watchdog.delay(),
        valves,
        watchdog.delay(),
        &mut sink,
    );

    match service.status().to_json() {
        Ok(json) => info!("status: {}", json),
        Err(e) => warn!("status: {}", e),
    }

    // ── 6. Control loop ───────────────────────────────────────
    let mut pause = watchdog.delay();
    loop {
        net.maintain();
        if service.poll(&mut net, &mut store, &mut control, &mut sink) {
            match service.status().to_json() {
                Ok(json) => info!("status: {}", json),
                Err(e) => warn!("status: {}", e),
            }
        }
        debug!("till next cycle: {}", service.time_interval_till_next_cycle());
        watchdog.feed();
        pause.delay_ms(service.config().control_loop_interval_ms);
    }
}
