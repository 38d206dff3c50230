//! EVSE WiFi firmware main entry point.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  UartTransport   WifiAdapter    OtaUpdater     NvsAdapter      │
//! │  (Transport)     (Network+Hook) (OtaStatus)    (ConfigPort)    │
//! │  LogDisplay      LogWebSink     LogBroker      LogCloud        │
//! │  LogDivert       Esp32Hal       Watchdog                       │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │              ControlLoop (pure logic)                  │    │
//! │  │  RAPI client · readiness FSM · telemetry fan-out       │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! └────────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use std::cell::RefCell;
use std::rc::Rc;

use anyhow::Result;
use log::{info, warn};

use esp_idf_hal::delay::FreeRtos;
use esp_idf_hal::peripherals::Peripherals;
use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::wifi::EspWifi;

use evsewifi::adapters::log_sink::{LogBroker, LogCloud, LogDisplay, LogDivert, LogWebSink};
use evsewifi::adapters::nvs::NvsAdapter;
use evsewifi::adapters::ota::OtaUpdater;
use evsewifi::adapters::time::Esp32Hal;
use evsewifi::adapters::uart::UartTransport;
use evsewifi::adapters::watchdog::Watchdog;
use evsewifi::adapters::wifi::WifiAdapter;
use evsewifi::app::control::{ControlLoop, Hook, Ports};
use evsewifi::app::ports::{ConfigPort, HalPort};
use evsewifi::config::SystemConfig;
use evsewifi::{diagnostics, pins};

/// Yield to the idle task between passes so the TWDT idle hook runs.
const PASS_YIELD_MS: u32 = 1;

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  EVSE WiFi v{}                      ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    diagnostics::install_panic_handler();
    let mut watchdog = Watchdog::new(pins::LOOP_WDT_TIMEOUT_MS);

    // ── 2. Config from NVS (or defaults) ──────────────────────
    let config = match NvsAdapter::new().and_then(|nvs| nvs.load()) {
        Ok(cfg) => cfg,
        Err(e) => {
            warn!("NVS config load failed ({}), using defaults", e);
            SystemConfig::default()
        }
    };
    info!("Config: {:?}", config.features);

    // ── 3. Peripherals ────────────────────────────────────────
    let peripherals = Peripherals::take()?;
    let sysloop = EspSystemEventLoop::take()?;

    let wifi = Rc::new(RefCell::new(WifiAdapter::new()));
    wifi.borrow_mut()
        .attach(EspWifi::new(peripherals.modem, sysloop, None)?);
    if let (Some(ssid), Some(pass)) = (option_env!("EVSE_WIFI_SSID"), option_env!("EVSE_WIFI_PASS")) {
        if let Err(e) = wifi.borrow_mut().set_credentials(ssid, pass) {
            warn!("WiFi: build-time credentials rejected: {}", e);
        }
    }

    let uart = UartTransport::new()?;

    // ── 4. Collaborators ──────────────────────────────────────
    let hal = Esp32Hal::new();
    let display = Rc::new(RefCell::new(LogDisplay::new()));
    let web = Rc::new(RefCell::new(LogWebSink::new()));
    let ota = Rc::new(RefCell::new(OtaUpdater::new()));
    let divert = Rc::new(RefCell::new(LogDivert::new()));
    let mut broker = LogBroker::new();
    let mut cloud = LogCloud::new();

    let hooks = vec![
        Hook::service(display.clone()),
        Hook::service(web.clone()),
        Hook::service(wifi.clone()),
        Hook::service(ota.clone()),
        Hook::RapiPump,
        Hook::service(divert.clone()),
    ];

    let mut control = ControlLoop::new(config, uart, hooks, hal.now_ms());
    control.setup();

    let mut network = wifi;
    let mut display = display;
    let mut web = web;
    let mut divert = divert;

    info!("System ready. Entering main loop.");

    // ── 5. Main loop ──────────────────────────────────────────
    loop {
        let mut ports = Ports {
            network: &mut network,
            ota: &ota,
            display: &mut display,
            web: &mut web,
            broker: &mut broker,
            cloud: &mut cloud,
            solar: &mut divert,
            hal: &hal,
        };
        control.run_pass(&mut ports);

        watchdog.feed();
        FreeRtos::delay_ms(PASS_YIELD_MS);
    }
}
