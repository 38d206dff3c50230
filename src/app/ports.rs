//! Port traits: the hexagonal boundary between the control loop and the
//! collaborators it drives.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ ControlLoop (domain)
//! ```
//!
//! WiFi, the web server, MQTT, the cloud client, the LCD, OTA and solar
//! diversion all live behind these traits.  The loop sees only the calls
//! listed here, so every collaborator can be replaced by a mock in tests.
//!
//! Many collaborators are both a hook (serviced every pass) and a port
//! (queried or published to).  Share one instance in both roles through
//! `Rc<RefCell<T>>`, which forwards every trait here.

use core::cell::RefCell;
use std::rc::Rc;

use crate::config::SystemConfig;
use crate::error::ConfigError;

// ───────────────────────────────────────────────────────────────
// Hooks
// ───────────────────────────────────────────────────────────────

/// A collaborator with a one-time setup and per-pass housekeeping.
///
/// `service` is called once per loop pass and must return promptly.
pub trait Service {
    fn name(&self) -> &'static str;

    fn setup(&mut self) {}

    fn service(&mut self);
}

// ───────────────────────────────────────────────────────────────
// Network
// ───────────────────────────────────────────────────────────────

/// The network stack.  `poll` runs first on every pass.
pub trait NetworkPort {
    fn poll(&mut self);

    fn is_connected(&self) -> bool;
}

// ───────────────────────────────────────────────────────────────
// Outbound sinks
// ───────────────────────────────────────────────────────────────

/// Local web UI (WebSocket push).
pub trait EventSink {
    fn send_event(&mut self, json: &str);
}

/// Message broker client.
pub trait BrokerPort {
    /// Keep the session alive.  Called every pass while connected.
    fn service(&mut self);

    fn publish(&mut self, json: &str);
}

/// Cloud telemetry client.
pub trait TelemetrySink {
    fn publish(&mut self, json: &str);
}

/// Character display.
pub trait DisplayPort {
    /// Show `text` on `line`, keeping it for at least `hold_ms`.
    fn show(&mut self, line: u8, text: &str, hold_ms: u32);
}

// ───────────────────────────────────────────────────────────────
// Queries
// ───────────────────────────────────────────────────────────────

/// Solar / grid-import current diversion.
pub trait SolarPort {
    fn update(&mut self);
}

/// Firmware updater.
pub trait OtaStatus {
    fn is_update_in_progress(&self) -> bool;
}

/// Clock and heap.
pub trait HalPort {
    /// Free-running millisecond counter.  Wraps at `u32::MAX`.
    fn now_ms(&self) -> u32;

    fn free_heap(&self) -> u32;
}

// ───────────────────────────────────────────────────────────────
// Configuration port (driven adapter: domain ↔ persistent config)
// ───────────────────────────────────────────────────────────────

/// Loads and persists system configuration.
///
/// Implementations MUST validate before persisting.  Invalid ranges are
/// rejected with [`ConfigError::ValidationFailed`], not clamped.
pub trait ConfigPort {
    /// Load configuration.  Returns [`SystemConfig::default()`] if nothing
    /// is stored.
    fn load(&self) -> Result<SystemConfig, ConfigError>;

    /// Validate and persist configuration.
    fn save(&self, config: &SystemConfig) -> Result<(), ConfigError>;
}

// ───────────────────────────────────────────────────────────────
// Shared handles
// ───────────────────────────────────────────────────────────────

impl<T: Service> Service for Rc<RefCell<T>> {
    fn name(&self) -> &'static str {
        self.borrow().name()
    }

    fn setup(&mut self) {
        self.borrow_mut().setup();
    }

    fn service(&mut self) {
        self.borrow_mut().service();
    }
}

impl<T: NetworkPort> NetworkPort for Rc<RefCell<T>> {
    fn poll(&mut self) {
        self.borrow_mut().poll();
    }

    fn is_connected(&self) -> bool {
        self.borrow().is_connected()
    }
}

impl<T: EventSink> EventSink for Rc<RefCell<T>> {
    fn send_event(&mut self, json: &str) {
        self.borrow_mut().send_event(json);
    }
}

impl<T: BrokerPort> BrokerPort for Rc<RefCell<T>> {
    fn service(&mut self) {
        self.borrow_mut().service();
    }

    fn publish(&mut self, json: &str) {
        self.borrow_mut().publish(json);
    }
}

impl<T: TelemetrySink> TelemetrySink for Rc<RefCell<T>> {
    fn publish(&mut self, json: &str) {
        self.borrow_mut().publish(json);
    }
}

impl<T: DisplayPort> DisplayPort for Rc<RefCell<T>> {
    fn show(&mut self, line: u8, text: &str, hold_ms: u32) {
        self.borrow_mut().show(line, text, hold_ms);
    }
}

impl<T: SolarPort> SolarPort for Rc<RefCell<T>> {
    fn update(&mut self) {
        self.borrow_mut().update();
    }
}

impl<T: OtaStatus> OtaStatus for Rc<RefCell<T>> {
    fn is_update_in_progress(&self) -> bool {
        self.borrow().is_update_in_progress()
    }
}
