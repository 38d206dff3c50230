//! Log-based outbound adapters.
//!
//! Implement the outbound ports by writing to the ESP-IDF logger (which
//! goes to UART / USB-CDC in production).  They stand in for the web
//! server, the MQTT client, the cloud uploader, the LCD and the solar
//! divert module until a real adapter replaces each one; a replacement
//! implements the same trait and nothing upstream changes.

use log::{debug, info};

use super::time::Esp32Hal;
use crate::app::ports::{
    BrokerPort, DisplayPort, EventSink, HalPort, Service, SolarPort, TelemetrySink,
};
use crate::timer::elapsed;

/// Local web UI stand-in: logs every pushed event.
#[derive(Debug, Default)]
pub struct LogWebSink {
    sent: u32,
}

impl LogWebSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Events pushed since boot.
    pub fn sent(&self) -> u32 {
        self.sent
    }
}

impl EventSink for LogWebSink {
    fn send_event(&mut self, json: &str) {
        self.sent = self.sent.wrapping_add(1);
        info!("WEB | {}", json);
    }
}

impl Service for LogWebSink {
    fn name(&self) -> &'static str {
        "web"
    }

    fn service(&mut self) {}
}

/// Broker stand-in.
#[derive(Debug, Default)]
pub struct LogBroker {
    published: u32,
    serviced: u32,
}

impl LogBroker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn published(&self) -> u32 {
        self.published
    }

    pub fn serviced(&self) -> u32 {
        self.serviced
    }
}

impl BrokerPort for LogBroker {
    fn service(&mut self) {
        self.serviced = self.serviced.wrapping_add(1);
    }

    fn publish(&mut self, json: &str) {
        self.published = self.published.wrapping_add(1);
        info!("MQTT | {}", json);
    }
}

/// Cloud telemetry stand-in.
#[derive(Debug, Default)]
pub struct LogCloud {
    published: u32,
}

impl LogCloud {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn published(&self) -> u32 {
        self.published
    }
}

impl TelemetrySink for LogCloud {
    fn publish(&mut self, json: &str) {
        self.published = self.published.wrapping_add(1);
        info!("CLOUD | {}", json);
    }
}

/// Number of character rows on the display.
pub const DISPLAY_LINES: usize = 2;

/// Two-line display rendered to the log.
///
/// A message shown with a hold time pins its line until the hold expires;
/// later messages for that line are dropped meanwhile.
pub struct LogDisplay {
    clock: Esp32Hal,
    lines: [heapless::String<32>; DISPLAY_LINES],
    held_since: [u32; DISPLAY_LINES],
    hold_ms: [u32; DISPLAY_LINES],
}

impl Default for LogDisplay {
    fn default() -> Self {
        Self::new()
    }
}

impl LogDisplay {
    pub fn new() -> Self {
        Self {
            clock: Esp32Hal::new(),
            lines: Default::default(),
            held_since: [0; DISPLAY_LINES],
            hold_ms: [0; DISPLAY_LINES],
        }
    }

    /// Current text of `line`, if it exists.
    pub fn line(&self, line: u8) -> Option<&str> {
        self.lines.get(usize::from(line)).map(|s| s.as_str())
    }

    fn is_held(&self, idx: usize, now: u32) -> bool {
        self.hold_ms[idx] != 0 && !elapsed(self.held_since[idx], self.hold_ms[idx], now)
    }
}

impl DisplayPort for LogDisplay {
    fn show(&mut self, line: u8, text: &str, hold_ms: u32) {
        let idx = usize::from(line);
        if idx >= DISPLAY_LINES {
            debug!("LCD: line {} out of range", line);
            return;
        }
        let now = self.clock.now_ms();
        if self.is_held(idx, now) {
            debug!("LCD: line {} held, dropping {:?}", line, text);
            return;
        }

        let slot = &mut self.lines[idx];
        slot.clear();
        for c in text.chars() {
            if slot.push(c).is_err() {
                break;
            }
        }
        self.held_since[idx] = now;
        self.hold_ms[idx] = hold_ms;
        info!("LCD[{}] | {}", line, slot);
    }
}

impl Service for LogDisplay {
    fn name(&self) -> &'static str {
        "display"
    }

    fn service(&mut self) {
        let now = self.clock.now_ms();
        for idx in 0..DISPLAY_LINES {
            if self.hold_ms[idx] != 0 && !self.is_held(idx, now) {
                self.hold_ms[idx] = 0;
            }
        }
    }
}

/// Solar divert stand-in.
#[derive(Debug, Default)]
pub struct LogDivert {
    updates: u32,
}

impl LogDivert {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn updates(&self) -> u32 {
        self.updates
    }
}

impl SolarPort for LogDivert {
    fn update(&mut self) {
        self.updates = self.updates.wrapping_add(1);
        debug!("DIVERT | update #{}", self.updates);
    }
}

impl Service for LogDivert {
    fn name(&self) -> &'static str {
        "divert"
    }

    fn service(&mut self) {}
}
