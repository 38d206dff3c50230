//! Shared mutable context threaded through every RAPI callback.
//!
//! `ChargerContext` is the single struct that completion and event
//! handlers read from and write to: the readiness machine, the latest live
//! readings, and the queue of charger events waiting to be published.  The
//! control loop owns it and lends it to the RAPI client on each pump.

use log::warn;

use super::{ReadinessMachine, Transition};
use crate::app::events::ChargerEvent;
use crate::rapi::RapiReply;

/// Capacity of the outbound event queue.
pub const EVENT_QUEUE_LEN: usize = 8;

// ---------------------------------------------------------------------------
// Live readings (written by RAPI completions; read by telemetry)
// ---------------------------------------------------------------------------

/// Last known values read from the EVSE.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChargerReadings {
    /// Charge current (mA), from `$GG`.
    pub current_ma: i32,
    /// Line voltage (mV), from `$GG`.
    pub voltage_mv: i32,
    /// Seconds into the current charging session, from `$GS`.
    pub elapsed_secs: u32,

    /// Temperature sensors (tenths of °C), from `$GP`.  `None` = not installed.
    pub temps_dc: [Option<i32>; 3],

    /// Energy delivered this session (watt-seconds), from `$GU`.
    pub session_watt_secs: u64,
    /// Lifetime energy delivered (Wh), from `$GU`.
    pub total_watt_hours: u64,

    /// Pilot current setting (A), from `$GE`.
    pub pilot_amps: i32,
    /// EVSE flag word, from `$GE`.
    pub flags: u32,

    /// Allowed current range (A), from `$GC`.
    pub min_amps: i32,
    pub max_amps: i32,

    /// Fault counters, from `$GF`.
    pub gfci_count: u32,
    pub no_ground_count: u32,
    pub stuck_relay_count: u32,

    /// EVSE firmware and RAPI protocol versions, from `$GV`.
    pub firmware: heapless::String<16>,
    pub protocol: heapless::String<16>,
}

impl ChargerReadings {
    /// Sentinel the EVSE reports for an absent temperature sensor.
    pub const TEMP_NOT_INSTALLED: i32 = -2560;
}

// ---------------------------------------------------------------------------
// ChargerContext
// ---------------------------------------------------------------------------

/// The shared context passed to every RAPI callback.
#[derive(Debug, Default)]
pub struct ChargerContext {
    /// Readiness state, mutated only by status replies.
    pub machine: ReadinessMachine,
    /// Latest live values.
    pub readings: ChargerReadings,
    events: heapless::Deque<ChargerEvent, EVENT_QUEUE_LEN>,
    dropped_events: u32,
}

impl ChargerContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold a `$GS` outcome into the machine and queue a state event on
    /// change.
    pub fn apply_status(&mut self, reply: RapiReply<'_>) -> Option<Transition> {
        let t = self.machine.apply_status_reply(reply)?;
        self.push_event(ChargerEvent::State {
            state: t.to.code(),
        });
        Some(t)
    }

    /// Queue an event for publication.  When the queue is full the new
    /// event is dropped.
    pub fn push_event(&mut self, event: ChargerEvent) {
        if let Err(event) = self.events.push_back(event) {
            self.dropped_events = self.dropped_events.wrapping_add(1);
            warn!("EVSE: event queue full, dropped {:?}", event);
        }
    }

    /// Oldest queued event.
    pub fn take_event(&mut self) -> Option<ChargerEvent> {
        self.events.pop_front()
    }

    pub fn queued_events(&self) -> usize {
        self.events.len()
    }

    pub fn dropped_events(&self) -> u32 {
        self.dropped_events
    }
}
