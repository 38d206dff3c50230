//! Discrete charger events.
//!
//! Queued on the [`ChargerContext`](crate::fsm::context::ChargerContext)
//! by RAPI handlers and drained by the control loop into
//! [`publish_event`](super::telemetry::publish_event).  Each variant
//! serialises as a one-key JSON object, e.g. `{"state":3}`.

use log::debug;
use serde::Serialize;

use crate::fsm::context::ChargerContext;
use crate::rapi::ResponseTokens;

/// Something the UI and broker should hear about immediately.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ChargerEvent {
    /// EVSE state code changed (polled or pushed by the EVSE).
    State { state: i32 },
    /// The EVSE asked the WiFi module to change mode.
    WifiMode { wifi_mode: i32 },
    /// The one-shot initial read of all values has completed.
    InitialRead { initial_read: bool },
}

impl ChargerEvent {
    pub fn to_json(&self) -> Option<String> {
        serde_json::to_string(self).ok()
    }
}

/// Unsolicited-line handler registered with the RAPI client.
///
/// `$ST hh` and `$AT hh …` carry a hex state code; `$WF n` a WiFi mode.
/// The readiness state itself is left to the next `$GS`.
pub fn on_rapi_event(ctx: &mut ChargerContext, tokens: &ResponseTokens) {
    match tokens.head() {
        Some("$ST" | "$AT") => match tokens.get_hex(1) {
            Some(code) => ctx.push_event(ChargerEvent::State {
                state: code as i32,
            }),
            None => debug!("EVSE: state event without code"),
        },
        Some("$WF") => match tokens.get_i32(1) {
            Some(mode) => ctx.push_event(ChargerEvent::WifiMode { wifi_mode: mode }),
            None => debug!("EVSE: WiFi mode event without mode"),
        },
        Some(head @ ("$OK" | "$NK")) => debug!("EVSE: orphaned {} reply ignored", head),
        other => debug!("EVSE: unhandled event {:?}", other),
    }
}
