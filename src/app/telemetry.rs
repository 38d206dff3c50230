//! Telemetry fan-out.
//!
//! ```text
//!                        ┌──▶ cloud   (if cloud_enabled)
//!   publish_snapshot ────┤
//!                        └──▶ broker  (if broker_enabled)
//!
//!                        ┌──▶ web UI  (always)
//!   publish_event ───────┤
//!                        └──▶ broker  (if broker_enabled)
//! ```
//!
//! Each payload is serialised once.  Sinks are independent and
//! fire-and-forget: nothing is retried and nothing is reported back.

use log::{debug, warn};
use serde::Serialize;

use super::events::ChargerEvent;
use super::ports::{BrokerPort, EventSink, TelemetrySink};
use crate::config::FeatureFlags;
use crate::fsm::ChargerState;
use crate::fsm::context::ChargerReadings;

/// One publish cycle's worth of live values, serialised as a flat JSON
/// object.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TelemetrySnapshot {
    /// Charge current (mA).
    pub amp: i32,
    /// Line voltage (V).
    pub voltage: i32,
    /// Pilot setting (A).
    pub pilot: i32,
    pub state: i32,
    /// Session time (s).
    pub elapsed: u32,
    pub wattsec: u64,
    pub watthour: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temp1: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temp2: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temp3: Option<i32>,
    pub freeram: u32,
}

impl TelemetrySnapshot {
    pub fn capture(state: ChargerState, r: &ChargerReadings, free_heap: u32) -> Self {
        let [temp1, temp2, temp3] = r.temps_dc;
        Self {
            amp: r.current_ma,
            voltage: r.voltage_mv / 1000,
            pilot: r.pilot_amps,
            state: state.code(),
            elapsed: r.elapsed_secs,
            wattsec: r.session_watt_secs,
            watthour: r.total_watt_hours,
            temp1,
            temp2,
            temp3,
            freeram: free_heap,
        }
    }

    pub fn to_json(&self) -> Option<String> {
        serde_json::to_string(self).ok()
    }
}

/// Forward a snapshot to every enabled telemetry sink.
pub fn publish_snapshot(
    snapshot: &TelemetrySnapshot,
    features: &FeatureFlags,
    cloud: &mut dyn TelemetrySink,
    broker: &mut dyn BrokerPort,
) {
    if !features.cloud_enabled && !features.broker_enabled {
        return;
    }
    let Some(json) = snapshot.to_json() else {
        warn!("Telemetry: snapshot serialisation failed");
        return;
    };
    debug!("Telemetry: {}", json);

    if features.cloud_enabled {
        cloud.publish(&json);
    }
    if features.broker_enabled {
        broker.publish(&json);
    }
}

/// Forward an event to the web UI and, if enabled, the broker.
pub fn publish_event(
    event: &ChargerEvent,
    features: &FeatureFlags,
    web: &mut dyn EventSink,
    broker: &mut dyn BrokerPort,
) {
    let Some(json) = event.to_json() else {
        warn!("Telemetry: event serialisation failed");
        return;
    };

    web.send_event(&json);
    if features.broker_enabled {
        broker.publish(&json);
    }
}
