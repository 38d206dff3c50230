//! Application core: the control loop and everything it orchestrates.
//!
//! All interaction with the network, the EVSE serial link and the
//! downstream sinks happens through **port traits** defined in [`ports`],
//! keeping this layer fully testable without real peripherals.

pub mod control;
pub mod events;
pub mod ports;
pub mod readings;
pub mod telemetry;
