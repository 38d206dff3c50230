//! EVSE WiFi gateway firmware library.
//!
//! Exposes the pure-logic modules for integration testing and external
//! inspection. All ESP-IDF-specific code is guarded by
//! `#[cfg(target_os = "espidf")]` within each module.

#![deny(unused_must_use)]

pub mod app;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod fsm;
pub mod rapi;
pub mod timer;

pub mod pins;

// The device-only parts are cfg-gated inside each adapter.
pub mod adapters;
