//! GPIO / peripheral assignments for the WiFi module.
//!
//! Single source of truth: every adapter references this module rather than
//! hard-coding pin numbers.

// ---------------------------------------------------------------------------
// RAPI serial link to the EVSE controller
// ---------------------------------------------------------------------------

/// UART peripheral wired to the EVSE's serial header.
pub const RAPI_UART_PORT: i32 = 1;
pub const RAPI_TX_GPIO: i32 = 17;
pub const RAPI_RX_GPIO: i32 = 16;
/// The EVSE firmware's fixed RAPI baud rate.
pub const RAPI_BAUD: u32 = 115_200;
/// Driver RX ring size (bytes).  Must exceed one RAPI line.
pub const RAPI_RX_BUF: usize = 256;

// ---------------------------------------------------------------------------
// Watchdog
// ---------------------------------------------------------------------------

/// Task watchdog timeout for the main loop (ms).
pub const LOOP_WDT_TIMEOUT_MS: u32 = 10_000;
