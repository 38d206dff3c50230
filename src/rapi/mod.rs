//! RAPI (Remote API) protocol client.
//!
//! The EVSE controller speaks a line-oriented ASCII protocol over UART.
//! This module owns everything protocol-shaped:
//!
//! - [`codec`]: framing, checksums, tokenising
//! - [`client`]: single in-flight command correlation
//! - [`transport`]: the byte-stream seam

pub mod client;
pub mod codec;
pub mod transport;

pub use client::{PumpOutcome, RapiClient, RapiReply};
pub use codec::ResponseTokens;
pub use transport::{MemoryTransport, Transport};
