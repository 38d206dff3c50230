//! Error types for the EVSE WiFi firmware.
//!
//! Every variant is `Copy` so result codes can be handed to RAPI completion
//! callbacks and logged without allocation.

use core::fmt;

// ---------------------------------------------------------------------------
// RAPI result codes
// ---------------------------------------------------------------------------

/// Failure result of a RAPI exchange.
///
/// A successful exchange carries the reply tokens instead; these are the
/// codes a completion callback (or a refused send) can observe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RapiError {
    /// The EVSE answered `$NK`.
    Nk,
    /// The reply line was not a recognisable RAPI response.
    InvalidResponse,
    /// The reply carried a checksum that does not match its contents.
    BadChecksum,
    /// A reply line exceeded the receive buffer and was dropped.
    BufferOverflow,
    /// The command text does not fit in a single RAPI line.
    CommandTooLong,
    /// A command is already in flight and the caller asked not to supersede it.
    Busy,
    /// The serial transport refused the write.
    Transport,
}

impl fmt::Display for RapiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Nk => write!(f, "EVSE rejected command (NK)"),
            Self::InvalidResponse => write!(f, "invalid response"),
            Self::BadChecksum => write!(f, "bad checksum"),
            Self::BufferOverflow => write!(f, "reply exceeded receive buffer"),
            Self::CommandTooLong => write!(f, "command too long"),
            Self::Busy => write!(f, "command already pending"),
            Self::Transport => write!(f, "serial write failed"),
        }
    }
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

/// Errors from [`ConfigPort`](crate::app::ports::ConfigPort) operations
/// and config validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// Stored config failed deserialization.
    Corrupted,
    /// A config field failed range validation.
    /// The `&'static str` describes which field and why.
    ValidationFailed(&'static str),
    /// Generic I/O error from the storage backend.
    IoError,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Corrupted => write!(f, "config corrupted"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

impl core::error::Error for RapiError {}
impl core::error::Error for ConfigError {}
