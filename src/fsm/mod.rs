//! Charger readiness state machine.
//!
//! Tracks the coarse state of the attached EVSE as reported by `$GS`
//! replies.  The control loop reads the current [`Regime`] every pass to
//! decide between the readiness probe and the live-read cycles.
//!
//! ```text
//!              ┌──────────────── $GS → 0 ───────────────┐
//!              ▼                                        │
//!   ┌──────────────┐  $GS → ready code   ┌─────────────────────┐
//!   │   Starting   │ ──────────────────▶ │ Ready(EvseStatus)   │
//!   └──────────────┘                     └─────────────────────┘
//!        │   ▲                                 ▲
//!  error │   │ $GS → 0                         │ $GS → ready code
//!        ▼   │                                 │
//!   ┌──────────────┐ ──────────────────────────┘
//!   │   Invalid    │
//!   └──────────────┘
//! ```
//!
//! There is no terminal state; the probe retries forever.

pub mod context;

use core::fmt;

use log::{info, warn};

use crate::rapi::RapiReply;

// ---------------------------------------------------------------------------
// EVSE status codes
// ---------------------------------------------------------------------------

/// Status codes reported by a responsive EVSE.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum EvseStatus {
    NotConnected = 1,
    Connected = 2,
    Charging = 3,
    VentRequired = 4,
    DiodeCheckFailed = 5,
    GfiFault = 6,
    NoEarthGround = 7,
    StuckRelay = 8,
    GfiSelfTestFailed = 9,
    OverTemperature = 10,
    OverCurrent = 11,
    Sleeping = 254,
    Disabled = 255,
}

impl EvseStatus {
    /// Map a raw code to a status.  `None` for anything unrecognised.
    pub fn from_code(code: i32) -> Option<Self> {
        Some(match code {
            1 => Self::NotConnected,
            2 => Self::Connected,
            3 => Self::Charging,
            4 => Self::VentRequired,
            5 => Self::DiodeCheckFailed,
            6 => Self::GfiFault,
            7 => Self::NoEarthGround,
            8 => Self::StuckRelay,
            9 => Self::GfiSelfTestFailed,
            10 => Self::OverTemperature,
            11 => Self::OverCurrent,
            254 => Self::Sleeping,
            255 => Self::Disabled,
            _ => return None,
        })
    }

    pub fn code(self) -> u8 {
        self as u8
    }

    /// Whether the EVSE reports an error condition.
    pub fn is_fault(self) -> bool {
        (4..=11).contains(&self.code())
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::NotConnected => "not connected",
            Self::Connected => "connected",
            Self::Charging => "charging",
            Self::VentRequired => "vent required",
            Self::DiodeCheckFailed => "diode check failed",
            Self::GfiFault => "GFCI fault",
            Self::NoEarthGround => "no earth ground",
            Self::StuckRelay => "stuck relay",
            Self::GfiSelfTestFailed => "GFCI self-test failed",
            Self::OverTemperature => "over temperature",
            Self::OverCurrent => "over current",
            Self::Sleeping => "sleeping",
            Self::Disabled => "disabled",
        }
    }
}

// ---------------------------------------------------------------------------
// Charger state
// ---------------------------------------------------------------------------

/// Which half of the control loop runs this pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Regime {
    /// EVSE starting or unresponsive: probe with `$GS`.
    PreReady,
    /// EVSE answered with a usable status: read live values.
    Ready,
}

/// Coarse EVSE state as last reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChargerState {
    /// Booting, or not heard from yet.
    #[default]
    Starting,
    /// Last probe failed or returned an unknown code.
    Invalid,
    Ready(EvseStatus),
}

impl ChargerState {
    /// Raw code reported by `$GS`, `0` for starting.
    pub const STARTING_CODE: i32 = 0;
    /// Code used for `Invalid` in telemetry.
    pub const INVALID_CODE: i32 = -1;

    /// Interpret a raw `$GS` state code.
    pub fn from_code(code: i32) -> Self {
        if code == Self::STARTING_CODE {
            return Self::Starting;
        }
        EvseStatus::from_code(code).map_or(Self::Invalid, Self::Ready)
    }

    pub fn code(self) -> i32 {
        match self {
            Self::Starting => Self::STARTING_CODE,
            Self::Invalid => Self::INVALID_CODE,
            Self::Ready(s) => i32::from(s.code()),
        }
    }

    pub fn regime(self) -> Regime {
        match self {
            Self::Starting | Self::Invalid => Regime::PreReady,
            Self::Ready(_) => Regime::Ready,
        }
    }

    pub fn is_ready(self) -> bool {
        self.regime() == Regime::Ready
    }
}

impl fmt::Display for ChargerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Starting => write!(f, "starting"),
            Self::Invalid => write!(f, "invalid"),
            Self::Ready(s) => write!(f, "{} ({})", s.name(), s.code()),
        }
    }
}

// ---------------------------------------------------------------------------
// Readiness machine
// ---------------------------------------------------------------------------

/// Minimum tokens in a usable `$GS` reply: `$OK state elapsed`.
pub const STATUS_MIN_TOKENS: usize = 3;

/// A state change produced by a status reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: ChargerState,
    pub to: ChargerState,
}

/// Owns the [`ChargerState`] and the one-shot initial-read flag.
#[derive(Debug, Default)]
pub struct ReadinessMachine {
    state: ChargerState,
    initial_read_done: bool,
    transitions: u32,
}

impl ReadinessMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> ChargerState {
        self.state
    }

    pub fn regime(&self) -> Regime {
        self.state.regime()
    }

    pub fn is_ready(&self) -> bool {
        self.state.is_ready()
    }

    pub fn initial_read_done(&self) -> bool {
        self.initial_read_done
    }

    /// Number of state changes since boot.
    pub fn transitions(&self) -> u32 {
        self.transitions
    }

    /// Fold one `$GS` outcome into the state.
    ///
    /// A usable reply always sets the state from its code.  A failed reply
    /// forces `Invalid` while pre-ready and is ignored once ready.
    pub fn apply_status_reply(&mut self, reply: RapiReply<'_>) -> Option<Transition> {
        let code = match reply {
            Ok(tokens) if tokens.len() >= STATUS_MIN_TOKENS => tokens.get_i32(1),
            Ok(tokens) => {
                warn!("EVSE: status reply has {} tokens", tokens.len());
                None
            }
            Err(e) => {
                info!("EVSE: not responding or not connected ({})", e);
                None
            }
        };

        let next = match code {
            Some(code) => ChargerState::from_code(code),
            None if self.is_ready() => {
                warn!("EVSE: status read failed, keeping {}", self.state);
                return None;
            }
            None => ChargerState::Invalid,
        };
        self.set_state(next)
    }

    /// `true` exactly once: the first time this is called while ready.
    pub fn take_initial_read(&mut self) -> bool {
        if self.initial_read_done || !self.is_ready() {
            return false;
        }
        self.initial_read_done = true;
        true
    }

    fn set_state(&mut self, next: ChargerState) -> Option<Transition> {
        if next == self.state {
            return None;
        }
        let t = Transition {
            from: self.state,
            to: next,
        };
        info!("EVSE: {} -> {}", t.from, t.to);
        self.state = next;
        self.transitions = self.transitions.wrapping_add(1);
        Some(t)
    }
}
