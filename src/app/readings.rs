//! Live-value queries and their reply parsers.
//!
//! Reads are queued as a batch and issued one per pass whenever the RAPI
//! client is idle; each completion folds its tokens into
//! [`ChargerReadings`].
//!
//! | Query | Reply tokens (after `$OK`)                  |
//! |-------|---------------------------------------------|
//! | `$GV` | firmware version, protocol version          |
//! | `$GE` | pilot amps, flags (hex)                     |
//! | `$GC` | min amps, max amps                          |
//! | `$GF` | GFCI, no-ground, stuck-relay counts (hex)   |
//! | `$GS` | state, elapsed seconds                      |
//! | `$GG` | current mA, voltage mV                      |
//! | `$GP` | temp 1, temp 2, temp 3 (tenths °C)          |
//! | `$GU` | session watt-seconds, lifetime Wh           |

use log::debug;

use crate::fsm::context::{ChargerContext, ChargerReadings};
use crate::rapi::{RapiReply, ResponseTokens};

/// Queries the loop knows how to issue and parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadCommand {
    Version,
    Settings,
    CurrentCapacity,
    FaultCounters,
    Status,
    ChargeCurrentVoltage,
    Temperatures,
    Energy,
}

impl ReadCommand {
    pub fn text(self) -> &'static str {
        match self {
            Self::Version => "$GV",
            Self::Settings => "$GE",
            Self::CurrentCapacity => "$GC",
            Self::FaultCounters => "$GF",
            Self::Status => "$GS",
            Self::ChargeCurrentVoltage => "$GG",
            Self::Temperatures => "$GP",
            Self::Energy => "$GU",
        }
    }
}

/// Everything, read once after the EVSE first becomes ready.
pub const INITIAL_READ: &[ReadCommand] = &[
    ReadCommand::Version,
    ReadCommand::Settings,
    ReadCommand::CurrentCapacity,
    ReadCommand::FaultCounters,
    ReadCommand::Status,
    ReadCommand::ChargeCurrentVoltage,
    ReadCommand::Temperatures,
    ReadCommand::Energy,
];

/// Values that change while charging, refreshed every fast interval.
pub const LIVE_READ: &[ReadCommand] = &[
    ReadCommand::Status,
    ReadCommand::ChargeCurrentVoltage,
    ReadCommand::Temperatures,
    ReadCommand::Energy,
];

/// Which batch a [`ReadQueue`] is working through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadBatch {
    Initial,
    Live,
}

/// FIFO of queries still to issue for the current batch.
#[derive(Debug, Default)]
pub struct ReadQueue {
    queue: heapless::Deque<ReadCommand, 8>,
    batch: Option<ReadBatch>,
}

impl ReadQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace whatever is queued with `batch`.
    pub fn load(&mut self, batch: ReadBatch) {
        let cmds = match batch {
            ReadBatch::Initial => INITIAL_READ,
            ReadBatch::Live => LIVE_READ,
        };
        self.queue.clear();
        for &cmd in cmds {
            let _ = self.queue.push_back(cmd);
        }
        self.batch = Some(batch);
    }

    pub fn next(&mut self) -> Option<ReadCommand> {
        self.queue.pop_front()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn batch(&self) -> Option<ReadBatch> {
        self.batch
    }

    /// Once the queue has drained, end the batch and report which it was.
    pub fn finish(&mut self) -> Option<ReadBatch> {
        if self.queue.is_empty() {
            self.batch.take()
        } else {
            None
        }
    }

    pub fn clear(&mut self) {
        self.queue.clear();
        self.batch = None;
    }
}

/// Completion for a queued read.
pub fn complete(cmd: ReadCommand, ctx: &mut ChargerContext, reply: RapiReply<'_>) {
    if cmd == ReadCommand::Status {
        ctx.apply_status(reply);
    }
    match reply {
        Ok(tokens) => apply(cmd, &mut ctx.readings, tokens),
        Err(e) => debug!("EVSE: {} failed: {}", cmd.text(), e),
    }
}

/// Fold a successful reply into the readings.  Missing or malformed
/// tokens leave the previous value.
pub fn apply(cmd: ReadCommand, r: &mut ChargerReadings, t: &ResponseTokens) {
    match cmd {
        ReadCommand::Version => {
            copy_token(&mut r.firmware, t.get(1));
            copy_token(&mut r.protocol, t.get(2));
        }
        ReadCommand::Settings => {
            set(&mut r.pilot_amps, t.get_i32(1));
            set(&mut r.flags, t.get_hex(2));
        }
        ReadCommand::CurrentCapacity => {
            set(&mut r.min_amps, t.get_i32(1));
            set(&mut r.max_amps, t.get_i32(2));
        }
        ReadCommand::FaultCounters => {
            set(&mut r.gfci_count, t.get_hex(1));
            set(&mut r.no_ground_count, t.get_hex(2));
            set(&mut r.stuck_relay_count, t.get_hex(3));
        }
        ReadCommand::Status => {
            set(&mut r.elapsed_secs, t.get_i32(2).and_then(|v| u32::try_from(v).ok()));
        }
        ReadCommand::ChargeCurrentVoltage => {
            set(&mut r.current_ma, t.get_i32(1));
            set(&mut r.voltage_mv, t.get_i32(2));
        }
        ReadCommand::Temperatures => {
            for (i, slot) in r.temps_dc.iter_mut().enumerate() {
                if let Some(v) = t.get_i32(i + 1) {
                    *slot = (v != ChargerReadings::TEMP_NOT_INSTALLED).then_some(v);
                }
            }
        }
        ReadCommand::Energy => {
            set(&mut r.session_watt_secs, t.get(1).and_then(|s| s.parse().ok()));
            set(&mut r.total_watt_hours, t.get(2).and_then(|s| s.parse().ok()));
        }
    }
}

fn set<T>(field: &mut T, value: Option<T>) {
    if let Some(v) = value {
        *field = v;
    }
}

fn copy_token(field: &mut heapless::String<16>, token: Option<&str>) {
    if let Some(s) = token {
        field.clear();
        for c in s.chars() {
            if field.push(c).is_err() {
                break;
            }
        }
    }
}
