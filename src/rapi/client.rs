//! Correlated RAPI request/response client.
//!
//! Strictly half-duplex: at most one command is in flight.  Each command is
//! stamped with a fresh sequence id; the reply echoing that id completes
//! the command, anything else is routed to the unsolicited-event handler.
//!
//! ```text
//!   send_command ──▶ [ pending: Option<PendingCommand> ] ──▶ transport
//!                                 │
//!   pump ◀── transport ◀──────────┘
//!     │
//!     ├── seq == pending.seq ──▶ Matched   → on_complete(ctx, result)
//!     └── otherwise          ──▶ Unmatched → on_event(ctx, tokens)
//! ```
//!
//! The client has no clock.  A command the EVSE never answers stays pending
//! until the caller supersedes it.

use log::{debug, warn};

use super::codec::{
    self, LINE_CAP, LineAssembler, LineEvent, ParsedLine, ResponseTokens, SEQ_NONE, SEQ_RESERVED,
};
use super::transport::Transport;
use crate::error::RapiError;

/// Outcome delivered to a completion callback.
pub type RapiReply<'a> = Result<&'a ResponseTokens, RapiError>;

type Completion<C> = Box<dyn FnOnce(&mut C, RapiReply<'_>)>;
type EventHandler<C> = Box<dyn FnMut(&mut C, &ResponseTokens)>;

/// Upper bound on bytes consumed by a single [`RapiClient::pump`] call.
const MAX_BYTES_PER_PUMP: usize = LINE_CAP * 2;

/// The single in-flight command.
pub struct PendingCommand<C> {
    command: heapless::String<LINE_CAP>,
    seq: u8,
    on_complete: Completion<C>,
}

impl<C> PendingCommand<C> {
    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn seq(&self) -> u8 {
        self.seq
    }
}

/// How an incoming line relates to the pending command.
enum Dispatch<C> {
    Matched(PendingCommand<C>, ParsedLine),
    Unmatched(ParsedLine),
}

/// What one [`RapiClient::pump`] call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PumpOutcome {
    /// No complete line was available.
    Idle,
    /// The pending command's callback ran.
    Completed { seq: u8 },
    /// The unsolicited-event handler ran.
    Event,
    /// A line arrived but nobody wanted it.
    Discarded,
    /// A line could not be decoded.
    Rejected(RapiError),
}

/// RAPI client over any byte [`Transport`].
///
/// `C` is the context handed to callbacks, so completion handlers can
/// update state the caller owns without shared ownership.
pub struct RapiClient<T: Transport, C> {
    transport: T,
    assembler: LineAssembler,
    pending: Option<PendingCommand<C>>,
    last_seq: u8,
    on_event: Option<EventHandler<C>>,
}

impl<T: Transport, C> RapiClient<T, C> {
    /// Create a client.  The first command uses `seq_seed + 1`.
    pub fn new(transport: T, seq_seed: u8) -> Self {
        Self {
            transport,
            assembler: LineAssembler::new(),
            pending: None,
            last_seq: seq_seed,
            on_event: None,
        }
    }

    /// Register the handler for unsolicited lines.
    pub fn set_on_event<F>(&mut self, handler: F)
    where
        F: FnMut(&mut C, &ResponseTokens) + 'static,
    {
        self.on_event = Some(Box::new(handler));
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn pending_seq(&self) -> Option<u8> {
        self.pending.as_ref().map(PendingCommand::seq)
    }

    pub fn pending_command(&self) -> Option<&str> {
        self.pending.as_ref().map(PendingCommand::command)
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Send `text` unless a command is already pending.
    ///
    /// Returns the sequence id stamped on the command.
    pub fn send_command<F>(&mut self, text: &str, on_complete: F) -> Result<u8, RapiError>
    where
        F: FnOnce(&mut C, RapiReply<'_>) + 'static,
    {
        if let Some(p) = &self.pending {
            debug!("RAPI: '{}' refused, '{}' still pending", text, p.command);
            return Err(RapiError::Busy);
        }
        self.transmit(text, Box::new(on_complete))
    }

    /// Send `text`, replacing any pending command.
    ///
    /// The superseded command's callback is dropped without running; a late
    /// reply to it no longer matches and is treated as unsolicited.
    pub fn supersede_command<F>(&mut self, text: &str, on_complete: F) -> Result<u8, RapiError>
    where
        F: FnOnce(&mut C, RapiReply<'_>) + 'static,
    {
        if let Some(old) = self.pending.take() {
            warn!(
                "RAPI: '{}' (seq {:02X}) unanswered, superseded by '{}'",
                old.command, old.seq, text
            );
        }
        self.transmit(text, Box::new(on_complete))
    }

    /// Service the transport: assemble at most one line and dispatch it.
    ///
    /// Runs at most one callback.  Never blocks.
    pub fn pump(&mut self, ctx: &mut C) -> PumpOutcome {
        let mut byte = [0u8; 1];
        for _ in 0..MAX_BYTES_PER_PUMP {
            match self.transport.read(&mut byte) {
                Ok(1) => {}
                Ok(_) => return PumpOutcome::Idle,
                Err(e) => {
                    warn!("RAPI: transport read error {:?}", e);
                    return PumpOutcome::Idle;
                }
            }

            match self.assembler.push(byte[0]) {
                None => {}
                Some(LineEvent::Overflow) => {
                    warn!("RAPI: reply exceeded {} bytes, dropped", LINE_CAP);
                    return PumpOutcome::Rejected(RapiError::BufferOverflow);
                }
                Some(LineEvent::Line(line)) => return self.handle_line(&line, ctx),
            }
        }
        PumpOutcome::Idle
    }

    // ── Internal ──────────────────────────────────────────────

    fn next_seq(&mut self) -> u8 {
        loop {
            self.last_seq = self.last_seq.wrapping_add(1);
            if self.last_seq != SEQ_NONE && self.last_seq != SEQ_RESERVED {
                return self.last_seq;
            }
        }
    }

    fn transmit(&mut self, text: &str, on_complete: Completion<C>) -> Result<u8, RapiError> {
        let seq = self.next_seq();
        let line = codec::encode_command(text, seq)?;

        match self.transport.write(line.as_bytes()) {
            Ok(n) if n == line.len() => {}
            Ok(n) => {
                warn!("RAPI: short write ({} of {} bytes)", n, line.len());
                return Err(RapiError::Transport);
            }
            Err(e) => {
                warn!("RAPI: write failed {:?}", e);
                return Err(RapiError::Transport);
            }
        }
        if let Err(e) = self.transport.flush() {
            warn!("RAPI: flush failed {:?}", e);
        }

        debug!("RAPI: > {}", line.trim_end());
        let mut command = heapless::String::new();
        let _ = command.push_str(text.trim());
        self.pending = Some(PendingCommand {
            command,
            seq,
            on_complete,
        });
        Ok(seq)
    }

    fn classify(&mut self, parsed: ParsedLine) -> Dispatch<C> {
        let matches = parsed.seq.is_some() && parsed.seq == self.pending_seq();
        match self.pending.take() {
            Some(cmd) if matches => Dispatch::Matched(cmd, parsed),
            other => {
                self.pending = other;
                Dispatch::Unmatched(parsed)
            }
        }
    }

    fn handle_line(&mut self, line: &str, ctx: &mut C) -> PumpOutcome {
        debug!("RAPI: < {}", line);
        let parsed = match codec::parse_line(line) {
            Ok(p) => p,
            Err(e) => {
                debug!("RAPI: undecodable line '{}' ({})", line, e);
                return PumpOutcome::Rejected(e);
            }
        };

        match self.classify(parsed) {
            Dispatch::Matched(cmd, parsed) => {
                let result = if !parsed.checksum_ok {
                    Err(RapiError::BadChecksum)
                } else {
                    match parsed.tokens.head() {
                        Some("$OK") => Ok(&parsed.tokens),
                        Some("$NK") => Err(RapiError::Nk),
                        _ => Err(RapiError::InvalidResponse),
                    }
                };
                if let Err(e) = result {
                    debug!("RAPI: '{}' failed: {}", cmd.command, e);
                }
                (cmd.on_complete)(ctx, result);
                PumpOutcome::Completed { seq: cmd.seq }
            }
            Dispatch::Unmatched(parsed) => {
                if !parsed.checksum_ok {
                    warn!("RAPI: unsolicited line with bad checksum dropped");
                    return PumpOutcome::Discarded;
                }
                if let Some(seq) = parsed.seq {
                    debug!(
                        "RAPI: stray reply seq {:02X} (pending {:?})",
                        seq,
                        self.pending_seq()
                    );
                }
                match self.on_event.as_mut() {
                    Some(handler) => {
                        handler(ctx, &parsed.tokens);
                        PumpOutcome::Event
                    }
                    None => PumpOutcome::Discarded,
                }
            }
        }
    }
}
