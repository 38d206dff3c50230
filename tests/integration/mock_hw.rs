//! Mock collaborators for integration tests.
//!
//! Every port and hook records into one shared [`CallLog`], so tests can
//! assert on the order of calls across collaborators within a pass.
//! [`SimEvse`] plays the charge controller on the other end of a
//! [`MemoryTransport`].

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use evsewifi::app::control::{ControlLoop, Hook, Ports};
use evsewifi::app::ports::{
    BrokerPort, DisplayPort, EventSink, HalPort, NetworkPort, OtaStatus, Service, SolarPort,
    TelemetrySink,
};
use evsewifi::config::SystemConfig;
use evsewifi::rapi::MemoryTransport;
use evsewifi::rapi::codec::checksum;

// ── Call record ───────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Poll,
    Hook(&'static str),
    Show { line: u8, text: String, hold_ms: u32 },
    WebEvent(String),
    BrokerService,
    BrokerPublish(String),
    CloudPublish(String),
    SolarUpdate,
}

pub type CallLog = Rc<RefCell<Vec<Call>>>;

// ── Clock ─────────────────────────────────────────────────────

pub struct Clock {
    now: Cell<u32>,
    pub free_heap: Cell<u32>,
}

#[allow(dead_code)]
impl Clock {
    pub fn new(start: u32) -> Self {
        Self {
            now: Cell::new(start),
            free_heap: Cell::new(180_000),
        }
    }

    pub fn set(&self, ms: u32) {
        self.now.set(ms);
    }

    pub fn advance(&self, ms: u32) {
        self.now.set(self.now.get().wrapping_add(ms));
    }
}

impl HalPort for Clock {
    fn now_ms(&self) -> u32 {
        self.now.get()
    }

    fn free_heap(&self) -> u32 {
        self.free_heap.get()
    }
}

// ── Hooks ─────────────────────────────────────────────────────

pub struct RecordingHook {
    name: &'static str,
    log: CallLog,
    pub setups: Rc<Cell<u32>>,
}

impl Service for RecordingHook {
    fn name(&self) -> &'static str {
        self.name
    }

    fn setup(&mut self) {
        self.setups.set(self.setups.get() + 1);
    }

    fn service(&mut self) {
        self.log.borrow_mut().push(Call::Hook(self.name));
    }
}

// ── Ports ─────────────────────────────────────────────────────

pub struct MockNetwork {
    log: CallLog,
    pub connected: bool,
}

impl NetworkPort for MockNetwork {
    fn poll(&mut self) {
        self.log.borrow_mut().push(Call::Poll);
    }

    fn is_connected(&self) -> bool {
        self.connected
    }
}

#[derive(Default)]
pub struct MockOta {
    pub in_progress: bool,
}

impl OtaStatus for MockOta {
    fn is_update_in_progress(&self) -> bool {
        self.in_progress
    }
}

pub struct Recorder(pub CallLog);

impl DisplayPort for Recorder {
    fn show(&mut self, line: u8, text: &str, hold_ms: u32) {
        self.0.borrow_mut().push(Call::Show {
            line,
            text: text.to_string(),
            hold_ms,
        });
    }
}

impl EventSink for Recorder {
    fn send_event(&mut self, json: &str) {
        self.0.borrow_mut().push(Call::WebEvent(json.to_string()));
    }
}

impl BrokerPort for Recorder {
    fn service(&mut self) {
        self.0.borrow_mut().push(Call::BrokerService);
    }

    fn publish(&mut self, json: &str) {
        self.0.borrow_mut().push(Call::BrokerPublish(json.to_string()));
    }
}

impl TelemetrySink for Recorder {
    fn publish(&mut self, json: &str) {
        self.0.borrow_mut().push(Call::CloudPublish(json.to_string()));
    }
}

impl SolarPort for Recorder {
    fn update(&mut self) {
        self.0.borrow_mut().push(Call::SolarUpdate);
    }
}

// ── Rig ───────────────────────────────────────────────────────

/// All mocks for one control loop, sharing a call log.
pub struct Rig {
    pub log: CallLog,
    pub clock: Clock,
    pub network: MockNetwork,
    pub ota: MockOta,
    display: Recorder,
    web: Recorder,
    broker: Recorder,
    cloud: Recorder,
    solar: Recorder,
}

#[allow(dead_code)]
impl Rig {
    pub fn new() -> Self {
        let log: CallLog = Rc::default();
        Self {
            clock: Clock::new(0),
            network: MockNetwork {
                log: log.clone(),
                connected: false,
            },
            ota: MockOta::default(),
            display: Recorder(log.clone()),
            web: Recorder(log.clone()),
            broker: Recorder(log.clone()),
            cloud: Recorder(log.clone()),
            solar: Recorder(log.clone()),
            log,
        }
    }

    pub fn hook(&self, name: &'static str) -> Hook {
        Hook::service(self.recording_hook(name))
    }

    pub fn recording_hook(&self, name: &'static str) -> RecordingHook {
        RecordingHook {
            name,
            log: self.log.clone(),
            setups: Rc::default(),
        }
    }

    /// A loop over a fresh memory transport, its timers started at the
    /// rig's current time.
    pub fn control_loop(&self, config: SystemConfig, hooks: Vec<Hook>) -> ControlLoop<MemoryTransport> {
        ControlLoop::new(config, MemoryTransport::new(), hooks, self.clock.now_ms())
    }

    pub fn pass(&mut self, lp: &mut ControlLoop<MemoryTransport>) {
        let mut ports = Ports {
            network: &mut self.network,
            ota: &self.ota,
            display: &mut self.display,
            web: &mut self.web,
            broker: &mut self.broker,
            cloud: &mut self.cloud,
            solar: &mut self.solar,
            hal: &self.clock,
        };
        lp.run_pass(&mut ports);
    }

    /// Let `evse` answer, advance the clock by `step_ms` and run one pass,
    /// until the clock reaches `until_ms`.
    pub fn run_until(
        &mut self,
        lp: &mut ControlLoop<MemoryTransport>,
        evse: &mut SimEvse,
        until_ms: u32,
        step_ms: u32,
    ) {
        while self.clock.now_ms() < until_ms {
            evse.answer(lp.rapi_mut().transport_mut());
            self.clock.advance(step_ms);
            self.pass(lp);
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.log.borrow().clone()
    }

    pub fn clear(&self) {
        self.log.borrow_mut().clear();
    }

    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.log.borrow().iter().filter(|c| pred(c)).count()
    }

    pub fn web_events(&self) -> Vec<String> {
        self.log
            .borrow()
            .iter()
            .filter_map(|c| match c {
                Call::WebEvent(s) => Some(s.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn broker_messages(&self) -> Vec<String> {
        self.log
            .borrow()
            .iter()
            .filter_map(|c| match c {
                Call::BrokerPublish(s) => Some(s.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn cloud_messages(&self) -> Vec<String> {
        self.log
            .borrow()
            .iter()
            .filter_map(|c| match c {
                Call::CloudPublish(s) => Some(s.clone()),
                _ => None,
            })
            .collect()
    }
}

// ── Simulated charge controller ───────────────────────────────

/// Frame `body` with a checksum and terminator.
pub fn frame(body: &str) -> Vec<u8> {
    format!("{}^{:02X}\r", body, checksum(body.as_bytes())).into_bytes()
}

/// Answers every command written to the transport, echoing its sequence id.
pub struct SimEvse {
    /// Status code returned by `$GS`.
    pub state: i32,
    pub elapsed: u32,
    /// Reply to `$GS` with too few tokens.
    pub short_status: bool,
    /// Read commands but never reply.
    pub silent: bool,
    /// Every command seen, without sequence id or checksum.
    pub seen: Vec<String>,
}

#[allow(dead_code)]
impl SimEvse {
    pub fn new(state: i32) -> Self {
        Self {
            state,
            elapsed: 0,
            short_status: false,
            silent: false,
            seen: Vec::new(),
        }
    }

    pub fn silent() -> Self {
        Self {
            silent: true,
            ..Self::new(0)
        }
    }

    pub fn count(&self, cmd: &str) -> usize {
        self.seen.iter().filter(|c| c.as_str() == cmd).count()
    }

    /// Consume written commands and queue one reply for each.
    pub fn answer(&mut self, transport: &mut MemoryTransport) {
        let written = transport.take_written();
        for line in written.split('\r').filter(|l| !l.is_empty()) {
            let body = line.split('^').next().unwrap_or(line);
            let (cmd, seq) = body.rsplit_once(" :").unwrap_or((body, ""));
            self.seen.push(cmd.to_string());
            if self.silent {
                continue;
            }
            let payload = self.reply_for(cmd);
            let reply = if seq.is_empty() {
                payload
            } else {
                format!("{} :{}", payload, seq)
            };
            transport.inject(&frame(&reply));
        }
    }

    fn reply_for(&self, cmd: &str) -> String {
        match cmd {
            "$GS" if self.short_status => format!("$OK {}", self.state),
            "$GS" => format!("$OK {} {}", self.state, self.elapsed),
            "$GV" => "$OK 7.1.3 5.0.1".to_string(),
            "$GE" => "$OK 32 0200".to_string(),
            "$GC" => "$OK 6 32".to_string(),
            "$GF" => "$OK 0 0 0".to_string(),
            "$GG" => "$OK 16000 240000".to_string(),
            "$GP" => "$OK 215 -2560 300".to_string(),
            "$GU" => "$OK 3600 12".to_string(),
            _ => "$NK".to_string(),
        }
    }
}
