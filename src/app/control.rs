//! Cooperative control loop.
//!
//! One call to [`ControlLoop::run_pass`] is one iteration of the firmware's
//! main loop.  Nothing in it blocks; every obligation is gated by a
//! [`PeriodicTimer`].
//!
//! ```text
//!   run_pass
//!    ├─ network.poll()
//!    ├─ hooks, in registration order (RAPI pump is one of them)
//!    ├─ drain charger events → publish_event
//!    ├─ pre-ready: $GS probe every status interval
//!    │  ready:     initial full read once, live reads every fast interval
//!    ├─ issue next queued read if the RAPI client is idle
//!    └─ connected:
//!        ├─ broker.service()               (if enabled)
//!        └─ every slow interval, unless OTA is running:
//!            ├─ publish_snapshot
//!            └─ solar.update()             (if enabled)
//! ```

use log::{debug, info, warn};

use super::events::{self, ChargerEvent};
use super::ports::{
    BrokerPort, DisplayPort, EventSink, HalPort, NetworkPort, OtaStatus, Service, SolarPort,
    TelemetrySink,
};
use super::readings::{self, ReadBatch, ReadCommand, ReadQueue};
use super::telemetry::{self, TelemetrySnapshot};
use crate::config::SystemConfig;
use crate::diagnostics::{HeapMonitor, LoopProfiler};
use crate::fsm::context::{ChargerContext, ChargerReadings};
use crate::fsm::{ChargerState, Regime};
use crate::rapi::{PumpOutcome, RapiClient, Transport};
use crate::timer::PeriodicTimer;

/// Banner shown when the EVSE first becomes ready.
pub const BANNER: &str = "OpenEVSE WiFi";
/// How long the version line stays on the display (ms).
pub const BANNER_HOLD_MS: u32 = 5_000;

/// One entry in the per-pass hook list.
pub enum Hook {
    /// A collaborator's housekeeping.
    Service(Box<dyn Service>),
    /// Position of the RAPI client's pump.
    RapiPump,
}

impl Hook {
    pub fn service(s: impl Service + 'static) -> Self {
        Self::Service(Box::new(s))
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Service(s) => s.name(),
            Self::RapiPump => "rapi",
        }
    }
}

/// The collaborators the loop queries or publishes to on each pass.
pub struct Ports<'a> {
    pub network: &'a mut dyn NetworkPort,
    pub ota: &'a dyn OtaStatus,
    pub display: &'a mut dyn DisplayPort,
    pub web: &'a mut dyn EventSink,
    pub broker: &'a mut dyn BrokerPort,
    pub cloud: &'a mut dyn TelemetrySink,
    pub solar: &'a mut dyn SolarPort,
    pub hal: &'a dyn HalPort,
}

/// The firmware's main loop state.
pub struct ControlLoop<T: Transport> {
    config: SystemConfig,
    rapi: RapiClient<T, ChargerContext>,
    ctx: ChargerContext,
    hooks: Vec<Hook>,
    reads: ReadQueue,

    status_timer: PeriodicTimer,
    fast_timer: PeriodicTimer,
    slow_timer: PeriodicTimer,

    profiler: LoopProfiler,
    heap: HeapMonitor,
    last_pump: PumpOutcome,
    snapshots_published: u32,
    snapshots_skipped: u32,
}

impl<T: Transport> ControlLoop<T> {
    /// Build the loop.  `now` starts every timer's first period.
    ///
    /// If `hooks` has no [`Hook::RapiPump`] entry one is appended.
    pub fn new(config: SystemConfig, transport: T, mut hooks: Vec<Hook>, now: u32) -> Self {
        if !hooks.iter().any(|h| matches!(h, Hook::RapiPump)) {
            hooks.push(Hook::RapiPump);
        }

        let mut rapi = RapiClient::new(transport, config.sequence_id_seed);
        rapi.set_on_event(events::on_rapi_event);

        Self {
            status_timer: PeriodicTimer::new(config.status_poll_interval_ms, now),
            fast_timer: PeriodicTimer::new(config.fast_interval_ms, now),
            slow_timer: PeriodicTimer::new(config.slow_interval_ms, now),
            profiler: LoopProfiler::new(config.loop_budget_ms),
            heap: HeapMonitor::default(),
            config,
            rapi,
            ctx: ChargerContext::new(),
            hooks,
            reads: ReadQueue::new(),
            last_pump: PumpOutcome::Idle,
            snapshots_published: 0,
            snapshots_skipped: 0,
        }
    }

    /// Run every service hook's `setup`, in order.
    pub fn setup(&mut self) {
        for hook in &mut self.hooks {
            if let Hook::Service(s) = hook {
                info!("Loop: setting up {}", s.name());
                s.setup();
            }
        }
        let order: Vec<&str> = self.hooks.iter().map(Hook::name).collect();
        info!("Loop: hook order {:?}", order);
    }

    /// One iteration of the main loop.  Never fails; every error is
    /// logged and retried on a later pass.
    pub fn run_pass(&mut self, ports: &mut Ports<'_>) {
        let start = ports.hal.now_ms();

        ports.network.poll();
        self.run_hooks();
        self.drain_events(ports);

        let now = ports.hal.now_ms();
        match self.ctx.machine.regime() {
            Regime::PreReady => self.probe_readiness(now),
            Regime::Ready => self.service_ready(now, ports),
        }
        self.issue_queued_read();

        if ports.network.is_connected() {
            self.service_connected(now, ports);
        }

        let end = ports.hal.now_ms();
        self.profiler.record(start, end);
    }

    // ── Accessors ─────────────────────────────────────────────

    pub fn state(&self) -> ChargerState {
        self.ctx.machine.state()
    }

    pub fn readings(&self) -> &ChargerReadings {
        &self.ctx.readings
    }

    pub fn context(&self) -> &ChargerContext {
        &self.ctx
    }

    pub fn config(&self) -> &SystemConfig {
        &self.config
    }

    pub fn rapi(&self) -> &RapiClient<T, ChargerContext> {
        &self.rapi
    }

    pub fn rapi_mut(&mut self) -> &mut RapiClient<T, ChargerContext> {
        &mut self.rapi
    }

    pub fn hook_names(&self) -> Vec<&'static str> {
        self.hooks.iter().map(Hook::name).collect()
    }

    pub fn pending_reads(&self) -> usize {
        self.reads.len()
    }

    pub fn profiler(&self) -> &LoopProfiler {
        &self.profiler
    }

    pub fn heap(&self) -> &HeapMonitor {
        &self.heap
    }

    pub fn last_pump(&self) -> PumpOutcome {
        self.last_pump
    }

    pub fn snapshots_published(&self) -> u32 {
        self.snapshots_published
    }

    /// Slow cycles skipped because a firmware update was running.
    pub fn snapshots_skipped(&self) -> u32 {
        self.snapshots_skipped
    }

    // ── Pass steps ────────────────────────────────────────────

    fn run_hooks(&mut self) {
        for hook in &mut self.hooks {
            match hook {
                Hook::Service(s) => s.service(),
                Hook::RapiPump => self.last_pump = self.rapi.pump(&mut self.ctx),
            }
        }
    }

    fn drain_events(&mut self, ports: &mut Ports<'_>) {
        while let Some(event) = self.ctx.take_event() {
            telemetry::publish_event(&event, &self.config.features, ports.web, ports.broker);
        }
    }

    fn probe_readiness(&mut self, now: u32) {
        match self.reads.batch() {
            Some(ReadBatch::Initial) => {
                info!(
                    "EVSE: not ready, initial read abandoned with {} queries left",
                    self.reads.len()
                );
                self.reads.clear();
            }
            Some(ReadBatch::Live) => {
                debug!("EVSE: not ready, dropping {} queued reads", self.reads.len());
                self.reads.clear();
            }
            None => {}
        }
        if !self.status_timer.check(now) {
            return;
        }

        let sent = self
            .rapi
            .supersede_command(ReadCommand::Status.text(), |ctx: &mut ChargerContext, reply| {
                ctx.apply_status(reply);
            });
        if let Err(e) = sent {
            warn!("EVSE: status query not sent: {}", e);
            self.ctx.apply_status(Err(e));
        }
    }

    fn service_ready(&mut self, now: u32, ports: &mut Ports<'_>) {
        if self.ctx.machine.take_initial_read() {
            ports.display.show(0, BANNER, 0);
            ports
                .display
                .show(1, env!("CARGO_PKG_VERSION"), BANNER_HOLD_MS);
            info!("EVSE: first read of RAPI values");
            self.reads.load(ReadBatch::Initial);
        }

        if self.fast_timer.check(now) {
            self.heap.sample(ports.hal.free_heap());
            if self.rapi.is_pending() {
                warn!(
                    "EVSE: '{}' unanswered at start of read cycle",
                    self.rapi.pending_command().unwrap_or("")
                );
            }
            if self.reads.is_empty() {
                self.reads.load(ReadBatch::Live);
            }
            if self.rapi.is_pending() {
                self.issue_next_read(true);
            }
        }
    }

    fn issue_queued_read(&mut self) {
        if self.rapi.is_pending() {
            return;
        }
        if self.reads.is_empty() {
            if self.reads.finish() == Some(ReadBatch::Initial) {
                self.ctx.push_event(ChargerEvent::InitialRead { initial_read: true });
            }
            return;
        }
        self.issue_next_read(false);
    }

    fn issue_next_read(&mut self, supersede: bool) {
        let Some(cmd) = self.reads.next() else {
            return;
        };
        let sent = if supersede {
            self.rapi
                .supersede_command(cmd.text(), move |ctx, reply| readings::complete(cmd, ctx, reply))
        } else {
            self.rapi
                .send_command(cmd.text(), move |ctx, reply| readings::complete(cmd, ctx, reply))
        };

        if let Err(e) = sent {
            warn!("EVSE: {} not sent: {}", cmd.text(), e);
            readings::complete(cmd, &mut self.ctx, Err(e));
        }
    }

    fn service_connected(&mut self, now: u32, ports: &mut Ports<'_>) {
        let features = self.config.features;
        if features.broker_enabled {
            ports.broker.service();
        }

        if !self.slow_timer.check(now) {
            return;
        }
        if !self.ctx.machine.is_ready() {
            debug!("Telemetry: charger {}, publish skipped", self.state());
            return;
        }
        if ports.ota.is_update_in_progress() {
            info!("Telemetry: firmware update running, publish skipped");
            self.snapshots_skipped = self.snapshots_skipped.wrapping_add(1);
            return;
        }

        let snapshot =
            TelemetrySnapshot::capture(self.state(), &self.ctx.readings, ports.hal.free_heap());
        telemetry::publish_snapshot(&snapshot, &features, ports.cloud, ports.broker);
        self.snapshots_published = self.snapshots_published.wrapping_add(1);

        if features.divert_enabled {
            ports.solar.update();
        }
    }
}
