//! Telemetry fan-out through the shipped adapters, wired the way the
//! firmware's `main` wires them.

use std::cell::RefCell;
use std::rc::Rc;

use super::mock_hw::{Call, CallLog, Clock, Recorder, SimEvse};

use evsewifi::adapters::log_sink::{LogBroker, LogCloud, LogDisplay, LogDivert, LogWebSink};
use evsewifi::adapters::nvs::NvsAdapter;
use evsewifi::adapters::ota::OtaUpdater;
use evsewifi::app::control::{ControlLoop, Hook, Ports};
use evsewifi::app::events::ChargerEvent;
use evsewifi::app::ports::{ConfigPort, HalPort, NetworkPort};
use evsewifi::app::telemetry::publish_event;
use evsewifi::config::{FeatureFlags, SystemConfig};
use evsewifi::rapi::MemoryTransport;

struct Firmware {
    lp: ControlLoop<MemoryTransport>,
    clock: Clock,
    network: AlwaysUp,
    ota: Rc<RefCell<OtaUpdater>>,
    display: Rc<RefCell<LogDisplay>>,
    web: Rc<RefCell<LogWebSink>>,
    divert: Rc<RefCell<LogDivert>>,
    broker: LogBroker,
    cloud: LogCloud,
}

struct AlwaysUp;

impl NetworkPort for AlwaysUp {
    fn poll(&mut self) {}

    fn is_connected(&self) -> bool {
        true
    }
}

impl Firmware {
    fn boot(config: SystemConfig) -> Self {
        let clock = Clock::new(0);
        let display = Rc::new(RefCell::new(LogDisplay::new()));
        let web = Rc::new(RefCell::new(LogWebSink::new()));
        let ota = Rc::new(RefCell::new(OtaUpdater::new()));
        let divert = Rc::new(RefCell::new(LogDivert::new()));

        let hooks = vec![
            Hook::service(display.clone()),
            Hook::service(web.clone()),
            Hook::service(ota.clone()),
            Hook::RapiPump,
            Hook::service(divert.clone()),
        ];
        let mut lp = ControlLoop::new(config, MemoryTransport::new(), hooks, 0);
        lp.setup();

        Self {
            lp,
            clock,
            network: AlwaysUp,
            ota,
            display,
            web,
            divert,
            broker: LogBroker::new(),
            cloud: LogCloud::new(),
        }
    }

    fn run_until(&mut self, evse: &mut SimEvse, until_ms: u32) {
        while self.clock.now_ms() < until_ms {
            evse.answer(self.lp.rapi_mut().transport_mut());
            self.clock.advance(100);
            let mut ports = Ports {
                network: &mut self.network,
                ota: &self.ota,
                display: &mut self.display,
                web: &mut self.web,
                broker: &mut self.broker,
                cloud: &mut self.cloud,
                solar: &mut self.divert,
                hal: &self.clock,
            };
            self.lp.run_pass(&mut ports);
        }
    }
}

#[test]
fn shared_adapters_serve_as_hook_and_port() {
    let mut fw = Firmware::boot(SystemConfig {
        features: FeatureFlags {
            cloud_enabled: true,
            broker_enabled: true,
            divert_enabled: true,
        },
        ..SystemConfig::default()
    });
    let mut evse = SimEvse::new(3);
    fw.run_until(&mut evse, 30_000);

    assert_eq!(
        fw.lp.hook_names(),
        vec!["display", "web", "ota", "rapi", "divert"]
    );
    // {"state":3} and {"initial_read":true}.
    assert_eq!(fw.web.borrow().sent(), 2);
    // Both events plus one snapshot.
    assert_eq!(fw.broker.published(), 3);
    assert_eq!(fw.broker.serviced(), 300);
    assert_eq!(fw.cloud.published(), 1);
    assert_eq!(fw.divert.borrow().updates(), 1);
    assert_eq!(fw.display.borrow().line(0), Some("OpenEVSE WiFi"));
}

#[test]
fn running_update_holds_telemetry() {
    let mut fw = Firmware::boot(SystemConfig {
        features: FeatureFlags {
            cloud_enabled: true,
            ..FeatureFlags::default()
        },
        ..SystemConfig::default()
    });
    fw.ota.borrow_mut().begin(1024).unwrap();

    let mut evse = SimEvse::new(3);
    fw.run_until(&mut evse, 30_000);
    assert_eq!(fw.cloud.published(), 0);
    assert_eq!(fw.lp.snapshots_skipped(), 1);

    fw.ota.borrow_mut().abort();
    fw.run_until(&mut evse, 60_000);
    assert_eq!(fw.cloud.published(), 1);
}

#[test]
fn stored_feature_flags_drive_the_fanout() {
    let nvs = NvsAdapter::new().unwrap();
    nvs.save(&SystemConfig {
        features: FeatureFlags {
            broker_enabled: true,
            ..FeatureFlags::default()
        },
        ..SystemConfig::default()
    })
    .unwrap();

    let mut fw = Firmware::boot(nvs.load().unwrap());
    let mut evse = SimEvse::new(1);
    fw.run_until(&mut evse, 30_000);

    assert_eq!(fw.cloud.published(), 0);
    assert_eq!(fw.broker.published(), 3);
}

#[test]
fn events_reach_the_broker_only_when_enabled() {
    let log: CallLog = Rc::default();
    let mut web = Recorder(Rc::clone(&log));
    let mut broker = Recorder(Rc::clone(&log));
    let event = ChargerEvent::WifiMode { wifi_mode: 1 };

    publish_event(&event, &FeatureFlags::default(), &mut web, &mut broker);
    publish_event(
        &event,
        &FeatureFlags {
            broker_enabled: true,
            ..FeatureFlags::default()
        },
        &mut web,
        &mut broker,
    );

    let json = r#"{"wifi_mode":1}"#.to_string();
    assert_eq!(
        *log.borrow(),
        vec![
            Call::WebEvent(json.clone()),
            Call::WebEvent(json.clone()),
            Call::BrokerPublish(json),
        ]
    );
}
