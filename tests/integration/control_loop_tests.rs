//! Control loop against a simulated charge controller.

use super::mock_hw::{Call, Rig, SimEvse, frame};

use evsewifi::app::control::{BANNER, BANNER_HOLD_MS, Hook};
use evsewifi::config::{FeatureFlags, SystemConfig};
use evsewifi::fsm::{ChargerState, EvseStatus};

fn config_with(features: FeatureFlags) -> SystemConfig {
    SystemConfig {
        features,
        ..SystemConfig::default()
    }
}

// ── Pass structure ────────────────────────────────────────────

#[test]
fn network_polls_first_then_hooks_in_registration_order() {
    let mut rig = Rig::new();
    let hooks = vec![
        rig.hook("display"),
        rig.hook("web"),
        rig.hook("net"),
        rig.hook("ota"),
        Hook::RapiPump,
        rig.hook("divert"),
    ];
    let mut lp = rig.control_loop(SystemConfig::default(), hooks);
    assert_eq!(
        lp.hook_names(),
        vec!["display", "web", "net", "ota", "rapi", "divert"]
    );

    rig.pass(&mut lp);
    assert_eq!(
        rig.calls(),
        vec![
            Call::Poll,
            Call::Hook("display"),
            Call::Hook("web"),
            Call::Hook("net"),
            Call::Hook("ota"),
            Call::Hook("divert"),
        ]
    );
}

#[test]
fn setup_runs_once_per_hook() {
    let rig = Rig::new();
    let a = rig.recording_hook("a");
    let b = rig.recording_hook("b");
    let (a_setups, b_setups) = (a.setups.clone(), b.setups.clone());

    let mut lp = rig.control_loop(
        SystemConfig::default(),
        vec![Hook::service(a), Hook::service(b)],
    );
    lp.setup();

    assert_eq!((a_setups.get(), b_setups.get()), (1, 1));
    assert_eq!(lp.hook_names(), vec!["a", "b", "rapi"]);
}

#[test]
fn every_pass_is_profiled() {
    let mut rig = Rig::new();
    let mut lp = rig.control_loop(SystemConfig::default(), vec![]);
    let mut evse = SimEvse::silent();
    rig.run_until(&mut lp, &mut evse, 1_000, 100);
    assert_eq!(lp.profiler().passes(), 10);
    assert_eq!(lp.profiler().overruns(), 0);
}

// ── Readiness ─────────────────────────────────────────────────

#[test]
fn silent_evse_is_probed_every_second() {
    let mut rig = Rig::new();
    let mut lp = rig.control_loop(SystemConfig::default(), vec![]);
    let mut evse = SimEvse::silent();

    rig.run_until(&mut lp, &mut evse, 3_500, 100);

    assert_eq!(evse.count("$GS"), 3);
    assert_eq!(evse.seen.len(), 3);
    assert_eq!(lp.state(), ChargerState::Starting);
    // Each probe superseded the last.
    assert_eq!(lp.rapi().pending_seq(), Some(3));
    assert!(rig.web_events().is_empty());
}

#[test]
fn short_status_reply_forces_invalid() {
    let mut rig = Rig::new();
    let mut lp = rig.control_loop(SystemConfig::default(), vec![]);
    let mut evse = SimEvse::new(3);
    evse.short_status = true;

    rig.run_until(&mut lp, &mut evse, 3_500, 100);

    assert_eq!(lp.state(), ChargerState::Invalid);
    assert_eq!(evse.count("$GS"), 3);
    // One transition, one event.
    assert_eq!(rig.web_events(), vec![r#"{"state":-1}"#.to_string()]);
}

#[test]
fn nk_status_reply_forces_invalid() {
    let mut rig = Rig::new();
    let mut lp = rig.control_loop(SystemConfig::default(), vec![]);

    rig.clock.set(1_000);
    rig.pass(&mut lp);
    lp.rapi_mut().transport_mut().take_written();
    lp.rapi_mut().transport_mut().inject(&frame("$NK :01"));
    rig.clock.set(1_100);
    rig.pass(&mut lp);

    assert_eq!(lp.state(), ChargerState::Invalid);
}

#[test]
fn ready_reply_shows_banner_and_reads_everything_once() {
    let mut rig = Rig::new();
    let mut lp = rig.control_loop(SystemConfig::default(), vec![]);
    let mut evse = SimEvse::new(3);

    rig.run_until(&mut lp, &mut evse, 2_500, 100);

    assert_eq!(lp.state(), ChargerState::Ready(EvseStatus::Charging));
    assert!(lp.context().machine.initial_read_done());
    assert_eq!(
        rig.web_events(),
        vec![
            r#"{"state":3}"#.to_string(),
            r#"{"initial_read":true}"#.to_string(),
        ]
    );

    let shows: Vec<Call> = rig
        .calls()
        .into_iter()
        .filter(|c| matches!(c, Call::Show { .. }))
        .collect();
    assert_eq!(
        shows,
        vec![
            Call::Show {
                line: 0,
                text: BANNER.to_string(),
                hold_ms: 0,
            },
            Call::Show {
                line: 1,
                text: env!("CARGO_PKG_VERSION").to_string(),
                hold_ms: BANNER_HOLD_MS,
            },
        ]
    );

    let r = lp.readings();
    assert_eq!(r.firmware.as_str(), "7.1.3");
    assert_eq!(r.protocol.as_str(), "5.0.1");
    assert_eq!((r.min_amps, r.max_amps), (6, 32));
    assert_eq!(r.pilot_amps, 32);
    assert_eq!(r.current_ma, 16_000);
    assert_eq!(r.temps_dc, [Some(215), None, Some(300)]);
    assert_eq!((r.session_watt_secs, r.total_watt_hours), (3_600, 12));

    rig.run_until(&mut lp, &mut evse, 12_000, 100);
    assert_eq!(evse.count("$GV"), 1);
    assert_eq!(
        rig.web_events()
            .iter()
            .filter(|e| e.contains("initial_read"))
            .count(),
        1
    );
}

#[test]
fn live_values_are_read_every_fast_interval() {
    let mut rig = Rig::new();
    let mut lp = rig.control_loop(SystemConfig::default(), vec![]);
    let mut evse = SimEvse::new(1);

    rig.run_until(&mut lp, &mut evse, 10_500, 100);

    // One from the initial read, then cycles at 2, 4, 6, 8 and 10 s.
    assert_eq!(evse.count("$GG"), 6);
    assert_eq!(evse.count("$GU"), 6);
    assert_eq!(evse.count("$GE"), 1);
    assert!(lp.heap().last() > 0);
}

#[test]
fn status_change_while_ready_is_published() {
    let mut rig = Rig::new();
    let mut lp = rig.control_loop(SystemConfig::default(), vec![]);
    let mut evse = SimEvse::new(3);
    rig.run_until(&mut lp, &mut evse, 2_500, 100);

    evse.state = 254;
    rig.run_until(&mut lp, &mut evse, 4_500, 100);

    assert_eq!(lp.state(), ChargerState::Ready(EvseStatus::Sleeping));
    assert_eq!(
        rig.web_events().last().map(String::as_str),
        Some(r#"{"state":254}"#)
    );
}

#[test]
fn initial_read_is_not_repeated_after_losing_readiness() {
    let mut rig = Rig::new();
    let mut lp = rig.control_loop(SystemConfig::default(), vec![]);
    let mut evse = SimEvse::new(3);
    rig.run_until(&mut lp, &mut evse, 2_500, 100);

    evse.state = 0;
    rig.run_until(&mut lp, &mut evse, 5_000, 100);
    assert_eq!(lp.state(), ChargerState::Starting);
    assert_eq!(lp.pending_reads(), 0);

    evse.state = 3;
    rig.run_until(&mut lp, &mut evse, 9_000, 100);
    assert!(lp.state().is_ready());
    assert_eq!(evse.count("$GV"), 1);
}

#[test]
fn readiness_lost_mid_initial_read_abandons_the_batch() {
    let mut rig = Rig::new();
    let mut lp = rig.control_loop(SystemConfig::default(), vec![]);
    let mut evse = SimEvse::new(3);
    rig.run_until(&mut lp, &mut evse, 1_100, 100);
    assert!(lp.state().is_ready());

    // The batch's own `$GS` reports the charger starting again.
    evse.state = 0;
    rig.run_until(&mut lp, &mut evse, 5_000, 100);

    assert_eq!(lp.state(), ChargerState::Starting);
    assert_eq!(lp.pending_reads(), 0);
    assert_eq!(evse.count("$GV"), 1);
    assert_eq!(evse.count("$GG"), 0);
    assert!(lp.context().machine.initial_read_done());
    assert!(
        !rig.web_events().iter().any(|e| e.contains("initial_read")),
        "abandoned batch must not report completion"
    );
}

#[test]
fn silent_evse_while_ready_keeps_state() {
    let mut rig = Rig::new();
    let mut lp = rig.control_loop(SystemConfig::default(), vec![]);
    let mut evse = SimEvse::new(2);
    rig.run_until(&mut lp, &mut evse, 2_500, 100);

    evse.silent = true;
    rig.run_until(&mut lp, &mut evse, 10_000, 100);

    assert_eq!(lp.state(), ChargerState::Ready(EvseStatus::Connected));
    assert!(lp.rapi().is_pending());
}

// ── Unsolicited lines ─────────────────────────────────────────

#[test]
fn pushed_state_is_forwarded_without_changing_state() {
    let mut rig = Rig::new();
    let mut lp = rig.control_loop(SystemConfig::default(), vec![]);
    let mut evse = SimEvse::new(3);
    rig.run_until(&mut lp, &mut evse, 2_500, 100);

    lp.rapi_mut().transport_mut().inject(&frame("$ST 08"));
    rig.run_until(&mut lp, &mut evse, 2_600, 100);

    assert_eq!(
        rig.web_events().last().map(String::as_str),
        Some(r#"{"state":8}"#)
    );
    assert_eq!(lp.state(), ChargerState::Ready(EvseStatus::Charging));
}

#[test]
fn wifi_mode_request_is_forwarded() {
    let mut rig = Rig::new();
    let mut lp = rig.control_loop(SystemConfig::default(), vec![]);
    let mut evse = SimEvse::new(3);
    rig.run_until(&mut lp, &mut evse, 2_500, 100);

    lp.rapi_mut().transport_mut().inject(&frame("$WF 2"));
    rig.run_until(&mut lp, &mut evse, 2_600, 100);

    assert_eq!(
        rig.web_events().last().map(String::as_str),
        Some(r#"{"wifi_mode":2}"#)
    );
}

// ── Connected obligations ─────────────────────────────────────

#[test]
fn snapshot_is_published_only_while_connected() {
    let mut rig = Rig::new();
    let mut lp = rig.control_loop(
        config_with(FeatureFlags {
            cloud_enabled: true,
            ..FeatureFlags::default()
        }),
        vec![],
    );
    let mut evse = SimEvse::new(3);

    rig.run_until(&mut lp, &mut evse, 35_000, 100);
    assert!(rig.cloud_messages().is_empty());

    rig.network.connected = true;
    rig.run_until(&mut lp, &mut evse, 35_100, 100);
    let sent = rig.cloud_messages();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].contains(r#""amp":16000"#));
    assert!(sent[0].contains(r#""voltage":240"#));
    assert!(sent[0].contains(r#""state":3"#));
    assert!(sent[0].contains(r#""temp1":215"#));
    assert!(!sent[0].contains("temp2"));
    assert!(sent[0].contains(r#""freeram":180000"#));

    rig.run_until(&mut lp, &mut evse, 65_000, 100);
    assert_eq!(rig.cloud_messages().len(), 1);
    rig.run_until(&mut lp, &mut evse, 65_100, 100);
    assert_eq!(rig.cloud_messages().len(), 2);
    assert_eq!(lp.snapshots_published(), 2);
}

#[test]
fn nothing_is_published_before_the_charger_is_ready() {
    let mut rig = Rig::new();
    rig.network.connected = true;
    let mut lp = rig.control_loop(
        config_with(FeatureFlags {
            cloud_enabled: true,
            broker_enabled: true,
            divert_enabled: true,
        }),
        vec![],
    );
    let mut evse = SimEvse::silent();

    rig.run_until(&mut lp, &mut evse, 31_000, 100);

    assert_eq!(lp.state(), ChargerState::Starting);
    assert!(rig.cloud_messages().is_empty());
    assert!(rig.broker_messages().is_empty());
    assert_eq!(rig.count(|c| *c == Call::SolarUpdate), 0);
    assert_eq!(lp.snapshots_published(), 0);
    assert_eq!(lp.snapshots_skipped(), 0);
    // The broker connection is still kept alive.
    assert_eq!(rig.count(|c| *c == Call::BrokerService), 310);
}

#[test]
fn firmware_update_skips_the_cycle_and_restarts_the_period() {
    let mut rig = Rig::new();
    rig.network.connected = true;
    let mut lp = rig.control_loop(
        config_with(FeatureFlags {
            cloud_enabled: true,
            ..FeatureFlags::default()
        }),
        vec![],
    );
    let mut evse = SimEvse::new(3);

    rig.ota.in_progress = true;
    rig.run_until(&mut lp, &mut evse, 30_000, 100);
    assert_eq!(lp.snapshots_skipped(), 1);
    assert!(rig.cloud_messages().is_empty());

    rig.ota.in_progress = false;
    rig.run_until(&mut lp, &mut evse, 59_900, 100);
    assert!(rig.cloud_messages().is_empty());
    rig.run_until(&mut lp, &mut evse, 60_000, 100);
    assert_eq!(rig.cloud_messages().len(), 1);
}

#[test]
fn broker_is_serviced_each_connected_pass_only_when_enabled() {
    let mut rig = Rig::new();
    rig.network.connected = true;
    let mut lp = rig.control_loop(SystemConfig::default(), vec![]);
    let mut evse = SimEvse::new(3);
    rig.run_until(&mut lp, &mut evse, 31_000, 100);
    assert_eq!(rig.count(|c| *c == Call::BrokerService), 0);
    assert!(rig.broker_messages().is_empty());

    let mut rig = Rig::new();
    rig.network.connected = true;
    let mut lp = rig.control_loop(
        config_with(FeatureFlags {
            broker_enabled: true,
            ..FeatureFlags::default()
        }),
        vec![],
    );
    let mut evse = SimEvse::new(3);
    rig.run_until(&mut lp, &mut evse, 31_000, 100);
    assert_eq!(rig.count(|c| *c == Call::BrokerService), 310);

    let msgs = rig.broker_messages();
    assert!(msgs.contains(&r#"{"state":3}"#.to_string()));
    assert!(msgs.iter().any(|m| m.contains(r#""amp":16000"#)));
    assert!(rig.cloud_messages().is_empty());
}

#[test]
fn divert_updates_after_publishing_when_enabled() {
    let mut rig = Rig::new();
    rig.network.connected = true;
    let mut lp = rig.control_loop(
        config_with(FeatureFlags {
            cloud_enabled: true,
            divert_enabled: true,
            ..FeatureFlags::default()
        }),
        vec![],
    );
    let mut evse = SimEvse::new(3);
    rig.run_until(&mut lp, &mut evse, 30_000, 100);

    let calls = rig.calls();
    let publish = calls
        .iter()
        .position(|c| matches!(c, Call::CloudPublish(_)));
    let divert = calls.iter().position(|c| *c == Call::SolarUpdate);
    assert!(publish.is_some());
    assert!(publish < divert);
    assert_eq!(rig.count(|c| *c == Call::SolarUpdate), 1);
}

#[test]
fn divert_is_left_alone_when_disabled() {
    let mut rig = Rig::new();
    rig.network.connected = true;
    let mut lp = rig.control_loop(SystemConfig::default(), vec![]);
    let mut evse = SimEvse::new(3);
    rig.run_until(&mut lp, &mut evse, 60_000, 100);

    assert_eq!(rig.count(|c| *c == Call::SolarUpdate), 0);
    // Nothing enabled: the cycle still counts, nothing goes out.
    assert_eq!(lp.snapshots_published(), 2);
    assert!(rig.cloud_messages().is_empty());
}
