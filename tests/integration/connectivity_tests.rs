//! Integration tests for the connectivity state machine and its pump.

use reptilog::connectivity::pump;
use reptilog::connectivity::{ConnectivityState, LinkEvent, ReconnectPolicy, post_event};

use crate::mock_hw::{Call, CallLog, LinkRig};

#[test]
fn each_disconnect_issues_exactly_one_connect() {
    let log = CallLog::new();
    let rig = LinkRig::new(&log, false);
    let mut m = rig.machine(ReconnectPolicy::Immediate);

    assert!(m.handle(LinkEvent::Started, 0));
    assert_eq!(log.count(Call::LinkConnect), 1);

    for n in 1..=5u64 {
        assert!(m.handle(LinkEvent::Disconnected, n));
        assert_eq!(log.count(Call::LinkConnect), 1 + n as usize);
        assert_eq!(m.state(), ConnectivityState::Connecting);
    }
}

#[test]
fn disconnect_after_refused_connect_issues_exactly_one_connect() {
    let log = CallLog::new();
    let rig = LinkRig::new(&log, true);
    let mut m = rig.machine(ReconnectPolicy::Immediate);

    rig.link.set_refuse(true);
    m.handle(LinkEvent::Started, 0);
    assert_eq!(log.count(Call::LinkConnect), 1);
    let stale = m.next_deadline().unwrap();

    // The driver recovers and reports a drop before the retry is due.
    rig.link.set_refuse(false);
    post_event(&rig.queue, LinkEvent::Disconnected);
    pump::drain(&mut m, &rig.queue, 10);
    assert_eq!(log.count(Call::LinkConnect), 2);
    assert_eq!(m.next_deadline(), None);

    pump::drain(&mut m, &rig.queue, stale);
    assert_eq!(log.count(Call::LinkConnect), 2);
    assert_eq!(rig.state(), ConnectivityState::Connected);
}

#[test]
fn persistent_refusal_backs_off_then_cools_down() {
    let log = CallLog::new();
    let rig = LinkRig::new(&log, false);
    let mut m = rig.machine(ReconnectPolicy::Backoff {
        initial_ms: 1_500,
        max_ms: 4_000,
        max_retries: 4,
        cooldown_ms: 20_000,
    });
    rig.link.set_refuse(true);

    m.handle(LinkEvent::Started, 0);
    let mut now = 0u64;
    let mut gaps = Vec::new();
    for _ in 0..6 {
        let at = m.next_deadline().expect("a refused link keeps a retry pending");
        gaps.push(at - now);
        now = at;
        pump::drain(&mut m, &rig.queue, now);
    }

    // 1 s floor, then exponential up to the cap, then the cooldown.
    assert_eq!(gaps, [1_000, 1_500, 3_000, 4_000, 20_000, 1_000]);
    assert_eq!(log.count(Call::LinkConnect), 7);
    assert_eq!(rig.status.connect_attempts(), 7);
    // The cooldown reset the count; two refusals since.
    assert_eq!(m.consecutive_failures(), 2);
    assert_eq!(rig.state(), ConnectivityState::Connecting);
}

#[test]
fn ip_while_disconnected_is_ignored() {
    let log = CallLog::new();
    let rig = LinkRig::new(&log, true);
    let mut m = rig.machine(ReconnectPolicy::Immediate);

    assert!(!m.handle(LinkEvent::IpAcquired, 0));
    assert_eq!(m.state(), ConnectivityState::Disconnected);
    assert!(!rig.status.has_connected());
}

#[test]
fn link_loss_reconnects_and_recovers() {
    let log = CallLog::new();
    let rig = LinkRig::new(&log, true);
    let mut m = rig.machine(ReconnectPolicy::default());

    m.handle(LinkEvent::Started, 0);
    pump::drain(&mut m, &rig.queue, 0);
    assert_eq!(rig.state(), ConnectivityState::Connected);

    // Access point drops us; the driver reports it and we retry at once.
    m.handle(LinkEvent::Disconnected, 1_000);
    assert_eq!(rig.state(), ConnectivityState::Connecting);
    pump::drain(&mut m, &rig.queue, 1_000);
    assert_eq!(rig.state(), ConnectivityState::Connected);
    assert_eq!(m.consecutive_failures(), 0);
    assert_eq!(rig.status.connect_attempts(), 2);
}

#[test]
fn backoff_defers_later_retries() {
    let log = CallLog::new();
    let rig = LinkRig::new(&log, false);
    let mut m = rig.machine(ReconnectPolicy::Backoff {
        initial_ms: 500,
        max_ms: 4_000,
        max_retries: 10,
        cooldown_ms: 60_000,
    });

    m.handle(LinkEvent::Started, 0);
    pump::drain(&mut m, &rig.queue, 0);
    // Started -> connect, first failure -> immediate connect, second -> deferred.
    assert_eq!(log.count(Call::LinkConnect), 2);
    assert_eq!(m.next_deadline(), Some(500));

    pump::drain(&mut m, &rig.queue, 499);
    assert_eq!(log.count(Call::LinkConnect), 2);

    pump::drain(&mut m, &rig.queue, 500);
    assert_eq!(log.count(Call::LinkConnect), 3);
    assert_eq!(m.next_deadline(), Some(1_500));
}

#[test]
fn deferred_retry_is_dropped_once_connected() {
    let log = CallLog::new();
    let rig = LinkRig::new(&log, false);
    let mut m = rig.machine(ReconnectPolicy::default());

    m.handle(LinkEvent::Started, 0);
    pump::drain(&mut m, &rig.queue, 0);
    assert!(m.next_deadline().is_some());

    rig.link.set_reachable(true);
    // A late association beats the timer.
    m.handle(LinkEvent::IpAcquired, 100);
    assert_eq!(m.next_deadline(), None);

    let before = log.count(Call::LinkConnect);
    pump::drain(&mut m, &rig.queue, 100_000);
    assert_eq!(log.count(Call::LinkConnect), before);
    assert_eq!(rig.state(), ConnectivityState::Connected);
}
