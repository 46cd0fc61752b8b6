//! Integration tests for the post-boot task loop: render gating, the
//! supervisor's watchdog discipline, and expiry under simulated time.

use std::cell::Cell;
use std::rc::Rc;
use std::sync::Arc;

use reptilog::app::ports::WatchdogPort;
use reptilog::boot::{BootOutcome, BootPorts, BootSequencer};
use reptilog::connectivity::{ConnectivityState, ConnectivityStatus, ReconnectPolicy};
use reptilog::drivers::watchdog::{Liveness, LivenessTimer};
use reptilog::error::WatchdogError;
use reptilog::health::SystemHealth;
use reptilog::tasks::{RenderTask, Supervisor};

use crate::mock_hw::{
    Call, CallLog, LinkRig, MockDisplay, MockMonitor, MockPairing, MockStorage, MockStore,
    MockTimeSync, MockUi, MockWatchdog,
};

/// Boot against healthy mocks and return the frozen health record.
fn booted_health(log: &CallLog) -> SystemHealth {
    let rig = LinkRig::new(log, true);
    let _pump = rig.spawn_pump(ReconnectPolicy::default());
    let mut store = MockStore::with_credentials(log, "Vivarium", "basking-lamp");
    let mut display = MockDisplay::new(log);
    let mut storage = MockStorage::new(log);
    let mut pairing = MockPairing::new(log);
    let mut time_sync = MockTimeSync::new(log);

    let outcome = BootSequencer::new(
        BootPorts {
            store: &mut store,
            display: &mut display,
            storage: &mut storage,
            link: &*rig.link,
            pairing: &mut pairing,
            time_sync: &mut time_sync,
        },
        &rig.status,
    )
    .run();
    match outcome {
        BootOutcome::Ready(report) => report.health,
        other => panic!("boot failed: {:?}", other),
    }
}

// ── Render task ───────────────────────────────────────────────

#[test]
fn render_stays_idle_without_display() {
    let log = CallLog::new();
    let mut task = RenderTask::new(
        MockUi::new(&log),
        MockDisplay::new(&log),
        &SystemHealth::new(),
        16,
    );

    for _ in 0..10 {
        assert_eq!(task.step(), 0);
    }
    assert_eq!(log.count(Call::UiTick), 0);
    assert_eq!(log.count(Call::UiProcess), 0);
    assert_eq!(log.count(Call::DisplayFlush), 0);
}

#[test]
fn render_ticks_then_flushes_each_period() {
    let log = CallLog::new();
    let health = booted_health(&log);
    let boot_calls = log.calls().len();

    let mut task = RenderTask::new(MockUi::new(&log), MockDisplay::new(&log), &health, 16);
    for _ in 0..3 {
        assert_eq!(task.step(), 1);
    }

    assert_eq!(task.frames(), 3);
    assert_eq!(task.engine().elapsed_ms, 48);
    assert_eq!(task.display().pixels, 3 * 100);
    assert_eq!(
        &log.calls()[boot_calls..],
        &[
            Call::UiTick,
            Call::UiProcess,
            Call::DisplayFlush,
            Call::UiTick,
            Call::UiProcess,
            Call::DisplayFlush,
            Call::UiTick,
            Call::UiProcess,
            Call::DisplayFlush,
        ]
    );
    assert_eq!(log.count(Call::WatchdogReset), 0);
}

// ── Supervisor ────────────────────────────────────────────────

#[test]
fn supervisor_samples_then_resets_every_cycle() {
    let log = CallLog::new();
    let health = booted_health(&log);
    let boot_calls = log.calls().len();
    let status = Arc::new(ConnectivityStatus::new());

    let mut sup = Supervisor::new(
        MockWatchdog::new(&log),
        MockMonitor::new(&log),
        health,
        status,
        1_000,
    );
    for _ in 0..4 {
        sup.step();
    }

    assert_eq!(sup.cycles(), 4);
    assert_eq!(sup.watchdog().resets, 4);
    let calls = log.calls();
    let tail = &calls[boot_calls..];
    assert!(
        tail.chunks(2)
            .all(|c| c == [Call::HealthSample, Call::WatchdogReset].as_slice()),
        "{:?}",
        tail
    );
    let (seen_health, seen_link) = sup.monitor().seen[0];
    assert_eq!(seen_health, health);
    assert_eq!(seen_link, ConnectivityState::Disconnected);
}

// ── Watchdog expiry under simulated time ──────────────────────

/// Watchdog whose countdown runs on a shared simulated clock.
struct SimWatchdog {
    timer: LivenessTimer,
    now: Rc<Cell<u64>>,
}

impl WatchdogPort for SimWatchdog {
    fn arm(&mut self, timeout_secs: u32) -> Result<(), WatchdogError> {
        self.timer = LivenessTimer::new(u64::from(timeout_secs) * 1_000);
        self.timer.arm(self.now.get())
    }

    fn register_current_context(&mut self) -> Result<(), WatchdogError> {
        if self.timer.is_armed() {
            Ok(())
        } else {
            Err(WatchdogError::NotArmed)
        }
    }

    fn reset(&mut self) {
        let _ = self.timer.feed(self.now.get());
    }
}

#[test]
fn healthy_supervisor_never_lets_watchdog_expire() {
    let log = CallLog::new();
    let now = Rc::new(Cell::new(0u64));
    let mut wdt = SimWatchdog {
        timer: LivenessTimer::new(0),
        now: Rc::clone(&now),
    };
    wdt.arm(5).unwrap();
    wdt.register_current_context().unwrap();

    let mut sup = Supervisor::new(
        wdt,
        MockMonitor::new(&log),
        SystemHealth::new(),
        Arc::new(ConnectivityStatus::new()),
        1_000,
    );

    for _ in 0..120 {
        now.set(now.get() + 1_000);
        sup.step();
        assert!(matches!(
            sup.watchdog().timer.check(now.get()),
            Liveness::Alive { .. }
        ));
    }
}

#[test]
fn stalled_supervisor_expires_at_timeout() {
    let log = CallLog::new();
    let now = Rc::new(Cell::new(0u64));
    let mut wdt = SimWatchdog {
        timer: LivenessTimer::new(0),
        now: Rc::clone(&now),
    };
    wdt.arm(5).unwrap();

    let mut sup = Supervisor::new(
        wdt,
        MockMonitor::new(&log),
        SystemHealth::new(),
        Arc::new(ConnectivityStatus::new()),
        1_000,
    );
    now.set(3_000);
    sup.step();

    // Supervisor hangs from here on.
    let timer = sup.watchdog().timer;
    assert_eq!(
        timer.check(7_999),
        Liveness::Alive { remaining_ms: 1 }
    );
    assert_eq!(timer.check(8_000), Liveness::Expired);
    assert_eq!(timer.check(60_000), Liveness::Expired);
}

#[test]
fn registering_before_arming_is_rejected() {
    let mut wdt = SimWatchdog {
        timer: LivenessTimer::new(0),
        now: Rc::new(Cell::new(0)),
    };
    assert_eq!(wdt.register_current_context(), Err(WatchdogError::NotArmed));
}
