//! Integration tests for the ordered bring-up.
//!
//! Drives `BootSequencer` against recording mocks and checks stage order,
//! the restart/abort paths and the degrade-and-continue behaviour.

use std::time::{Duration, Instant};

use reptilog::boot::{BootOutcome, BootPorts, BootReport, BootSequencer, BootStage};
use reptilog::config::{self, SystemConfig};
use reptilog::connectivity::{ConnectivityState, ReconnectPolicy};
use reptilog::error::{MountError, StoreError};
use reptilog::health::LogMedium;

use crate::mock_hw::{
    Call, CallLog, LinkRig, MockDisplay, MockPairing, MockStorage, MockStore, MockTimeSync,
    PumpThread,
};

/// Shortest boot wait the config accepts.
const SHORT_LINK_WAIT_MS: u32 = 1_000;

struct Bench {
    log: CallLog,
    store: MockStore,
    display: MockDisplay,
    storage: MockStorage,
    pairing: MockPairing,
    time_sync: MockTimeSync,
    rig: LinkRig,
    _pump: PumpThread,
    /// Wall time the last `boot()` took.
    elapsed: Duration,
}

impl Bench {
    fn new(ap_reachable: bool) -> Self {
        let log = CallLog::new();
        let rig = LinkRig::new(&log, ap_reachable);
        let pump = rig.spawn_pump(ReconnectPolicy::default());
        Self {
            store: MockStore::with_credentials(&log, "Vivarium", "basking-lamp"),
            display: MockDisplay::new(&log),
            storage: MockStorage::new(&log),
            pairing: MockPairing::new(&log),
            time_sync: MockTimeSync::new(&log),
            rig,
            _pump: pump,
            elapsed: Duration::ZERO,
            log,
        }
    }

    /// Persist a config whose boot wait is `link_wait_ms`.
    fn with_link_wait(mut self, link_wait_ms: u32) -> Self {
        let cfg = SystemConfig {
            link_wait_ms,
            ..SystemConfig::default()
        };
        config::save(&mut self.store, &cfg).unwrap();
        self
    }

    fn boot(&mut self) -> BootOutcome {
        let started = Instant::now();
        let outcome = BootSequencer::new(
            BootPorts {
                store: &mut self.store,
                display: &mut self.display,
                storage: &mut self.storage,
                link: &*self.rig.link,
                pairing: &mut self.pairing,
                time_sync: &mut self.time_sync,
            },
            &self.rig.status,
        )
        .run();
        self.elapsed = started.elapsed();
        outcome
    }

    fn boot_ready(&mut self) -> BootReport {
        match self.boot() {
            BootOutcome::Ready(report) => report,
            other => panic!("expected Ready, got {:?}", other),
        }
    }
}

// ── Happy path ────────────────────────────────────────────────

#[test]
fn full_boot_visits_every_stage_in_order() {
    let mut bench = Bench::new(true);
    let report = bench.boot_ready();

    assert_eq!(report.trace.as_slice(), &BootStage::ALL);
    assert!(report.health.display_ready());
    assert!(report.health.storage_ready());
    assert!(report.health.connectivity_ready());
    assert!(report.health.pairing_ready());
    assert!(report.health.time_synced());
    assert_eq!(bench.rig.state(), ConnectivityState::Connected);

    let calls = bench.log.calls();
    let order = [
        Call::StoreInit,
        Call::DisplayInit,
        Call::StorageMount,
        Call::LinkConfigure,
        Call::LinkStart,
        Call::ControllerEnable,
        Call::StackEnable,
        Call::TimeSyncStart,
    ];
    let positions: Vec<usize> = order
        .iter()
        .map(|c| calls.iter().position(|x| x == c).unwrap())
        .collect();
    assert!(positions.windows(2).all(|w| w[0] < w[1]), "{:?}", calls);
}

#[test]
fn reachable_link_wakes_boot_before_the_bound() {
    let mut bench = Bench::new(true);
    let report = bench.boot_ready();

    assert!(report.health.connectivity_ready());
    // Woken by the connect, not by the timer running out.
    assert!(
        bench.elapsed < Duration::from_millis(u64::from(report.config.link_wait_ms) / 2),
        "boot took {:?}",
        bench.elapsed
    );
}

#[test]
fn boot_never_touches_ui_or_watchdog() {
    let mut bench = Bench::new(true);
    let _ = bench.boot_ready();

    for call in [
        Call::UiTick,
        Call::UiProcess,
        Call::WatchdogArm,
        Call::WatchdogReset,
    ] {
        assert_eq!(bench.log.count(call), 0, "{:?} during boot", call);
    }
}

#[test]
fn time_sync_uses_configured_server() {
    let mut bench = Bench::new(true);
    let report = bench.boot_ready();
    assert_eq!(
        bench.time_sync.server.as_deref(),
        Some(report.config.sntp_server.as_str())
    );
}

// ── Display failure ───────────────────────────────────────────

#[test]
fn display_failure_demands_exactly_one_restart() {
    let mut bench = Bench::new(true);
    bench.display.fail_init = true;

    match bench.boot() {
        BootOutcome::Restart { stage, .. } => assert_eq!(stage, BootStage::Display),
        other => panic!("expected Restart, got {:?}", other),
    }

    assert_eq!(bench.log.count(Call::DisplayInit), 1);
    assert!(
        bench.log.after(Call::DisplayInit).is_empty(),
        "nothing may run after a display failure: {:?}",
        bench.log.calls()
    );
}

// ── Config store recovery ─────────────────────────────────────

#[test]
fn corrupted_store_is_erased_exactly_once() {
    let mut bench = Bench::new(true);
    bench.store.init_results.push_back(Err(StoreError::NoFreePages));

    let _ = bench.boot_ready();
    assert_eq!(bench.log.count(Call::StoreErase), 1);
    assert_eq!(bench.log.count(Call::StoreInit), 2);
}

#[test]
fn second_corruption_aborts_boot() {
    let mut bench = Bench::new(true);
    bench.store.init_results.push_back(Err(StoreError::VersionMismatch));
    bench.store.init_results.push_back(Err(StoreError::VersionMismatch));

    assert!(matches!(bench.boot(), BootOutcome::Aborted(_)));
    assert_eq!(bench.log.count(Call::StoreErase), 1);
    assert_eq!(bench.log.count(Call::DisplayInit), 0);
}

#[test]
fn non_corruption_store_error_aborts_without_erase() {
    let mut bench = Bench::new(true);
    bench.store.init_results.push_back(Err(StoreError::Io(-1)));

    assert!(matches!(bench.boot(), BootOutcome::Aborted(_)));
    assert_eq!(bench.log.count(Call::StoreErase), 0);
}

// ── Degraded subsystems ───────────────────────────────────────

#[test]
fn storage_failure_continues_to_connectivity() {
    let mut bench = Bench::new(true);
    bench.storage.result = Err(MountError::NoMedia);

    let report = bench.boot_ready();
    assert!(!report.health.storage_ready());
    assert_eq!(report.health.log_medium(), LogMedium::InternalFlash);
    assert_eq!(bench.log.after(Call::StorageMount).first(), Some(&Call::LinkConfigure));
}

#[test]
fn degraded_boot_still_reaches_ui_ready() {
    let mut bench = Bench::new(false).with_link_wait(SHORT_LINK_WAIT_MS);
    bench.storage.result = Err(MountError::MountFailed(-1));

    let report = bench.boot_ready();
    let h = report.health;
    assert!(!h.storage_ready());
    assert!(h.display_ready());
    assert!(!h.connectivity_ready());
    assert!(h.pairing_ready());
    assert!(h.time_synced());
    assert_eq!(report.trace.last(), Some(&BootStage::UiReady));

    // The wait ran to the configured limit and no further.
    assert_eq!(report.config.link_wait_ms, SHORT_LINK_WAIT_MS);
    assert!(bench.elapsed >= Duration::from_millis(u64::from(SHORT_LINK_WAIT_MS)));
    assert!(bench.elapsed < Duration::from_secs(5), "boot took {:?}", bench.elapsed);
    assert!(bench.log.count(Call::LinkConnect) >= 2);
}

#[test]
fn missing_credentials_skip_the_radio() {
    let mut bench = Bench::new(true);
    bench.store = MockStore::new(&bench.log);

    let report = bench.boot_ready();
    assert!(!report.health.connectivity_ready());
    assert_eq!(bench.log.count(Call::LinkStart), 0);
    assert!(
        bench.elapsed < Duration::from_millis(500),
        "no wait without credentials, took {:?}",
        bench.elapsed
    );
    assert!(report.health.pairing_ready());
}

#[test]
fn pairing_failure_is_not_fatal() {
    let mut bench = Bench::new(true);
    bench.pairing.fail_controller = true;

    let report = bench.boot_ready();
    assert!(!report.health.pairing_ready());
    assert_eq!(bench.log.count(Call::StackEnable), 0);
    assert!(report.health.time_synced());
}

#[test]
fn summary_json_reports_attempts_and_medium() {
    let mut bench = Bench::new(true);
    bench.storage.result = Err(MountError::NoMedia);
    let report = bench.boot_ready();

    let json = report.summary_json(&bench.rig.status).unwrap();
    let v: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(v["log_medium"], "InternalFlash");
    assert_eq!(v["link_attempts"], 1);
    assert_eq!(v["stages"].as_array().unwrap().len(), BootStage::COUNT);
}
