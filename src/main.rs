//! Reptilog Firmware: Main Entry Point
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  NvsStore   QspiDisplay   SdCard   WifiLink   BlePairing       │
//! │  SntpClient   LvglEngine   TaskWatchdog   LogHealthMonitor     │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │  BootSequencer  →  RenderTask (core 1)                 │    │
//! │  │                 →  Supervisor (main task, core 0)      │    │
//! │  │  ConnectivityMachine ← LinkEventQueue (link pump)      │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! └────────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use std::sync::Arc;

use anyhow::{Context, Result};
use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::hal::delay::FreeRtos;
use esp_idf_svc::hal::peripherals::Peripherals;
use log::{error, info};

use reptilog::adapters::ble::BlePairing;
use reptilog::adapters::display::QspiDisplay;
use reptilog::adapters::log_monitor::LogHealthMonitor;
use reptilog::adapters::lvgl::LvglEngine;
use reptilog::adapters::nvs::NvsStore;
use reptilog::adapters::sdcard::SdCard;
use reptilog::adapters::sntp::SntpClient;
use reptilog::adapters::time::MonotonicClock;
use reptilog::adapters::wifi::WifiLink;
use reptilog::app::ports::WatchdogPort;
use reptilog::boot::{BootOutcome, BootPorts, BootSequencer};
use reptilog::connectivity::{
    ConnectivityMachine, ConnectivityStatus, LinkEventQueue, ReconnectPolicy, pump,
};
use reptilog::drivers::restart::restart_device;
use reptilog::drivers::watchdog::TaskWatchdog;
use reptilog::tasks::{self, RenderTask, Supervisor};

/// Filled by the WiFi driver's event callback, drained by the link pump.
static LINK_EVENTS: LinkEventQueue = LinkEventQueue::new();

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  Reptilog v{}                        ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    let peripherals = Peripherals::take()?;
    let sysloop = EspSystemEventLoop::take()?;

    // ── 2. Link plumbing ──────────────────────────────────────
    // No NVS partition handle here: taking it would initialise (and
    // silently erase) the partition before the config-store stage runs.
    let link_status = Arc::new(ConnectivityStatus::new());
    let wifi = Arc::new(
        WifiLink::new(peripherals.modem, sysloop, None, &LINK_EVENTS).context("WiFi driver")?,
    );
    let machine = ConnectivityMachine::new(
        Arc::clone(&wifi),
        Arc::clone(&link_status),
        ReconnectPolicy::default(),
    );
    let _link_pump = pump::spawn(machine, &LINK_EVENTS);

    // ── 3. Ordered bring-up ───────────────────────────────────
    let mut store = NvsStore::new();
    let mut display = QspiDisplay::new();
    let mut sdcard = SdCard::new();
    let mut ble = BlePairing::new();
    let mut sntp = SntpClient::new();

    let outcome = BootSequencer::new(
        BootPorts {
            store: &mut store,
            display: &mut display,
            storage: &mut sdcard,
            link: &*wifi,
            pairing: &mut ble,
            time_sync: &mut sntp,
        },
        &link_status,
    )
    .run();

    let report = match outcome {
        BootOutcome::Ready(report) => report,
        BootOutcome::Restart { stage, reason } => {
            restart_device(&format!("{:?} stage: {}", stage, reason))
        }
        BootOutcome::Aborted(e) => {
            error!("Boot aborted: {}", e);
            return Err(e.into());
        }
    };
    let config = report.config.clone();

    // ── 4. Rendering on core 1 ────────────────────────────────
    let engine = LvglEngine::new(&config.display);
    let render = RenderTask::new(engine, display, &report.health, config.render_period_ms);
    let _render = tasks::spawn_render(render, FreeRtos);

    // ── 5. Supervision on the main task ───────────────────────
    let mut watchdog = TaskWatchdog::new();
    watchdog.arm(config.watchdog_timeout_secs).context("watchdog arm")?;
    watchdog.register_current_context().context("watchdog subscribe")?;

    let monitor = LogHealthMonitor::new(MonotonicClock::new());
    Supervisor::new(
        watchdog,
        monitor,
        report.health,
        link_status,
        config.supervisor_period_ms,
    )
    .run(&mut FreeRtos)
}
