//! One-time bring-up sequencer.
//!
//! Runs every stage strictly in order, exactly once, on the caller's task:
//!
//! ```text
//! ConfigStore ─▶ Display ─▶ Storage ─▶ Connectivity ─▶ Pairing ─▶ TimeSync ─▶ UiReady
//!   │ erase+reinit   │ restart   │ degrade    │ bounded wait   │ degrade    │ degrade
//!   │ once, then     │ device    │ (flash     │ then proceed   │            │ (fire and
//!   ▼ abort          ▼           ▼  fallback) ▼                ▼            ▼  forget)
//! ```
//!
//! Each stage consumes its own failure and either records a readiness flag
//! in [`SystemHealth`] or ends boot with a terminal [`BootOutcome`].

mod report;

pub use report::BootReport;

use core::fmt;

use log::{error, info, warn};
use serde::Serialize;

use crate::app::ports::{
    ConfigStorePort, DisplayPort, LinkPort, PairingPort, StoragePort, TimeSyncPort,
};
use crate::config::{self, SystemConfig};
use crate::connectivity::{ConnectivityStatus, load_credentials, wait_for_first_connection};
use crate::error::{DisplayError, StoreError};
use crate::health::{Subsystem, SystemHealth};

/// Bring-up stages in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum BootStage {
    ConfigStore,
    Display,
    Storage,
    Connectivity,
    Pairing,
    TimeSync,
    UiReady,
}

impl BootStage {
    pub const COUNT: usize = 7;

    pub const ALL: [BootStage; Self::COUNT] = [
        Self::ConfigStore,
        Self::Display,
        Self::Storage,
        Self::Connectivity,
        Self::Pairing,
        Self::TimeSync,
        Self::UiReady,
    ];
}

/// The config store could not be brought up, even after one erase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootError {
    ConfigStore(StoreError),
}

impl fmt::Display for BootError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConfigStore(e) => write!(f, "config store unrecoverable: {e}"),
        }
    }
}

impl core::error::Error for BootError {
    fn source(&self) -> Option<&(dyn core::error::Error + 'static)> {
        match self {
            Self::ConfigStore(e) => Some(e),
        }
    }
}

/// How boot ended.
#[derive(Debug)]
#[must_use = "a Restart outcome must reset the device"]
pub enum BootOutcome {
    /// Every mandatory stage passed; hand the report to the task loop.
    Ready(BootReport),
    /// A stage demands a full device reset. Nothing else may run.
    Restart {
        stage: BootStage,
        reason: DisplayError,
    },
    /// No automatic remedy exists.
    Aborted(BootError),
}

/// Collaborators used during bring-up. Borrowed only for the boot duration.
pub struct BootPorts<'a> {
    pub store: &'a mut dyn ConfigStorePort,
    pub display: &'a mut dyn DisplayPort,
    pub storage: &'a mut dyn StoragePort,
    pub link: &'a dyn LinkPort,
    pub pairing: &'a mut dyn PairingPort,
    pub time_sync: &'a mut dyn TimeSyncPort,
}

pub struct BootSequencer<'a> {
    ports: BootPorts<'a>,
    link_status: &'a ConnectivityStatus,
    health: SystemHealth,
    trace: heapless::Vec<BootStage, { BootStage::COUNT }>,
}

impl<'a> BootSequencer<'a> {
    pub fn new(ports: BootPorts<'a>, link_status: &'a ConnectivityStatus) -> Self {
        Self {
            ports,
            link_status,
            health: SystemHealth::new(),
            trace: heapless::Vec::new(),
        }
    }

    /// Run the whole sequence. Blocks for at most the connectivity wait
    /// plus the time each collaborator takes to start.
    pub fn run(mut self) -> BootOutcome {
        self.enter(BootStage::ConfigStore);
        if let Err(e) = self.bring_up_config_store() {
            error!("Boot: {}", e);
            return BootOutcome::Aborted(e);
        }
        let config = config::load_or_default(&*self.ports.store);

        self.enter(BootStage::Display);
        if let Err(e) = self.ports.display.init(&config.display) {
            error!("Boot: display init failed ({}), device must restart", e);
            return BootOutcome::Restart {
                stage: BootStage::Display,
                reason: e,
            };
        }
        self.complete(Subsystem::Display);

        self.enter(BootStage::Storage);
        self.bring_up_storage(&config);

        self.enter(BootStage::Connectivity);
        if self.bring_up_connectivity(&config) {
            self.complete(Subsystem::Connectivity);
        }

        self.enter(BootStage::Pairing);
        self.bring_up_pairing();

        self.enter(BootStage::TimeSync);
        match self.ports.time_sync.start(&config.sntp_server) {
            Ok(()) => {
                info!("Boot: time sync started ({})", config.sntp_server);
                self.complete(Subsystem::TimeSync);
            }
            Err(e) => warn!("Boot: time sync not started ({})", e),
        }

        self.enter(BootStage::UiReady);
        let report = BootReport::new(self.health, config, self.trace);
        report.log(self.link_status);
        BootOutcome::Ready(report)
    }

    fn enter(&mut self, stage: BootStage) {
        info!("Boot: {:?}", stage);
        // Capacity equals the number of stages, each entered once.
        let _ = self.trace.push(stage);
    }

    fn complete(&mut self, subsystem: Subsystem) {
        self.health.mark_ready(subsystem);
    }

    /// Init, curing a corrupted partition with exactly one erase+reinit.
    fn bring_up_config_store(&mut self) -> Result<(), BootError> {
        let store = &mut *self.ports.store;
        match store.init() {
            Ok(()) => Ok(()),
            Err(e) if e.is_corruption() => {
                warn!("Boot: config store corrupted ({}), erasing", e);
                store.erase().map_err(BootError::ConfigStore)?;
                store.init().map_err(BootError::ConfigStore)?;
                info!("Boot: config store re-initialised");
                Ok(())
            }
            Err(e) => Err(BootError::ConfigStore(e)),
        }
    }

    fn bring_up_storage(&mut self, config: &SystemConfig) {
        let s = &config.storage;
        match self.ports.storage.mount(s) {
            Ok(()) => {
                info!("Boot: storage mounted at {}", s.mount_path);
                self.complete(Subsystem::Storage);
            }
            Err(e) => warn!(
                "Boot: storage unavailable ({}), logs go to {:?}",
                e,
                self.health.log_medium()
            ),
        }
    }

    /// Start the radio and wait (bounded) for the first connection.
    fn bring_up_connectivity(&mut self, config: &SystemConfig) -> bool {
        let credentials = match load_credentials(&*self.ports.store) {
            Ok(Some(c)) => c,
            Ok(None) => {
                warn!("Boot: no WiFi credentials provisioned, skipping link");
                return false;
            }
            Err(e) => {
                warn!("Boot: stored WiFi credentials unusable ({})", e);
                return false;
            }
        };

        let link = self.ports.link;
        if let Err(e) = link.configure(&credentials).and_then(|()| link.start()) {
            warn!("Boot: link start failed ({})", e);
            return false;
        }

        let connected = wait_for_first_connection(self.link_status, config.link_wait_ms);
        if !connected {
            warn!(
                "Boot: no connection within {}ms, continuing (retries run in background)",
                config.link_wait_ms
            );
        }
        connected
    }

    fn bring_up_pairing(&mut self) {
        let pairing = &mut *self.ports.pairing;
        match pairing.enable_controller().and_then(|()| pairing.enable_stack()) {
            Ok(()) => {
                info!("Boot: Bluetooth enabled");
                self.complete(Subsystem::Pairing);
            }
            Err(e) => warn!("Boot: Bluetooth unavailable ({})", e),
        }
    }
}
