//! Port traits: the hexagonal boundary between the bring-up core and the
//! outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ BootSequencer / ConnectivityMachine / tasks
//! ```
//!
//! Driven adapters (NVS, QSPI panel, SD card, WiFi, BT, SNTP, TWDT, LVGL)
//! implement these traits. The domain core consumes them as `&mut dyn` or
//! generics, so it never touches ESP-IDF directly and every flow can be
//! exercised on the host with recording mocks.

use crate::config::{DisplayConfig, StorageConfig};
use crate::connectivity::{ConnectivityState, Credentials};
use crate::error::{
    DisplayError, LinkError, MountError, PairingError, StoreError, TimeSyncError, WatchdogError,
};
use crate::health::SystemHealth;

// ───────────────────────────────────────────────────────────────
// Persistent config store
// ───────────────────────────────────────────────────────────────

/// Key-value store that survives reboots (NVS on the device).
pub trait ConfigStorePort {
    /// Open the partition. Corruption is reported as
    /// [`StoreError::NoFreePages`] or [`StoreError::VersionMismatch`].
    fn init(&mut self) -> Result<(), StoreError>;

    /// Wipe the whole partition.
    fn erase(&mut self) -> Result<(), StoreError>;

    /// Write a value atomically.
    fn put(&mut self, key: &str, value: &[u8]) -> Result<(), StoreError>;

    /// Read a value into `buf`. `Ok(None)` when the key is absent.
    fn get(&self, key: &str, buf: &mut [u8]) -> Result<Option<usize>, StoreError>;
}

// ───────────────────────────────────────────────────────────────
// Display
// ───────────────────────────────────────────────────────────────

/// RGB565 pixel as produced by the UI engine.
pub type Rgb565 = u16;

/// Inclusive rectangle in panel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Area {
    pub x1: i16,
    pub y1: i16,
    pub x2: i16,
    pub y2: i16,
}

impl Area {
    pub fn pixel_count(&self) -> usize {
        let w = (i32::from(self.x2) - i32::from(self.x1) + 1).max(0);
        let h = (i32::from(self.y2) - i32::from(self.y1) + 1).max(0);
        (w * h) as usize
    }
}

pub trait DisplayPort {
    /// Bring up the bus and the panel. Failure is fatal to the device.
    fn init(&mut self, config: &DisplayConfig) -> Result<(), DisplayError>;

    /// Push pixels to the given area. Returns once the buffer may be reused.
    fn flush(&mut self, area: Area, pixels: &[Rgb565]);
}

// ───────────────────────────────────────────────────────────────
// Removable storage
// ───────────────────────────────────────────────────────────────

pub trait StoragePort {
    /// Mount the card described by `config` at `config.mount_path`.
    fn mount(&mut self, config: &StorageConfig) -> Result<(), MountError>;
}

// ───────────────────────────────────────────────────────────────
// Wireless link
// ───────────────────────────────────────────────────────────────

/// Station-mode wireless driver.
///
/// Methods take `&self`: the boot sequencer starts the radio while the
/// connectivity machine (on its own task) issues connects. Link events are
/// delivered out-of-band into a
/// [`LinkEventQueue`](crate::connectivity::LinkEventQueue).
pub trait LinkPort: Send + Sync {
    fn configure(&self, credentials: &Credentials) -> Result<(), LinkError>;
    fn start(&self) -> Result<(), LinkError>;
    fn connect(&self) -> Result<(), LinkError>;
}

// ───────────────────────────────────────────────────────────────
// Short-range radio
// ───────────────────────────────────────────────────────────────

pub trait PairingPort {
    fn enable_controller(&mut self) -> Result<(), PairingError>;
    fn enable_stack(&mut self) -> Result<(), PairingError>;
}

// ───────────────────────────────────────────────────────────────
// Time sync
// ───────────────────────────────────────────────────────────────

/// Fire-and-forget clock synchronisation.
pub trait TimeSyncPort {
    fn start(&mut self, server: &str) -> Result<(), TimeSyncError>;
}

/// Broken-down local time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CivilTime {
    pub year: u16,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
}

/// Wall-clock source. `None` until the clock has been set.
pub trait ClockPort {
    fn local_time(&self) -> Option<CivilTime>;
}

// ───────────────────────────────────────────────────────────────
// Watchdog
// ───────────────────────────────────────────────────────────────

/// Hardware liveness timer. Exactly one instance per process.
pub trait WatchdogPort {
    fn arm(&mut self, timeout_secs: u32) -> Result<(), WatchdogError>;
    fn register_current_context(&mut self) -> Result<(), WatchdogError>;
    fn reset(&mut self);
}

// ───────────────────────────────────────────────────────────────
// UI engine boundary
// ───────────────────────────────────────────────────────────────

/// Proof that a flushed buffer reached the display.
///
/// Only the render task can mint one, after forwarding the pixels. The UI
/// engine adapter must hand it back to the engine (`lv_disp_flush_ready`)
/// before the draw buffer is reused.
#[derive(Debug)]
#[must_use = "the UI engine stalls until the flush is acknowledged"]
pub struct FlushReady {
    _private: (),
}

impl FlushReady {
    pub(crate) fn new() -> Self {
        Self { _private: () }
    }
}

/// Flush callback handed to [`UiEnginePort::process_pending`].
pub type FlushFn<'a> = dyn FnMut(Area, &[Rgb565]) -> FlushReady + 'a;

/// The opaque UI engine. Widget construction is not part of this core.
pub trait UiEnginePort {
    /// Advance the engine's internal clock.
    fn inject_tick(&mut self, elapsed_ms: u32);

    /// Run pending update/draw work; may call `flush` zero or more times.
    fn process_pending(&mut self, flush: &mut FlushFn<'_>);
}

// ───────────────────────────────────────────────────────────────
// Health sampling
// ───────────────────────────────────────────────────────────────

/// Periodic device-health sampling, invoked by the supervisory loop.
pub trait HealthMonitor {
    fn sample(&mut self, health: &SystemHealth, link: ConnectivityState);
}
