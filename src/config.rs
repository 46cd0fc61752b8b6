//! System configuration parameters
//!
//! All tunable parameters for the Reptilog terminal. Values are persisted in
//! the config store as a postcard blob and fall back to the defaults below.

use core::fmt;

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::app::ports::ConfigStorePort;
use crate::error::StoreError;

/// Store key for the persisted [`SystemConfig`] blob.
pub const CONFIG_KEY: &str = "syscfg";

const MAX_CONFIG_BLOB: usize = 256;

/// QSPI panel configuration handed to the display collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayConfig {
    pub width: u16,
    pub height: u16,
    pub pin_cs: u8,
    pub pin_sclk: u8,
    pub pin_d0: u8,
    pub pin_d1: u8,
    pub pin_d2: u8,
    pub pin_d3: u8,
    /// Bus clock in Hz
    pub qspi_frequency_hz: u32,
    pub use_dma: bool,
    /// Backlight level (0-255)
    pub brightness: u8,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        // Waveshare ESP32-S3 3.5" Type B (AXS15231B)
        Self {
            width: 320,
            height: 480,
            pin_cs: 10,
            pin_sclk: 9,
            pin_d0: 11,
            pin_d1: 12,
            pin_d2: 13,
            pin_d3: 14,
            qspi_frequency_hz: 80_000_000,
            use_dma: true,
            brightness: 128,
        }
    }
}

/// SDMMC slot 1 wiring (routed through the GPIO matrix on the S3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SdSlotConfig {
    pub pin_clk: u8,
    pub pin_cmd: u8,
    pub pin_d0: u8,
    /// `d1`..`d3` are ignored on a 1-bit bus.
    pub pin_d1: u8,
    pub pin_d2: u8,
    pub pin_d3: u8,
    /// Data lines: 1 or 4
    pub bus_width: u8,
}

impl Default for SdSlotConfig {
    /// IDF's `SDMMC_SLOT_CONFIG_DEFAULT()` for slot 1.
    fn default() -> Self {
        Self {
            pin_clk: 14,
            pin_cmd: 15,
            pin_d0: 2,
            pin_d1: 4,
            pin_d2: 12,
            pin_d3: 13,
            bus_width: 4,
        }
    }
}

/// Removable log media settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageConfig {
    pub mount_path: heapless::String<16>,
    pub max_files: u8,
    pub format_if_mount_failed: bool,
    pub slot: SdSlotConfig,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            mount_path: fixed_str("/sdcard"),
            max_files: 5,
            format_if_mount_failed: true,
            slot: SdSlotConfig::default(),
        }
    }
}

/// Core system configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemConfig {
    // --- Task loop ---
    /// Render task period and tick unit (milliseconds)
    pub render_period_ms: u32,
    /// Supervisory loop period (milliseconds)
    pub supervisor_period_ms: u32,
    /// Hardware liveness timeout (seconds)
    pub watchdog_timeout_secs: u32,

    // --- Boot ---
    /// Upper bound on the boot-time wait for the first connection
    pub link_wait_ms: u32,
    /// SNTP server name
    pub sntp_server: heapless::String<32>,

    // --- Subsystems ---
    pub storage: StorageConfig,
    pub display: DisplayConfig,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            render_period_ms: 16, // ~60 FPS
            supervisor_period_ms: 1000,
            watchdog_timeout_secs: 5,

            link_wait_ms: 10_000,
            sntp_server: fixed_str("pool.ntp.org"),

            storage: StorageConfig::default(),
            display: DisplayConfig::default(),
        }
    }
}

impl SystemConfig {
    pub fn watchdog_timeout_ms(&self) -> u64 {
        u64::from(self.watchdog_timeout_secs) * 1000
    }

    /// Range-check every field. Rejects rather than clamps.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=100).contains(&self.render_period_ms) {
            return Err(ConfigError::ValidationFailed(
                "render_period_ms must be 1-100",
            ));
        }
        if !(100..=10_000).contains(&self.supervisor_period_ms) {
            return Err(ConfigError::ValidationFailed(
                "supervisor_period_ms must be 100-10000",
            ));
        }
        if self.render_period_ms >= self.supervisor_period_ms {
            return Err(ConfigError::ValidationFailed(
                "render_period_ms must be < supervisor_period_ms",
            ));
        }
        if !(1..=60).contains(&self.watchdog_timeout_secs) {
            return Err(ConfigError::ValidationFailed(
                "watchdog_timeout_secs must be 1-60",
            ));
        }
        if self.watchdog_timeout_ms() <= u64::from(self.supervisor_period_ms) {
            return Err(ConfigError::ValidationFailed(
                "watchdog timeout must exceed supervisor_period_ms",
            ));
        }
        if !(1_000..=60_000).contains(&self.link_wait_ms) {
            return Err(ConfigError::ValidationFailed(
                "link_wait_ms must be 1000-60000",
            ));
        }
        if self.sntp_server.is_empty() {
            return Err(ConfigError::ValidationFailed("sntp_server must not be empty"));
        }
        if !self.storage.mount_path.starts_with('/') {
            return Err(ConfigError::ValidationFailed(
                "storage.mount_path must be absolute",
            ));
        }
        if self.storage.max_files == 0 {
            return Err(ConfigError::ValidationFailed("storage.max_files must be > 0"));
        }
        if !matches!(self.storage.slot.bus_width, 1 | 4) {
            return Err(ConfigError::ValidationFailed(
                "storage.slot.bus_width must be 1 or 4",
            ));
        }
        if self.display.width == 0 || self.display.height == 0 {
            return Err(ConfigError::ValidationFailed(
                "display dimensions must be non-zero",
            ));
        }
        if !(1_000_000..=80_000_000).contains(&self.display.qspi_frequency_hz) {
            return Err(ConfigError::ValidationFailed(
                "display.qspi_frequency_hz must be 1-80 MHz",
            ));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Persistence
// ---------------------------------------------------------------------------

/// Errors from loading or persisting [`SystemConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// Stored blob failed deserialization.
    Corrupted,
    /// A field failed range validation.
    ValidationFailed(&'static str),
    /// Underlying store failure.
    Store(StoreError),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Corrupted => write!(f, "config corrupted"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
            Self::Store(e) => write!(f, "store: {}", e),
        }
    }
}

impl core::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn core::error::Error + 'static)> {
        match self {
            Self::Store(e) => Some(e),
            _ => None,
        }
    }
}

impl From<StoreError> for ConfigError {
    fn from(e: StoreError) -> Self {
        Self::Store(e)
    }
}

/// Read the persisted config, strictly.
pub fn try_load(store: &dyn ConfigStorePort) -> Result<Option<SystemConfig>, ConfigError> {
    let mut buf = [0u8; MAX_CONFIG_BLOB];
    let Some(len) = store.get(CONFIG_KEY, &mut buf)? else {
        return Ok(None);
    };
    let cfg: SystemConfig = postcard::from_bytes(&buf[..len]).map_err(|_| ConfigError::Corrupted)?;
    cfg.validate()?;
    Ok(Some(cfg))
}

/// Read the persisted config, falling back to defaults on any problem.
pub fn load_or_default(store: &dyn ConfigStorePort) -> SystemConfig {
    match try_load(store) {
        Ok(Some(cfg)) => {
            info!("Config loaded from store");
            cfg
        }
        Ok(None) => {
            info!("No stored config, using defaults");
            SystemConfig::default()
        }
        Err(e) => {
            warn!("Stored config unusable ({}), using defaults", e);
            SystemConfig::default()
        }
    }
}

/// Validate and persist the config.
pub fn save(store: &mut dyn ConfigStorePort, config: &SystemConfig) -> Result<(), ConfigError> {
    config.validate()?;
    let bytes = postcard::to_allocvec(config).map_err(|_| ConfigError::Corrupted)?;
    if bytes.len() > MAX_CONFIG_BLOB {
        return Err(ConfigError::Store(StoreError::TooLarge));
    }
    store.put(CONFIG_KEY, &bytes)?;
    info!("Config saved ({} bytes)", bytes.len());
    Ok(())
}

fn fixed_str<const N: usize>(s: &str) -> heapless::String<N> {
    let mut out = heapless::String::new();
    for c in s.chars() {
        if out.push(c).is_err() {
            break;
        }
    }
    out
}
