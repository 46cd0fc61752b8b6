//! Error types for the Reptilog firmware.
//!
//! Every collaborator reports failures through a small `Copy` enum so the
//! boot sequencer and the connectivity machine can branch on them without
//! allocation. Nothing here crosses a component boundary as a panic: each
//! stage consumes its own error and records the outcome in
//! [`SystemHealth`](crate::health::SystemHealth).

use core::fmt;

// ---------------------------------------------------------------------------
// Config store
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreError {
    /// The partition has no free pages left (needs erase).
    NoFreePages,
    /// The partition was written by a newer store format (needs erase).
    VersionMismatch,
    /// A stored value exceeds the caller's buffer or the store's blob limit.
    TooLarge,
    /// Key is empty or longer than the store allows.
    InvalidKey,
    /// Any other platform error code.
    Io(i32),
}

impl StoreError {
    /// Corruption signals are the only init failures cured by erase+reinit.
    pub const fn is_corruption(self) -> bool {
        matches!(self, Self::NoFreePages | Self::VersionMismatch)
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoFreePages => write!(f, "no free pages"),
            Self::VersionMismatch => write!(f, "new version found"),
            Self::TooLarge => write!(f, "value too large"),
            Self::InvalidKey => write!(f, "invalid key (must be 1-15 bytes)"),
            Self::Io(rc) => write!(f, "I/O error (rc={rc})"),
        }
    }
}

impl core::error::Error for StoreError {}

// ---------------------------------------------------------------------------
// Display
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayError {
    /// QSPI bus could not be configured (pins, DMA channel).
    BusInitFailed(i32),
    /// Panel controller did not answer its init sequence.
    PanelInitFailed(i32),
}

impl fmt::Display for DisplayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BusInitFailed(rc) => write!(f, "QSPI bus init failed (rc={rc})"),
            Self::PanelInitFailed(rc) => write!(f, "panel init failed (rc={rc})"),
        }
    }
}

impl core::error::Error for DisplayError {}

// ---------------------------------------------------------------------------
// Storage media
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MountError {
    /// No card in the slot or the card did not respond.
    NoMedia,
    /// Mount (and the optional format) failed.
    MountFailed(i32),
}

impl fmt::Display for MountError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoMedia => write!(f, "no media"),
            Self::MountFailed(rc) => write!(f, "mount failed (rc={rc})"),
        }
    }
}

impl core::error::Error for MountError {}

// ---------------------------------------------------------------------------
// Wireless link
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkError {
    /// Driver not initialised or radio not started.
    NotStarted,
    /// Station configuration was rejected by the driver.
    ConfigRejected(i32),
    /// Radio start failed.
    StartFailed(i32),
    /// The connect request itself was refused.
    ConnectFailed(i32),
}

impl fmt::Display for LinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotStarted => write!(f, "radio not started"),
            Self::ConfigRejected(rc) => write!(f, "configuration rejected (rc={rc})"),
            Self::StartFailed(rc) => write!(f, "start failed (rc={rc})"),
            Self::ConnectFailed(rc) => write!(f, "connect failed (rc={rc})"),
        }
    }
}

impl core::error::Error for LinkError {}

// ---------------------------------------------------------------------------
// Short-range radio
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairingError {
    ControllerFailed(i32),
    StackFailed(i32),
}

impl fmt::Display for PairingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ControllerFailed(rc) => write!(f, "BT controller enable failed (rc={rc})"),
            Self::StackFailed(rc) => write!(f, "BT host stack enable failed (rc={rc})"),
        }
    }
}

impl core::error::Error for PairingError {}

// ---------------------------------------------------------------------------
// Time sync
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeSyncError {
    InvalidServer,
    StartFailed(i32),
}

impl fmt::Display for TimeSyncError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidServer => write!(f, "invalid server name"),
            Self::StartFailed(rc) => write!(f, "SNTP start failed (rc={rc})"),
        }
    }
}

impl core::error::Error for TimeSyncError {}

// ---------------------------------------------------------------------------
// Watchdog
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchdogError {
    /// `arm` was called a second time.
    AlreadyArmed,
    /// `reset`/`register` before `arm`.
    NotArmed,
    /// Platform refused the configuration or subscription.
    Platform(i32),
}

impl fmt::Display for WatchdogError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlreadyArmed => write!(f, "already armed"),
            Self::NotArmed => write!(f, "not armed"),
            Self::Platform(rc) => write!(f, "platform error (rc={rc})"),
        }
    }
}

impl core::error::Error for WatchdogError {}

// ---------------------------------------------------------------------------
// Credentials
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialError {
    InvalidSsid,
    InvalidPassphrase,
    Store(StoreError),
}

impl fmt::Display for CredentialError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidSsid => write!(f, "SSID invalid (must be 1-32 printable ASCII bytes)"),
            Self::InvalidPassphrase => {
                write!(f, "passphrase invalid (must be 8-64 bytes for WPA2, or empty for open)")
            }
            Self::Store(e) => write!(f, "store: {e}"),
        }
    }
}

impl core::error::Error for CredentialError {
    fn source(&self) -> Option<&(dyn core::error::Error + 'static)> {
        match self {
            Self::Store(e) => Some(e),
            _ => None,
        }
    }
}

impl From<StoreError> for CredentialError {
    fn from(e: StoreError) -> Self {
        Self::Store(e)
    }
}
