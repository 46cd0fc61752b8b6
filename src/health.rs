//! Subsystem readiness record.
//!
//! Built incrementally by the boot sequencer, one flag per completed stage,
//! then frozen and copied into the task contexts that read it. Nothing
//! writes to it after boot returns, so readers need no synchronisation.

use serde::Serialize;

/// A subsystem whose readiness is tracked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Subsystem {
    Storage,
    Display,
    Connectivity,
    TimeSync,
    Pairing,
}

/// Where persistent health logs should be written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LogMedium {
    SdCard,
    /// Internal flash partition, used when the card is unavailable.
    InternalFlash,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SystemHealth {
    storage_ready: bool,
    display_ready: bool,
    connectivity_ready: bool,
    time_synced: bool,
    pairing_ready: bool,
}

impl SystemHealth {
    pub const fn new() -> Self {
        Self {
            storage_ready: false,
            display_ready: false,
            connectivity_ready: false,
            time_synced: false,
            pairing_ready: false,
        }
    }

    /// Only the boot sequencer marks subsystems, after their stage completes.
    pub(crate) fn mark_ready(&mut self, subsystem: Subsystem) {
        match subsystem {
            Subsystem::Storage => self.storage_ready = true,
            Subsystem::Display => self.display_ready = true,
            Subsystem::Connectivity => self.connectivity_ready = true,
            Subsystem::TimeSync => self.time_synced = true,
            Subsystem::Pairing => self.pairing_ready = true,
        }
    }

    pub fn is_ready(&self, subsystem: Subsystem) -> bool {
        match subsystem {
            Subsystem::Storage => self.storage_ready,
            Subsystem::Display => self.display_ready,
            Subsystem::Connectivity => self.connectivity_ready,
            Subsystem::TimeSync => self.time_synced,
            Subsystem::Pairing => self.pairing_ready,
        }
    }

    pub fn storage_ready(&self) -> bool {
        self.storage_ready
    }

    pub fn display_ready(&self) -> bool {
        self.display_ready
    }

    /// First connection was made within the boot wait. The live link state
    /// is in [`ConnectivityStatus`](crate::connectivity::ConnectivityStatus).
    pub fn connectivity_ready(&self) -> bool {
        self.connectivity_ready
    }

    /// The sync client was started. Clock validity is eventually consistent.
    pub fn time_synced(&self) -> bool {
        self.time_synced
    }

    pub fn pairing_ready(&self) -> bool {
        self.pairing_ready
    }

    pub fn log_medium(&self) -> LogMedium {
        if self.storage_ready {
            LogMedium::SdCard
        } else {
            LogMedium::InternalFlash
        }
    }
}
