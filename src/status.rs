//! Status bar model: clock, WiFi and Bluetooth indicators.
//!
//! Built once per supervisory period from the frozen [`SystemHealth`], the
//! live link state and the wall clock. Rendering it is the UI's business.

use core::fmt::{self, Write};

use serde::Serialize;

use crate::app::ports::CivilTime;
use crate::connectivity::ConnectivityState;
use crate::health::SystemHealth;

/// Shown until the clock has been set.
pub const CLOCK_PLACEHOLDER: &str = "Loading...";

/// `dd/mm/YYYY HH:MM`
const CLOCK_TEXT_LEN: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusLine {
    pub clock: heapless::String<CLOCK_TEXT_LEN>,
    pub wifi_on: bool,
    pub bt_on: bool,
}

impl StatusLine {
    pub fn new(
        health: &SystemHealth,
        link: ConnectivityState,
        time: Option<CivilTime>,
    ) -> Self {
        let mut clock = heapless::String::new();
        match time {
            Some(t) => {
                // Always fits: four-digit year is the widest case.
                let _ = write!(
                    clock,
                    "{:02}/{:02}/{:04} {:02}:{:02}",
                    t.day, t.month, t.year, t.hour, t.minute
                );
            }
            None => {
                let _ = clock.push_str(CLOCK_PLACEHOLDER);
            }
        }
        Self {
            clock,
            wifi_on: link == ConnectivityState::Connected,
            bt_on: health.pairing_ready(),
        }
    }

    pub fn wifi_label(&self) -> &'static str {
        if self.wifi_on { "WiFi ON" } else { "WiFi OFF" }
    }

    pub fn bt_label(&self) -> &'static str {
        if self.bt_on { "BT ON" } else { "BT OFF" }
    }
}

impl fmt::Display for StatusLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} | {} | {}", self.clock, self.wifi_label(), self.bt_label())
    }
}
