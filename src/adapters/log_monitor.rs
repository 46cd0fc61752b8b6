//! Log-backed health monitor.
//!
//! Implements [`HealthMonitor`] by building the [`StatusLine`] each
//! supervisory period and writing it to the ESP-IDF logger (UART / USB-CDC)
//! whenever it differs from the previous one. Sensor sampling plugs in
//! behind the same trait.

use log::{info, warn};

use crate::app::ports::{ClockPort, HealthMonitor};
use crate::connectivity::ConnectivityState;
use crate::health::SystemHealth;
use crate::status::StatusLine;

pub struct LogHealthMonitor<C> {
    clock: C,
    last: Option<StatusLine>,
    emitted: u32,
}

impl<C: ClockPort> LogHealthMonitor<C> {
    pub fn new(clock: C) -> Self {
        Self {
            clock,
            last: None,
            emitted: 0,
        }
    }

    pub fn last(&self) -> Option<&StatusLine> {
        self.last.as_ref()
    }

    /// Number of status lines written so far.
    pub fn emitted(&self) -> u32 {
        self.emitted
    }
}

impl<C: ClockPort> HealthMonitor for LogHealthMonitor<C> {
    fn sample(&mut self, health: &SystemHealth, link: ConnectivityState) {
        let line = StatusLine::new(health, link, self.clock.local_time());
        if self.last.as_ref() == Some(&line) {
            return;
        }

        let was_online = self.last.as_ref().is_some_and(|prev| prev.wifi_on);
        if was_online && !line.wifi_on {
            warn!("STATUS | WiFi lost ({:?})", link);
        }
        info!("STATUS | {}", line);
        self.last = Some(line);
        self.emitted += 1;
    }
}
