//! Supervisory loop: sample device health, then reset the watchdog.
//!
//! The only caller of [`WatchdogPort::reset`]. Runs on the task that was
//! registered with the watchdog.

use std::sync::Arc;

use embedded_hal::delay::DelayNs;
use log::info;

use crate::app::ports::{HealthMonitor, WatchdogPort};
use crate::connectivity::ConnectivityStatus;
use crate::health::SystemHealth;

pub struct Supervisor<W, M> {
    watchdog: W,
    monitor: M,
    health: SystemHealth,
    link: Arc<ConnectivityStatus>,
    period_ms: u32,
    cycles: u64,
}

impl<W: WatchdogPort, M: HealthMonitor> Supervisor<W, M> {
    /// `watchdog` must already be armed with this task registered.
    pub fn new(
        watchdog: W,
        monitor: M,
        health: SystemHealth,
        link: Arc<ConnectivityStatus>,
        period_ms: u32,
    ) -> Self {
        Self {
            watchdog,
            monitor,
            health,
            link,
            period_ms: period_ms.max(1),
            cycles: 0,
        }
    }

    pub fn step(&mut self) {
        self.monitor.sample(&self.health, self.link.state());
        self.watchdog.reset();
        self.cycles += 1;
    }

    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    pub fn watchdog(&self) -> &W {
        &self.watchdog
    }

    pub fn monitor(&self) -> &M {
        &self.monitor
    }

    pub fn run(mut self, delay: &mut impl DelayNs) -> ! {
        info!("Supervisor: running every {}ms", self.period_ms);
        loop {
            self.step();
            delay.delay_ms(self.period_ms);
        }
    }
}
