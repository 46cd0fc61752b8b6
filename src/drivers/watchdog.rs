//! Task Watchdog Timer (TWDT) driver.
//!
//! [`TaskWatchdog`] wraps the ESP-IDF TWDT API with panic-on-trigger, so a
//! missed reset ends in a hard reset of the chip. The host body runs the
//! same contract on a [`LivenessTimer`] against the monotonic clock, checked
//! by a `twdt-sim` thread that fires an [`ExpiryHandler`] (by default
//! [`restart_device`]) once the countdown runs out.
//!
//! Only the supervisory loop may call [`WatchdogPort::reset`]; a stalled
//! render task then shows up as a starved supervisor and a missed reset.

use std::sync::{Arc, Mutex, PoisonError};

use log::{info, warn};

use crate::adapters::time::MonotonicClock;
use crate::app::ports::WatchdogPort;
use crate::error::WatchdogError;

#[cfg(not(target_os = "espidf"))]
use log::error;
#[cfg(not(target_os = "espidf"))]
use std::sync::Weak;
#[cfg(not(target_os = "espidf"))]
use crate::drivers::restart::restart_device;

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

// ───────────────────────────────────────────────────────────────
// Pure countdown
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Liveness {
    Disarmed,
    Alive { remaining_ms: u64 },
    Expired,
}

/// Countdown that expires `timeout_ms` after the last feed.
#[derive(Debug, Clone, Copy)]
pub struct LivenessTimer {
    timeout_ms: u64,
    last_feed_ms: Option<u64>,
}

impl LivenessTimer {
    pub const fn new(timeout_ms: u64) -> Self {
        Self {
            timeout_ms,
            last_feed_ms: None,
        }
    }

    pub fn timeout_ms(&self) -> u64 {
        self.timeout_ms
    }

    pub fn is_armed(&self) -> bool {
        self.last_feed_ms.is_some()
    }

    /// Start counting from `now_ms`. Re-arming an armed timer is an error.
    pub fn arm(&mut self, now_ms: u64) -> Result<(), WatchdogError> {
        if self.is_armed() {
            return Err(WatchdogError::AlreadyArmed);
        }
        self.last_feed_ms = Some(now_ms);
        Ok(())
    }

    pub fn feed(&mut self, now_ms: u64) -> Result<(), WatchdogError> {
        match self.last_feed_ms {
            Some(_) => {
                self.last_feed_ms = Some(now_ms);
                Ok(())
            }
            None => Err(WatchdogError::NotArmed),
        }
    }

    /// Expired once `now_ms - last_feed >= timeout`.
    pub fn check(&self, now_ms: u64) -> Liveness {
        let Some(fed) = self.last_feed_ms else {
            return Liveness::Disarmed;
        };
        let elapsed = now_ms.saturating_sub(fed);
        if elapsed >= self.timeout_ms {
            Liveness::Expired
        } else {
            Liveness::Alive {
                remaining_ms: self.timeout_ms - elapsed,
            }
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Platform watchdog
// ───────────────────────────────────────────────────────────────

/// Host stand-in for the TWDT panic. Receives how long the task was silent.
pub type ExpiryHandler = Arc<dyn Fn(u64) + Send + Sync>;

#[cfg(not(target_os = "espidf"))]
fn restart_on_expiry(silent_ms: u64) {
    restart_device(&format!("task watchdog: no reset for {}ms", silent_ms));
}

pub struct TaskWatchdog {
    timer: Arc<Mutex<LivenessTimer>>,
    clock: MonotonicClock,
    #[cfg(target_os = "espidf")]
    subscribed: bool,
    #[cfg(not(target_os = "espidf"))]
    on_expiry: ExpiryHandler,
}

impl Default for TaskWatchdog {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskWatchdog {
    pub fn new() -> Self {
        Self {
            timer: Arc::new(Mutex::new(LivenessTimer::new(0))),
            clock: MonotonicClock::new(),
            #[cfg(target_os = "espidf")]
            subscribed: false,
            #[cfg(not(target_os = "espidf"))]
            on_expiry: Arc::new(restart_on_expiry),
        }
    }

    /// Replace the host expiry action.
    #[cfg(not(target_os = "espidf"))]
    pub fn with_expiry_handler(mut self, handler: ExpiryHandler) -> Self {
        self.on_expiry = handler;
        self
    }

    fn timer(&self) -> std::sync::MutexGuard<'_, LivenessTimer> {
        // `LivenessTimer` is `Copy` state with no invariant a panic can break.
        self.timer.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current countdown as seen from the monotonic clock.
    pub fn liveness(&self) -> Liveness {
        self.timer().check(self.clock.uptime_ms())
    }

    /// Check the countdown a few times per timeout until it expires or the
    /// watchdog is dropped.
    #[cfg(not(target_os = "espidf"))]
    fn spawn_expiry_monitor(&self, timeout_ms: u64) {
        let timer: Weak<Mutex<LivenessTimer>> = Arc::downgrade(&self.timer);
        let clock = self.clock;
        let on_expiry = Arc::clone(&self.on_expiry);
        let step = core::time::Duration::from_millis((timeout_ms / 4).max(1));

        let spawned = std::thread::Builder::new()
            .name("twdt-sim".into())
            .spawn(move || {
                loop {
                    std::thread::sleep(step);
                    let Some(timer) = timer.upgrade() else {
                        return;
                    };
                    let timer = *timer.lock().unwrap_or_else(PoisonError::into_inner);
                    if timer.check(clock.uptime_ms()) == Liveness::Expired {
                        let silent_ms = clock
                            .uptime_ms()
                            .saturating_sub(timer.last_feed_ms.unwrap_or_default());
                        error!("Watchdog(sim): expired after {}ms without reset", silent_ms);
                        on_expiry(silent_ms);
                        return;
                    }
                }
            });
        if let Err(e) = spawned {
            warn!("Watchdog(sim): expiry monitor not started ({})", e);
        }
    }
}

impl WatchdogPort for TaskWatchdog {
    fn arm(&mut self, timeout_secs: u32) -> Result<(), WatchdogError> {
        let timeout_ms = u64::from(timeout_secs) * 1_000;
        if self.timer().is_armed() {
            return Err(WatchdogError::AlreadyArmed);
        }

        #[cfg(target_os = "espidf")]
        {
            let cfg = esp_task_wdt_config_t {
                timeout_ms: timeout_ms as u32,
                idle_core_mask: 0,
                trigger_panic: true,
            };
            // The bootloader usually starts the TWDT already; reconfigure it.
            let ret = unsafe { esp_task_wdt_reconfigure(&cfg) };
            if ret != ESP_OK as i32 {
                let ret = unsafe { esp_task_wdt_init(&cfg) };
                if ret != ESP_OK as i32 {
                    return Err(WatchdogError::Platform(ret));
                }
            }
        }

        {
            let mut timer = self.timer();
            *timer = LivenessTimer::new(timeout_ms);
            timer.arm(self.clock.uptime_ms())?;
        }

        #[cfg(not(target_os = "espidf"))]
        self.spawn_expiry_monitor(timeout_ms);

        info!("Watchdog: armed ({}s timeout, panic on trigger)", timeout_secs);
        Ok(())
    }

    fn register_current_context(&mut self) -> Result<(), WatchdogError> {
        if !self.timer().is_armed() {
            return Err(WatchdogError::NotArmed);
        }

        #[cfg(target_os = "espidf")]
        {
            let ret = unsafe { esp_task_wdt_add(core::ptr::null_mut()) };
            if ret != ESP_OK as i32 {
                warn!("Watchdog: failed to subscribe ({})", ret);
                return Err(WatchdogError::Platform(ret));
            }
            self.subscribed = true;
        }

        info!("Watchdog: current task subscribed");
        Ok(())
    }

    fn reset(&mut self) {
        #[cfg(target_os = "espidf")]
        if self.subscribed {
            unsafe {
                esp_task_wdt_reset();
            }
        }

        let now = self.clock.uptime_ms();
        if let Err(e) = self.timer().feed(now) {
            warn!("Watchdog: reset ignored ({})", e);
        }
    }
}
