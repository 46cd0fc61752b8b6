//! Time sources.
//!
//! - **`target_os = "espidf"`**: `esp_timer_get_time()` for monotonic
//!   uptime, `gettimeofday` + `localtime_r` for the SNTP-disciplined wall
//!   clock.
//! - **`not(target_os = "espidf")`**: `std::time::Instant` for uptime; the
//!   wall clock is never set.

use crate::app::ports::{CivilTime, ClockPort};

/// Anything earlier than 2020-01-01 means SNTP has not run yet.
#[cfg(target_os = "espidf")]
const EPOCH_2020: i64 = 1_577_836_800;

#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    #[cfg(not(target_os = "espidf"))]
    start: std::time::Instant,
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            #[cfg(not(target_os = "espidf"))]
            start: std::time::Instant::now(),
        }
    }

    /// Milliseconds since boot.
    #[cfg(target_os = "espidf")]
    pub fn uptime_ms(&self) -> u64 {
        (unsafe { esp_idf_svc::sys::esp_timer_get_time() }) as u64 / 1_000
    }

    /// Milliseconds since this clock was created.
    #[cfg(not(target_os = "espidf"))]
    pub fn uptime_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }
}

impl ClockPort for MonotonicClock {
    #[cfg(target_os = "espidf")]
    fn local_time(&self) -> Option<CivilTime> {
        use core::ptr;
        let mut tv = esp_idf_svc::sys::timeval {
            tv_sec: 0,
            tv_usec: 0,
        };
        if unsafe { esp_idf_svc::sys::gettimeofday(&mut tv, ptr::null_mut()) } != 0 {
            return None;
        }
        if (tv.tv_sec as i64) < EPOCH_2020 {
            return None;
        }
        let secs = tv.tv_sec as esp_idf_svc::sys::time_t;
        let mut tm: esp_idf_svc::sys::tm = unsafe { core::mem::zeroed() };
        if unsafe { esp_idf_svc::sys::localtime_r(&secs, &mut tm) }.is_null() {
            return None;
        }
        Some(CivilTime {
            year: (tm.tm_year + 1900) as u16,
            month: (tm.tm_mon + 1) as u8,
            day: tm.tm_mday as u8,
            hour: tm.tm_hour as u8,
            minute: tm.tm_min as u8,
        })
    }

    #[cfg(not(target_os = "espidf"))]
    fn local_time(&self) -> Option<CivilTime> {
        None
    }
}
