//! Core-pinned thread spawning for ESP32-S3 dual-core.
//!
//! ESP-IDF implements `std::thread` on pthreads, which are FreeRTOS tasks.
//! A [`TaskSpec`] is turned into an `esp_pthread_cfg_t` that applies to the
//! *next* `pthread_create()` from the calling thread, so placement and spawn
//! must not be interleaved with other thread creation on that thread.
//!
//! Host builds keep the name and stack size and drop core and priority.

use log::info;
#[cfg(not(target_os = "espidf"))]
use log::debug;
#[cfg(target_os = "espidf")]
use log::warn;

/// CPU core identifiers for the ESP32-S3 Xtensa LX7 dual-core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum Core {
    /// Core 0 (PRO_CPU): WiFi, Bluetooth, lwIP.
    Pro = 0,
    /// Core 1 (APP_CPU): UI and application logic.
    App = 1,
}

/// Smallest stack a host thread gets; debug builds of the render loop need
/// more than the device budget.
#[cfg(not(target_os = "espidf"))]
const HOST_MIN_STACK_KB: usize = 64;

/// Placement of one long-lived task.
#[derive(Debug, Clone, Copy)]
pub struct TaskSpec {
    /// NUL-terminated, e.g. `"render\0"`.
    pub name: &'static str,
    pub core: Core,
    pub priority: u8,
    pub stack_kb: usize,
}

impl TaskSpec {
    fn thread_name(&self) -> &'static str {
        self.name.trim_end_matches('\0')
    }

    fn stack_bytes(&self) -> usize {
        #[cfg(target_os = "espidf")]
        let kb = self.stack_kb;
        #[cfg(not(target_os = "espidf"))]
        let kb = self.stack_kb.max(HOST_MIN_STACK_KB);
        kb * 1024
    }

    /// Make the next thread created by the caller inherit this placement.
    #[cfg(target_os = "espidf")]
    fn claim_next_pthread(&self) -> Result<(), i32> {
        use esp_idf_svc::sys::{ESP_OK, esp_create_default_pthread_config, esp_pthread_set_cfg};

        // SAFETY: the config is a plain struct filled by IDF; `name` is a
        // NUL-terminated `'static` string, so the pointer outlives the task.
        let rc = unsafe {
            let mut cfg = esp_create_default_pthread_config();
            cfg.pin_to_core = self.core as i32;
            cfg.prio = i32::from(self.priority);
            cfg.stack_size = self.stack_bytes() as _;
            cfg.thread_name = self.name.as_ptr().cast();
            esp_pthread_set_cfg(&cfg)
        };
        if rc == ESP_OK as i32 { Ok(()) } else { Err(rc) }
    }
}

/// Render/tick task. Above the supervisory loop (main task, priority 1).
pub const RENDER_TASK: TaskSpec = TaskSpec {
    name: "render\0",
    core: Core::App,
    priority: 4,
    stack_kb: 8,
};

/// Connectivity pump, next to the WiFi driver.
pub const LINK_PUMP_TASK: TaskSpec = TaskSpec {
    name: "link-pump\0",
    core: Core::Pro,
    priority: 5,
    stack_kb: 4,
};

/// Spawn a thread with the placement in `spec`.
///
/// A rejected placement is logged and the task runs with IDF defaults.
/// Panics if the thread itself cannot be created: there is no degraded mode
/// for a missing render or pump task.
pub fn spawn_on_core(
    spec: &TaskSpec,
    f: impl FnOnce() + Send + 'static,
) -> std::thread::JoinHandle<()> {
    #[cfg(target_os = "espidf")]
    if let Err(rc) = spec.claim_next_pthread() {
        warn!(
            "Task '{}': placement rejected (rc={}), using defaults",
            spec.thread_name(),
            rc
        );
    }
    #[cfg(not(target_os = "espidf"))]
    if spec.stack_kb < HOST_MIN_STACK_KB {
        debug!(
            "Task '{}': host stack raised to {}KB, core {:?} ignored",
            spec.thread_name(),
            HOST_MIN_STACK_KB,
            spec.core
        );
    }

    info!(
        "Task '{}' -> {:?} core, priority {}, {}KB stack",
        spec.thread_name(),
        spec.core,
        spec.priority,
        spec.stack_bytes() / 1024
    );

    std::thread::Builder::new()
        .name(spec.thread_name().into())
        .stack_size(spec.stack_bytes())
        .spawn(f)
        .unwrap_or_else(|e| panic!("task '{}' not created: {}", spec.thread_name(), e))
}
