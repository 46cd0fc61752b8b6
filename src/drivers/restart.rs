//! Unconditional device reset.
//!
//! A terminal transition out of the process, not an error return: nothing
//! after a call to [`restart_device`] runs.

use log::error;

#[cfg(target_os = "espidf")]
pub fn restart_device(reason: &str) -> ! {
    error!("Restarting device: {}", reason);
    // Let the UART drain the line above.
    std::thread::sleep(core::time::Duration::from_millis(100));
    esp_idf_svc::hal::reset::restart()
}

/// Simulation: the "device" is the host process.
#[cfg(not(target_os = "espidf"))]
pub fn restart_device(reason: &str) -> ! {
    error!("Restarting device (sim): {}", reason);
    std::process::exit(1)
}
