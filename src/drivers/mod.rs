//! Low-level platform drivers that sit beneath the port adapters.

pub mod restart;
pub mod task_pin;
pub mod watchdog;
