//! Reptilog firmware library.
//!
//! Exposes the bring-up orchestrator, the connectivity state machine and the
//! watchdog-supervised task loop for integration testing. All ESP-IDF-specific
//! code is guarded by `#[cfg(target_os = "espidf")]` within each module.

#![deny(unused_must_use)]

pub mod app;
pub mod boot;
pub mod config;
pub mod connectivity;
pub mod error;
pub mod health;
pub mod status;
pub mod tasks;

pub mod adapters;
pub mod drivers;

// Host unit tests need a `critical-section` implementation for the link queue.
#[cfg(all(test, not(target_os = "espidf")))]
use critical_section as _;
