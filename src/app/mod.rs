//! Application boundary.
//!
//! The bring-up core (`boot`, `connectivity`, `tasks`) talks to hardware
//! only through the **port traits** defined in [`ports`], which keeps every
//! sequencing and recovery rule testable without real peripherals.

pub mod ports;
