//! Bluetooth LE adapter.
//!
//! Implements [`PairingPort`]: brings up the controller in BLE-only mode and
//! then the Bluedroid host stack. Profiles (the companion-app sync service)
//! register on top once the stack is enabled; they are not this adapter's
//! concern.
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: `esp_bt_controller_*` / `esp_bluedroid_*`.
//! - **all other targets**: simulation with injectable failures.

use log::info;

use crate::app::ports::PairingPort;
use crate::error::PairingError;

#[cfg(target_os = "espidf")]
use log::error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BleState {
    Off,
    ControllerUp,
    StackUp,
}

pub struct BlePairing {
    state: BleState,
    #[cfg(not(target_os = "espidf"))]
    sim_fail_controller: bool,
}

impl Default for BlePairing {
    fn default() -> Self {
        Self::new()
    }
}

impl BlePairing {
    pub fn new() -> Self {
        Self {
            state: BleState::Off,
            #[cfg(not(target_os = "espidf"))]
            sim_fail_controller: false,
        }
    }

    pub fn state(&self) -> BleState {
        self.state
    }

    // ── Platform-specific ─────────────────────────────────────

    #[cfg(target_os = "espidf")]
    fn platform_enable_controller(&mut self) -> Result<(), PairingError> {
        use esp_idf_svc::sys::*;
        unsafe {
            // Release classic BT memory (BLE-only mode saves ~30 KB).
            esp_bt_controller_mem_release(esp_bt_mode_t_ESP_BT_MODE_CLASSIC_BT);

            let mut bt_cfg = esp_bt_controller_config_t::default();
            let ret = esp_bt_controller_init(&mut bt_cfg);
            if ret != ESP_OK as i32 {
                error!("BLE: bt_controller_init failed ({})", ret);
                return Err(PairingError::ControllerFailed(ret));
            }

            let ret = esp_bt_controller_enable(esp_bt_mode_t_ESP_BT_MODE_BLE);
            if ret != ESP_OK as i32 {
                error!("BLE: bt_controller_enable failed ({})", ret);
                return Err(PairingError::ControllerFailed(ret));
            }
        }
        Ok(())
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_enable_controller(&mut self) -> Result<(), PairingError> {
        if self.sim_fail_controller {
            return Err(PairingError::ControllerFailed(-1));
        }
        Ok(())
    }

    #[cfg(target_os = "espidf")]
    fn platform_enable_stack(&mut self) -> Result<(), PairingError> {
        use esp_idf_svc::sys::*;
        unsafe {
            let ret = esp_bluedroid_init();
            if ret != ESP_OK as i32 {
                error!("BLE: bluedroid_init failed ({})", ret);
                return Err(PairingError::StackFailed(ret));
            }

            let ret = esp_bluedroid_enable();
            if ret != ESP_OK as i32 {
                error!("BLE: bluedroid_enable failed ({})", ret);
                return Err(PairingError::StackFailed(ret));
            }
        }
        Ok(())
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_enable_stack(&mut self) -> Result<(), PairingError> {
        Ok(())
    }
}

#[cfg(not(target_os = "espidf"))]
impl BlePairing {
    /// Simulate a controller that refuses to start (e.g. no BT in sdkconfig).
    pub fn simulate_controller_failure(&mut self) {
        self.sim_fail_controller = true;
    }
}

impl PairingPort for BlePairing {
    fn enable_controller(&mut self) -> Result<(), PairingError> {
        if self.state != BleState::Off {
            return Ok(());
        }
        self.platform_enable_controller()?;
        self.state = BleState::ControllerUp;
        info!("BLE: controller enabled");
        Ok(())
    }

    fn enable_stack(&mut self) -> Result<(), PairingError> {
        match self.state {
            BleState::StackUp => return Ok(()),
            // Bluedroid refuses to init without a running controller.
            BleState::Off => return Err(PairingError::StackFailed(-1)),
            BleState::ControllerUp => {}
        }
        self.platform_enable_stack()?;
        self.state = BleState::StackUp;
        info!("BLE: Bluedroid stack enabled");
        Ok(())
    }
}
