//! SD card adapter (FAT over SDMMC slot 1).
//!
//! Host and slot settings start from IDF's `SDMMC_HOST_DEFAULT()` and
//! `SDMMC_SLOT_CONFIG_DEFAULT()`; pins and bus width come from
//! [`SdSlotConfig`].
//!
//! Implements [`StoragePort`]. A failed mount is reported, never retried
//! here; the boot sequencer degrades to internal flash instead.

use log::info;

use crate::app::ports::StoragePort;
use crate::config::StorageConfig;
#[cfg(target_os = "espidf")]
use crate::config::SdSlotConfig;
use crate::error::MountError;

#[cfg(target_os = "espidf")]
use log::warn;

#[cfg(target_os = "espidf")]
const ALLOCATION_UNIT: usize = 16 * 1024;

pub struct SdCard {
    #[cfg(target_os = "espidf")]
    card: *mut esp_idf_svc::sys::sdmmc_card_t,
    #[cfg(not(target_os = "espidf"))]
    media_present: bool,
    mounted: bool,
}

impl Default for SdCard {
    fn default() -> Self {
        Self::new()
    }
}

impl SdCard {
    pub fn new() -> Self {
        Self {
            #[cfg(target_os = "espidf")]
            card: core::ptr::null_mut(),
            #[cfg(not(target_os = "espidf"))]
            media_present: true,
            mounted: false,
        }
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted
    }

    #[cfg(target_os = "espidf")]
    fn mount_fat(&mut self, config: &StorageConfig) -> Result<(), MountError> {
        use esp_idf_svc::sys::*;

        let mut base = [0u8; 17];
        let path = config.mount_path.as_bytes();
        base[..path.len()].copy_from_slice(path);

        let host = default_host();
        let slot = slot_config(&config.slot);

        let mount_cfg = esp_vfs_fat_mount_config_t {
            format_if_mount_failed: config.format_if_mount_failed,
            max_files: i32::from(config.max_files),
            allocation_unit_size: ALLOCATION_UNIT,
            ..Default::default()
        };

        let ret = unsafe {
            esp_vfs_fat_sdmmc_mount(
                base.as_ptr() as *const _,
                &host,
                &slot as *const _ as *const core::ffi::c_void,
                &mount_cfg,
                &mut self.card,
            )
        };
        if ret == ESP_OK as i32 {
            return Ok(());
        }
        warn!("SD: esp_vfs_fat_sdmmc_mount returned {}", ret);
        if ret == ESP_ERR_TIMEOUT as i32
            || ret == ESP_ERR_NOT_FOUND as i32
            || ret == ESP_ERR_INVALID_RESPONSE as i32
        {
            Err(MountError::NoMedia)
        } else {
            Err(MountError::MountFailed(ret))
        }
    }
}

/// `SDMMC_HOST_DEFAULT()`: slot 1, every bus width allowed, default clock.
#[cfg(target_os = "espidf")]
fn default_host() -> esp_idf_svc::sys::sdmmc_host_t {
    use esp_idf_svc::sys::*;

    sdmmc_host_t {
        flags: SDMMC_HOST_FLAG_8BIT
            | SDMMC_HOST_FLAG_4BIT
            | SDMMC_HOST_FLAG_1BIT
            | SDMMC_HOST_FLAG_DDR,
        slot: SDMMC_HOST_SLOT_1 as i32,
        max_freq_khz: SDMMC_FREQ_DEFAULT as i32,
        io_voltage: 3.3,
        init: Some(sdmmc_host_init),
        set_bus_width: Some(sdmmc_host_set_bus_width),
        get_bus_width: Some(sdmmc_host_get_slot_width),
        set_bus_ddr_mode: Some(sdmmc_host_set_bus_ddr_mode),
        set_card_clk: Some(sdmmc_host_set_card_clk),
        do_transaction: Some(sdmmc_host_do_transaction),
        __bindgen_anon_1: sdmmc_host_t__bindgen_ty_1 {
            deinit: Some(sdmmc_host_deinit),
        },
        io_int_enable: Some(sdmmc_host_io_int_enable),
        io_int_wait: Some(sdmmc_host_io_int_wait),
        ..Default::default()
    }
}

/// `SDMMC_SLOT_CONFIG_DEFAULT()` with the configured wiring: no card-detect
/// or write-protect lines, no internal pull-ups.
#[cfg(target_os = "espidf")]
fn slot_config(slot: &SdSlotConfig) -> esp_idf_svc::sys::sdmmc_slot_config_t {
    use esp_idf_svc::sys::*;

    sdmmc_slot_config_t {
        clk: i32::from(slot.pin_clk),
        cmd: i32::from(slot.pin_cmd),
        d0: i32::from(slot.pin_d0),
        d1: i32::from(slot.pin_d1),
        d2: i32::from(slot.pin_d2),
        d3: i32::from(slot.pin_d3),
        d4: gpio_num_t_GPIO_NUM_NC,
        d5: gpio_num_t_GPIO_NUM_NC,
        d6: gpio_num_t_GPIO_NUM_NC,
        d7: gpio_num_t_GPIO_NUM_NC,
        __bindgen_anon_1: sdmmc_slot_config_t__bindgen_ty_1 {
            cd: gpio_num_t_GPIO_NUM_NC,
        },
        __bindgen_anon_2: sdmmc_slot_config_t__bindgen_ty_2 {
            wp: gpio_num_t_GPIO_NUM_NC,
        },
        width: slot.bus_width,
        flags: 0,
        ..Default::default()
    }
}

#[cfg(not(target_os = "espidf"))]
impl SdCard {
    /// Simulate an empty slot.
    pub fn eject(&mut self) {
        self.media_present = false;
        self.mounted = false;
    }
}

impl StoragePort for SdCard {
    fn mount(&mut self, config: &StorageConfig) -> Result<(), MountError> {
        info!(
            "SD: mounting at {} ({}-bit, clk={} cmd={} d0={}, max_files={}, format_if_failed={})",
            config.mount_path,
            config.slot.bus_width,
            config.slot.pin_clk,
            config.slot.pin_cmd,
            config.slot.pin_d0,
            config.max_files,
            config.format_if_mount_failed
        );

        #[cfg(target_os = "espidf")]
        self.mount_fat(config)?;

        #[cfg(not(target_os = "espidf"))]
        if !self.media_present {
            return Err(MountError::NoMedia);
        }

        self.mounted = true;
        info!("SD: mounted");
        Ok(())
    }
}
