//! QSPI panel adapter (AXS15231B, 320x480).
//!
//! Implements [`DisplayPort`] on the ESP-IDF `esp_lcd` SPI panel-IO in quad
//! mode. The controller is driven with raw DCS commands: the QSPI framing
//! puts the opcode in bits 8..16 of a 32-bit command word whose top byte
//! selects a parameter write (`0x02`) or a quad pixel write (`0x32`).

use log::info;

use crate::app::ports::{Area, DisplayPort, Rgb565};
use crate::config::DisplayConfig;
use crate::error::DisplayError;

/// Lines per UI draw buffer; bounds the largest single flush.
pub const DRAW_BUFFER_LINES: usize = 40;

#[cfg(target_os = "espidf")]
mod dcs {
    pub const NOP: u8 = 0x00;
    pub const SLPOUT: u8 = 0x11;
    pub const CASET: u8 = 0x2A;
    pub const RASET: u8 = 0x2B;
    pub const RAMWR: u8 = 0x2C;
    pub const DISPON: u8 = 0x29;
    pub const COLMOD: u8 = 0x3A;
    pub const WRDISBV: u8 = 0x51;

    pub const fn param(op: u8) -> i32 {
        (0x02 << 24) | ((op as i32) << 8)
    }

    pub const fn pixels(op: u8) -> i32 {
        (0x32 << 24) | ((op as i32) << 8)
    }
}

pub struct QspiDisplay {
    #[cfg(target_os = "espidf")]
    io: esp_idf_svc::sys::esp_lcd_panel_io_handle_t,
    #[cfg(not(target_os = "espidf"))]
    fail_init: bool,
    #[cfg(not(target_os = "espidf"))]
    pixels_flushed: usize,
    ready: bool,
}

// SAFETY: the panel-IO handle is only used by the task that owns the adapter.
#[cfg(target_os = "espidf")]
unsafe impl Send for QspiDisplay {}

impl Default for QspiDisplay {
    fn default() -> Self {
        Self::new()
    }
}

impl QspiDisplay {
    pub fn new() -> Self {
        Self {
            #[cfg(target_os = "espidf")]
            io: core::ptr::null_mut(),
            #[cfg(not(target_os = "espidf"))]
            fail_init: false,
            #[cfg(not(target_os = "espidf"))]
            pixels_flushed: 0,
            ready: false,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    #[cfg(target_os = "espidf")]
    fn send(&self, op: u8, params: &[u8]) -> Result<(), i32> {
        use esp_idf_svc::sys::*;
        let ptr = if params.is_empty() {
            core::ptr::null()
        } else {
            params.as_ptr() as *const _
        };
        let ret = unsafe { esp_lcd_panel_io_tx_param(self.io, dcs::param(op), ptr, params.len()) };
        if ret != ESP_OK as i32 {
            return Err(ret);
        }
        Ok(())
    }

    #[cfg(target_os = "espidf")]
    fn init_panel(&mut self, config: &DisplayConfig) -> Result<(), DisplayError> {
        use esp_idf_svc::sys::*;

        let mut bus_cfg = spi_bus_config_t::default();
        bus_cfg.__bindgen_anon_1.mosi_io_num = i32::from(config.pin_d0);
        bus_cfg.__bindgen_anon_2.miso_io_num = i32::from(config.pin_d1);
        bus_cfg.__bindgen_anon_3.quadwp_io_num = i32::from(config.pin_d2);
        bus_cfg.__bindgen_anon_4.quadhd_io_num = i32::from(config.pin_d3);
        bus_cfg.sclk_io_num = i32::from(config.pin_sclk);
        bus_cfg.max_transfer_sz = (config.width as usize * DRAW_BUFFER_LINES * 2) as i32;

        let host = spi_host_device_t_SPI2_HOST;
        let dma = if config.use_dma {
            spi_common_dma_t_SPI_DMA_CH_AUTO
        } else {
            spi_common_dma_t_SPI_DMA_DISABLED
        };
        let ret = unsafe { spi_bus_initialize(host, &bus_cfg, dma) };
        if ret != ESP_OK as i32 {
            return Err(DisplayError::BusInitFailed(ret));
        }

        let io_cfg = esp_lcd_panel_io_spi_config_t {
            cs_gpio_num: i32::from(config.pin_cs),
            dc_gpio_num: -1,
            spi_mode: 3,
            pclk_hz: config.qspi_frequency_hz,
            trans_queue_depth: 10,
            on_color_trans_done: None,
            user_ctx: core::ptr::null_mut(),
            lcd_cmd_bits: 32,
            lcd_param_bits: 8,
            flags: esp_lcd_panel_io_spi_config_t__bindgen_ty_1 {
                _bitfield_align_1: [],
                // quad_mode
                _bitfield_1: esp_lcd_panel_io_spi_config_t__bindgen_ty_1::new_bitfield_1(
                    0, 0, 0, 0, 1, 0, 0, 0,
                ),
                __bindgen_padding_0: [0; 3],
            },
        };
        let ret = unsafe {
            esp_lcd_new_panel_io_spi(host as esp_lcd_spi_bus_handle_t, &io_cfg, &mut self.io)
        };
        if ret != ESP_OK as i32 {
            return Err(DisplayError::BusInitFailed(ret));
        }

        let panel = |e: i32| DisplayError::PanelInitFailed(e);
        self.send(dcs::SLPOUT, &[]).map_err(panel)?;
        std::thread::sleep(core::time::Duration::from_millis(120));
        self.send(dcs::COLMOD, &[0x55]).map_err(panel)?; // 16 bpp
        self.send(dcs::WRDISBV, &[config.brightness]).map_err(panel)?;
        self.send(dcs::DISPON, &[]).map_err(panel)?;
        Ok(())
    }
}

impl DisplayPort for QspiDisplay {
    fn init(&mut self, config: &DisplayConfig) -> Result<(), DisplayError> {
        info!(
            "Display: QSPI {}x{} @ {} MHz (dma={})",
            config.width,
            config.height,
            config.qspi_frequency_hz / 1_000_000,
            config.use_dma
        );

        #[cfg(target_os = "espidf")]
        self.init_panel(config)?;

        #[cfg(not(target_os = "espidf"))]
        if self.fail_init {
            return Err(DisplayError::PanelInitFailed(-1));
        }

        self.ready = true;
        info!("Display: ready (brightness {})", config.brightness);
        Ok(())
    }

    fn flush(&mut self, area: Area, pixels: &[Rgb565]) {
        if !self.ready {
            return;
        }
        let count = area.pixel_count().min(pixels.len());

        #[cfg(target_os = "espidf")]
        {
            use esp_idf_svc::sys::*;
            let [x1h, x1l] = (area.x1 as u16).to_be_bytes();
            let [x2h, x2l] = (area.x2 as u16).to_be_bytes();
            let [y1h, y1l] = (area.y1 as u16).to_be_bytes();
            let [y2h, y2l] = (area.y2 as u16).to_be_bytes();
            let window = self
                .send(dcs::CASET, &[x1h, x1l, x2h, x2l])
                .and_then(|()| self.send(dcs::RASET, &[y1h, y1l, y2h, y2l]));
            if let Err(e) = window {
                log::warn!("Display: window set failed ({})", e);
                return;
            }
            let ret = unsafe {
                esp_lcd_panel_io_tx_color(
                    self.io,
                    dcs::pixels(dcs::RAMWR),
                    pixels.as_ptr() as *const _,
                    count * core::mem::size_of::<Rgb565>(),
                )
            };
            if ret != ESP_OK as i32 {
                log::warn!("Display: pixel push failed ({})", ret);
                return;
            }
            // tx_param waits for queued colour transfers, so the caller's
            // buffer is free once this returns.
            let _ = self.send(dcs::NOP, &[]);
        }

        #[cfg(not(target_os = "espidf"))]
        {
            self.pixels_flushed += count;
        }
    }
}

#[cfg(not(target_os = "espidf"))]
impl QspiDisplay {
    /// Simulate a panel that does not answer (loose ribbon, EMI).
    pub fn simulate_init_failure(&mut self) {
        self.fail_init = true;
    }

    pub fn pixels_flushed(&self) -> usize {
        self.pixels_flushed
    }
}
