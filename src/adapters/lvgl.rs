//! LVGL engine adapter.
//!
//! Implements [`UiEnginePort`] over the LVGL 8 C library (pulled in as an
//! ESP-IDF component, bindings in `esp_idf_sys::lvgl`). LVGL's own tick
//! timer is not used: the render task injects ticks.
//!
//! LVGL calls back into `flush_trampoline` from inside `lv_timer_handler`.
//! The caller's flush closure is parked in a thread-local for exactly the
//! duration of that call, and the returned [`FlushReady`] is handed straight
//! to `lv_disp_flush_ready`.

use log::info;

use crate::app::ports::{FlushFn, FlushReady, UiEnginePort};
use crate::config::DisplayConfig;

#[cfg(target_os = "espidf")]
use core::cell::Cell;

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::lvgl::*;

#[cfg(target_os = "espidf")]
use crate::adapters::display::DRAW_BUFFER_LINES;
#[cfg(target_os = "espidf")]
use crate::app::ports::{Area, Rgb565};

#[cfg(not(target_os = "espidf"))]
use crate::app::ports::Area;

#[cfg(target_os = "espidf")]
thread_local! {
    static ACTIVE_FLUSH: Cell<Option<*mut FlushFn<'static>>> = const { Cell::new(None) };
}

#[cfg(target_os = "espidf")]
unsafe extern "C" fn flush_trampoline(
    drv: *mut lv_disp_drv_t,
    area: *const lv_area_t,
    color_map: *mut lv_color_t,
) {
    // SAFETY: LVGL passes a valid area and a draw buffer holding at least
    // the area's pixels, both live until `lv_disp_flush_ready`.
    let a = unsafe { &*area };
    let area = Area {
        x1: a.x1,
        y1: a.y1,
        x2: a.x2,
        y2: a.y2,
    };
    let pixels =
        unsafe { core::slice::from_raw_parts(color_map as *const Rgb565, area.pixel_count()) };

    match ACTIVE_FLUSH.with(Cell::get) {
        Some(flush) => {
            // SAFETY: set by `process_pending` on this thread, which is
            // still inside `lv_timer_handler`.
            let ready = unsafe { (*flush)(area, pixels) };
            acknowledge(drv, ready);
        }
        None => {
            // Outside process_pending: nothing to draw to, but never stall.
            unsafe { lv_disp_flush_ready(drv) };
        }
    }
}

#[cfg(target_os = "espidf")]
fn acknowledge(drv: *mut lv_disp_drv_t, _ready: FlushReady) {
    unsafe { lv_disp_flush_ready(drv) };
}

pub struct LvglEngine {
    #[cfg(target_os = "espidf")]
    _draw_buf: Box<lv_disp_draw_buf_t>,
    #[cfg(target_os = "espidf")]
    _pixels: Vec<lv_color_t>,
    #[cfg(target_os = "espidf")]
    _driver: Box<lv_disp_drv_t>,
    #[cfg(not(target_os = "espidf"))]
    screen: Area,
    #[cfg(not(target_os = "espidf"))]
    invalidated: bool,
    #[cfg(not(target_os = "espidf"))]
    acknowledged: u64,
    elapsed_ms: u64,
}

// SAFETY: LVGL state is created here and afterwards only touched by the
// render task that owns the engine.
#[cfg(target_os = "espidf")]
unsafe impl Send for LvglEngine {}

impl LvglEngine {
    /// Initialise LVGL and register the panel. Call only after the display
    /// came up.
    #[cfg(target_os = "espidf")]
    pub fn new(config: &DisplayConfig) -> Self {
        let px = config.width as usize * DRAW_BUFFER_LINES;
        let mut pixels: Vec<lv_color_t> = Vec::with_capacity(px);
        // SAFETY: lv_color_t is plain data.
        pixels.resize_with(px, || unsafe { core::mem::zeroed() });

        let mut draw_buf: Box<lv_disp_draw_buf_t> = Box::new(unsafe { core::mem::zeroed() });
        let mut driver: Box<lv_disp_drv_t> = Box::new(unsafe { core::mem::zeroed() });
        unsafe {
            lv_init();
            lv_disp_draw_buf_init(
                &mut *draw_buf,
                pixels.as_mut_ptr() as *mut _,
                core::ptr::null_mut(),
                px as u32,
            );
            lv_disp_drv_init(&mut *driver);
            driver.hor_res = config.width as lv_coord_t;
            driver.ver_res = config.height as lv_coord_t;
            driver.flush_cb = Some(flush_trampoline);
            driver.draw_buf = &mut *draw_buf;
            lv_disp_drv_register(&mut *driver);
        }
        info!(
            "LVGL: {}x{} registered, draw buffer {} lines",
            config.width, config.height, DRAW_BUFFER_LINES
        );

        Self {
            _draw_buf: draw_buf,
            _pixels: pixels,
            _driver: driver,
            elapsed_ms: 0,
        }
    }

    /// Simulated engine: redraws the whole screen whenever invalidated.
    #[cfg(not(target_os = "espidf"))]
    pub fn new(config: &DisplayConfig) -> Self {
        info!("LVGL(sim): {}x{}", config.width, config.height);
        Self {
            screen: Area {
                x1: 0,
                y1: 0,
                x2: config.width as i16 - 1,
                y2: config.height as i16 - 1,
            },
            invalidated: true,
            acknowledged: 0,
            elapsed_ms: 0,
        }
    }

    /// Engine time accumulated from injected ticks.
    pub fn elapsed_ms(&self) -> u64 {
        self.elapsed_ms
    }
}

#[cfg(not(target_os = "espidf"))]
impl LvglEngine {
    pub fn invalidate(&mut self) {
        self.invalidated = true;
    }

    pub fn acknowledged(&self) -> u64 {
        self.acknowledged
    }
}

impl UiEnginePort for LvglEngine {
    fn inject_tick(&mut self, elapsed_ms: u32) {
        self.elapsed_ms += u64::from(elapsed_ms);
        #[cfg(target_os = "espidf")]
        unsafe {
            lv_tick_inc(elapsed_ms);
        }
    }

    #[cfg(target_os = "espidf")]
    fn process_pending(&mut self, flush: &mut FlushFn<'_>) {
        let ptr: *mut FlushFn<'_> = flush;
        // SAFETY: the pointer is cleared before `flush` goes out of scope.
        let ptr: *mut FlushFn<'static> = unsafe { core::mem::transmute(ptr) };
        ACTIVE_FLUSH.with(|f| f.set(Some(ptr)));
        unsafe {
            lv_timer_handler();
        }
        ACTIVE_FLUSH.with(|f| f.set(None));
    }

    #[cfg(not(target_os = "espidf"))]
    fn process_pending(&mut self, flush: &mut FlushFn<'_>) {
        if !self.invalidated {
            return;
        }
        let pixels = vec![0u16; self.screen.pixel_count()];
        let _ready: FlushReady = flush(self.screen, &pixels);
        self.acknowledged += 1;
        self.invalidated = false;
    }
}
