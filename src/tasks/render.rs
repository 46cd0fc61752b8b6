//! Periodic UI tick/render task.
//!
//! Every period: inject one tick, let the engine process pending work and
//! forward each flushed area to the display. Never touches the watchdog.

use embedded_hal::delay::DelayNs;
use log::{info, warn};

use crate::app::ports::{Area, DisplayPort, FlushReady, Rgb565, UiEnginePort};
use crate::health::SystemHealth;

pub struct RenderTask<U, D> {
    engine: U,
    display: D,
    period_ms: u32,
    enabled: bool,
    frames: u64,
    flushes: u64,
}

impl<U: UiEnginePort, D: DisplayPort> RenderTask<U, D> {
    pub fn new(engine: U, display: D, health: &SystemHealth, period_ms: u32) -> Self {
        let enabled = health.display_ready();
        if !enabled {
            warn!("Render: display not ready, UI engine stays idle");
        }
        Self {
            engine,
            display,
            period_ms: period_ms.max(1),
            enabled,
            frames: 0,
            flushes: 0,
        }
    }

    /// One period of work. Returns the number of areas flushed.
    pub fn step(&mut self) -> usize {
        if !self.enabled {
            return 0;
        }

        self.engine.inject_tick(self.period_ms);

        let display = &mut self.display;
        let mut flushed = 0usize;
        self.engine.process_pending(&mut |area: Area, pixels: &[Rgb565]| {
            display.flush(area, pixels);
            flushed += 1;
            FlushReady::new()
        });

        self.frames += 1;
        self.flushes += flushed as u64;
        flushed
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn flushes(&self) -> u64 {
        self.flushes
    }

    pub fn engine(&self) -> &U {
        &self.engine
    }

    pub fn display(&self) -> &D {
        &self.display
    }

    pub fn run(mut self, delay: &mut impl DelayNs) -> ! {
        info!("Render: running every {}ms", self.period_ms);
        loop {
            self.step();
            delay.delay_ms(self.period_ms);
        }
    }
}
