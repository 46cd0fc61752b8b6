//! Post-boot execution contexts.
//!
//! | Context     | Period | Placement                       | Watchdog      |
//! |-------------|--------|---------------------------------|---------------|
//! | render      | 16 ms  | App core, above the main task   | never touches |
//! | supervisor  | 1 s    | main task (registered context)  | resets        |
//! | link pump   | events | Pro core                        | never touches |
//!
//! Neither task is ever stopped; the only way out is a watchdog reset.

pub mod render;
pub mod supervisor;

pub use render::RenderTask;
pub use supervisor::Supervisor;

use embedded_hal::delay::DelayNs;

use crate::app::ports::{DisplayPort, UiEnginePort};
use crate::drivers::task_pin::{RENDER_TASK, spawn_on_core};

/// Start the render task on its own core.
pub fn spawn_render<U, D, T>(task: RenderTask<U, D>, mut delay: T) -> std::thread::JoinHandle<()>
where
    U: UiEnginePort + Send + 'static,
    D: DisplayPort + Send + 'static,
    T: DelayNs + Send + 'static,
{
    spawn_on_core(&RENDER_TASK, move || {
        task.run(&mut delay);
    })
}
