//! Event pump for the connectivity machine.
//!
//! Runs in a dedicated thread on the protocol core. A single future waits on
//! whichever comes first: the next link event from the queue or the
//! machine's deferred-reconnect deadline (an `async-io-mini` reactor timer,
//! no busy polling).

use core::time::Duration;

use futures_lite::future;
use log::info;

use super::{ConnectivityMachine, LinkEventQueue};
use crate::adapters::time::MonotonicClock;
use crate::app::ports::LinkPort;
use crate::drivers::task_pin::{LINK_PUMP_TASK, spawn_on_core};

/// Apply every queued event without blocking. Returns how many were handled.
pub fn drain<L: LinkPort>(
    machine: &mut ConnectivityMachine<L>,
    queue: &LinkEventQueue,
    now_ms: u64,
) -> usize {
    machine.poll(now_ms);
    let mut handled = 0;
    while let Ok(event) = queue.try_receive() {
        machine.handle(event, now_ms);
        handled += 1;
    }
    handled
}

/// Consume link events forever.
pub async fn run<L: LinkPort>(
    mut machine: ConnectivityMachine<L>,
    queue: &LinkEventQueue,
    clock: &MonotonicClock,
) {
    info!("Link pump started");
    loop {
        machine.poll(clock.uptime_ms());

        let event = match machine.next_deadline() {
            Some(at) => {
                let wait = Duration::from_millis(at.saturating_sub(clock.uptime_ms()));
                future::or(async { Some(queue.receive().await) }, async move {
                    async_io_mini::Timer::after(wait).await;
                    None
                })
                .await
            }
            None => Some(queue.receive().await),
        };

        if let Some(event) = event {
            machine.handle(event, clock.uptime_ms());
        }
    }
}

/// Spawn the pump on the protocol core (co-located with the WiFi stack).
pub fn spawn<L: LinkPort + 'static>(
    machine: ConnectivityMachine<L>,
    queue: &'static LinkEventQueue,
) -> std::thread::JoinHandle<()> {
    spawn_on_core(&LINK_PUMP_TASK, move || {
        let clock = MonotonicClock::new();
        future::block_on(run(machine, queue, &clock));
    })
}
