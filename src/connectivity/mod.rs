//! Wireless link lifecycle.
//!
//! ```text
//! ┌──────────────┐  LinkEvent   ┌─────────────────┐  connect()  ┌──────────┐
//! │ WiFi driver  │─────────────▶│ LinkEventQueue  │────────────▶│ Machine  │──▶ LinkPort
//! │ (event task) │  try_send    │ (embassy-sync)  │  one at a   │ (pump)   │
//! └──────────────┘              └─────────────────┘  time       └────┬─────┘
//!                                                                    │ atomics
//!                                                        ┌───────────▼──────────┐
//!                                                        │ ConnectivityStatus   │◀── boot waiter,
//!                                                        └──────────────────────┘    supervisor
//! ```
//!
//! The machine is the only writer of [`ConnectivityStatus`]; everyone else
//! reads it and tolerates stale values.

pub mod credentials;
pub mod machine;
pub mod pump;

use core::sync::atomic::{AtomicBool, AtomicU8, AtomicU32, Ordering};
use core::time::Duration;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use embassy_sync::signal::Signal;
use futures_lite::future;
use log::{info, warn};

pub use credentials::{Credentials, load_credentials, store_credentials};
pub use machine::{ConnectivityMachine, ReconnectPolicy};

// ---------------------------------------------------------------------------
// State and events
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ConnectivityState {
    Disconnected = 0,
    Connecting = 1,
    Connected = 2,
}

impl ConnectivityState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            1 => Self::Connecting,
            2 => Self::Connected,
            _ => Self::Disconnected,
        }
    }
}

/// Notification from the wireless stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkEvent {
    /// Radio is up in station mode.
    Started,
    /// Association lost or a connect attempt failed.
    Disconnected,
    /// DHCP lease obtained.
    IpAcquired,
}

/// Pending link events. Producers `try_send` from the driver's event
/// context; the connectivity pump is the single consumer.
pub const LINK_QUEUE_DEPTH: usize = 8;

pub type LinkEventQueue = Channel<CriticalSectionRawMutex, LinkEvent, LINK_QUEUE_DEPTH>;

/// Push an event from the driver context. Returns `false` if dropped.
pub fn post_event(queue: &LinkEventQueue, event: LinkEvent) -> bool {
    if queue.try_send(event).is_err() {
        warn!("Link: event queue full, dropping {:?}", event);
        return false;
    }
    true
}

// ---------------------------------------------------------------------------
// Shared status
// ---------------------------------------------------------------------------

/// Cross-task view of the link. Written only by the connectivity machine.
pub struct ConnectivityStatus {
    state: AtomicU8,
    connect_attempts: AtomicU32,
    ever_connected: AtomicBool,
    /// Raised on every transition into `Connected`; the boot waiter parks on it.
    came_up: Signal<CriticalSectionRawMutex, ()>,
}

impl Default for ConnectivityStatus {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectivityStatus {
    pub const fn new() -> Self {
        Self {
            state: AtomicU8::new(ConnectivityState::Disconnected as u8),
            connect_attempts: AtomicU32::new(0),
            ever_connected: AtomicBool::new(false),
            came_up: Signal::new(),
        }
    }

    pub fn state(&self) -> ConnectivityState {
        ConnectivityState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectivityState::Connected
    }

    /// Latched on the first `IpAcquired`; never cleared.
    pub fn has_connected(&self) -> bool {
        self.ever_connected.load(Ordering::Acquire)
    }

    pub fn connect_attempts(&self) -> u32 {
        self.connect_attempts.load(Ordering::Relaxed)
    }

    pub(crate) fn set_state(&self, state: ConnectivityState) {
        if state == ConnectivityState::Connected {
            self.ever_connected.store(true, Ordering::Release);
        }
        self.state.store(state as u8, Ordering::Release);
        if state == ConnectivityState::Connected {
            self.came_up.signal(());
        }
    }

    pub(crate) fn record_attempt(&self) {
        self.connect_attempts.fetch_add(1, Ordering::Relaxed);
    }
}

/// Block for at most `wait_ms` until the first connection is made.
///
/// Parks on the status signal raced against a reactor timer, so the caller
/// wakes as soon as the machine reports `Connected`. Returns whether the
/// link came up; expiry is not an error.
pub fn wait_for_first_connection(status: &ConnectivityStatus, wait_ms: u32) -> bool {
    if status.has_connected() {
        return true;
    }

    let started = std::time::Instant::now();
    let up = future::block_on(future::or(
        async {
            status.came_up.wait().await;
            true
        },
        async {
            async_io_mini::Timer::after(Duration::from_millis(u64::from(wait_ms))).await;
            false
        },
    )) || status.has_connected();

    if up {
        info!("Link: connected after {}ms", started.elapsed().as_millis());
    }
    up
}
