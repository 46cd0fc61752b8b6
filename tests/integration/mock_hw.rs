//! Recording mocks for every port trait.
//!
//! All mocks append to one shared [`CallLog`] so tests can assert on the
//! global order of hardware interactions across collaborators.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;
use futures_lite::future;
use reptilog::adapters::time::MonotonicClock;
use reptilog::app::ports::{
    Area, ConfigStorePort, DisplayPort, FlushFn, HealthMonitor, LinkPort, PairingPort, Rgb565,
    StoragePort, TimeSyncPort, UiEnginePort, WatchdogPort,
};
use reptilog::config::{DisplayConfig, StorageConfig};
use reptilog::connectivity::pump;
use reptilog::connectivity::{
    ConnectivityMachine, ConnectivityState, ConnectivityStatus, Credentials, LinkEvent,
    LinkEventQueue, ReconnectPolicy,
};
use reptilog::error::{
    DisplayError, LinkError, MountError, PairingError, StoreError, TimeSyncError, WatchdogError,
};
use reptilog::health::SystemHealth;

// ── Call record ───────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Call {
    StoreInit,
    StoreErase,
    DisplayInit,
    DisplayFlush,
    StorageMount,
    LinkConfigure,
    LinkStart,
    LinkConnect,
    ControllerEnable,
    StackEnable,
    TimeSyncStart,
    UiTick,
    UiProcess,
    WatchdogArm,
    WatchdogRegister,
    WatchdogReset,
    HealthSample,
}

#[derive(Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<Call>>>);

#[allow(dead_code)]
impl CallLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, call: Call) {
        self.0.lock().unwrap().push(call);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.0.lock().unwrap().clone()
    }

    pub fn count(&self, call: Call) -> usize {
        self.0.lock().unwrap().iter().filter(|c| **c == call).count()
    }

    pub fn position(&self, call: Call) -> Option<usize> {
        self.0.lock().unwrap().iter().position(|c| *c == call)
    }

    /// Every call made after the first `call`.
    pub fn after(&self, call: Call) -> Vec<Call> {
        let calls = self.calls();
        match calls.iter().position(|c| *c == call) {
            Some(i) => calls[i + 1..].to_vec(),
            None => Vec::new(),
        }
    }
}

// ── Config store ──────────────────────────────────────────────

pub struct MockStore {
    log: CallLog,
    /// Scripted `init` results, consumed front to back; `Ok` once empty.
    pub init_results: VecDeque<Result<(), StoreError>>,
    pub values: HashMap<String, Vec<u8>>,
}

impl MockStore {
    pub fn new(log: &CallLog) -> Self {
        Self {
            log: log.clone(),
            init_results: VecDeque::new(),
            values: HashMap::new(),
        }
    }

    pub fn with_credentials(log: &CallLog, ssid: &str, pass: &str) -> Self {
        let mut store = Self::new(log);
        let creds = Credentials::new(ssid, pass).unwrap();
        reptilog::connectivity::store_credentials(&mut store, &creds).unwrap();
        store
    }
}

impl ConfigStorePort for MockStore {
    fn init(&mut self) -> Result<(), StoreError> {
        self.log.push(Call::StoreInit);
        self.init_results.pop_front().unwrap_or(Ok(()))
    }

    fn erase(&mut self) -> Result<(), StoreError> {
        self.log.push(Call::StoreErase);
        self.values.clear();
        Ok(())
    }

    fn put(&mut self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        self.values.insert(key.to_owned(), value.to_vec());
        Ok(())
    }

    fn get(&self, key: &str, buf: &mut [u8]) -> Result<Option<usize>, StoreError> {
        match self.values.get(key) {
            None => Ok(None),
            Some(v) if v.len() > buf.len() => Err(StoreError::TooLarge),
            Some(v) => {
                buf[..v.len()].copy_from_slice(v);
                Ok(Some(v.len()))
            }
        }
    }
}

// ── Display ───────────────────────────────────────────────────

pub struct MockDisplay {
    log: CallLog,
    pub fail_init: bool,
    pub pixels: usize,
}

impl MockDisplay {
    pub fn new(log: &CallLog) -> Self {
        Self {
            log: log.clone(),
            fail_init: false,
            pixels: 0,
        }
    }
}

impl DisplayPort for MockDisplay {
    fn init(&mut self, _config: &DisplayConfig) -> Result<(), DisplayError> {
        self.log.push(Call::DisplayInit);
        if self.fail_init {
            Err(DisplayError::PanelInitFailed(-1))
        } else {
            Ok(())
        }
    }

    fn flush(&mut self, _area: Area, pixels: &[Rgb565]) {
        self.log.push(Call::DisplayFlush);
        self.pixels += pixels.len();
    }
}

// ── Storage ───────────────────────────────────────────────────

pub struct MockStorage {
    log: CallLog,
    pub result: Result<(), MountError>,
}

impl MockStorage {
    pub fn new(log: &CallLog) -> Self {
        Self {
            log: log.clone(),
            result: Ok(()),
        }
    }
}

impl StoragePort for MockStorage {
    fn mount(&mut self, _config: &StorageConfig) -> Result<(), MountError> {
        self.log.push(Call::StorageMount);
        self.result
    }
}

// ── Link ──────────────────────────────────────────────────────

/// Posts driver events into the queue the way the real WiFi driver would.
pub struct MockLink {
    log: CallLog,
    queue: Arc<LinkEventQueue>,
    /// When false, every connect attempt ends in `Disconnected`.
    pub reachable: AtomicBool,
    /// When true, the driver rejects `connect()` outright and posts nothing.
    pub refuse: AtomicBool,
}

impl MockLink {
    pub fn new(log: &CallLog, queue: &Arc<LinkEventQueue>, reachable: bool) -> Self {
        Self {
            log: log.clone(),
            queue: Arc::clone(queue),
            reachable: AtomicBool::new(reachable),
            refuse: AtomicBool::new(false),
        }
    }

    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }

    pub fn set_refuse(&self, refuse: bool) {
        self.refuse.store(refuse, Ordering::SeqCst);
    }
}

impl LinkPort for MockLink {
    fn configure(&self, _credentials: &Credentials) -> Result<(), LinkError> {
        self.log.push(Call::LinkConfigure);
        Ok(())
    }

    fn start(&self) -> Result<(), LinkError> {
        self.log.push(Call::LinkStart);
        let _ = self.queue.try_send(LinkEvent::Started);
        Ok(())
    }

    fn connect(&self) -> Result<(), LinkError> {
        self.log.push(Call::LinkConnect);
        if self.refuse.load(Ordering::SeqCst) {
            return Err(LinkError::ConnectFailed(-1));
        }
        let event = if self.reachable.load(Ordering::SeqCst) {
            LinkEvent::IpAcquired
        } else {
            LinkEvent::Disconnected
        };
        let _ = self.queue.try_send(event);
        Ok(())
    }
}

/// Link fixture: queue, shared status and a mock link wired together.
pub struct LinkRig {
    pub queue: Arc<LinkEventQueue>,
    pub status: Arc<ConnectivityStatus>,
    pub link: Arc<MockLink>,
}

#[allow(dead_code)]
impl LinkRig {
    pub fn new(log: &CallLog, reachable: bool) -> Self {
        let queue = Arc::new(LinkEventQueue::new());
        let link = Arc::new(MockLink::new(log, &queue, reachable));
        Self {
            queue,
            status: Arc::new(ConnectivityStatus::new()),
            link,
        }
    }

    pub fn machine(&self, policy: ReconnectPolicy) -> ConnectivityMachine<MockLink> {
        ConnectivityMachine::new(Arc::clone(&self.link), Arc::clone(&self.status), policy)
    }

    /// Run the real link pump for `policy` on its own thread until the
    /// returned handle is dropped.
    pub fn spawn_pump(&self, policy: ReconnectPolicy) -> PumpThread {
        let machine = self.machine(policy);
        let queue = Arc::clone(&self.queue);
        let stop = Arc::new(Signal::new());
        let handle = {
            let stop = Arc::clone(&stop);
            std::thread::spawn(move || {
                let clock = MonotonicClock::new();
                future::block_on(future::or(pump::run(machine, &queue, &clock), stop.wait()));
            })
        };
        PumpThread {
            stop,
            handle: Some(handle),
        }
    }

    pub fn state(&self) -> ConnectivityState {
        self.status.state()
    }
}

/// The pump task of the device, stopped and joined on drop.
pub struct PumpThread {
    stop: Arc<Signal<CriticalSectionRawMutex, ()>>,
    handle: Option<JoinHandle<()>>,
}

impl Drop for PumpThread {
    fn drop(&mut self) {
        self.stop.signal(());
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

// ── Pairing / time sync ───────────────────────────────────────

pub struct MockPairing {
    log: CallLog,
    pub fail_controller: bool,
}

impl MockPairing {
    pub fn new(log: &CallLog) -> Self {
        Self {
            log: log.clone(),
            fail_controller: false,
        }
    }
}

impl PairingPort for MockPairing {
    fn enable_controller(&mut self) -> Result<(), PairingError> {
        self.log.push(Call::ControllerEnable);
        if self.fail_controller {
            Err(PairingError::ControllerFailed(-1))
        } else {
            Ok(())
        }
    }

    fn enable_stack(&mut self) -> Result<(), PairingError> {
        self.log.push(Call::StackEnable);
        Ok(())
    }
}

pub struct MockTimeSync {
    log: CallLog,
    pub server: Option<String>,
}

impl MockTimeSync {
    pub fn new(log: &CallLog) -> Self {
        Self {
            log: log.clone(),
            server: None,
        }
    }
}

impl TimeSyncPort for MockTimeSync {
    fn start(&mut self, server: &str) -> Result<(), TimeSyncError> {
        self.log.push(Call::TimeSyncStart);
        if server.is_empty() {
            return Err(TimeSyncError::InvalidServer);
        }
        self.server = Some(server.to_owned());
        Ok(())
    }
}

// ── UI engine ─────────────────────────────────────────────────

/// Emits one full-screen flush per processed frame.
pub struct MockUi {
    log: CallLog,
    pub elapsed_ms: u64,
    pub screen: Area,
}

impl MockUi {
    pub fn new(log: &CallLog) -> Self {
        Self {
            log: log.clone(),
            elapsed_ms: 0,
            screen: Area {
                x1: 0,
                y1: 0,
                x2: 9,
                y2: 9,
            },
        }
    }
}

impl UiEnginePort for MockUi {
    fn inject_tick(&mut self, elapsed_ms: u32) {
        self.log.push(Call::UiTick);
        self.elapsed_ms += u64::from(elapsed_ms);
    }

    fn process_pending(&mut self, flush: &mut FlushFn<'_>) {
        self.log.push(Call::UiProcess);
        let pixels = vec![0u16; self.screen.pixel_count()];
        let _ready = flush(self.screen, &pixels);
    }
}

// ── Watchdog / monitor ────────────────────────────────────────

pub struct MockWatchdog {
    log: CallLog,
    pub resets: u32,
}

impl MockWatchdog {
    pub fn new(log: &CallLog) -> Self {
        Self {
            log: log.clone(),
            resets: 0,
        }
    }
}

impl WatchdogPort for MockWatchdog {
    fn arm(&mut self, _timeout_secs: u32) -> Result<(), WatchdogError> {
        self.log.push(Call::WatchdogArm);
        Ok(())
    }

    fn register_current_context(&mut self) -> Result<(), WatchdogError> {
        self.log.push(Call::WatchdogRegister);
        Ok(())
    }

    fn reset(&mut self) {
        self.log.push(Call::WatchdogReset);
        self.resets += 1;
    }
}

pub struct MockMonitor {
    log: CallLog,
    pub seen: Vec<(SystemHealth, ConnectivityState)>,
}

impl MockMonitor {
    pub fn new(log: &CallLog) -> Self {
        Self {
            log: log.clone(),
            seen: Vec::new(),
        }
    }
}

impl HealthMonitor for MockMonitor {
    fn sample(&mut self, health: &SystemHealth, link: ConnectivityState) {
        self.log.push(Call::HealthSample);
        self.seen.push((*health, link));
    }
}
