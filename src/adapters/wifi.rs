//! WiFi station-mode adapter.
//!
//! Implements [`LinkPort`]. Driver events (`STA_START`, `STA_DISCONNECTED`,
//! `STA_GOT_IP`) are translated into [`LinkEvent`]s and pushed into the
//! connectivity queue from the system event task; reconnect decisions
//! belong to the connectivity machine, never to this adapter.
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: `esp_idf_svc::wifi::EspWifi` behind a
//!   mutex, raw `esp_event_handler_register` for event delivery.
//! - **all other targets**: a simulated access point that answers `start`
//!   with `Started` and `connect` with `IpAcquired` (or `Disconnected`).

use log::info;

use crate::app::ports::LinkPort;
use crate::connectivity::{Credentials, LinkEvent, LinkEventQueue, post_event};
use crate::error::LinkError;

#[cfg(target_os = "espidf")]
use std::sync::Mutex;

#[cfg(target_os = "espidf")]
use esp_idf_svc::wifi::{AuthMethod, ClientConfiguration, Configuration, EspWifi};

#[cfg(not(target_os = "espidf"))]
use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

// ───────────────────────────────────────────────────────────────
// ESP-IDF event bridge
// ───────────────────────────────────────────────────────────────

/// Map a raw driver event onto the link vocabulary.
#[cfg(target_os = "espidf")]
fn classify(base: esp_idf_svc::sys::esp_event_base_t, id: i32) -> Option<LinkEvent> {
    use esp_idf_svc::sys::*;
    // SAFETY: the event bases are immutable statics defined by ESP-IDF.
    let (wifi_base, ip_base) = unsafe { (WIFI_EVENT, IP_EVENT) };
    if base == wifi_base && id == wifi_event_t_WIFI_EVENT_STA_START as i32 {
        Some(LinkEvent::Started)
    } else if base == wifi_base && id == wifi_event_t_WIFI_EVENT_STA_DISCONNECTED as i32 {
        Some(LinkEvent::Disconnected)
    } else if base == ip_base && id == ip_event_t_IP_EVENT_STA_GOT_IP as i32 {
        Some(LinkEvent::IpAcquired)
    } else {
        None
    }
}

/// Runs on the system event task. Only enqueues; never blocks.
#[cfg(target_os = "espidf")]
unsafe extern "C" fn on_driver_event(
    arg: *mut core::ffi::c_void,
    base: esp_idf_svc::sys::esp_event_base_t,
    id: i32,
    _data: *mut core::ffi::c_void,
) {
    if arg.is_null() {
        return;
    }
    // SAFETY: `arg` is the `&'static LinkEventQueue` given at registration.
    let queue = unsafe { &*(arg as *const LinkEventQueue) };
    if let Some(event) = classify(base, id) {
        post_event(queue, event);
    }
}

// ───────────────────────────────────────────────────────────────
// WiFi adapter
// ───────────────────────────────────────────────────────────────

pub struct WifiLink {
    #[cfg(target_os = "espidf")]
    wifi: Mutex<EspWifi<'static>>,
    #[cfg(not(target_os = "espidf"))]
    queue: &'static LinkEventQueue,
    #[cfg(not(target_os = "espidf"))]
    ap_reachable: AtomicBool,
    #[cfg(not(target_os = "espidf"))]
    started: AtomicBool,
    #[cfg(not(target_os = "espidf"))]
    sim_connects: AtomicU32,
}

#[cfg(target_os = "espidf")]
impl WifiLink {
    /// Create the driver and route its events into `queue`.
    pub fn new(
        modem: esp_idf_svc::hal::modem::Modem,
        sysloop: esp_idf_svc::eventloop::EspSystemEventLoop,
        nvs: Option<esp_idf_svc::nvs::EspDefaultNvsPartition>,
        queue: &'static LinkEventQueue,
    ) -> Result<Self, LinkError> {
        use esp_idf_svc::sys::*;

        let wifi = EspWifi::new(modem, sysloop, nvs)
            .map_err(|e| LinkError::StartFailed(e.code()))?;

        let arg = queue as *const LinkEventQueue as *mut core::ffi::c_void;
        // SAFETY: the handler only reads `arg`, which is 'static.
        unsafe {
            for base in [WIFI_EVENT, IP_EVENT] {
                let ret =
                    esp_event_handler_register(base, ESP_EVENT_ANY_ID, Some(on_driver_event), arg);
                if ret != ESP_OK as i32 {
                    return Err(LinkError::StartFailed(ret));
                }
            }
        }

        info!("WiFi: driver created, events routed to link queue");
        Ok(Self {
            wifi: Mutex::new(wifi),
        })
    }

    fn with_wifi<T>(
        &self,
        f: impl FnOnce(&mut EspWifi<'static>) -> Result<T, LinkError>,
    ) -> Result<T, LinkError> {
        // A poisoned lock only means another caller panicked mid-call; the
        // driver itself is still consistent.
        let mut wifi = self.wifi.lock().unwrap_or_else(|p| p.into_inner());
        f(&mut wifi)
    }
}

#[cfg(target_os = "espidf")]
impl LinkPort for WifiLink {
    fn configure(&self, credentials: &Credentials) -> Result<(), LinkError> {
        let auth_method = if credentials.is_open() {
            AuthMethod::None
        } else {
            AuthMethod::WPA2Personal
        };
        let mut ssid = heapless::String::<32>::new();
        let mut password = heapless::String::<64>::new();
        ssid.push_str(credentials.ssid())
            .map_err(|_| LinkError::ConfigRejected(-1))?;
        password
            .push_str(credentials.passphrase())
            .map_err(|_| LinkError::ConfigRejected(-1))?;

        self.with_wifi(|wifi| {
            wifi.set_configuration(&Configuration::Client(ClientConfiguration {
                ssid,
                password,
                auth_method,
                ..Default::default()
            }))
            .map_err(|e| LinkError::ConfigRejected(e.code()))
        })?;
        info!("WiFi: configured for '{}'", credentials.ssid());
        Ok(())
    }

    fn start(&self) -> Result<(), LinkError> {
        self.with_wifi(|wifi| wifi.start().map_err(|e| LinkError::StartFailed(e.code())))?;
        info!("WiFi: station started");
        Ok(())
    }

    fn connect(&self) -> Result<(), LinkError> {
        self.with_wifi(|wifi| wifi.connect().map_err(|e| LinkError::ConnectFailed(e.code())))
    }
}

// ── Simulation ────────────────────────────────────────────────

#[cfg(not(target_os = "espidf"))]
impl WifiLink {
    pub fn new(queue: &'static LinkEventQueue) -> Self {
        info!("WiFi(sim): simulated access point");
        Self {
            queue,
            ap_reachable: AtomicBool::new(true),
            started: AtomicBool::new(false),
            sim_connects: AtomicU32::new(0),
        }
    }

    /// Make the simulated access point (un)reachable.
    pub fn set_ap_reachable(&self, reachable: bool) {
        self.ap_reachable.store(reachable, Ordering::Relaxed);
    }

    pub fn sim_connects(&self) -> u32 {
        self.sim_connects.load(Ordering::Relaxed)
    }
}

#[cfg(not(target_os = "espidf"))]
impl LinkPort for WifiLink {
    fn configure(&self, credentials: &Credentials) -> Result<(), LinkError> {
        info!("WiFi(sim): configured for '{}'", credentials.ssid());
        Ok(())
    }

    fn start(&self) -> Result<(), LinkError> {
        self.started.store(true, Ordering::Release);
        post_event(self.queue, LinkEvent::Started);
        Ok(())
    }

    fn connect(&self) -> Result<(), LinkError> {
        if !self.started.load(Ordering::Acquire) {
            return Err(LinkError::NotStarted);
        }
        let n = self.sim_connects.fetch_add(1, Ordering::Relaxed) + 1;
        let event = if self.ap_reachable.load(Ordering::Relaxed) {
            LinkEvent::IpAcquired
        } else {
            LinkEvent::Disconnected
        };
        info!("WiFi(sim): connect #{} -> {:?}", n, event);
        post_event(self.queue, event);
        Ok(())
    }
}
