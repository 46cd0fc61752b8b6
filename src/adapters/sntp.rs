//! SNTP time-sync adapter.
//!
//! Implements [`TimeSyncPort`] as fire-and-forget: the client is started in
//! poll mode and left to discipline the system clock in the background.
//! Nothing waits for the first sync; [`ClockPort`](crate::app::ports::ClockPort)
//! readers see `None` until it lands.

use log::info;

use crate::app::ports::TimeSyncPort;
use crate::error::TimeSyncError;

#[cfg(target_os = "espidf")]
use esp_idf_svc::sntp::{EspSntp, OperatingMode, SntpConf, SyncMode};

pub struct SntpClient {
    /// Dropping the client stops synchronisation.
    #[cfg(target_os = "espidf")]
    sntp: Option<EspSntp<'static>>,
    server: heapless::String<32>,
}

impl Default for SntpClient {
    fn default() -> Self {
        Self::new()
    }
}

impl SntpClient {
    pub fn new() -> Self {
        Self {
            #[cfg(target_os = "espidf")]
            sntp: None,
            server: heapless::String::new(),
        }
    }

    /// Server the client was started with, empty before `start`.
    pub fn server(&self) -> &str {
        &self.server
    }
}

impl TimeSyncPort for SntpClient {
    fn start(&mut self, server: &str) -> Result<(), TimeSyncError> {
        let name = server.trim();
        if name.is_empty() {
            return Err(TimeSyncError::InvalidServer);
        }
        self.server.clear();
        self.server
            .push_str(name)
            .map_err(|_| TimeSyncError::InvalidServer)?;

        #[cfg(target_os = "espidf")]
        {
            let mut conf = SntpConf {
                operating_mode: OperatingMode::Poll,
                sync_mode: SyncMode::Immediate,
                ..Default::default()
            };
            conf.servers[0] = name;
            let sntp = EspSntp::new(&conf).map_err(|e| TimeSyncError::StartFailed(e.code()))?;
            self.sntp = Some(sntp);
        }

        info!("SNTP: polling {}", name);
        Ok(())
    }
}
