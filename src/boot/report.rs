use log::{info, warn};
use serde::Serialize;

use super::BootStage;
use crate::config::SystemConfig;
use crate::connectivity::ConnectivityStatus;
use crate::health::{LogMedium, SystemHealth};

/// Result of a successful boot: the frozen health record, the config that
/// was in force, and the stages that ran.
#[derive(Debug, Clone)]
pub struct BootReport {
    pub health: SystemHealth,
    pub config: SystemConfig,
    pub trace: heapless::Vec<BootStage, { BootStage::COUNT }>,
}

#[derive(Serialize)]
struct BootSummary<'a> {
    health: &'a SystemHealth,
    log_medium: LogMedium,
    stages: &'a [BootStage],
    link_attempts: u32,
}

impl BootReport {
    pub(crate) fn new(
        health: SystemHealth,
        config: SystemConfig,
        trace: heapless::Vec<BootStage, { BootStage::COUNT }>,
    ) -> Self {
        Self {
            health,
            config,
            trace,
        }
    }

    /// One-line JSON summary for the serial log.
    pub fn summary_json(&self, link: &ConnectivityStatus) -> serde_json::Result<String> {
        serde_json::to_string(&BootSummary {
            health: &self.health,
            log_medium: self.health.log_medium(),
            stages: &self.trace,
            link_attempts: link.connect_attempts(),
        })
    }

    pub(crate) fn log(&self, link: &ConnectivityStatus) {
        match self.summary_json(link) {
            Ok(json) => info!("BOOT | {}", json),
            Err(e) => warn!("BOOT | summary unavailable: {}", e),
        }
    }
}
