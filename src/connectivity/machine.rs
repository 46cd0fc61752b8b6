//! Connectivity state machine.
//!
//! ```text
//!                 Started
//!  Disconnected ───────────▶ Connecting ◀──────────┐
//!                              │    ▲              │ Disconnected
//!                   IpAcquired │    │ Disconnected │ (link loss)
//!                              ▼    │              │
//!                            Connected ────────────┘
//! ```
//!
//! Transitions are applied one event at a time by the single consumer of
//! the link queue. Every `Disconnected` moves to `Connecting` immediately;
//! the [`ReconnectPolicy`] decides whether `connect()` is issued on the spot
//! or deferred to a deadline serviced by [`ConnectivityMachine::poll`].

use std::sync::Arc;

use log::{debug, info, warn};

use super::{ConnectivityState, ConnectivityStatus, LinkEvent};
use crate::app::ports::LinkPort;

/// Floor for retries after the driver refused a connect request outright.
const REFUSED_RETRY_MS: u32 = 1_000;

// ---------------------------------------------------------------------------
// Retry policy
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconnectPolicy {
    /// One `connect()` per `Disconnected` event, no delay, no cap.
    Immediate,
    /// First retry immediate, then `initial_ms` doubling up to `max_ms`.
    /// After `max_retries` consecutive failures the next retry waits
    /// `cooldown_ms` and the count starts over.
    Backoff {
        initial_ms: u32,
        max_ms: u32,
        max_retries: u32,
        cooldown_ms: u32,
    },
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::Backoff {
            initial_ms: 2_000,
            max_ms: 60_000,
            max_retries: 10,
            cooldown_ms: 300_000,
        }
    }
}

/// When the next `connect()` should go out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPlan {
    pub delay_ms: u32,
    /// The failure streak is exhausted; the counter restarts after this retry.
    pub cooldown: bool,
}

impl ReconnectPolicy {
    /// Plan the retry after the `failures`-th consecutive disconnect (1-based).
    pub fn plan(&self, failures: u32) -> RetryPlan {
        match *self {
            Self::Immediate => RetryPlan { delay_ms: 0, cooldown: false },
            Self::Backoff { initial_ms, max_ms, max_retries, cooldown_ms } => {
                if failures > max_retries {
                    return RetryPlan { delay_ms: cooldown_ms, cooldown: true };
                }
                if failures <= 1 {
                    return RetryPlan { delay_ms: 0, cooldown: false };
                }
                let shift = (failures - 2).min(31);
                let delay = initial_ms.saturating_mul(1u32 << shift).min(max_ms);
                RetryPlan { delay_ms: delay, cooldown: false }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Machine
// ---------------------------------------------------------------------------

pub struct ConnectivityMachine<L: LinkPort> {
    link: Arc<L>,
    status: Arc<ConnectivityStatus>,
    policy: ReconnectPolicy,
    state: ConnectivityState,
    /// Consecutive disconnects since the last `IpAcquired`.
    failures: u32,
    /// Deferred `connect()` deadline (ms since boot).
    retry_at: Option<u64>,
}

impl<L: LinkPort> ConnectivityMachine<L> {
    pub fn new(link: Arc<L>, status: Arc<ConnectivityStatus>, policy: ReconnectPolicy) -> Self {
        status.set_state(ConnectivityState::Disconnected);
        Self {
            link,
            status,
            policy,
            state: ConnectivityState::Disconnected,
            failures: 0,
            retry_at: None,
        }
    }

    pub fn state(&self) -> ConnectivityState {
        self.state
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.failures
    }

    /// Deadline of the deferred reconnect, if one is pending.
    pub fn next_deadline(&self) -> Option<u64> {
        self.retry_at
    }

    /// Apply one link event. Returns `false` when the event does not apply
    /// to the current state and was ignored.
    pub fn handle(&mut self, event: LinkEvent, now_ms: u64) -> bool {
        match (self.state, event) {
            (ConnectivityState::Disconnected, LinkEvent::Started) => {
                self.transition(ConnectivityState::Connecting);
                self.attempt_connect(now_ms);
                true
            }
            (
                ConnectivityState::Connecting | ConnectivityState::Connected,
                LinkEvent::Disconnected,
            ) => {
                if self.state == ConnectivityState::Connected {
                    warn!("Link: connection lost");
                }
                self.transition(ConnectivityState::Connecting);
                self.failures = self.failures.saturating_add(1);
                self.schedule_retry(now_ms, 0);
                true
            }
            (ConnectivityState::Connecting, LinkEvent::IpAcquired) => {
                self.failures = 0;
                self.retry_at = None;
                self.transition(ConnectivityState::Connected);
                true
            }
            (state, event) => {
                debug!("Link: {:?} ignored in {:?}", event, state);
                false
            }
        }
    }

    /// Fire a deferred reconnect whose deadline has passed.
    pub fn poll(&mut self, now_ms: u64) {
        let Some(at) = self.retry_at else {
            return;
        };
        if now_ms < at {
            return;
        }
        self.retry_at = None;
        if self.state == ConnectivityState::Connecting {
            self.attempt_connect(now_ms);
        }
    }

    // -----------------------------------------------------------------------
    // Internal
    // -----------------------------------------------------------------------

    fn transition(&mut self, next: ConnectivityState) {
        if next != self.state {
            info!("Link: {:?} -> {:?}", self.state, next);
        }
        self.state = next;
        self.status.set_state(next);
    }

    /// Plan the next `connect()` after a failure, no sooner than `floor_ms`.
    fn schedule_retry(&mut self, now_ms: u64, floor_ms: u32) {
        // One failure, one pending retry.
        self.retry_at = None;

        let plan = self.policy.plan(self.failures);
        if plan.cooldown {
            warn!(
                "Link: {} consecutive failures, cooling down for {}s",
                self.failures,
                plan.delay_ms / 1000
            );
            self.failures = 0;
        }
        let delay_ms = plan.delay_ms.max(floor_ms);
        if delay_ms == 0 {
            self.attempt_connect(now_ms);
        } else {
            info!("Link: reconnect attempt {} in {}ms", self.failures, delay_ms);
            self.retry_at = Some(now_ms + u64::from(delay_ms));
        }
    }

    fn attempt_connect(&mut self, now_ms: u64) {
        self.status.record_attempt();
        if let Err(e) = self.link.connect() {
            // No event follows a refused request, so it counts as a failure
            // here and goes through the same backoff.
            warn!("Link: connect refused ({})", e);
            self.failures = self.failures.saturating_add(1);
            self.schedule_retry(now_ms, REFUSED_RETRY_MS);
        }
    }
}
