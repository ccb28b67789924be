//! Sliding-window admission control per caller key.
//!
//! Each key carries two independent timestamp windows (one minute and one
//! hour). A check purges expired timestamps, rejects when either window is
//! full, and otherwise records the request in both windows. The check and the
//! record happen under one lock acquisition, so concurrent requests for the
//! same key can neither overshoot the limit nor be rejected spuriously.
//!
//! State is in-process only. Multi-node deployments need a shared counter
//! store instead.

use std::collections::{HashMap, VecDeque};
use std::net::IpAddr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::RateLimitConfig;

const MINUTE: Duration = Duration::from_secs(60);
const HOUR: Duration = Duration::from_secs(3600);

/// Time source for the limiter.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    origin: Instant,
    offset: Mutex<Duration>,
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl ManualClock {
    pub fn new() -> Self {
        Self { origin: Instant::now(), offset: Mutex::new(Duration::ZERO) }
    }

    pub fn advance(&self, by: Duration) {
        let mut offset = self.offset.lock().unwrap_or_else(PoisonError::into_inner);
        *offset += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        let offset = *self.offset.lock().unwrap_or_else(PoisonError::into_inner);
        self.origin + offset
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowKind {
    Minute,
    Hour,
}

impl WindowKind {
    pub fn length(self) -> Duration {
        match self {
            Self::Minute => MINUTE,
            Self::Hour => HOUR,
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("{window:?} rate limit of {limit} exceeded; retry after {retry_after_secs}s")]
pub struct RateLimitExceeded {
    pub window: WindowKind,
    pub limit: u32,
    pub retry_after_secs: u64,
}

impl RateLimitExceeded {
    pub fn user_message(&self) -> String {
        match self.window {
            WindowKind::Minute => format!(
                "Rate limit exceeded. Try again in {} seconds.",
                self.retry_after_secs
            ),
            WindowKind::Hour => format!(
                "Hourly rate limit exceeded. Try again in {} seconds.",
                self.retry_after_secs
            ),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RateLimitPolicy {
    pub per_minute: u32,
    pub per_hour: u32,
}

impl RateLimitPolicy {
    /// Limits for endpoints that call a model.
    pub const STRICT: Self = Self { per_minute: 5, per_hour: 60 };
    /// Limits for everything else.
    pub const LENIENT: Self = Self { per_minute: 30, per_hour: 500 };

    pub fn ai(config: &RateLimitConfig) -> Self {
        Self { per_minute: config.ai_per_minute, per_hour: config.ai_per_hour }
    }

    pub fn general(config: &RateLimitConfig) -> Self {
        Self { per_minute: config.general_per_minute, per_hour: config.general_per_hour }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct WindowUsage {
    pub used: u32,
    pub limit: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Usage {
    pub minute: WindowUsage,
    pub hour: WindowUsage,
}

#[derive(Debug, Default)]
struct KeyWindows {
    minute: VecDeque<Instant>,
    hour: VecDeque<Instant>,
}

impl KeyWindows {
    fn purge(&mut self, now: Instant) {
        purge_window(&mut self.minute, now, MINUTE);
        purge_window(&mut self.hour, now, HOUR);
    }

    fn is_idle(&self) -> bool {
        self.minute.is_empty() && self.hour.is_empty()
    }
}

fn purge_window(window: &mut VecDeque<Instant>, now: Instant, length: Duration) {
    while let Some(&oldest) = window.front() {
        if now.saturating_duration_since(oldest) >= length {
            window.pop_front();
        } else {
            break;
        }
    }
}

fn count_live(window: &VecDeque<Instant>, now: Instant, length: Duration) -> u32 {
    let live = window.iter().filter(|&&t| now.saturating_duration_since(t) < length).count();
    u32::try_from(live).unwrap_or(u32::MAX)
}

fn retry_after(oldest: Instant, now: Instant, length: Duration) -> u64 {
    let remaining = length.saturating_sub(now.saturating_duration_since(oldest));
    let secs = remaining.as_secs() + u64::from(remaining.subsec_nanos() > 0);
    secs.max(1)
}

/// Shorten a caller key for log output.
fn redact_key(key: &str) -> String {
    let prefix: String = key.chars().take(8).collect();
    format!("{prefix}...")
}

#[derive(Clone)]
pub struct RateLimiter {
    policy: RateLimitPolicy,
    clock: Arc<dyn Clock>,
    entries: Arc<Mutex<HashMap<String, KeyWindows>>>,
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("policy", &self.policy)
            .field("tracked_keys", &self.tracked_keys())
            .finish()
    }
}

impl RateLimiter {
    pub fn new(policy: RateLimitPolicy, clock: Arc<dyn Clock>) -> Self {
        Self { policy, clock, entries: Arc::new(Mutex::new(HashMap::new())) }
    }

    pub fn with_system_clock(policy: RateLimitPolicy) -> Self {
        Self::new(policy, Arc::new(SystemClock))
    }

    pub fn policy(&self) -> RateLimitPolicy {
        self.policy
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, KeyWindows>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Admit one request for `key`, or report how long the caller must wait.
    pub fn check(&self, key: &str) -> Result<(), RateLimitExceeded> {
        let now = self.clock.now();
        let mut entries = self.entries();
        let windows = entries.entry(key.to_string()).or_default();

        windows.purge(now);

        let minute_used = windows.minute.len();
        if minute_used >= self.policy.per_minute as usize {
            let oldest = windows.minute.front().copied().unwrap_or(now);
            let exceeded = RateLimitExceeded {
                window: WindowKind::Minute,
                limit: self.policy.per_minute,
                retry_after_secs: retry_after(oldest, now, MINUTE),
            };
            warn!(
                event_name = "rate_limit.exceeded",
                window = "minute",
                key = %redact_key(key),
                used = minute_used,
                limit = self.policy.per_minute,
                retry_after_secs = exceeded.retry_after_secs,
                "rate limit exceeded (per-minute)"
            );
            return Err(exceeded);
        }

        let hour_used = windows.hour.len();
        if hour_used >= self.policy.per_hour as usize {
            let oldest = windows.hour.front().copied().unwrap_or(now);
            let exceeded = RateLimitExceeded {
                window: WindowKind::Hour,
                limit: self.policy.per_hour,
                retry_after_secs: retry_after(oldest, now, HOUR),
            };
            warn!(
                event_name = "rate_limit.exceeded",
                window = "hour",
                key = %redact_key(key),
                used = hour_used,
                limit = self.policy.per_hour,
                retry_after_secs = exceeded.retry_after_secs,
                "rate limit exceeded (per-hour)"
            );
            return Err(exceeded);
        }

        windows.minute.push_back(now);
        windows.hour.push_back(now);
        Ok(())
    }

    /// Current usage for `key`. Does not record a request or purge state.
    pub fn get_remaining(&self, key: &str) -> Usage {
        let now = self.clock.now();
        let entries = self.entries();
        let (minute_used, hour_used) = entries
            .get(key)
            .map(|windows| {
                (count_live(&windows.minute, now, MINUTE), count_live(&windows.hour, now, HOUR))
            })
            .unwrap_or((0, 0));

        Usage {
            minute: WindowUsage { used: minute_used, limit: self.policy.per_minute },
            hour: WindowUsage { used: hour_used, limit: self.policy.per_hour },
        }
    }

    /// Drop keys with no live timestamps in either window. Returns how many were removed.
    pub fn evict_idle(&self) -> usize {
        let now = self.clock.now();
        let mut entries = self.entries();
        let before = entries.len();
        entries.retain(|_, windows| {
            windows.purge(now);
            !windows.is_idle()
        });
        let evicted = before - entries.len();
        if evicted > 0 {
            debug!(
                event_name = "rate_limit.evicted",
                evicted,
                remaining = entries.len(),
                "evicted idle rate limit keys"
            );
        }
        evicted
    }

    pub fn tracked_keys(&self) -> usize {
        self.entries().len()
    }
}

/// Rate-limit subject: the authenticated user when known, else the client IP.
///
/// The first `X-Forwarded-For` entry wins over the socket address.
pub fn caller_key(
    user_id: Option<&str>,
    forwarded_for: Option<&str>,
    peer: Option<IpAddr>,
) -> String {
    if let Some(user_id) = user_id.map(str::trim).filter(|id| !id.is_empty()) {
        return format!("user:{user_id}");
    }

    let forwarded = forwarded_for
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty());

    match (forwarded, peer) {
        (Some(ip), _) => format!("ip:{ip}"),
        (None, Some(addr)) => format!("ip:{addr}"),
        (None, None) => "ip:unknown".to_string(),
    }
}
