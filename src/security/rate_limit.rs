//! Sliding-window rate limiter.
//!
//! # Algorithm
//! Each client keeps the timestamps of its admitted requests, oldest first.
//! On every evaluation the timestamps that left the trailing window are
//! dropped, then the remaining count decides the outcome:
//!
//! ```text
//! count < max_requests            → Allow (timestamp recorded now)
//! full, soft delay, grace unused  → AllowAfterDelay (timestamp recorded on commit)
//! otherwise                       → Reject (retry when the oldest entry expires)
//! ```
//!
//! # Design Decisions
//! - Window edge is exclusive: a timestamp exactly `window` old is expired
//! - Soft delay is checked before the hard reject and granted once per window
//! - Per-client state lives in a sharded map; the purge/count/append sequence
//!   runs under the shard lock so it is atomic per client
//! - At most `max_requests` timestamps are retained per client

use dashmap::DashMap;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Key used when the caller could not identify the client.
pub const UNKNOWN_CLIENT: &str = "unknown";

/// Limits applied to every client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowPolicy {
    /// Maximum admitted requests inside one window.
    pub max_requests: usize,
    /// Length of the trailing window.
    pub window: Duration,
    /// One-time grace delay granted when the window is full.
    pub soft_delay: Option<Duration>,
}

/// Outcome of a rate-limit evaluation.
#[derive(Debug)]
pub enum Decision {
    Allow,
    /// Proceed after sleeping for `delay`, then call [`GracePermit::commit`].
    AllowAfterDelay { delay: Duration, permit: GracePermit },
    Reject { retry_after: Duration },
}

impl Decision {
    pub fn is_allow(&self) -> bool {
        matches!(self, Decision::Allow)
    }

    pub fn is_reject(&self) -> bool {
        matches!(self, Decision::Reject { .. })
    }
}

#[derive(Debug, Clone, Copy)]
struct Grace {
    id: u64,
    granted_at: Instant,
    pending: bool,
}

#[derive(Debug, Default)]
struct ClientHistory {
    timestamps: VecDeque<Instant>,
    grace: Option<Grace>,
}

impl ClientHistory {
    /// Never let `now` run behind what was already recorded.
    fn clamp(&self, now: Instant) -> Instant {
        match self.timestamps.back() {
            Some(last) if *last > now => *last,
            _ => now,
        }
    }

    fn purge(&mut self, now: Instant, window: Duration) {
        while let Some(oldest) = self.timestamps.front() {
            if *oldest + window <= now {
                self.timestamps.pop_front();
            } else {
                break;
            }
        }
        if let Some(grace) = self.grace {
            if !grace.pending && grace.granted_at + window <= now {
                self.grace = None;
            }
        }
    }

    fn record(&mut self, now: Instant, max_requests: usize) {
        self.timestamps.push_back(now);
        while self.timestamps.len() > max_requests {
            self.timestamps.pop_front();
        }
    }

    fn retry_after(&self, now: Instant, window: Duration) -> Duration {
        self.timestamps
            .front()
            .map(|oldest| (*oldest + window).saturating_duration_since(now))
            .unwrap_or_default()
    }

    fn is_idle(&self) -> bool {
        self.timestamps.is_empty() && self.grace.is_none()
    }
}

type ClientMap = Arc<DashMap<String, ClientHistory>>;

/// In-memory, single-process sliding-window limiter.
#[derive(Debug)]
pub struct RateLimiter {
    policy: WindowPolicy,
    clients: ClientMap,
    next_grant: AtomicU64,
}

impl RateLimiter {
    pub fn new(policy: WindowPolicy) -> Self {
        Self {
            policy,
            clients: Arc::new(DashMap::new()),
            next_grant: AtomicU64::new(0),
        }
    }

    pub fn policy(&self) -> &WindowPolicy {
        &self.policy
    }

    /// Decide whether the client may proceed at `now`.
    ///
    /// Empty keys are bucketed under [`UNKNOWN_CLIENT`].
    pub fn evaluate(&self, key: &str, now: Instant) -> Decision {
        let key = if key.is_empty() { UNKNOWN_CLIENT } else { key };
        let WindowPolicy {
            max_requests,
            window,
            soft_delay,
        } = self.policy;

        let mut entry = self.clients.entry(key.to_string()).or_default();
        let history = entry.value_mut();
        let now = history.clamp(now);
        history.purge(now, window);

        if history.timestamps.len() < max_requests {
            history.record(now, max_requests);
            return Decision::Allow;
        }

        if let Some(delay) = soft_delay {
            if history.grace.is_none() {
                let id = self.next_grant.fetch_add(1, Ordering::Relaxed);
                history.grace = Some(Grace {
                    id,
                    granted_at: now,
                    pending: true,
                });
                return Decision::AllowAfterDelay {
                    delay,
                    permit: GracePermit {
                        clients: Arc::clone(&self.clients),
                        key: key.to_string(),
                        id,
                        policy: self.policy,
                        settled: false,
                    },
                };
            }
        }

        Decision::Reject {
            retry_after: history.retry_after(now, window),
        }
    }

    /// Drop every client whose history has fully aged out.
    ///
    /// Returns the number of clients removed.
    pub fn sweep(&self, now: Instant) -> usize {
        let window = self.policy.window;
        let before = self.clients.len();
        self.clients.retain(|_, history| {
            history.purge(now, window);
            !history.is_idle()
        });
        before.saturating_sub(self.clients.len())
    }

    /// Number of clients currently holding state.
    pub fn tracked_clients(&self) -> usize {
        self.clients.len()
    }

    /// Number of timestamps retained for a client.
    pub fn recorded(&self, key: &str) -> usize {
        self.clients
            .get(key)
            .map(|history| history.timestamps.len())
            .unwrap_or(0)
    }
}

/// The reserved grace slot of an [`Decision::AllowAfterDelay`].
///
/// Committing records the request. Dropping without committing (e.g. the
/// request future was cancelled mid-delay) records nothing and hands the
/// grace back to the client.
#[derive(Debug)]
#[must_use = "dropping the permit abandons the delayed request"]
pub struct GracePermit {
    clients: ClientMap,
    key: String,
    id: u64,
    policy: WindowPolicy,
    settled: bool,
}

impl GracePermit {
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Record the delayed request as admitted at `now`.
    pub fn commit(mut self, now: Instant) {
        self.settled = true;
        let mut entry = self.clients.entry(self.key.clone()).or_default();
        let history = entry.value_mut();
        let now = history.clamp(now);
        history.purge(now, self.policy.window);
        match history.grace.as_mut() {
            Some(grace) if grace.id == self.id => {
                grace.pending = false;
                grace.granted_at = now;
            }
            // The grant was lost to a sweep; still charge the window.
            _ => {
                history.grace = Some(Grace {
                    id: self.id,
                    granted_at: now,
                    pending: false,
                });
            }
        }
        history.record(now, self.policy.max_requests);
    }
}

impl Drop for GracePermit {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        if let Some(mut history) = self.clients.get_mut(&self.key) {
            if history.grace.is_some_and(|grace| grace.id == self.id) {
                history.grace = None;
            }
        }
        self.clients.remove_if(&self.key, |_, history| history.is_idle());
    }
}
