use std::collections::HashMap;

use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;

const MAX_FAILED_ATTEMPTS: u32 = 3;
const BLOCK_HOURS: i64 = 24;

/// Failure threshold and block length applied by a [`LoginThrottle`].
#[derive(Debug, Clone, Copy)]
pub struct ThrottlePolicy {
    pub max_failures: u32,
    pub block_duration: TimeDelta,
}

impl Default for ThrottlePolicy {
    fn default() -> Self {
        ThrottlePolicy {
            max_failures: MAX_FAILED_ATTEMPTS,
            block_duration: TimeDelta::hours(BLOCK_HOURS),
        }
    }
}

/// Bookkeeping for one IP that has failed to log in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptRecord {
    pub ip: String,
    pub failure_count: u32,
    pub last_attempt: DateTime<Utc>,
    pub blocked_until: Option<DateTime<Utc>>,
}

impl AttemptRecord {
    fn is_blocked_at(&self, now: DateTime<Utc>) -> bool {
        self.blocked_until.is_some_and(|until| until > now)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BlockedIp {
    pub ip: String,
    pub blocked_until: DateTime<Utc>,
    pub remaining_ms: i64,
}

/// Per-IP failed login tracking.
///
/// Only a successful login clears an IP's failure count. Reaching the
/// threshold blocks the IP for a fixed duration, and the record is kept
/// afterwards so the count carries over once the block expires.
pub struct LoginThrottle {
    policy: ThrottlePolicy,
    attempts: HashMap<String, AttemptRecord>,
}

impl LoginThrottle {
    pub fn new() -> Self {
        Self::with_policy(ThrottlePolicy::default())
    }

    pub fn with_policy(policy: ThrottlePolicy) -> Self {
        LoginThrottle {
            policy,
            attempts: HashMap::new(),
        }
    }

    pub fn policy(&self) -> ThrottlePolicy {
        self.policy
    }

    pub fn is_blocked(&self, ip: &str, now: DateTime<Utc>) -> bool {
        self.attempts
            .get(ip)
            .is_some_and(|record| record.is_blocked_at(now))
    }

    /// Counts a failed attempt from `ip`.
    ///
    /// Returns the expiry of the block this failure imposed, if any. An
    /// active block is never moved: callers are expected to check
    /// [`is_blocked`](Self::is_blocked) first and skip recording.
    pub fn record_failure(&mut self, ip: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let record = self
            .attempts
            .entry(ip.to_string())
            .or_insert_with(|| AttemptRecord {
                ip: ip.to_string(),
                failure_count: 0,
                last_attempt: now,
                blocked_until: None,
            });

        let already_blocked = record.is_blocked_at(now);
        record.failure_count += 1;
        record.last_attempt = now;

        if record.failure_count >= self.policy.max_failures && !already_blocked {
            let until = now + self.policy.block_duration;
            record.blocked_until = Some(until);
            return Some(until);
        }
        None
    }

    pub fn record_success(&mut self, ip: &str) {
        self.attempts.remove(ip);
    }

    pub fn record(&self, ip: &str) -> Option<AttemptRecord> {
        self.attempts.get(ip).cloned()
    }

    /// Snapshot of every IP still blocked at `now`, ordered by IP.
    pub fn list_blocked(&self, now: DateTime<Utc>) -> Vec<BlockedIp> {
        let mut blocked: Vec<BlockedIp> = self
            .attempts
            .values()
            .filter_map(|record| {
                let until = record.blocked_until.filter(|until| *until > now)?;
                Some(BlockedIp {
                    ip: record.ip.clone(),
                    blocked_until: until,
                    remaining_ms: (until - now).num_milliseconds(),
                })
            })
            .collect();
        blocked.sort_by(|a, b| a.ip.cmp(&b.ip));
        blocked
    }

    /// Drops records that are not blocked and whose last failure is older
    /// than `retention`. Returns the number of records removed.
    pub fn purge_stale(&mut self, now: DateTime<Utc>, retention: TimeDelta) -> usize {
        let before = self.attempts.len();
        self.attempts
            .retain(|_, record| record.is_blocked_at(now) || now - record.last_attempt <= retention);
        before - self.attempts.len()
    }

    pub fn len(&self) -> usize {
        self.attempts.len()
    }
}
