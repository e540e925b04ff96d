//! Rollback windows for the optimistic session fields.
//!
//! DESIGN
//! ======
//! Each optimistic field reverts to the persisted value if the push source
//! neither confirms nor contradicts it within its window. The windows default
//! to 10 seconds and can be widened per deployment for high-latency networks.

#[cfg(test)]
#[path = "config_test.rs"]
mod config_test;

use std::time::Duration;

pub const DEFAULT_INSTANCE_ROLLBACK_MS: u64 = 10_000;
pub const DEFAULT_PAGE_ROLLBACK_MS: u64 = 10_000;
pub const DEFAULT_PAGE_START_ROLLBACK_MS: u64 = 10_000;

pub const INSTANCE_ROLLBACK_ENV: &str = "MEETING_SYNC_INSTANCE_ROLLBACK_MS";
pub const PAGE_ROLLBACK_ENV: &str = "MEETING_SYNC_PAGE_ROLLBACK_MS";
pub const PAGE_START_ROLLBACK_ENV: &str = "MEETING_SYNC_PAGE_START_ROLLBACK_MS";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SyncConfig {
    /// Window for the optimistic meeting instance (start, conclude, leader change).
    pub instance_rollback: Duration,
    /// Window for the optimistic current page id.
    pub page_rollback: Duration,
    /// Window for the optimistic page start timestamp.
    pub page_start_rollback: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            instance_rollback: Duration::from_millis(DEFAULT_INSTANCE_ROLLBACK_MS),
            page_rollback: Duration::from_millis(DEFAULT_PAGE_ROLLBACK_MS),
            page_start_rollback: Duration::from_millis(DEFAULT_PAGE_START_ROLLBACK_MS),
        }
    }
}

impl SyncConfig {
    /// Read the windows from the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Missing or unparsable values fall
    /// back to the defaults.
    #[must_use]
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let millis = |key: &str, default: u64| Duration::from_millis(env_parse(&lookup, key, default));
        Self {
            instance_rollback: millis(INSTANCE_ROLLBACK_ENV, DEFAULT_INSTANCE_ROLLBACK_MS),
            page_rollback: millis(PAGE_ROLLBACK_ENV, DEFAULT_PAGE_ROLLBACK_MS),
            page_start_rollback: millis(PAGE_START_ROLLBACK_ENV, DEFAULT_PAGE_START_ROLLBACK_MS),
        }
    }

    /// Same window for all three fields.
    #[must_use]
    pub fn uniform(window: Duration) -> Self {
        Self { instance_rollback: window, page_rollback: window, page_start_rollback: window }
    }
}

fn env_parse<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr + Copy,
{
    let Some(raw) = lookup(key) else {
        return default;
    };
    match raw.trim().parse::<T>() {
        Ok(value) => value,
        Err(_) => {
            tracing::warn!(%key, value = %raw, "ignoring unparsable setting");
            default
        }
    }
}
