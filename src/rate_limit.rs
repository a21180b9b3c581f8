use std::{collections::HashMap, sync::Arc, time::Duration};

use chrono::{DateTime, TimeDelta, Utc};
use tokio::{sync::Mutex, task::JoinHandle};
use tracing::debug;

type RateLimitMap = HashMap<String, Vec<DateTime<Utc>>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("rate limit exceeded, retry in {retry_after_seconds}s")]
pub struct RateLimited {
    pub retry_after_seconds: u64,
}

/// Sliding-window request counter keyed by client address.
#[derive(Debug)]
pub struct RateLimiter {
    max_requests: usize,
    window: TimeDelta,
    entries: Mutex<RateLimitMap>,
}

impl RateLimiter {
    pub fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            max_requests,
            window: TimeDelta::from_std(window).unwrap_or(TimeDelta::MAX),
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub async fn check(&self, key: &str) -> Result<(), RateLimited> {
        self.check_at(key, Utc::now()).await
    }

    /// Records a request at `now` unless the key already used its quota for
    /// the window ending at `now`. Rejected requests are not recorded.
    pub async fn check_at(&self, key: &str, now: DateTime<Utc>) -> Result<(), RateLimited> {
        let window_start = self.window_start(now);
        let mut entries = self.entries.lock().await;
        let timestamps = entries.entry(key.to_string()).or_default();
        timestamps.retain(|timestamp| *timestamp > window_start);

        if timestamps.len() >= self.max_requests {
            let reset_at = timestamps
                .iter()
                .min()
                .and_then(|oldest| oldest.checked_add_signed(self.window))
                .unwrap_or(DateTime::<Utc>::MAX_UTC);
            let retry_after_seconds = (reset_at - now).num_seconds().max(1) as u64;
            return Err(RateLimited {
                retry_after_seconds,
            });
        }

        timestamps.push(now);
        Ok(())
    }

    /// Drops timestamps outside the window and forgets idle keys.
    pub async fn prune(&self, now: DateTime<Utc>) -> usize {
        let window_start = self.window_start(now);
        let mut entries = self.entries.lock().await;
        entries.retain(|_, timestamps| {
            timestamps.retain(|timestamp| *timestamp > window_start);
            !timestamps.is_empty()
        });
        entries.len()
    }

    fn window_start(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now.checked_sub_signed(self.window)
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    pub fn spawn_sweeper(self: &Arc<Self>) -> JoinHandle<()> {
        let limiter = Arc::clone(self);
        let period = limiter
            .window
            .to_std()
            .unwrap_or(Duration::from_secs(60))
            .max(Duration::from_secs(1));
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.tick().await;
            loop {
                interval.tick().await;
                let remaining = limiter.prune(Utc::now()).await;
                debug!("Rate limiter sweep done, {remaining} address(es) still tracked");
            }
        })
    }
}
