// Copyright (c) James Kassemi, SC, US. All rights reserved.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tokio::time::sleep;

/// Jittered exponential backoff for node-facing calls.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub jitter_pct: f64,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration, max_delay: Duration, jitter_pct: f64) -> Self {
        let base_delay = base_delay.max(Duration::from_millis(1));
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay: max_delay.max(base_delay),
            jitter_pct: jitter_pct.clamp(0.0, 1.0),
        }
    }

    /// Tuned for a ledger node on the local network.
    pub fn default_node() -> Self {
        Self::new(4, Duration::from_millis(200), Duration::from_secs(5), 0.2)
    }

    /// Single attempt, no backoff.
    pub fn no_retry() -> Self {
        Self::new(1, Duration::from_millis(1), Duration::from_millis(1), 0.0)
    }

    fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        let mut millis = (self.base_delay.as_millis() as u64).saturating_mul(factor as u64);
        let cap = self.max_delay.as_millis() as u64;
        if millis > cap {
            millis = cap;
        }
        if self.jitter_pct > 0.0 {
            let spread = (millis as f64 * self.jitter_pct) as i64;
            if spread > 0 {
                let delta = rand::thread_rng().gen_range(-spread..=spread);
                millis = millis.saturating_add_signed(delta);
            }
        }
        Duration::from_millis(millis)
    }

    /// Runs `op` until it succeeds or attempts run out; the final error is
    /// returned unchanged. The closure receives the zero-based attempt index.
    pub async fn run<F, Fut, T, E>(&self, mut op: F) -> Result<T, E>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut attempt = 0;
        loop {
            match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    attempt += 1;
                    if attempt >= self.max_attempts {
                        return Err(err);
                    }
                    sleep(self.delay_for(attempt - 1)).await;
                }
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::default_node()
    }
}
