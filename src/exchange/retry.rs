use std::future::Future;

use anyhow::Result;
use rand::Rng;
use serde_json::json;
use tokio::time::{sleep, Duration};

use crate::logging::{log, obj, v_str, Domain, Level};

/// Exponential backoff: the wait before retry `n` is `base_delay_ms * 2^n`,
/// capped at `max_delay_ms`, then spread by `± jitter_factor`.
#[derive(Clone, Debug)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub jitter_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 100,
            max_delay_ms: 5000,
            jitter_factor: 0.3,
        }
    }
}

impl RetryConfig {
    /// Three attempts, waiting 2s then 4s. Market buys right after a
    /// deposit fail until the funds settle, so the waits are long and flat.
    pub fn market_order() -> Self {
        Self {
            max_retries: 2,
            base_delay_ms: 2000,
            max_delay_ms: 16_000,
            jitter_factor: 0.0,
        }
    }

    pub fn attempts(&self) -> u32 {
        self.max_retries + 1
    }

    pub fn delay_before_retry(&self, retry: u32) -> Duration {
        let doubled = self.base_delay_ms.saturating_mul(1u64 << retry.min(32));
        let capped = doubled.min(self.max_delay_ms) as f64;
        let spread = capped * self.jitter_factor;
        let ms = if spread > 0.0 {
            capped + rand::thread_rng().gen_range(-spread..=spread)
        } else {
            capped
        };
        Duration::from_millis(ms.max(0.0) as u64)
    }
}

/// Run `operation` until it succeeds or every attempt is spent, returning
/// the last error. There is no wait after the final attempt.
pub async fn retry_async<F, Fut, T>(config: &RetryConfig, operation_name: &str, mut operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut retry = 0;
    loop {
        let err = match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };
        let mut fields = obj(&[
            ("operation", v_str(operation_name)),
            ("attempt", json!(retry + 1)),
            ("max_attempts", json!(config.attempts())),
            ("msg", v_str(&format!("{:#}", err))),
        ]);
        if retry >= config.max_retries {
            log(Level::Error, Domain::Exec, "retry_exhausted", fields);
            return Err(err);
        }
        let wait = config.delay_before_retry(retry);
        fields.insert("retry_in_ms".to_string(), json!(wait.as_millis() as u64));
        log(Level::Warn, Domain::Exec, "retry", fields);
        sleep(wait).await;
        retry += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn quick(max_retries: u32) -> RetryConfig {
        RetryConfig { max_retries, base_delay_ms: 1, max_delay_ms: 4, jitter_factor: 0.0 }
    }

    #[test]
    fn test_backoff_doubles_then_caps() {
        let cfg = RetryConfig { max_retries: 5, base_delay_ms: 250, max_delay_ms: 1500, jitter_factor: 0.0 };
        let waits: Vec<u64> = (0..5).map(|n| cfg.delay_before_retry(n).as_millis() as u64).collect();
        assert_eq!(waits, vec![250, 500, 1000, 1500, 1500]);
    }

    #[test]
    fn test_jitter_stays_in_band() {
        let cfg = RetryConfig { max_retries: 1, base_delay_ms: 1000, max_delay_ms: 1000, jitter_factor: 0.1 };
        for _ in 0..50 {
            let ms = cfg.delay_before_retry(0).as_millis();
            assert!((900..=1100).contains(&ms), "{}", ms);
        }
    }

    #[test]
    fn test_market_order_schedule() {
        let cfg = RetryConfig::market_order();
        assert_eq!(cfg.attempts(), 3);
        assert_eq!(cfg.delay_before_retry(0), Duration::from_secs(2));
        assert_eq!(cfg.delay_before_retry(1), Duration::from_secs(4));
    }

    #[tokio::test]
    async fn test_first_success_is_returned() {
        let calls = AtomicU32::new(0);
        let out = retry_async(&quick(3), "ping", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok("pong") }
        })
        .await
        .unwrap();
        assert_eq!(out, "pong");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_succeeds_on_last_attempt() {
        let calls = AtomicU32::new(0);
        let out = retry_async(&quick(2), "market_buy", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(anyhow!("Insufficient funds"))
                } else {
                    Ok(n)
                }
            }
        })
        .await
        .unwrap();
        assert_eq!(out, 2);
    }

    #[tokio::test]
    async fn test_gives_up_with_last_error() {
        let calls = AtomicU32::new(0);
        let err = retry_async(&quick(2), "market_buy", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move { Err::<(), _>(anyhow!("failure {}", n)) }
        })
        .await
        .unwrap_err();
        assert_eq!(err.to_string(), "failure 2");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
