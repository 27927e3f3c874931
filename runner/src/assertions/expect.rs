//! Auto-retrying assertion helper.
//!
//! The automation layer is eventually consistent: an element may become
//! visible, or a URL may change, a few hundred milliseconds after the action
//! that caused it. Assertions therefore probe repeatedly until they hold or
//! the timeout elapses, and report the last observed value on failure.

use std::future::Future;
use std::time::Duration;

use serde_json::Value;
use tokio::time::{sleep, Instant};

use crate::browser::PageError;
use crate::config::EngineConfig;

/// Result of one probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Check {
    Pass,
    /// Did not hold; carries what was actually observed.
    Fail(String),
}

impl Check {
    pub fn from_bool(holds: bool, actual: impl Into<String>) -> Self {
        if holds {
            Self::Pass
        } else {
            Self::Fail(actual.into())
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Expect {
    pub timeout: Duration,
    pub poll_interval: Duration,
}

impl Expect {
    pub fn new(timeout: Duration, poll_interval: Duration) -> Self {
        Self {
            timeout,
            poll_interval,
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.expect_timeout, config.poll_interval)
    }

    /// Applies `expectOptions` (currently only `timeout`, in ms).
    pub fn with_options(mut self, options: Option<&Value>) -> Self {
        if let Some(ms) = options.and_then(|o| o.get("timeout")).and_then(Value::as_u64) {
            self.timeout = Duration::from_millis(ms);
        }
        self
    }

    /// Probes until `probe` passes or the timeout elapses. Page errors count
    /// as a failed probe (the element may not exist yet). On timeout returns
    /// the last observation.
    pub async fn poll<F, Fut>(&self, mut probe: F) -> Result<(), String>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Check, PageError>>,
    {
        let deadline = Instant::now() + self.timeout;
        loop {
            let observed = match probe().await {
                Ok(Check::Pass) => return Ok(()),
                Ok(Check::Fail(actual)) => actual,
                Err(e) => e.to_string(),
            };

            let now = Instant::now();
            if now >= deadline {
                return Err(observed);
            }
            sleep(self.poll_interval.min(deadline - now)).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn test_poll_passes_after_retries() {
        let expect = Expect::new(Duration::from_millis(500), Duration::from_millis(5));
        let attempts = AtomicU32::new(0);
        let attempts = &attempts;

        let result = expect
            .poll(move || async move {
                let n = attempts.fetch_add(1, Ordering::SeqCst);
                Ok(Check::from_bool(n >= 2, format!("attempt {}", n)))
            })
            .await;

        assert!(result.is_ok());
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_poll_reports_last_observation() {
        let expect = Expect::new(Duration::from_millis(30), Duration::from_millis(5));
        let result = expect
            .poll(|| async { Ok(Check::Fail("still hidden".to_string())) })
            .await;
        assert_eq!(result.unwrap_err(), "still hidden");
    }

    #[tokio::test]
    async fn test_zero_timeout_probes_once() {
        let expect = Expect::new(Duration::ZERO, Duration::from_millis(5));
        let attempts = AtomicU32::new(0);
        let attempts = &attempts;
        let result = expect
            .poll(move || async move {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err(PageError::NotFound("#missing".to_string()))
            })
            .await;
        assert!(result.unwrap_err().contains("#missing"));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_expect_options_override_timeout() {
        let expect = Expect::new(Duration::from_secs(5), Duration::from_millis(100))
            .with_options(Some(&serde_json::json!({ "timeout": 250 })));
        assert_eq!(expect.timeout, Duration::from_millis(250));
    }
}
