//! Wait-until-terminal loops for asynchronous OpenAI resources.

use std::future::Future;
use std::time::Duration;

use super::types::OpenAiError;

/// Header OpenAI sets on status responses to suggest the next poll delay.
pub const POLL_AFTER_HEADER: &str = "openai-poll-after-ms";

/// Timing applied to a polling loop.
#[derive(Debug, Clone, Copy)]
pub struct PollPolicy {
    /// Delay between polls when the provider gives no hint.
    pub interval: Duration,
    /// Deadline for the whole loop.
    pub timeout: Duration,
}

/// A fetched resource together with the provider's suggested wait before the next fetch.
#[derive(Debug, Clone)]
pub struct Polled<T> {
    /// Latest observed state.
    pub value: T,
    /// Delay parsed from `openai-poll-after-ms`, if present.
    pub retry_after: Option<Duration>,
}

/// Fetch `resource` repeatedly until `is_terminal` accepts it or the policy deadline elapses.
///
/// The terminal value is returned as-is; callers decide whether it represents success.
pub async fn poll_until<T, F, Fut, P>(
    resource: &str,
    policy: PollPolicy,
    mut fetch: F,
    is_terminal: P,
) -> Result<T, OpenAiError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Polled<T>, OpenAiError>>,
    P: Fn(&T) -> bool,
{
    let mut attempts = 0u32;
    let outcome = tokio::time::timeout(policy.timeout, async {
        loop {
            attempts += 1;
            let Polled { value, retry_after } = fetch().await?;
            if is_terminal(&value) {
                return Ok(value);
            }
            let delay = retry_after.unwrap_or(policy.interval);
            tracing::trace!(resource, attempts, delay_ms = delay.as_millis() as u64, "Still waiting");
            tokio::time::sleep(delay).await;
        }
    })
    .await;

    match outcome {
        Ok(result) => {
            tracing::debug!(resource, attempts, "Polling finished");
            result
        }
        Err(_) => {
            tracing::warn!(resource, attempts, timeout_secs = policy.timeout.as_secs(), "Polling timed out");
            Err(OpenAiError::PollTimeout {
                resource: resource.to_string(),
                waited: policy.timeout,
            })
        }
    }
}

/// Parse the provider's poll hint from response headers.
pub(crate) fn retry_after(headers: &reqwest::header::HeaderMap) -> Option<Duration> {
    headers
        .get(POLL_AFTER_HEADER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<u64>().ok())
        .map(Duration::from_millis)
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::{HeaderMap, HeaderValue};
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_policy(timeout: Duration) -> PollPolicy {
        PollPolicy {
            interval: Duration::from_millis(5),
            timeout,
        }
    }

    #[tokio::test]
    async fn returns_first_terminal_value() {
        let calls = AtomicU32::new(0);
        let result = poll_until(
            "counter",
            fast_policy(Duration::from_secs(5)),
            || {
                let seen = calls.fetch_add(1, Ordering::SeqCst) + 1;
                async move {
                    Ok(Polled {
                        value: seen,
                        retry_after: None,
                    })
                }
            },
            |value: &u32| *value >= 3,
        )
        .await
        .expect("poll completes");

        assert_eq!(result, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn times_out_when_never_terminal() {
        let err = poll_until(
            "stuck resource",
            fast_policy(Duration::from_millis(50)),
            || async {
                Ok(Polled {
                    value: (),
                    retry_after: None,
                })
            },
            |_| false,
        )
        .await
        .expect_err("poll should time out");

        match err {
            OpenAiError::PollTimeout { resource, .. } => assert_eq!(resource, "stuck resource"),
            other => panic!("expected timeout, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn fetch_errors_abort_the_loop() {
        let err = poll_until::<(), _, _, _>(
            "broken",
            fast_policy(Duration::from_secs(5)),
            || async { Err(OpenAiError::InvalidUrl("nope".into())) },
            |_| true,
        )
        .await
        .expect_err("error propagates");
        assert!(matches!(err, OpenAiError::InvalidUrl(_)));
    }

    #[test]
    fn parses_poll_after_header() {
        let mut headers = HeaderMap::new();
        assert_eq!(retry_after(&headers), None);
        headers.insert(POLL_AFTER_HEADER, HeaderValue::from_static("250"));
        assert_eq!(retry_after(&headers), Some(Duration::from_millis(250)));
        headers.insert(POLL_AFTER_HEADER, HeaderValue::from_static("soon"));
        assert_eq!(retry_after(&headers), None);
    }
}
