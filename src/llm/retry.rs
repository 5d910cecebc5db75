//! Shared retry helpers for the inference gateway.
//!
//! Provides exponential backoff with jitter and retryable status
//! classification. Retries cover transport failures only; semantic
//! failures (bad structured output) are handled by the caller.

use std::time::Duration;

use rand::Rng;

/// Returns `true` if the HTTP status code is transient and worth retrying.
pub(crate) fn is_retryable_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}

/// Calculate exponential backoff delay with random jitter.
///
/// Base delay is 1 second, doubled each attempt, with +/-25% jitter.
pub(crate) fn retry_backoff_delay(attempt: u32) -> Duration {
    let base_ms: u64 = 1000u64.saturating_mul(2u64.saturating_pow(attempt));
    let jitter_range = base_ms / 4;
    let jitter = if jitter_range > 0 {
        let offset = rand::thread_rng().gen_range(0..=jitter_range * 2);
        offset as i64 - jitter_range as i64
    } else {
        0
    };
    let delay_ms = (base_ms as i64 + jitter).max(100) as u64;
    Duration::from_millis(delay_ms)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_statuses() {
        assert!(is_retryable_status(429));
        assert!(is_retryable_status(500));
        assert!(is_retryable_status(503));
        assert!(!is_retryable_status(400));
        assert!(!is_retryable_status(401));
        assert!(!is_retryable_status(200));
    }

    #[test]
    fn backoff_grows_with_attempt() {
        for _ in 0..20 {
            let d0 = retry_backoff_delay(0);
            let d1 = retry_backoff_delay(1);
            assert!(d0.as_millis() >= 750 && d0.as_millis() <= 1250, "{:?}", d0);
            assert!(d1.as_millis() >= 1500 && d1.as_millis() <= 2500, "{:?}", d1);
        }
    }

    #[test]
    fn backoff_no_overflow_at_high_attempts() {
        let delay = retry_backoff_delay(40);
        assert!(delay.as_millis() >= 100);
    }
}
