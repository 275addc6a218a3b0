//! Retry logic
//!
//! Exponential backoff for transient provider failures (429 and 5xx).
//!
//! The conversation generator reuses `RetryConfig::delay_for_attempt` for the
//! scheduler's own backoff so both follow the same curve.

mod backoff;

pub use backoff::{is_retryable_status, with_retry, IsRetryable, RetryConfig};
