//! Retrying decorator
//!
//! [`RetryingClient`] wraps any [`RestClient`] and re-invokes failed calls
//! with a fixed delay between attempts. Connectivity failures are always
//! retried. Status failures are retried selectively: informational codes,
//! redirects and everything above 404 are transient enough to retry, while
//! the 400..=404 client-error band is permanent and fails immediately.
//!
//! Deferred holders from `get_and` only fail at the call site on
//! connectivity errors, so only those are retried; a bad status surfaces
//! later, when the holder is resolved.

use std::time::Duration;

use backoff::backoff::{Backoff, Constant};
use bytes::Bytes;

use crate::client::{Headers, RestClient};
use crate::error::{Error, Result};
use crate::response::ResponseHolder;

/// Retry configuration: total number of attempts and the fixed delay
/// between them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    times: usize,
    delay: Duration,
}

impl RetryPolicy {
    /// A policy making `times` attempts in total, waiting `delay` between
    /// consecutive attempts. `times` is clamped to at least one.
    pub fn new(times: usize, delay: Duration) -> Self {
        Self {
            times: times.max(1),
            delay,
        }
    }

    pub fn times(&self) -> usize {
        self.times
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Create the backoff schedule for one execution.
    pub fn create_backoff(&self) -> Constant {
        Constant::new(self.delay)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(500))
    }
}

/// Whether a failed attempt is worth repeating.
pub fn is_retriable(err: &Error) -> bool {
    match err {
        Error::Connect { .. } => true,
        Error::Status { status, .. } => {
            *status < 200 || (300..=399).contains(status) || *status > 404
        }
        _ => false,
    }
}

/// Retrying decorator over any [`RestClient`].
pub struct RetryingClient<C> {
    inner: C,
    policy: RetryPolicy,
}

impl<C: RestClient> RetryingClient<C> {
    pub fn new(inner: C, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    pub fn inner(&self) -> &C {
        &self.inner
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    fn execute<T>(&self, mut attempt: impl FnMut(&C) -> Result<T>) -> Result<T> {
        let mut backoff = self.policy.create_backoff();
        let times = self.policy.times;

        for attempt_number in 1..=times {
            match attempt(&self.inner) {
                Ok(value) => return Ok(value),
                Err(err) if attempt_number < times && is_retriable(&err) => {
                    log::warn!(
                        "attempt {}/{} failed, retrying in {:?}: {}",
                        attempt_number,
                        times,
                        self.policy.delay,
                        err
                    );
                    if let Some(delay) = backoff.next_backoff() {
                        std::thread::sleep(delay);
                    }
                }
                Err(err) => {
                    if is_retriable(&err) {
                        log::error!("giving up after {} attempts: {}", times, err);
                    }
                    return Err(err);
                }
            }
        }

        Err(Error::Invariant {
            message: "retry loop ended without an outcome".to_string(),
        })
    }
}

impl<C: RestClient> RestClient for RetryingClient<C> {
    fn get(&self, url: &str, headers: &Headers) -> Result<Option<Bytes>> {
        self.execute(|inner| inner.get(url, headers))
    }

    fn get_and(&self, url: &str, headers: &Headers) -> Result<ResponseHolder<Option<Bytes>>> {
        self.execute(|inner| inner.get_and(url, headers))
    }

    fn post(&self, url: &str, body: Bytes, headers: &Headers) -> Result<Bytes> {
        self.execute(|inner| inner.post(url, body.clone(), headers))
    }

    fn patch(&self, url: &str, body: Bytes, headers: &Headers) -> Result<Bytes> {
        self.execute(|inner| inner.patch(url, body.clone(), headers))
    }
}
