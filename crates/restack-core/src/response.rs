//! Deferred response evaluation
//!
//! [`ResponseHolder`] binds a result to the HTTP status code that produced
//! it and defers status validation until the result is consumed. Callers
//! can attach status-code-specific handling after the fact via
//! [`ResponseHolder::handle_status_code`], or transform the eventual value
//! with [`ResponseHolder::map`] without forcing evaluation.

use crate::error::{Error, Result};

/// True when a status code counts as success for body-returning purposes.
/// 302 is included: a followed redirect still delivers a usable body.
pub fn is_success_status(status: u16) -> bool {
    (200..=299).contains(&status) || status == 302
}

/// Failure snapshot that can be replayed on repeated `get()` calls without
/// re-running validation or mapper side effects. Mirrors [`Error`] minus
/// the non-clonable source chains.
#[derive(Debug, Clone)]
enum Failure {
    Status { status: u16, body: String },
    Connect { message: String },
    Argument { message: String },
    Decode { message: String },
    Cache { message: String },
    Invariant { message: String },
}

impl From<Error> for Failure {
    fn from(err: Error) -> Self {
        match err {
            Error::Status { status, body } => Failure::Status { status, body },
            Error::Connect { message, .. } => Failure::Connect { message },
            Error::Argument { message } => Failure::Argument { message },
            Error::Decode { message } => Failure::Decode { message },
            Error::Cache { message, .. } => Failure::Cache { message },
            Error::Invariant { message } => Failure::Invariant { message },
        }
    }
}

impl From<Failure> for Error {
    fn from(failure: Failure) -> Self {
        match failure {
            Failure::Status { status, body } => Error::Status { status, body },
            Failure::Connect { message } => Error::Connect {
                message,
                source: None,
            },
            Failure::Argument { message } => Error::Argument { message },
            Failure::Decode { message } => Error::Decode { message },
            Failure::Cache { message } => Error::Cache {
                message,
                source: None,
            },
            Failure::Invariant { message } => Error::Invariant { message },
        }
    }
}

enum State<T> {
    Pending(Box<dyn FnOnce() -> std::result::Result<T, Failure> + Send>),
    Ready(std::result::Result<T, Failure>),
}

/// Lazy, single-evaluation wrapper around a transport result.
///
/// The first `get()` resolves the pending supplier (validating the status
/// code unless an override replaced it) and memoizes the outcome; later
/// calls replay the memoized value or failure without side effects.
pub struct ResponseHolder<T> {
    status: u16,
    body_preview: String,
    state: State<T>,
}

impl<T: Clone + Send + 'static> ResponseHolder<T> {
    /// Holder whose value is validated against `status` on first `get()`.
    pub fn new(value: T, status: u16) -> Self {
        Self::with_preview(value, status, String::new())
    }

    /// Like [`ResponseHolder::new`] but with a body snapshot that is
    /// carried into the status error on validation failure.
    pub fn with_preview(value: T, status: u16, body_preview: impl Into<String>) -> Self {
        let body_preview = body_preview.into();
        let preview = body_preview.clone();
        Self {
            status,
            body_preview,
            state: State::Pending(Box::new(move || {
                if is_success_status(status) {
                    Ok(value)
                } else {
                    Err(Failure::Status {
                        status,
                        body: preview,
                    })
                }
            })),
        }
    }

    /// The HTTP status code this holder was created with.
    pub fn status(&self) -> u16 {
        self.status
    }

    /// Resolve the held value, validating the status code on the first
    /// call and replaying the memoized outcome afterwards.
    pub fn get(&mut self) -> Result<T> {
        if matches!(self.state, State::Pending(_)) {
            let placeholder = State::Ready(Err(Failure::Invariant {
                message: "response holder resolved re-entrantly".to_string(),
            }));
            let supplier = match std::mem::replace(&mut self.state, placeholder) {
                State::Pending(supplier) => supplier,
                State::Ready(_) => unreachable!(),
            };
            self.state = State::Ready(supplier());
        }
        match &self.state {
            State::Ready(Ok(value)) => Ok(value.clone()),
            State::Ready(Err(failure)) => Err(failure.clone().into()),
            State::Pending(_) => unreachable!(),
        }
    }

    /// If this holder's status code equals `code`, eagerly replace the
    /// result with `handler(self)` and disable future validation.
    /// Otherwise a no-op. Returns the holder for chaining.
    pub fn handle_status_code(
        mut self,
        code: u16,
        handler: impl FnOnce(&mut ResponseHolder<T>) -> T,
    ) -> Self {
        if self.status == code {
            let value = handler(&mut self);
            self.state = State::Ready(Ok(value));
        }
        self
    }

    /// New holder lazily computing `f` over this holder's value; the
    /// original's validation runs on the new holder's first `get()`.
    pub fn map<R>(self, f: impl FnOnce(T) -> R + Send + 'static) -> ResponseHolder<R>
    where
        R: Clone + Send + 'static,
    {
        self.try_map(move |value| Ok(f(value)))
    }

    /// Fallible variant of [`ResponseHolder::map`]; mapper failures are
    /// memoized like any other outcome.
    pub fn try_map<R>(mut self, f: impl FnOnce(T) -> Result<R> + Send + 'static) -> ResponseHolder<R>
    where
        R: Clone + Send + 'static,
    {
        let status = self.status;
        let body_preview = self.body_preview.clone();
        ResponseHolder {
            status,
            body_preview,
            state: State::Pending(Box::new(move || {
                let value = self.get().map_err(Failure::from)?;
                f(value).map_err(Failure::from)
            })),
        }
    }

    /// Like [`ResponseHolder::map`] but `f` receives the holder itself, so
    /// it can attach status-code handling or inspect the code before
    /// unwrapping.
    pub fn map_response<R>(
        mut self,
        f: impl FnOnce(&mut ResponseHolder<T>) -> R + Send + 'static,
    ) -> ResponseHolder<R>
    where
        R: Clone + Send + 'static,
    {
        let status = self.status;
        let body_preview = self.body_preview.clone();
        ResponseHolder {
            status,
            body_preview,
            state: State::Pending(Box::new(move || Ok(f(&mut self)))),
        }
    }

    /// Consume the holder into an `Option`.
    ///
    /// Policy: a status-validation failure collapses to `Ok(None)`; any
    /// other failure (e.g. a decode error from `try_map`) propagates.
    pub fn into_optional(mut self) -> Result<Option<T>> {
        match self.get() {
            Ok(value) => Ok(Some(value)),
            Err(Error::Status { .. }) => Ok(None),
            Err(err) => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_success_status_range() {
        assert!(is_success_status(200));
        assert!(is_success_status(204));
        assert!(is_success_status(299));
        assert!(is_success_status(302));
        assert!(!is_success_status(199));
        assert!(!is_success_status(300));
        assert!(!is_success_status(301));
        assert!(!is_success_status(404));
        assert!(!is_success_status(500));
    }

    #[test]
    fn test_get_returns_value_on_success_status() {
        let mut holder = ResponseHolder::new("body".to_string(), 200);
        assert_eq!(holder.get().unwrap(), "body");
    }

    #[test]
    fn test_get_raises_status_error_with_body() {
        let mut holder = ResponseHolder::with_preview("oops".to_string(), 500, "oops");
        match holder.get().unwrap_err() {
            Error::Status { status, body } => {
                assert_eq!(status, 500);
                assert_eq!(body, "oops");
            }
            other => panic!("unexpected error: {other}"),
        }
        // Replayed, not re-validated.
        assert!(matches!(holder.get(), Err(Error::Status { status: 500, .. })));
    }

    #[test]
    fn test_single_evaluation_of_mapper() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = calls.clone();
        let mut holder = ResponseHolder::new(2u32, 200).map(move |v| {
            seen.fetch_add(1, Ordering::SeqCst);
            v * 10
        });
        assert_eq!(holder.get().unwrap(), 20);
        assert_eq!(holder.get().unwrap(), 20);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_handle_status_code_overrides_validation() {
        let mut holder = ResponseHolder::new(String::new(), 404)
            .handle_status_code(404, |_| "fallback".to_string());
        assert_eq!(holder.get().unwrap(), "fallback");
        assert_eq!(holder.get().unwrap(), "fallback");
    }

    #[test]
    fn test_handle_status_code_ignores_other_codes() {
        let mut holder = ResponseHolder::new(String::new(), 404)
            .handle_status_code(500, |_| "fallback".to_string());
        assert!(matches!(holder.get(), Err(Error::Status { status: 404, .. })));
    }

    #[test]
    fn test_map_is_lazy() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = calls.clone();
        let _holder = ResponseHolder::new(1u32, 200).map(move |v| {
            seen.fetch_add(1, Ordering::SeqCst);
            v
        });
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_map_forwards_validation_failure() {
        let mut holder = ResponseHolder::new(1u32, 503).map(|v| v + 1);
        assert!(matches!(holder.get(), Err(Error::Status { status: 503, .. })));
    }

    #[test]
    fn test_map_response_sees_holder() {
        let mut holder = ResponseHolder::new("ignored".to_string(), 404).map_response(|inner| {
            assert_eq!(inner.status(), 404);
            inner.get().ok()
        });
        assert_eq!(holder.get().unwrap(), None);
    }

    #[test]
    fn test_into_optional_collapses_status_failure() {
        let holder = ResponseHolder::new("x".to_string(), 404);
        assert_eq!(holder.into_optional().unwrap(), None);

        let holder = ResponseHolder::new("x".to_string(), 200);
        assert_eq!(holder.into_optional().unwrap(), Some("x".to_string()));
    }

    #[test]
    fn test_into_optional_propagates_decode_failure() {
        let holder = ResponseHolder::new("x".to_string(), 200).try_map(|_| {
            Err::<String, _>(Error::Decode {
                message: "bad json".to_string(),
            })
        });
        assert!(matches!(holder.into_optional(), Err(Error::Decode { .. })));
    }

    #[test]
    fn test_status_accessor_survives_map() {
        let holder = ResponseHolder::new(0u8, 201).map(|v| v);
        assert_eq!(holder.status(), 201);
    }
}
