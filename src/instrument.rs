//! Per-attempt instrumentation hook.

use http::{Method, StatusCode};
use std::time::Duration;
use url::Url;

/// What happened during one attempt of a call.
#[derive(Debug)]
pub struct Attempt<'a> {
    /// The request method.
    pub method: &'a Method,
    /// The formatted request URL.
    pub url: &'a Url,
    /// 1 for the first attempt, 2 for the first retry, and so on.
    pub number: usize,
    /// Response status, when a response arrived.
    pub status: Option<StatusCode>,
    /// Transport error, when the request could not be completed.
    pub error: Option<&'a reqwest::Error>,
    /// Time from dispatch until headers arrived or the transport failed.
    pub duration: Duration,
}

/// Observer invoked once per attempt, including retried ones.
///
/// # Examples
///
/// ```
/// use realm_client::instrument::{Attempt, Instrumentation};
/// use std::sync::atomic::{AtomicUsize, Ordering};
///
/// #[derive(Default)]
/// struct CountAttempts(AtomicUsize);
///
/// impl Instrumentation for CountAttempts {
///     fn on_attempt(&self, _attempt: &Attempt<'_>) {
///         self.0.fetch_add(1, Ordering::Relaxed);
///     }
/// }
/// ```
pub trait Instrumentation: Send + Sync {
    /// Called after each attempt completes or fails at the transport level.
    fn on_attempt(&self, attempt: &Attempt<'_>);
}
