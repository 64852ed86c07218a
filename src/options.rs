//! Client configuration and per-request options.
//!
//! [`Options`] is an immutable value. Scoping a client (to a realm, an inbound
//! request, or a single call) never edits options in place; it produces a new
//! value with [`Options::merge`].

use crate::instrument::Instrumentation;
use crate::retry::RetryStrategy;
use crate::{Error, Result};
use http::{HeaderMap, HeaderName, HeaderValue};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Protocol used when none is configured.
pub const DEFAULT_PROTOCOL: &str = "http";

/// API version used when none is configured.
pub const DEFAULT_API_VERSION: u32 = 1;

/// Configuration for one API endpoint.
///
/// Empty strings, `0` and `None` mean "not set". Unset fields are filled by
/// [`Options::apply_defaults`] or inherited from a base through
/// [`Options::merge`].
#[derive(Clone, Default)]
pub struct Options {
    /// Name of the target service, the `{service}` in `/api/{service}/v{n}`.
    pub service_name: String,

    /// API version of the target service. Defaults to 1.
    pub api_version: u32,

    /// Host name, optionally including a port.
    pub host: String,

    /// URL scheme. Defaults to `"http"`.
    pub protocol: String,

    /// Transport to use instead of a freshly built one.
    pub http_client: Option<reqwest::Client>,

    /// Checkpoint session token, sent as the `checkpoint.session` cookie.
    pub session: String,

    /// Request identifier forwarded in the `Request-Id` header.
    pub request_id: String,

    /// Per-attempt transport timeout.
    pub timeout: Option<Duration>,

    /// Hook invoked after every attempt.
    pub instrumentation: Option<Arc<dyn Instrumentation>>,

    /// Backoff used between retries of gateway failures.
    pub retry: Option<RetryStrategy>,

    /// Point in time after which the call gives up.
    pub deadline: Option<Instant>,

    /// Token that aborts the call when cancelled.
    pub cancellation: Option<CancellationToken>,
}

impl Options {
    /// Returns a copy of `self` with every field that is set in `other`
    /// replaced by `other`'s value.
    ///
    /// Merging is associative: `a.merge(&b).merge(&c)` equals
    /// `a.merge(&b.merge(&c))`.
    ///
    /// # Examples
    ///
    /// ```
    /// use realm_client::Options;
    ///
    /// let base = Options {
    ///     host: "example.com".into(),
    ///     service_name: "frobnitz".into(),
    ///     ..Default::default()
    /// };
    /// let scoped = base.merge(&Options {
    ///     session: "42smurf99".into(),
    ///     ..Default::default()
    /// });
    ///
    /// assert_eq!(scoped.host, "example.com");
    /// assert_eq!(scoped.session, "42smurf99");
    /// assert_eq!(base.session, "");
    /// ```
    pub fn merge(&self, other: &Options) -> Options {
        fn pick_str(base: &str, over: &str) -> String {
            let picked = if over.is_empty() { base } else { over };
            picked.to_string()
        }
        fn pick<T: Clone>(base: &Option<T>, over: &Option<T>) -> Option<T> {
            over.as_ref().or(base.as_ref()).cloned()
        }

        Options {
            service_name: pick_str(&self.service_name, &other.service_name),
            api_version: if other.api_version != 0 {
                other.api_version
            } else {
                self.api_version
            },
            host: pick_str(&self.host, &other.host),
            protocol: pick_str(&self.protocol, &other.protocol),
            http_client: pick(&self.http_client, &other.http_client),
            session: pick_str(&self.session, &other.session),
            request_id: pick_str(&self.request_id, &other.request_id),
            timeout: pick(&self.timeout, &other.timeout),
            instrumentation: pick(&self.instrumentation, &other.instrumentation),
            retry: pick(&self.retry, &other.retry),
            deadline: pick(&self.deadline, &other.deadline),
            cancellation: pick(&self.cancellation, &other.cancellation),
        }
    }

    /// Returns a copy with protocol, API version, retry strategy and transport
    /// filled in where unset.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if the transport cannot be built.
    pub fn apply_defaults(&self) -> Result<Options> {
        let mut options = self.clone();
        if options.protocol.is_empty() {
            options.protocol = DEFAULT_PROTOCOL.to_string();
        }
        if options.api_version == 0 {
            options.api_version = DEFAULT_API_VERSION;
        }
        if options.retry.is_none() {
            options.retry = Some(RetryStrategy::default());
        }
        if options.http_client.is_none() {
            let http_client = reqwest::Client::builder().build().map_err(|e| {
                Error::Configuration(format!("Failed to build HTTP client: {}", e))
            })?;
            options.http_client = Some(http_client);
        }
        Ok(options)
    }

    /// Checks that the fields every call needs are present.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if the host or service name is empty.
    pub fn validate(&self) -> Result<()> {
        if self.host.is_empty() {
            return Err(Error::Configuration(
                "Host must be specified in options".to_string(),
            ));
        }
        if self.service_name.is_empty() {
            return Err(Error::Configuration(
                "Service name must be specified in options".to_string(),
            ));
        }
        Ok(())
    }
}

impl fmt::Debug for Options {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Options")
            .field("service_name", &self.service_name)
            .field("api_version", &self.api_version)
            .field("host", &self.host)
            .field("protocol", &self.protocol)
            .field("session", &if self.session.is_empty() { "" } else { "<redacted>" })
            .field("request_id", &self.request_id)
            .field("timeout", &self.timeout)
            .field("instrumentation", &self.instrumentation.is_some())
            .field("retry", &self.retry)
            .field("deadline", &self.deadline)
            .field("cancellation", &self.cancellation.is_some())
            .finish_non_exhaustive()
    }
}

/// Ordered multimap of request parameters.
///
/// Path placeholders are filled from here first; whatever is left becomes the
/// query string. Keys iterate in sorted order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params {
    values: BTreeMap<String, Vec<String>>,
}

impl Params {
    /// Creates an empty set of parameters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Converts a JSON object into parameters.
    ///
    /// `null` becomes the empty string, strings are taken verbatim, and any
    /// other value uses its JSON text.
    ///
    /// # Examples
    ///
    /// ```
    /// use realm_client::Params;
    /// use serde_json::json;
    ///
    /// let json = json!({ "limit": 10, "q": "rust", "deleted": null });
    /// let params = Params::from_json(json.as_object().unwrap());
    ///
    /// assert_eq!(params.first("limit"), Some("10"));
    /// assert_eq!(params.first("q"), Some("rust"));
    /// assert_eq!(params.first("deleted"), Some(""));
    /// ```
    pub fn from_json(object: &serde_json::Map<String, serde_json::Value>) -> Self {
        object
            .iter()
            .map(|(key, value)| {
                let value = match value {
                    serde_json::Value::Null => String::new(),
                    serde_json::Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                (key.clone(), value)
            })
            .collect()
    }

    /// Sets `key` to a single value, replacing any previous values.
    pub fn insert(&mut self, key: impl Into<String>, value: impl fmt::Display) -> &mut Self {
        self.values.insert(key.into(), vec![value.to_string()]);
        self
    }

    /// Adds a value to `key`, keeping previous values.
    pub fn append(&mut self, key: impl Into<String>, value: impl fmt::Display) -> &mut Self {
        self.values
            .entry(key.into())
            .or_default()
            .push(value.to_string());
        self
    }

    /// Returns every value of `key`.
    pub fn get(&self, key: &str) -> Option<&[String]> {
        self.values.get(key).map(Vec::as_slice)
    }

    /// Returns the first value of `key`.
    pub fn first(&self, key: &str) -> Option<&str> {
        self.get(key)?.first().map(String::as_str)
    }

    /// Removes `key` and returns its values.
    pub fn remove(&mut self, key: &str) -> Option<Vec<String>> {
        self.values.remove(key)
    }

    /// Returns `true` if `key` is present.
    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Number of distinct keys.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns `true` if there are no parameters.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterates over keys and their values in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.values
            .iter()
            .map(|(key, values)| (key.as_str(), values.as_slice()))
    }
}

impl<K, V> FromIterator<(K, V)> for Params
where
    K: Into<String>,
    V: fmt::Display,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = Params::new();
        for (key, value) in iter {
            params.append(key, value);
        }
        params
    }
}

impl<K, V, const N: usize> From<[(K, V); N]> for Params
where
    K: Into<String>,
    V: fmt::Display,
{
    fn from(pairs: [(K, V); N]) -> Self {
        pairs.into_iter().collect()
    }
}

/// Options that apply to a single request.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    /// Path and query parameters.
    pub params: Params,

    /// Extra headers sent with this request only.
    pub headers: HeaderMap,
}

impl RequestOptions {
    /// Creates empty request options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses `params` as the request's parameters.
    pub fn with_params(mut self, params: impl Into<Params>) -> Self {
        self.params = params.into();
        self
    }

    /// Sets a single parameter.
    pub fn param(mut self, key: impl Into<String>, value: impl fmt::Display) -> Self {
        self.params.insert(key, value);
        self
    }

    /// Adds a header to the request.
    ///
    /// # Errors
    ///
    /// Returns an error if the header name or value is invalid.
    pub fn header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Result<Self> {
        let name = HeaderName::try_from(name.as_ref())
            .map_err(|e| Error::Configuration(format!("Invalid header name: {}", e)))?;
        let value = HeaderValue::try_from(value.as_ref())
            .map_err(|e| Error::Configuration(format!("Invalid header value: {}", e)))?;
        self.headers.insert(name, value);
        Ok(self)
    }
}
