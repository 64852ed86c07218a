//! Response wrapper that carries decoded data along with call metadata.

use http::{HeaderMap, StatusCode};
use std::time::Duration;

/// A successful API response.
///
/// `data` is `None` when there was nothing to decode: `204 No Content`,
/// `205 Reset Content`, a declared empty body, or a call made with
/// [`Client::send`](crate::Client::send).
///
/// # Examples
///
/// ```no_run
/// use realm_client::Client;
/// use serde::Deserialize;
///
/// #[derive(Deserialize)]
/// struct User {
///     name: String,
/// }
///
/// # async fn example() -> Result<(), realm_client::Error> {
/// let client = Client::builder().host("example.com").service_name("accounts").build()?;
/// let response = client.get::<User>("/users/123", None).await?;
///
/// println!("Status: {}", response.status);
/// println!("Request took {:?} over {} attempts", response.latency, response.attempts);
/// if let Some(user) = response.data {
///     println!("User: {}", user.name);
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Response<T> {
    /// The decoded response body, if there was one.
    pub data: Option<T>,

    /// The HTTP status code of the final attempt.
    pub status: StatusCode,

    /// The response headers of the final attempt.
    pub headers: HeaderMap,

    /// Time from the first attempt until the final response was handled,
    /// including backoff waits.
    pub latency: Duration,

    /// The number of attempts made. `1` means no retries were needed.
    pub attempts: usize,
}

impl<T> Response<T> {
    /// Creates a new `Response`.
    pub fn new(
        data: Option<T>,
        status: StatusCode,
        headers: HeaderMap,
        latency: Duration,
        attempts: usize,
    ) -> Self {
        Self {
            data,
            status,
            headers,
            latency,
            attempts,
        }
    }

    /// Maps the response data to a different type, keeping the metadata.
    ///
    /// # Examples
    ///
    /// ```
    /// # use realm_client::Response;
    /// # use http::{HeaderMap, StatusCode};
    /// # use std::time::Duration;
    /// let response = Response::new(Some(42), StatusCode::OK, HeaderMap::new(), Duration::from_millis(5), 1);
    ///
    /// let string_response = response.map(|n| n.to_string());
    /// assert_eq!(string_response.data.as_deref(), Some("42"));
    /// ```
    pub fn map<U, F>(self, f: F) -> Response<U>
    where
        F: FnOnce(T) -> U,
    {
        Response {
            data: self.data.map(f),
            status: self.status,
            headers: self.headers,
            latency: self.latency,
            attempts: self.attempts,
        }
    }

    /// Consumes the response and returns the decoded data.
    pub fn into_data(self) -> Option<T> {
        self.data
    }

    /// Returns `true` if the call required retries.
    pub fn was_retried(&self) -> bool {
        self.attempts > 1
    }

    /// Returns a header value by name, if present and valid UTF-8.
    ///
    /// # Examples
    ///
    /// ```
    /// # use realm_client::Response;
    /// # use http::{HeaderMap, HeaderValue, StatusCode};
    /// # use std::time::Duration;
    /// let mut headers = HeaderMap::new();
    /// headers.insert("content-type", HeaderValue::from_static("application/json"));
    ///
    /// let response = Response::<()>::new(None, StatusCode::NO_CONTENT, headers, Duration::ZERO, 3);
    ///
    /// assert_eq!(response.header("content-type"), Some("application/json"));
    /// assert!(response.was_retried());
    /// ```
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)?.to_str().ok()
    }
}
