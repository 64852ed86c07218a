//! Error types for API calls and service binding.
//!
//! Every failure is returned to the caller. The only failures the client
//! absorbs on its own are transient gateway statuses, which are retried until
//! the call's context ends.

use crate::options::RequestOptions;
use bytes::Bytes;
use http::{HeaderMap, Method, StatusCode};
use std::fmt;
use url::Url;

/// Boxed error returned by service factories.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The main error type for API calls.
///
/// # Examples
///
/// ```no_run
/// use realm_client::{Client, Error};
///
/// # async fn example() -> Result<(), Error> {
/// let client = Client::builder()
///     .host("api.example.com")
///     .service_name("frobnitz")
///     .build()?;
///
/// match client.get::<serde_json::Value>("/things/:id", None).await {
///     Ok(response) => println!("Success: {:?}", response.data),
///     Err(Error::Request(err)) => {
///         eprintln!("{} returned {}", err.url, err.status);
///         eprintln!("body: {}", String::from_utf8_lossy(&err.partial_body));
///     }
///     Err(Error::MissingParameter { name }) => eprintln!("forgot :{name}"),
///     Err(e) => eprintln!("Other error: {}", e),
/// }
/// # Ok(())
/// # }
/// ```
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The client options are incomplete or invalid.
    ///
    /// Raised before anything is sent, e.g. when the host or service name is
    /// missing or a header value cannot be encoded.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A `:name` placeholder in the path had no matching parameter.
    #[error("Missing parameter {name:?} for path placeholder")]
    MissingParameter {
        /// The placeholder name, without the leading `:`.
        name: String,
    },

    /// A transport-level failure (DNS, connection refused, TLS, broken body).
    ///
    /// These are surfaced as-is and never retried.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// A single attempt exceeded the configured transport timeout.
    #[error("Request timed out")]
    Timeout,

    /// The call's cancellation token fired while a request was in flight.
    #[error("Request cancelled")]
    Cancelled,

    /// The call's deadline passed while a request was in flight.
    #[error("Request deadline exceeded")]
    DeadlineExceeded,

    /// The server answered with a non-success status.
    ///
    /// Terminal statuses produce this immediately; gateway statuses produce it
    /// once retrying stops.
    #[error(transparent)]
    Request(Box<RequestError>),

    /// The response has no `Content-Type`, or one other than `application/json`.
    #[error("Expected response to be JSON, {}", describe_media_type(.media_type))]
    UnexpectedContentType {
        /// The media type the server declared, if any.
        media_type: Option<String>,
    },

    /// The `Content-Type` header could not be parsed.
    #[error("Invalid content type {value:?}: {source}")]
    InvalidContentType {
        /// The raw header value.
        value: String,
        /// The parse failure.
        source: mime::FromStrError,
    },

    /// The response body was not valid JSON for the destination type.
    #[error("Could not decode response JSON (status {status}): {source}")]
    Decode {
        /// The HTTP status code.
        status: StatusCode,
        /// The underlying parse failure.
        source: serde_json::Error,
    },

    /// The request body could not be encoded as JSON.
    #[error("Failed to serialize request: {0}")]
    Serialization(#[source] serde_json::Error),

    /// The endpoint URL could not be built.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// No realm is configured for the inbound request's host.
    #[error("No host configuration for host {host:?}")]
    NoHostConfig {
        /// The host that failed to match.
        host: String,
    },

    /// No realm is configured under the requested name.
    #[error("No realm named {name:?}")]
    UnknownRealm {
        /// The requested realm name.
        name: String,
    },

    /// A service destination could not be bound.
    #[error("Could not get service for argument {index}: {source}")]
    Service {
        /// Zero-based position of the failing destination.
        index: usize,
        /// Why the destination could not be bound.
        source: ServiceError,
    },
}

impl Error {
    /// Returns `true` for statuses the executor retries on its own.
    ///
    /// Only `502`, `503` and `504` qualify. Network errors are not retried.
    ///
    /// # Examples
    ///
    /// ```
    /// use realm_client::Error;
    ///
    /// assert!(!Error::Timeout.is_retryable());
    /// assert!(!Error::MissingParameter { name: "id".into() }.is_retryable());
    /// ```
    pub fn is_retryable(&self) -> bool {
        match self.status() {
            Some(status) => {
                crate::status::Classification::of(status)
                    == crate::status::Classification::RetriableFailure
            }
            None => false,
        }
    }

    /// Returns `true` if the server answered `404 Not Found`.
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(StatusCode::NOT_FOUND)
    }

    /// Returns the HTTP status code if this error has one.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Error::Request(err) => Some(err.status),
            Error::Decode { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Returns the truncated response body of a failed request.
    pub fn partial_body(&self) -> Option<&[u8]> {
        match self {
            Error::Request(err) => Some(&err.partial_body[..]),
            _ => None,
        }
    }
}

fn describe_media_type(media_type: &Option<String>) -> String {
    match media_type {
        Some(media_type) => format!("got {media_type:?}"),
        None => "received bytes".to_string(),
    }
}

impl From<RequestError> for Error {
    fn from(err: RequestError) -> Self {
        Error::Request(Box::new(err))
    }
}

/// Snapshot of a call the server refused.
///
/// Holds at most [`RequestError::BODY_LIMIT`] bytes of the response body so
/// that a misbehaving server cannot make the error arbitrarily large.
#[derive(Debug, Clone)]
pub struct RequestError {
    /// The request method.
    pub method: Method,
    /// The fully formatted request URL.
    pub url: Url,
    /// The response status.
    pub status: StatusCode,
    /// The response headers.
    pub headers: HeaderMap,
    /// The start of the response body.
    pub partial_body: Bytes,
    /// The options the call was made with.
    pub options: RequestOptions,
}

impl RequestError {
    /// Maximum number of body bytes kept for diagnostics.
    pub const BODY_LIMIT: usize = 64 * 1024;
}

impl fmt::Display for RequestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Request to {} failed with status {}",
            self.url, self.status
        )
    }
}

impl std::error::Error for RequestError {}

/// Why a service destination could not be bound.
#[derive(thiserror::Error, Debug)]
pub enum ServiceError {
    /// Nothing is registered for the destination's capability.
    #[error("No registered service matching type {capability}")]
    NotRegistered {
        /// The capability's type name.
        capability: &'static str,
    },

    /// The registry holds a factory of a different shape under this capability.
    #[error("Registered factory for {capability} has a mismatched type")]
    TypeMismatch {
        /// The capability's type name.
        capability: &'static str,
    },

    /// The factory itself failed.
    #[error("Factory for {capability} failed: {source}")]
    Factory {
        /// The capability's type name.
        capability: &'static str,
        /// The factory's error.
        source: BoxError,
    },
}

/// A specialized `Result` type for API calls.
pub type Result<T> = std::result::Result<T, Error>;
