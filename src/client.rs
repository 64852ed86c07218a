//! HTTP client with gateway retries and strict JSON decoding.
//!
//! The [`Client`] type is the main entry point for making API calls.
//! Use [`ClientBuilder`] or [`Client::new`] to create clients, and
//! [`Client::with_options`] to derive rescoped ones.

use crate::{
    context::CallContext,
    decode::decode_json,
    endpoint::format_endpoint_url,
    error::RequestError,
    inbound::{Inbound, REQUEST_ID_HEADER, SESSION_COOKIE},
    instrument::{Attempt, Instrumentation},
    options::{Options, RequestOptions},
    retry::RetryStrategy,
    status::{yields_body, Classification},
    Error, Response, Result,
};
use bytes::{Bytes, BytesMut};
use http::header::{CONTENT_TYPE, COOKIE};
use http::{HeaderMap, HeaderName, HeaderValue, Method};
use serde::{de::DeserializeOwned, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use url::Url;

const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";

/// A client for one service of the API, scoped to one host.
///
/// Clients are cheap to clone and safe to share between tasks. Deriving a
/// client with different options never changes the original.
///
/// # Examples
///
/// ```no_run
/// use realm_client::{Client, RequestOptions};
/// use serde::Deserialize;
///
/// #[derive(Deserialize)]
/// struct User {
///     name: String,
/// }
///
/// # async fn example() -> Result<(), realm_client::Error> {
/// let client = Client::builder()
///     .host("example.com")
///     .service_name("accounts")
///     .session("42smurf99")
///     .build()?;
///
/// let options = RequestOptions::new().param("id", 123);
/// let user = client.get::<User>("/users/:id", Some(&options)).await?;
/// if let Some(user) = user.data {
///     println!("User: {}", user.name);
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    options: Options,
    http_client: reqwest::Client,
    retry: RetryStrategy,
}

impl Client {
    /// Creates a new `ClientBuilder` for configuring a client.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Creates a client from `options`, filling in defaults.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if the host or service name is
    /// missing, or if the transport cannot be built.
    pub fn new(options: Options) -> Result<Client> {
        options.validate()?;
        Client::unchecked(options)
    }

    /// Creates a client without requiring host and service name.
    ///
    /// Calls still validate their options before anything is sent.
    pub(crate) fn unchecked(options: Options) -> Result<Client> {
        let options = options.apply_defaults()?;
        let http_client = options.http_client.clone().unwrap_or_default();
        let retry = options.retry.clone().unwrap_or_default();
        Ok(Client {
            inner: Arc::new(ClientInner {
                options,
                http_client,
                retry,
            }),
        })
    }

    /// The effective options of this client.
    pub fn options(&self) -> &Options {
        &self.inner.options
    }

    /// Returns a new client whose options are this client's options merged
    /// with `overrides`. Only fields set in `overrides` change.
    ///
    /// # Examples
    ///
    /// ```
    /// use realm_client::{Client, Options};
    ///
    /// # fn example() -> Result<(), realm_client::Error> {
    /// let client = Client::builder().host("localhost").service_name("frobnitz").build()?;
    /// let scoped = client.with_options(&Options {
    ///     host: "example.com".into(),
    ///     ..Default::default()
    /// });
    ///
    /// assert_eq!(scoped.options().host, "example.com");
    /// assert_eq!(scoped.options().service_name, "frobnitz");
    /// assert_eq!(client.options().host, "localhost");
    /// # Ok(())
    /// # }
    /// ```
    pub fn with_options(&self, overrides: &Options) -> Client {
        let options = self.inner.options.merge(overrides);
        let http_client = options
            .http_client
            .clone()
            .unwrap_or_else(|| self.inner.http_client.clone());
        let retry = options
            .retry
            .clone()
            .unwrap_or_else(|| self.inner.retry.clone());
        Client {
            inner: Arc::new(ClientInner {
                options,
                http_client,
                retry,
            }),
        }
    }

    /// Returns a new client that inherits host, protocol, session and
    /// request identifier from an inbound request.
    ///
    /// The host comes from the last `X-Forwarded-Host` value, else the
    /// request's own host. The session comes from the `checkpoint.session`
    /// cookie, else the `session` query parameter. Signals missing from the
    /// request keep this client's values.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if the result has no host or service name.
    pub fn from_http_request<B>(&self, req: &http::Request<B>) -> Result<Client> {
        let inbound = Inbound::from_request(req);
        let client = self.with_options(&Options {
            host: inbound.host.unwrap_or_default(),
            protocol: inbound.protocol.unwrap_or_default(),
            session: inbound.session.unwrap_or_default(),
            request_id: inbound.request_id.unwrap_or_default(),
            ..Default::default()
        });
        client.options().validate()?;
        Ok(client)
    }

    /// Makes a call and decodes the response body into `Res`.
    ///
    /// Gateway failures (`502`, `503`, `504`) are retried with backoff until
    /// a different status arrives or the call's deadline or cancellation
    /// fires. `Response::data` is `None` for `204`, `205` and responses that
    /// declare an empty body.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use realm_client::{Client, RequestOptions};
    /// use http::Method;
    /// use serde::{Deserialize, Serialize};
    ///
    /// #[derive(Serialize)]
    /// struct Search { query: String }
    ///
    /// #[derive(Deserialize)]
    /// struct Results { hits: Vec<String> }
    ///
    /// # async fn example() -> Result<(), realm_client::Error> {
    /// let client = Client::builder().host("example.com").service_name("search").build()?;
    /// let request = Search { query: "rust".to_string() };
    ///
    /// let response = client
    ///     .call::<_, Results>(Method::POST, "/indexes/:index/search",
    ///         Some(&RequestOptions::new().param("index", "docs")), Some(&request))
    ///     .await?;
    /// println!("{} attempts", response.attempts);
    /// # Ok(())
    /// # }
    /// ```
    pub async fn call<Req, Res>(
        &self,
        method: Method,
        path: &str,
        options: Option<&RequestOptions>,
        body: Option<&Req>,
    ) -> Result<Response<Res>>
    where
        Req: Serialize + ?Sized,
        Res: DeserializeOwned,
    {
        self.execute(method, path, options, body, true).await
    }

    /// Makes a call without decoding the response body.
    ///
    /// The status is still checked and failures are still retried; the body
    /// of a successful response is read and discarded.
    pub async fn send<Req>(
        &self,
        method: Method,
        path: &str,
        options: Option<&RequestOptions>,
        body: Option<&Req>,
    ) -> Result<Response<()>>
    where
        Req: Serialize + ?Sized,
    {
        self.execute(method, path, options, body, false).await
    }

    /// Makes a GET request and decodes the response.
    pub async fn get<Res>(&self, path: &str, options: Option<&RequestOptions>) -> Result<Response<Res>>
    where
        Res: DeserializeOwned,
    {
        self.call::<(), Res>(Method::GET, path, options, None).await
    }

    /// Makes a HEAD request, checking only that the resource answers with success.
    pub async fn head(&self, path: &str, options: Option<&RequestOptions>) -> Result<Response<()>> {
        self.send::<()>(Method::HEAD, path, options, None).await
    }

    /// Makes a DELETE request and decodes the response.
    pub async fn delete<Res>(&self, path: &str, options: Option<&RequestOptions>) -> Result<Response<Res>>
    where
        Res: DeserializeOwned,
    {
        self.call::<(), Res>(Method::DELETE, path, options, None).await
    }

    /// Makes a POST request with a JSON body and decodes the response.
    pub async fn post<Req, Res>(
        &self,
        path: &str,
        options: Option<&RequestOptions>,
        body: &Req,
    ) -> Result<Response<Res>>
    where
        Req: Serialize + ?Sized,
        Res: DeserializeOwned,
    {
        self.call(Method::POST, path, options, Some(body)).await
    }

    /// Makes a PUT request with a JSON body and decodes the response.
    pub async fn put<Req, Res>(
        &self,
        path: &str,
        options: Option<&RequestOptions>,
        body: &Req,
    ) -> Result<Response<Res>>
    where
        Req: Serialize + ?Sized,
        Res: DeserializeOwned,
    {
        self.call(Method::PUT, path, options, Some(body)).await
    }

    /// Makes a PATCH request with a JSON body and decodes the response.
    pub async fn patch<Req, Res>(
        &self,
        path: &str,
        options: Option<&RequestOptions>,
        body: &Req,
    ) -> Result<Response<Res>>
    where
        Req: Serialize + ?Sized,
        Res: DeserializeOwned,
    {
        self.call(Method::PATCH, path, options, Some(body)).await
    }

    async fn execute<Req, Res>(
        &self,
        method: Method,
        path: &str,
        request_options: Option<&RequestOptions>,
        body: Option<&Req>,
        decode: bool,
    ) -> Result<Response<Res>>
    where
        Req: Serialize + ?Sized,
        Res: DeserializeOwned,
    {
        let options = &self.inner.options;
        options.validate()?;

        let request_options = request_options.cloned().unwrap_or_default();
        let mut params = request_options.params.clone();
        let url = format_endpoint_url(options, path, &mut params)?;
        let headers = self.request_headers(&request_options)?;
        let body = body
            .map(serde_json::to_vec)
            .transpose()
            .map_err(Error::Serialization)?
            .map(Bytes::from);

        let context = CallContext::from_options(options);
        let start_time = Instant::now();
        let mut attempt = 0;

        loop {
            attempt += 1;

            let mut response = self
                .execute_request(&context, &method, &url, &headers, body.as_ref(), attempt)
                .await?;
            let status = response.status();

            tracing::info!(
                status = status.as_u16(),
                latency_ms = start_time.elapsed().as_millis(),
                attempt = attempt,
                "Received HTTP response"
            );

            match Classification::of(status) {
                Classification::Success => {
                    let headers = response.headers().clone();
                    if !decode || !yields_body(status) {
                        context.run(read_limited(&mut response, 0)).await??;
                        return Ok(Response::new(
                            None,
                            status,
                            headers,
                            start_time.elapsed(),
                            attempt,
                        ));
                    }

                    let raw_body = context.run(response.bytes()).await??;
                    let data = decode_json(status, &headers, &raw_body).inspect_err(|e| {
                        tracing::error!(error = %e, url = %url, "Failed to decode response");
                    })?;
                    return Ok(Response::new(
                        data,
                        status,
                        headers,
                        start_time.elapsed(),
                        attempt,
                    ));
                }
                Classification::RetriableFailure => {
                    let err = self
                        .request_error(&context, response, &method, &url, &request_options)
                        .await?;

                    if context.done().is_some() {
                        return Err(err.into());
                    }
                    let Some(delay) = self.inner.retry.delay_for_retry(attempt) else {
                        return Err(err.into());
                    };

                    tracing::warn!(
                        status = status.as_u16(),
                        delay_ms = delay.as_millis(),
                        attempt = attempt,
                        url = %url,
                        "Gateway failure - retrying request after delay"
                    );

                    if context.sleep(delay).await.is_err() {
                        return Err(err.into());
                    }
                }
                Classification::TerminalFailure => {
                    let err = self
                        .request_error(&context, response, &method, &url, &request_options)
                        .await?;
                    if status.is_client_error() {
                        tracing::error!(status = status.as_u16(), url = %url, "Client error (4xx)");
                    } else {
                        tracing::warn!(status = status.as_u16(), url = %url, "Request failed");
                    }
                    return Err(err.into());
                }
            }
        }
    }

    /// Executes a single request attempt.
    async fn execute_request(
        &self,
        context: &CallContext,
        method: &Method,
        url: &Url,
        headers: &HeaderMap,
        body: Option<&Bytes>,
        attempt: usize,
    ) -> Result<reqwest::Response> {
        tracing::debug!(
            method = %method,
            url = %url,
            attempt = attempt,
            "Executing HTTP request"
        );

        let mut request = self
            .inner
            .http_client
            .request(method.clone(), url.clone())
            .headers(headers.clone());
        if let Some(timeout) = self.inner.options.timeout {
            request = request.timeout(timeout);
        }
        if let Some(body) = body {
            request = request.body(body.clone());
        }

        let sent_at = Instant::now();
        let result = context.run(request.send()).await?;

        if let Some(instrumentation) = &self.inner.options.instrumentation {
            instrumentation.on_attempt(&Attempt {
                method,
                url,
                number: attempt,
                status: result.as_ref().ok().map(reqwest::Response::status),
                error: result.as_ref().err(),
                duration: sent_at.elapsed(),
            });
        }

        result.map_err(|e| {
            tracing::warn!(error = %e, attempt = attempt, url = %url, "Request failed");
            if e.is_timeout() {
                Error::Timeout
            } else {
                Error::Network(e)
            }
        })
    }

    async fn request_error(
        &self,
        context: &CallContext,
        mut response: reqwest::Response,
        method: &Method,
        url: &Url,
        request_options: &RequestOptions,
    ) -> Result<RequestError> {
        let status = response.status();
        let headers = response.headers().clone();
        let partial_body = context
            .run(read_limited(&mut response, RequestError::BODY_LIMIT))
            .await??;
        Ok(RequestError {
            method: method.clone(),
            url: url.clone(),
            status,
            headers,
            partial_body,
            options: request_options.clone(),
        })
    }

    fn request_headers(&self, request_options: &RequestOptions) -> Result<HeaderMap> {
        let options = &self.inner.options;
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(JSON_CONTENT_TYPE));
        if !options.request_id.is_empty() {
            headers.insert(
                HeaderName::from_static(REQUEST_ID_HEADER),
                header_value(&options.request_id)?,
            );
        }
        if !options.session.is_empty() {
            let cookie = format!("{}={}", SESSION_COOKIE, options.session);
            headers.insert(COOKIE, header_value(&cookie)?);
        }
        headers.extend(request_options.headers.clone());
        Ok(headers)
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("options", &self.inner.options)
            .finish()
    }
}

fn header_value(value: &str) -> Result<HeaderValue> {
    HeaderValue::try_from(value)
        .map_err(|e| Error::Configuration(format!("Invalid header value: {}", e)))
}

/// Reads the whole body, keeping at most `limit` bytes.
///
/// The rest is read and dropped so the connection can be reused.
async fn read_limited(response: &mut reqwest::Response, limit: usize) -> Result<Bytes> {
    let mut kept = BytesMut::new();
    while let Some(chunk) = response.chunk().await? {
        let room = limit.saturating_sub(kept.len()).min(chunk.len());
        kept.extend_from_slice(&chunk[..room]);
    }
    Ok(kept.freeze())
}

/// Builder for configuring and creating a [`Client`].
///
/// # Examples
///
/// ```no_run
/// use realm_client::{ClientBuilder, RetryStrategy};
/// use std::time::Duration;
///
/// # async fn example() -> Result<(), realm_client::Error> {
/// let client = ClientBuilder::new()
///     .host("api.example.com")
///     .protocol("https")
///     .service_name("accounts")
///     .api_version(2)
///     .timeout(Duration::from_secs(30))
///     .retry_strategy(RetryStrategy::ExponentialBackoff {
///         initial_delay: Duration::from_millis(100),
///         max_delay: Duration::from_secs(10),
///         max_retries: Some(8),
///         jitter: true,
///     })
///     .build()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct ClientBuilder {
    options: Options,
}

impl ClientBuilder {
    /// Creates a new `ClientBuilder` with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the host, optionally including a port.
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.options.host = host.into();
        self
    }

    /// Sets the URL scheme.
    pub fn protocol(mut self, protocol: impl Into<String>) -> Self {
        self.options.protocol = protocol.into();
        self
    }

    /// Sets the target service name.
    pub fn service_name(mut self, service_name: impl Into<String>) -> Self {
        self.options.service_name = service_name.into();
        self
    }

    /// Sets the target API version.
    pub fn api_version(mut self, api_version: u32) -> Self {
        self.options.api_version = api_version;
        self
    }

    /// Sets the session token.
    pub fn session(mut self, session: impl Into<String>) -> Self {
        self.options.session = session.into();
        self
    }

    /// Sets the request identifier forwarded with every call.
    pub fn request_id(mut self, request_id: impl Into<String>) -> Self {
        self.options.request_id = request_id.into();
        self
    }

    /// Sets the per-attempt transport timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.options.timeout = Some(timeout);
        self
    }

    /// Sets the backoff used between retries.
    pub fn retry_strategy(mut self, strategy: RetryStrategy) -> Self {
        self.options.retry = Some(strategy);
        self
    }

    /// Uses an existing transport.
    pub fn http_client(mut self, http_client: reqwest::Client) -> Self {
        self.options.http_client = Some(http_client);
        self
    }

    /// Sets a hook invoked after every attempt.
    pub fn instrumentation(mut self, instrumentation: Arc<dyn Instrumentation>) -> Self {
        self.options.instrumentation = Some(instrumentation);
        self
    }

    /// Gives up on calls that are still running at `deadline`.
    pub fn deadline(mut self, deadline: tokio::time::Instant) -> Self {
        self.options.deadline = Some(deadline);
        self
    }

    /// Aborts calls when `token` is cancelled.
    pub fn cancellation(mut self, token: CancellationToken) -> Self {
        self.options.cancellation = Some(token);
        self
    }

    /// Builds the configured `Client`.
    ///
    /// # Errors
    ///
    /// Returns an error if the host or service name is missing, or if the
    /// transport cannot be built.
    pub fn build(self) -> Result<Client> {
        Client::new(self.options)
    }
}
