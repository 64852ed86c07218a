//! # realm-client - JSON/HTTP client for versioned, multi-tenant APIs
//!
//! Services live under `{protocol}://{host}/api/{service}/v{version}/...`, and
//! every tenant ("realm") of the backend has its own host and session. This
//! crate provides a typed [`Client`] for such endpoints and a [`Connector`]
//! that binds service interfaces to clients scoped to the realm an inbound
//! request belongs to.
//!
//! ## Quick Start
//!
//! ```no_run
//! use realm_client::{Client, RequestOptions};
//! use serde::Deserialize;
//!
//! #[derive(Deserialize)]
//! struct Thing {
//!     id: u64,
//!     name: String,
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), realm_client::Error> {
//!     let client = Client::builder()
//!         .host("example.com")
//!         .service_name("things")
//!         .session("42smurf99")
//!         .build()?;
//!
//!     // GET http://example.com/api/things/v1/things/7?expand=owner
//!     let options = RequestOptions::new().param("id", 7).param("expand", "owner");
//!     let thing = client.get::<Thing>("/things/:id", Some(&options)).await?;
//!     if let Some(thing) = thing.data {
//!         println!("{}: {}", thing.id, thing.name);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Behaviour
//!
//! - **Path parameters** - `:name` segments are filled from the request
//!   parameters; the rest become the query string. A missing parameter is an
//!   [`Error::MissingParameter`].
//! - **Retries** - `502`, `503` and `504` are retried with jittered
//!   exponential backoff until another status arrives or the call's deadline
//!   or [`CancellationToken`](tokio_util::sync::CancellationToken) ends it.
//!   Other failures are returned at once as [`Error::Request`], carrying up
//!   to 64 KiB of the response body.
//! - **Decoding** - success bodies must be `application/json`; `204` and `205`
//!   decode to nothing.
//! - **Identity** - the session travels in the `checkpoint.session` cookie,
//!   the request identifier in `Request-Id`.
//!
//! ## Realms
//!
//! ```no_run
//! use realm_client::{Client, Connector, Options, RealmsConfig};
//! use std::sync::Arc;
//!
//! trait Things: Send + Sync {}
//! struct HttpThings(Client);
//! impl Things for HttpThings {}
//!
//! # fn example(req: http::Request<()>) -> Result<(), realm_client::Error> {
//! let realms = RealmsConfig::from_json(r#"{"acme": {"host": "acme.example.com", "session": "s"}}"#)?;
//! let connector = Connector::with_base_options(realms, Options {
//!     service_name: "things".into(),
//!     ..Default::default()
//! })?;
//! connector.register::<dyn Things, _>(|client| Ok(Arc::new(HttpThings(client)) as Arc<dyn Things>));
//!
//! // Per inbound request:
//! let mut things: Option<Arc<dyn Things>> = None;
//! connector.with_request(&req)?.connect(&mut [&mut things])?;
//! # Ok(())
//! # }
//! ```

mod client;
mod connector;
mod context;
mod decode;
pub mod endpoint;
mod error;
mod inbound;
pub mod instrument;
mod options;
pub mod realm;
pub mod registry;
mod response;
pub mod retry;
pub mod status;

pub use client::{Client, ClientBuilder};
pub use connector::Connector;
pub use error::{BoxError, Error, RequestError, Result, ServiceError};
pub use inbound::{REQUEST_ID_HEADER, SESSION_COOKIE, SESSION_PARAM};
pub use instrument::{Attempt, Instrumentation};
pub use options::{Options, Params, RequestOptions};
pub use realm::{RealmConfig, RealmsConfig};
pub use registry::{Capability, Registry, Slot};
pub use response::Response;
pub use retry::RetryStrategy;
