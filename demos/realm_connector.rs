//! Example binding a service interface to realm-scoped clients.
//!
//! This example shows how to:
//! - Load realm configuration from JSON
//! - Register a service factory with a connector
//! - Scope the connector to the realm an inbound request belongs to
//! - Call the service and handle request failures
//!
//! Run with: `cargo run --example realm_connector`

use realm_client::{Client, Connector, Error, Options, RealmsConfig};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Deserialize)]
#[allow(dead_code)]
struct Account {
    id: u64,
    name: String,
}

/// What request handlers depend on.
trait Accounts: Send + Sync {
    fn client(&self) -> &Client;
}

struct HttpAccounts {
    client: Client,
}

impl Accounts for HttpAccounts {
    fn client(&self) -> &Client {
        &self.client
    }
}

const REALMS: &str = r#"{
    "acme_inc": {
        "host": "acme.example.com",
        "aliases": ["localhost:8080"],
        "session": "42smurf99"
    },
    "globex": {
        "host": "globex.example.com",
        "session": "g10b3x"
    }
}"#;

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter("realm_client=debug,realm_connector=info")
        .init();

    let connector = Connector::with_base_options(
        RealmsConfig::from_json(REALMS)?,
        Options {
            service_name: "accounts".into(),
            api_version: 2,
            timeout: Some(Duration::from_secs(5)),
            deadline: Some(tokio::time::Instant::now() + Duration::from_secs(10)),
            ..Default::default()
        },
    )?;
    connector.register::<dyn Accounts, _>(|client| Ok(Arc::new(HttpAccounts { client }) as Arc<dyn Accounts>));

    for (name, realm) in connector.realms().iter() {
        println!("Realm {} served at {} (aliases: {:?})", name, realm.host, realm.aliases);
    }

    // An inbound request as a server framework would hand it over.
    let inbound = http::Request::builder()
        .uri("/dashboard")
        .header("host", "localhost:8080")
        .header("request-id", "demo-1")
        .body(())
        .map_err(|e| Error::Configuration(e.to_string()))?;

    let scoped = connector.with_request(&inbound)?;
    let mut accounts: Option<Arc<dyn Accounts>> = None;
    scoped.connect(&mut [&mut accounts])?;

    let Some(accounts) = accounts else {
        return Ok(());
    };
    println!("Bound accounts service to {:?}", accounts.client().options().host);

    let options = realm_client::RequestOptions::new().param("id", 7);
    match accounts
        .client()
        .get::<Account>("/accounts/:id", Some(&options))
        .await
    {
        Ok(response) => println!("Account: {:?} ({} attempts)", response.data, response.attempts),
        Err(e) if e.is_not_found() => println!("No such account"),
        Err(Error::Request(err)) => println!("Server refused: {}", err),
        Err(e) => println!("Call failed: {}", e),
    }

    Ok(())
}
