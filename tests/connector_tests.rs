//! Realm scoping and service binding through the connector.

use realm_client::{
    Client, Connector, Error, Options, RealmConfig, RealmsConfig, ServiceError,
};
use serde_json::Value;
use std::sync::Arc;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

trait ServiceA: Send + Sync {
    fn client(&self) -> &Client;
}

trait ServiceB: Send + Sync {
    fn client(&self) -> &Client;
}

struct HttpServiceA(Client);

impl ServiceA for HttpServiceA {
    fn client(&self) -> &Client {
        &self.0
    }
}

struct HttpServiceB(Client);

impl ServiceB for HttpServiceB {
    fn client(&self) -> &Client {
        &self.0
    }
}

fn realms() -> RealmsConfig {
    RealmsConfig::from_json(
        r#"{
            "acme_inc": {
                "host": "example.com",
                "aliases": ["acme.test"],
                "session": "42smurf99"
            },
            "globex": {
                "host": "globex.test",
                "session": "g10b3x"
            }
        }"#,
    )
    .unwrap()
}

fn connector() -> Connector {
    let connector = Connector::with_base_options(
        realms(),
        Options {
            service_name: "frobnitz".into(),
            ..Default::default()
        },
    )
    .unwrap();
    connector.register::<dyn ServiceA, _>(|client| Ok(Arc::new(HttpServiceA(client)) as Arc<dyn ServiceA>));
    connector.register::<dyn ServiceB, _>(|client| Ok(Arc::new(HttpServiceB(client)) as Arc<dyn ServiceB>));
    connector
}

fn inbound(host: &str) -> http::request::Builder {
    http::Request::builder().uri("/things").header("host", host)
}

#[test]
fn test_connect_success() {
    let connector = connector();
    let mut a: Option<Arc<dyn ServiceA>> = None;

    connector.connect(&mut [&mut a]).unwrap();

    assert!(a.is_some());
}

#[test]
fn test_connect_multiple() {
    let connector = connector();
    let mut a: Option<Arc<dyn ServiceA>> = None;
    let mut b: Option<Arc<dyn ServiceB>> = None;

    connector.connect(&mut [&mut a, &mut b]).unwrap();

    assert!(a.is_some());
    assert!(b.is_some());
}

#[test]
fn test_connect_no_slots() {
    connector().connect(&mut []).unwrap();
}

#[test]
fn test_connect_unregistered() {
    trait Unknown: Send + Sync {}

    let connector = connector();
    let mut missing: Option<Arc<dyn Unknown>> = None;

    match connector.connect(&mut [&mut missing]) {
        Err(Error::Service {
            index,
            source: ServiceError::NotRegistered { capability },
        }) => {
            assert_eq!(index, 0);
            assert!(capability.contains("Unknown"));
        }
        other => panic!("Expected NotRegistered, got {:?}", other),
    }
    assert!(missing.is_none());
}

#[test]
fn test_connect_reports_failing_position() {
    trait Unknown: Send + Sync {}

    let connector = connector();
    let mut a: Option<Arc<dyn ServiceA>> = None;
    let mut missing: Option<Arc<dyn Unknown>> = None;

    let err = connector.connect(&mut [&mut a, &mut missing]).unwrap_err();

    assert!(matches!(err, Error::Service { index: 1, .. }), "got {:?}", err);
    assert!(a.is_some());
}

#[test]
fn test_factory_failure() {
    trait Flaky: Send + Sync + std::fmt::Debug {}

    let connector = connector();
    connector.register::<dyn Flaky, _>(|_client| Err("backend offline".into()));

    let err = connector.resolve::<dyn Flaky>().unwrap_err();
    match err {
        Error::Service {
            source: ServiceError::Factory { source, .. },
            ..
        } => assert_eq!(source.to_string(), "backend offline"),
        other => panic!("Expected factory failure, got {:?}", other),
    }
}

#[test]
fn test_with_request_success() {
    let req = inbound("example.com").body(()).unwrap();

    let scoped = connector().with_request(&req).unwrap();
    let mut a: Option<Arc<dyn ServiceA>> = None;
    scoped.connect(&mut [&mut a]).unwrap();

    let options = a.unwrap().client().options().clone();
    assert_eq!(options.host, "example.com");
    assert_eq!(options.session, "42smurf99");
    assert_eq!(options.service_name, "frobnitz");
}

#[test]
fn test_with_request_forwarded_host() {
    let req = inbound("internal.lb")
        .header("x-forwarded-host", "globex.test")
        .body(())
        .unwrap();

    let scoped = connector().with_request(&req).unwrap();

    assert_eq!(scoped.client().options().host, "globex.test");
    assert_eq!(scoped.client().options().session, "g10b3x");
}

#[test]
fn test_with_request_default_port() {
    let req = inbound("example.com:80").body(()).unwrap();

    let scoped = connector().with_request(&req).unwrap();

    assert_eq!(scoped.client().options().host, "example.com");
}

#[test]
fn test_with_request_alias() {
    let req = inbound("acme.test").body(()).unwrap();

    let scoped = connector().with_request(&req).unwrap();

    assert_eq!(scoped.client().options().host, "example.com");
    assert_eq!(scoped.client().options().session, "42smurf99");
}

#[test]
fn test_with_request_no_config() {
    let req = inbound("smurf.com").body(()).unwrap();

    match connector().with_request(&req) {
        Err(Error::NoHostConfig { host }) => assert_eq!(host, "smurf.com"),
        other => panic!("Expected NoHostConfig, got {:?}", other),
    }
}

#[test]
fn test_with_request_inherits_request_id() {
    let req = inbound("example.com")
        .header("request-id", "abc-123")
        .body(())
        .unwrap();

    let scoped = connector().with_request(&req).unwrap();

    assert_eq!(scoped.client().options().request_id, "abc-123");
}

#[test]
fn test_with_realm() {
    let connector = connector();

    let scoped = connector.with_realm("globex").unwrap();
    assert_eq!(scoped.client().options().host, "globex.test");
    assert_eq!(connector.client().options().host, "");

    match connector.with_realm("initech") {
        Err(Error::UnknownRealm { name }) => assert_eq!(name, "initech"),
        other => panic!("Expected UnknownRealm, got {:?}", other),
    }
}

#[test]
fn test_registry_is_shared_with_scoped_connectors() {
    trait Late: Send + Sync {}
    struct LateImpl;
    impl Late for LateImpl {}

    let connector = connector();
    let scoped = connector.with_realm("acme_inc").unwrap();
    connector.register::<dyn Late, _>(|_client| Ok(Arc::new(LateImpl) as Arc<dyn Late>));

    assert!(scoped.resolve::<dyn Late>().is_ok());
    assert_eq!(scoped.registry().len(), 3);
}

#[tokio::test]
async fn test_scoped_service_calls_realm_host() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/frobnitz/v1/ping"))
        .and(header("cookie", "checkpoint.session=l0c4l"))
        .and(header("request-id", "req-7"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"pong": true})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let address = mock_server.address().to_string();
    let realms: RealmsConfig = [(
        "local",
        RealmConfig {
            host: address.clone(),
            session: "l0c4l".into(),
            ..Default::default()
        },
    )]
    .into_iter()
    .collect();

    let connector = Connector::with_base_options(
        realms,
        Options {
            service_name: "frobnitz".into(),
            ..Default::default()
        },
    )
    .unwrap();
    connector.register::<dyn ServiceA, _>(|client| Ok(Arc::new(HttpServiceA(client)) as Arc<dyn ServiceA>));

    let req = inbound(&address)
        .header("request-id", "req-7")
        .body(())
        .unwrap();
    let mut a: Option<Arc<dyn ServiceA>> = None;
    connector.with_request(&req).unwrap().connect(&mut [&mut a]).unwrap();

    let response = a
        .unwrap()
        .client()
        .get::<Value>("ping", None)
        .await
        .unwrap();
    assert_eq!(response.data, Some(serde_json::json!({"pong": true})));
}

#[tokio::test]
async fn test_unscoped_client_refuses_to_send() {
    let connector = connector();

    let result = connector.client().get::<Value>("ping", None).await;

    assert!(matches!(result, Err(Error::Configuration(_))), "got {:?}", result);
}
