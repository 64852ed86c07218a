//! Signals read from an inbound HTTP request.
//!
//! A service handling a request can derive a client for its own backend
//! calls from that request: the host picks the realm, and the session and
//! request identifier are passed along.

use crate::realm::strip_default_port;
use http::header::{COOKIE, HOST};
use http::{HeaderMap, Request};

/// Cookie carrying the session token.
pub const SESSION_COOKIE: &str = "checkpoint.session";

/// Query parameter carrying the session token.
pub const SESSION_PARAM: &str = "session";

/// Header carrying the request identifier.
pub const REQUEST_ID_HEADER: &str = "request-id";

const FORWARDED_HOST_HEADER: &str = "x-forwarded-host";
const FORWARDED_PROTO_HEADER: &str = "x-forwarded-proto";

/// What an inbound request says about who it is for.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct Inbound {
    pub host: Option<String>,
    pub protocol: Option<String>,
    pub session: Option<String>,
    pub request_id: Option<String>,
}

impl Inbound {
    pub fn from_request<B>(req: &Request<B>) -> Self {
        let headers = req.headers();
        let uri = req.uri();

        let host = last_header_value(headers, FORWARDED_HOST_HEADER)
            .or_else(|| header_str(headers, HOST.as_str()).map(str::to_string))
            .or_else(|| uri.authority().map(|a| a.as_str().to_string()))
            .map(|host| strip_default_port(&host).to_string())
            .filter(|host| !host.is_empty());

        let protocol = last_header_value(headers, FORWARDED_PROTO_HEADER)
            .or_else(|| uri.scheme_str().map(str::to_string));

        let session = cookie(headers, SESSION_COOKIE).or_else(|| {
            uri.query().and_then(|query| {
                url::form_urlencoded::parse(query.as_bytes())
                    .find(|(key, _)| key == SESSION_PARAM)
                    .map(|(_, value)| value.into_owned())
            })
        });

        let request_id = header_str(headers, REQUEST_ID_HEADER).map(str::to_string);

        Self {
            host,
            protocol,
            session: session.filter(|s| !s.is_empty()),
            request_id: request_id.filter(|id| !id.is_empty()),
        }
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name)?.to_str().ok().map(str::trim)
}

/// Returns the last value of a possibly repeated, possibly comma-joined header.
fn last_header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    let value = headers.get_all(name).iter().last()?.to_str().ok()?;
    value
        .rsplit(',')
        .next()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.trim_matches('"').to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(uri: &str) -> http::request::Builder {
        Request::builder().uri(uri)
    }

    #[test]
    fn host_comes_from_uri() {
        let req = request("http://example.com/").body(()).unwrap();
        let inbound = Inbound::from_request(&req);
        assert_eq!(inbound.host.as_deref(), Some("example.com"));
        assert_eq!(inbound.protocol.as_deref(), Some("http"));
    }

    #[test]
    fn host_header_wins_over_uri_and_default_port_is_stripped() {
        let req = request("/things")
            .header(HOST, "example.com:80")
            .body(())
            .unwrap();
        let inbound = Inbound::from_request(&req);
        assert_eq!(inbound.host.as_deref(), Some("example.com"));
        assert_eq!(inbound.protocol, None);
    }

    #[test]
    fn non_default_port_is_kept() {
        let req = request("/").header(HOST, "localhost:3000").body(()).unwrap();
        assert_eq!(
            Inbound::from_request(&req).host.as_deref(),
            Some("localhost:3000")
        );
    }

    #[test]
    fn last_forwarded_host_wins() {
        let req = request("http://internal.local/")
            .header("X-Forwarded-Host", "first.example.com")
            .header("X-Forwarded-Host", "edge.example.com, example.com")
            .header("X-Forwarded-Proto", "https")
            .body(())
            .unwrap();
        let inbound = Inbound::from_request(&req);
        assert_eq!(inbound.host.as_deref(), Some("example.com"));
        assert_eq!(inbound.protocol.as_deref(), Some("https"));
    }

    #[test]
    fn session_cookie_wins_over_query() {
        let req = request("http://example.com/?session=fromquery")
            .header(COOKIE, "theme=dark; checkpoint.session=uio3ui3ui3")
            .body(())
            .unwrap();
        assert_eq!(
            Inbound::from_request(&req).session.as_deref(),
            Some("uio3ui3ui3")
        );
    }

    #[test]
    fn session_falls_back_to_query() {
        let req = request("http://example.com/?a=1&session=uio3ui3ui3")
            .body(())
            .unwrap();
        assert_eq!(
            Inbound::from_request(&req).session.as_deref(),
            Some("uio3ui3ui3")
        );
    }

    #[test]
    fn request_id_is_read() {
        let req = request("http://example.com/")
            .header("Request-Id", "abc-123")
            .body(())
            .unwrap();
        assert_eq!(
            Inbound::from_request(&req).request_id.as_deref(),
            Some("abc-123")
        );
    }
}
