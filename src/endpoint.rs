//! Endpoint URL construction.
//!
//! URLs have the shape `{protocol}://{host}/api/{service}/v{version}/{path}?{query}`.
//! Path templates may contain `:name` segments, which are filled from the
//! request parameters. Parameters used this way are removed so that they do
//! not also appear in the query string.

use crate::options::{Options, Params};
use crate::{Error, Result};
use std::fmt::Write;
use url::Url;

/// Builds the full URL for `path`, consuming any parameters used as path
/// placeholders.
///
/// # Errors
///
/// Returns [`Error::MissingParameter`] for an unresolved placeholder and
/// [`Error::InvalidUrl`] if the protocol and host do not form a valid URL.
///
/// # Examples
///
/// ```
/// use realm_client::{endpoint::format_endpoint_url, Options, Params};
///
/// let options = Options {
///     protocol: "http".into(),
///     host: "localhost:8080".into(),
///     service_name: "frobnitz".into(),
///     api_version: 1,
///     ..Default::default()
/// };
/// let mut params = Params::from([("name", "drkropotkin"), ("format", "json")]);
///
/// let url = format_endpoint_url(&options, "/get/:name", &mut params).unwrap();
/// assert_eq!(url.as_str(), "http://localhost:8080/api/frobnitz/v1/get/drkropotkin?format=json");
/// assert!(!params.contains_key("name"));
/// ```
pub fn format_endpoint_url(options: &Options, path: &str, params: &mut Params) -> Result<Url> {
    let path = substitute_path_params(path, params)?;
    let path = path.strip_prefix('/').unwrap_or(&path);

    let mut url = Url::parse(&format!("{}://{}", options.protocol, options.host))?;
    url.set_path(&format!(
        "/api/{}/v{}/{}",
        options.service_name, options.api_version, path
    ));

    if !params.is_empty() {
        let mut query = url.query_pairs_mut();
        for (key, values) in params.iter() {
            for value in values {
                query.append_pair(key, value);
            }
        }
    }

    Ok(url)
}

/// Replaces every `:name` segment of `path` with the escaped value of `name`.
///
/// Multiple values are joined with `,`. Used keys are removed from `params`
/// once every placeholder has been resolved. A lone `:` is not a placeholder.
pub fn substitute_path_params(path: &str, params: &mut Params) -> Result<String> {
    if !path.contains(':') {
        return Ok(path.to_string());
    }

    let mut used = Vec::new();
    let mut segments = Vec::new();
    for segment in path.split('/') {
        match segment.strip_prefix(':') {
            Some(name) if !name.is_empty() => {
                let values = params.get(name).ok_or_else(|| Error::MissingParameter {
                    name: name.to_string(),
                })?;
                segments.push(escape_path_segment(&values.join(",")));
                used.push(name);
            }
            _ => segments.push(segment.to_string()),
        }
    }

    for name in used {
        params.remove(name);
    }
    Ok(segments.join("/"))
}

/// Percent-escapes a value for use as a single path segment.
///
/// Unreserved characters and `$&+,:;=@` are kept; everything else, `/`
/// included, is encoded.
pub fn escape_path_segment(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for byte in value.bytes() {
        let keep = byte.is_ascii_alphanumeric()
            || matches!(
                byte,
                b'-' | b'_' | b'.' | b'~' | b'$' | b'&' | b'+' | b',' | b':' | b';' | b'=' | b'@'
            );
        if keep {
            escaped.push(byte as char);
        } else {
            let _ = write!(escaped, "%{:02X}", byte);
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options() -> Options {
        Options {
            protocol: "http".into(),
            host: "localhost".into(),
            service_name: "frobnitz".into(),
            api_version: 1,
            ..Default::default()
        }
    }

    fn format(path: &str, params: &mut Params) -> Result<String> {
        format_endpoint_url(&options(), path, params).map(String::from)
    }

    #[test]
    fn leading_slash_is_optional() {
        let with = format("/hello", &mut Params::new()).unwrap();
        let without = format("hello", &mut Params::new()).unwrap();
        assert_eq!(with, "http://localhost/api/frobnitz/v1/hello");
        assert_eq!(with, without);
    }

    #[test]
    fn api_version_is_part_of_the_prefix() {
        let options = Options {
            api_version: 3,
            ..options()
        };
        let url = format_endpoint_url(&options, "hello", &mut Params::new()).unwrap();
        assert_eq!(url.path(), "/api/frobnitz/v3/hello");
    }

    #[test]
    fn path_params_are_substituted_and_consumed() {
        let mut params = Params::from([("name", "drkropotkin"), ("format", "json")]);
        let url = format("/get/:name", &mut params).unwrap();
        assert_eq!(url, "http://localhost/api/frobnitz/v1/get/drkropotkin?format=json");
        assert_eq!(params, Params::from([("format", "json")]));
    }

    #[test]
    fn repeated_placeholder_uses_same_value() {
        let mut params = Params::from([("id", 7)]);
        let url = format("/a/:id/b/:id", &mut params).unwrap();
        assert_eq!(url, "http://localhost/api/frobnitz/v1/a/7/b/7");
        assert!(params.is_empty());
    }

    #[test]
    fn missing_placeholder_names_the_key() {
        let mut params = Params::from([("other", "x")]);
        match format("/foo/:missing", &mut params) {
            Err(Error::MissingParameter { name }) => assert_eq!(name, "missing"),
            other => panic!("Expected MissingParameter, got {:?}", other),
        }
        assert!(params.contains_key("other"));
    }

    #[test]
    fn lone_colon_is_literal() {
        let url = format("/foo/:/bar", &mut Params::new()).unwrap();
        assert_eq!(url, "http://localhost/api/frobnitz/v1/foo/:/bar");
    }

    #[test]
    fn multiple_values_join_with_commas() {
        let mut params: Params = [("ids", "a"), ("ids", "b c")].into_iter().collect();
        let url = format("/things/:ids", &mut params).unwrap();
        assert_eq!(url, "http://localhost/api/frobnitz/v1/things/a,b%20c");
    }

    #[test]
    fn substituted_values_are_escaped() {
        let mut params = Params::from([("name", "foo/bar")]);
        let url = format("/get/:name", &mut params).unwrap();
        assert_eq!(url, "http://localhost/api/frobnitz/v1/get/foo%2Fbar");
    }

    #[test]
    fn query_is_sorted_and_encoded() {
        let mut params: Params = [("z", "last"), ("a", "x y"), ("a", "&")].into_iter().collect();
        let url = format("search", &mut params).unwrap();
        assert_eq!(url, "http://localhost/api/frobnitz/v1/search?a=x+y&a=%26&z=last");
    }

    #[test]
    fn escape_table() {
        for (input, expected) in [
            ("", ""),
            ("foo bar", "foo%20bar"),
            ("foo/bar", "foo%2Fbar"),
            ("!@#$%^&*():;?.,", "%21@%23$%25%5E&%2A%28%29:;%3F.,"),
        ] {
            assert_eq!(escape_path_segment(input), expected, "{input:?}");
        }
    }
}
