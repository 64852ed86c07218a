//! JSON envelope checks and decoding.

use crate::{Error, Result};
use http::header::{CONTENT_LENGTH, CONTENT_TYPE};
use http::{HeaderMap, StatusCode};
use serde::de::DeserializeOwned;

/// Returns `true` if the headers declare an empty body.
pub(crate) fn declares_empty_body(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<u64>().ok())
        == Some(0)
}

/// Checks that the response declares `application/json`.
///
/// Parameters such as `charset` are allowed; the media type itself must match
/// exactly.
pub(crate) fn check_content_type(headers: &HeaderMap) -> Result<()> {
    let value = match headers.get(CONTENT_TYPE) {
        Some(value) => value,
        None => return Err(Error::UnexpectedContentType { media_type: None }),
    };
    let value = String::from_utf8_lossy(value.as_bytes()).into_owned();

    let media_type: mime::Mime = value
        .parse()
        .map_err(|source| Error::InvalidContentType { value: value.clone(), source })?;

    if media_type.essence_str() != mime::APPLICATION_JSON.essence_str() {
        return Err(Error::UnexpectedContentType {
            media_type: Some(media_type.essence_str().to_string()),
        });
    }
    Ok(())
}

/// Decodes a response body into `T`.
///
/// Returns `Ok(None)` without looking at the body when the headers declare a
/// zero content length.
pub(crate) fn decode_json<T>(status: StatusCode, headers: &HeaderMap, body: &[u8]) -> Result<Option<T>>
where
    T: DeserializeOwned,
{
    if declares_empty_body(headers) {
        return Ok(None);
    }
    check_content_type(headers)?;
    serde_json::from_slice(body)
        .map(Some)
        .map_err(|source| Error::Decode { status, source })
}
