//! Response status classification.

use http::StatusCode;

/// What the executor does with a response status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// `200..=299`.
    Success,
    /// `502`, `503` and `504`: transient upstream failures, retried.
    RetriableFailure,
    /// Everything else, returned to the caller immediately.
    TerminalFailure,
}

impl Classification {
    /// Classifies a response status.
    ///
    /// # Examples
    ///
    /// ```
    /// use http::StatusCode;
    /// use realm_client::status::Classification;
    ///
    /// assert_eq!(Classification::of(StatusCode::CREATED), Classification::Success);
    /// assert_eq!(Classification::of(StatusCode::BAD_GATEWAY), Classification::RetriableFailure);
    /// assert_eq!(Classification::of(StatusCode::NOT_FOUND), Classification::TerminalFailure);
    /// ```
    pub fn of(status: StatusCode) -> Self {
        match status {
            s if s.is_success() => Classification::Success,
            StatusCode::BAD_GATEWAY
            | StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::GATEWAY_TIMEOUT => Classification::RetriableFailure,
            _ => Classification::TerminalFailure,
        }
    }
}

/// Returns `false` for statuses that never carry a body (`204`, `205`).
pub fn yields_body(status: StatusCode) -> bool {
    !matches!(status, StatusCode::NO_CONTENT | StatusCode::RESET_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classify(code: u16) -> Classification {
        Classification::of(StatusCode::from_u16(code).unwrap())
    }

    #[test]
    fn every_2xx_is_success() {
        for code in 200..=299 {
            assert_eq!(classify(code), Classification::Success, "{code}");
        }
    }

    #[test]
    fn only_gateway_failures_retry() {
        for code in (100..=199).chain(300..=599) {
            let expected = match code {
                502..=504 => Classification::RetriableFailure,
                _ => Classification::TerminalFailure,
            };
            assert_eq!(classify(code), expected, "{code}");
        }
    }

    #[test]
    fn no_content_statuses_have_no_body() {
        assert!(!yields_body(StatusCode::NO_CONTENT));
        assert!(!yields_body(StatusCode::RESET_CONTENT));
        assert!(yields_body(StatusCode::OK));
        assert!(yields_body(StatusCode::CREATED));
        assert!(yields_body(StatusCode::NOT_FOUND));
    }
}
