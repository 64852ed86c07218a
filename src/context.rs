//! Cancellation and deadline handling for a single call.

use crate::options::Options;
use crate::{Error, Result};
use std::future::{pending, Future};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// The cancellation scope of one logical call, shared by all its attempts.
#[derive(Debug, Clone, Default)]
pub(crate) struct CallContext {
    cancellation: Option<CancellationToken>,
    deadline: Option<Instant>,
}

impl CallContext {
    pub(crate) fn from_options(options: &Options) -> Self {
        Self {
            cancellation: options.cancellation.clone(),
            deadline: options.deadline,
        }
    }

    /// Returns the error describing why the context ended, if it has.
    pub(crate) fn done(&self) -> Option<Error> {
        if self.cancellation.as_ref().is_some_and(|t| t.is_cancelled()) {
            return Some(Error::Cancelled);
        }
        if self.deadline.is_some_and(|d| Instant::now() >= d) {
            return Some(Error::DeadlineExceeded);
        }
        None
    }

    /// Runs `fut` until it completes or the context ends, whichever is first.
    pub(crate) async fn run<F>(&self, fut: F) -> Result<F::Output>
    where
        F: Future,
    {
        let cancelled = async {
            match &self.cancellation {
                Some(token) => token.cancelled().await,
                None => pending().await,
            }
        };
        let expired = async {
            match self.deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => pending().await,
            }
        };

        tokio::select! {
            biased;
            _ = cancelled => Err(Error::Cancelled),
            _ = expired => Err(Error::DeadlineExceeded),
            output = fut => Ok(output),
        }
    }

    /// Sleeps for `delay`, returning early with an error if the context ends.
    pub(crate) async fn sleep(&self, delay: std::time::Duration) -> Result<()> {
        self.run(tokio::time::sleep(delay)).await
    }
}
