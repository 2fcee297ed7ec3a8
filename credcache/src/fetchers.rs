//! Token fetchers

use std::error;

use async_trait::async_trait;
use thiserror::Error;

use crate::TokenSnapshot;

pub mod oauth2;

/// Performs a single exchange with an authority to obtain a new token
///
/// Each call is independent. Implementations hold no state about prior fetches
/// and must release any connection they acquire before returning, whatever the
/// result.
#[async_trait]
pub trait TokenFetcher: Send + Sync {
    /// Requests a fresh token from the authority
    async fn fetch(&self) -> Result<TokenSnapshot, FetchError>;
}

#[async_trait]
impl<F: TokenFetcher + ?Sized> TokenFetcher for std::sync::Arc<F> {
    async fn fetch(&self) -> Result<TokenSnapshot, FetchError> {
        (**self).fetch().await
    }
}

/// An error while attempting to obtain a token from the authority
///
/// Errors fall into two classes: the authority _rejected_ the request, which
/// usually means bad credentials or configuration, or the exchange _failed_
/// for any other reason. See [`FetchError::is_rejection()`].
#[derive(Debug, Error)]
pub enum FetchError {
    /// The authority answered with a non-success status
    #[error("authority rejected the token request with status {status}")]
    Rejected {
        /// The HTTP status code returned
        status: u16,
        /// The body of the response, kept for diagnostics only
        body: String,
    },
    /// Unable to send a token request to the authority
    #[error("error sending request to authority")]
    RequestSend(#[source] reqwest::Error),
    /// Unable to read the response
    #[error("error reading response body")]
    BodyRead(#[source] reqwest::Error),
    /// Unable to deserialize the token body
    #[error("error deserializing token body from authority")]
    TokenBody(#[from] serde_json::Error),
    /// Any other failure raised by a custom fetcher
    #[error("token exchange failed")]
    Other(#[source] Box<dyn error::Error + Send + Sync + 'static>),
}

impl FetchError {
    /// Whether the authority declined the request, as opposed to the exchange failing
    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::Rejected { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_rejections() {
        let rejected = FetchError::Rejected {
            status: 401,
            body: "{\"error\":\"invalid_client\"}".into(),
        };
        assert!(rejected.is_rejection());
        assert_eq!(
            rejected.to_string(),
            "authority rejected the token request with status 401"
        );

        let failed = FetchError::Other("connection reset".into());
        assert!(!failed.is_rejection());
        assert!(error::Error::source(&failed).is_some());
    }
}
