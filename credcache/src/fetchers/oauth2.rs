//! A token fetcher that performs the OAuth2 client credentials exchange

use async_trait::async_trait;
use credcache_clock::{Clock, DurationSecs, System};
use reqwest::header;

use super::{FetchError, TokenFetcher};
use crate::{AccessToken, AuthConfig, TokenSnapshot, TokenType};

mod dto;

/// Fetches tokens from an authorization endpoint using the client credentials flow
///
/// Each fetch POSTs `grant_type=client_credentials` and the configured scope as
/// form data, authenticating with HTTP Basic credentials built from the app key
/// and secret. No timeout is applied beyond whatever the provided
/// [`reqwest::Client`] is configured with.
#[derive(Debug)]
pub struct ClientCredentialsFetcher<C = System> {
    client: reqwest::Client,
    config: AuthConfig,
    clock: C,
}

impl ClientCredentialsFetcher<System> {
    /// Constructs a new client credentials fetcher
    pub fn new(client: reqwest::Client, config: AuthConfig) -> Self {
        Self {
            client,
            config,
            clock: System,
        }
    }
}

impl<C> ClientCredentialsFetcher<C> {
    /// Sets a custom clock used to stamp the issue time of new tokens
    ///
    /// Useful for testing purposes
    pub fn with_clock<D>(self, clock: D) -> ClientCredentialsFetcher<D> {
        ClientCredentialsFetcher {
            client: self.client,
            config: self.config,
            clock,
        }
    }

    /// The configuration used for each exchange
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }
}

#[async_trait]
impl<C: Clock + Send + Sync> TokenFetcher for ClientCredentialsFetcher<C> {
    async fn fetch(&self) -> Result<TokenSnapshot, FetchError> {
        request_token(&self.client, &self.config, &self.clock).await
    }
}

#[tracing::instrument(
    err,
    skip(client, config, clock),
    fields(
        token_url = %config.token_url(),
        app_key = %config.app_key(),
        scope = config.scope(),
    ),
)]
async fn request_token<C: Clock>(
    client: &reqwest::Client,
    config: &AuthConfig,
    clock: &C,
) -> Result<TokenSnapshot, FetchError> {
    tracing::trace!("requesting token from authority");

    let resp = client
        .post(config.token_url().clone())
        .header(header::ACCEPT, "application/json")
        .basic_auth(config.app_key().as_str(), Some(config.app_secret().as_str()))
        .form(&dto::ClientCredentialsGrant::new(config.scope()))
        .send()
        .await
        .map_err(FetchError::RequestSend)?;

    let status = resp.status();

    tracing::debug!(
        response.status = status.as_u16(),
        "received token response from issuing authority"
    );

    if !status.is_success() {
        let body = match resp.text().await {
            Ok(body) => body,
            Err(error) => {
                tracing::trace!(
                    error = (&error as &dyn std::error::Error),
                    "unable to read rejection body"
                );
                String::new()
            }
        };
        tracing::trace!(%body, "authority rejection body");
        return Err(FetchError::Rejected {
            status: status.as_u16(),
            body,
        });
    }

    let body = resp.bytes().await.map_err(FetchError::BodyRead)?;
    let resp: dto::TokenResponse = serde_json::from_slice(&body)?;

    let token = TokenSnapshot::issued_now(
        AccessToken::from(resp.access_token),
        TokenType::from(resp.token_type),
        DurationSecs(resp.expires_in),
        clock,
    );

    if token.is_present() {
        tracing::info!(
            token_type = %token.token_type(),
            lifetime = token.lifetime().0,
            expiry = token.expiry().0,
            "received new token"
        );
    } else {
        tracing::warn!("authority response did not include a usable token");
    }

    Ok(token)
}
