//! Authorization endpoint configuration

use thiserror::Error;
use url::Url;

use crate::{AppKey, AppKeyRef, AppSecret, AppSecretRef};

/// Where and how to request client credentials tokens
///
/// The configuration is supplied by the embedding application; this crate only
/// reads it.
#[derive(Clone, Debug)]
pub struct AuthConfig {
    token_url: Url,
    app_key: AppKey,
    app_secret: AppSecret,
    scope: String,
}

/// The configuration could not be used
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The base URL and authorization path do not form a valid URL
    #[error("invalid authorization endpoint URL `{url}`")]
    InvalidUrl {
        /// The URL that failed to parse
        url: String,
        /// The underlying parse error
        #[source]
        source: url::ParseError,
    },
}

impl AuthConfig {
    /// The scope requested when none is configured
    pub const DEFAULT_SCOPE: &'static str = "client";

    /// Constructs a configuration from a base URL and the path of the authorization endpoint
    ///
    /// The two are joined with exactly one `/` between them, so either may carry the
    /// separator.
    pub fn new(
        base_url: &str,
        auth_path: &str,
        app_key: AppKey,
        app_secret: AppSecret,
    ) -> Result<Self, ConfigError> {
        let url = format!(
            "{}/{}",
            base_url.trim_end_matches('/'),
            auth_path.trim_start_matches('/')
        );

        let token_url = match Url::parse(&url) {
            Ok(token_url) => token_url,
            Err(source) => return Err(ConfigError::InvalidUrl { url, source }),
        };

        Ok(Self::from_token_url(token_url, app_key, app_secret))
    }

    /// Constructs a configuration from the full URL of the authorization endpoint
    pub fn from_token_url(token_url: Url, app_key: AppKey, app_secret: AppSecret) -> Self {
        Self {
            token_url,
            app_key,
            app_secret,
            scope: Self::DEFAULT_SCOPE.to_owned(),
        }
    }

    /// Overrides the requested scope
    #[must_use]
    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = scope.into();
        self
    }

    /// The authorization endpoint
    pub fn token_url(&self) -> &Url {
        &self.token_url
    }

    /// The application key
    pub fn app_key(&self) -> &AppKeyRef {
        &self.app_key
    }

    /// The application secret
    pub fn app_secret(&self) -> &AppSecretRef {
        &self.app_secret
    }

    /// The scope requested from the authority
    pub fn scope(&self) -> &str {
        &self.scope
    }
}
