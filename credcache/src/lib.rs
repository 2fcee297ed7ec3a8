//! Client credentials token caching with single-flight refresh
//!
//! This library keeps a bearer token obtained through the OAuth2 _client credentials_
//! flow available to any component in a process that needs one, without those
//! components knowing how or when the token is refreshed.
//!
//! An [`Authenticator`] caches the most recent token as an immutable
//! [`TokenSnapshot`]. Calling [`authenticate()`][Authenticator::authenticate()] while
//! the snapshot is valid reports the cached token straight away. Once it is absent or
//! expired, a single refresh is started in the background and every concurrent caller
//! joins it, so a burst of callers produces only one exchange with the authority.
//!
//! Results are fanned out to registered [`AuthorizationListener`]s as one of three
//! outcomes: the token was authorized, the credentials were declined as invalid, or
//! the exchange failed. Errors are never retried automatically.
//!
//! ```
//! use std::sync::Arc;
//!
//! use credcache::{
//!     fetchers::oauth2::ClientCredentialsFetcher, AccessTokenRef, AppKey, AppSecret,
//!     AuthConfig, AuthorizationListener, Authenticator, TokenTypeRef,
//! };
//!
//! struct LogListener;
//!
//! impl AuthorizationListener for LogListener {
//!     fn on_authorization(&self, access_token: &AccessTokenRef, token_type: &TokenTypeRef) {
//!         tracing::info!(%token_type, token = %access_token, "authorized");
//!     }
//!
//!     fn on_invalid(&self) {
//!         tracing::error!("credentials rejected");
//!     }
//!
//!     fn on_failure(&self) {
//!         tracing::warn!("token exchange failed");
//!     }
//! }
//!
//! # fn main() -> Result<(), credcache::ConfigError> {
//! let config = AuthConfig::new(
//!     "https://auth.example.com",
//!     "/oauth2/token",
//!     AppKey::from_static("my-app"),
//!     AppSecret::from_static("my-secret"),
//! )?;
//!
//! let fetcher = ClientCredentialsFetcher::new(reqwest::Client::new(), config);
//! let authenticator = Authenticator::new(fetcher);
//! authenticator.add_listener(Arc::new(LogListener));
//!
//! # /* Commented out due to this trying to interact with the world.
//! let outcome = authenticator.authenticate().await;
//! # */
//! # Ok(())
//! # }
//! ```
//!
//! # Features
//!
//! * `rustls-tls`: Enables TLS for the underlying [reqwest] client using rustls.
//! * `default-tls`: Enables TLS for the underlying [reqwest] client using the platform
//!   default implementation.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(
    missing_docs,
    unused_import_braces,
    unused_imports,
    unused_qualifications
)]
#![deny(
    missing_debug_implementations,
    trivial_numeric_casts,
    unsafe_code,
    unused_must_use
)]

mod authenticator;
mod braids;
mod config;
pub mod fetchers;
mod listener;
mod snapshot;
mod watcher;

pub use authenticator::{AuthOutcome, AuthState, Authenticator};
pub use braids::*;
pub use config::{AuthConfig, ConfigError};
pub use listener::{AuthorizationListener, ListenerRegistry, SharedListener};
pub use snapshot::TokenSnapshot;
pub use watcher::{BorrowedToken, TokenPublisherQuit, TokenWatcher};
