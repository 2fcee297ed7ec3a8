use std::{sync::Arc, time::Duration};

use clap::Parser;
use credcache::{
    fetchers::oauth2::ClientCredentialsFetcher, AccessTokenRef, AppKey, AppSecret, AuthConfig,
    AuthOutcome, AuthorizationListener, Authenticator, TokenTypeRef,
};
use tokio::time;

#[derive(Debug, Parser)]
struct Opts {
    /// The base URL of the issuing authority
    #[arg(short, long, env)]
    base_url: String,

    /// The path of the token endpoint, relative to the base URL
    #[arg(short = 'p', long, env, default_value = "/oauth2/token")]
    auth_path: String,

    /// The key identifying this application to the issuing authority
    #[arg(short = 'k', long, env)]
    app_key: AppKey,

    /// The secret used to authenticate this application
    #[arg(short = 's', long, env, hide_env_values = true)]
    app_secret: AppSecret,

    /// The scope to request
    #[arg(long, env, default_value = credcache::AuthConfig::DEFAULT_SCOPE)]
    scope: String,

    /// Seconds between authentication attempts
    #[arg(short, long, env, default_value_t = 30)]
    interval: u64,
}

#[derive(Debug)]
struct LoggingListener;

impl AuthorizationListener for LoggingListener {
    fn on_authorization(&self, access_token: &AccessTokenRef, token_type: &TokenTypeRef) {
        tracing::info!(
            %token_type,
            token = format_args!("{:#?}", access_token),
            "authorized"
        );
    }

    fn on_invalid(&self) {
        tracing::error!("issuing authority rejected the configured credentials");
    }

    fn on_failure(&self) {
        tracing::warn!("token exchange failed");
    }
}

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .pretty()
        .with_env_filter(tracing_subscriber::filter::EnvFilter::from_default_env())
        .init();

    let opts = Opts::parse();

    let config = AuthConfig::new(&opts.base_url, &opts.auth_path, opts.app_key, opts.app_secret)?
        .with_scope(opts.scope);

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(30))
        .build()?;

    let authenticator = Authenticator::new(ClientCredentialsFetcher::new(client, config));
    authenticator.add_listener(Arc::new(LoggingListener));

    let mut interval = time::interval(Duration::from_secs(opts.interval));
    loop {
        interval.tick().await;

        match authenticator.authenticate().await {
            AuthOutcome::Authorized(token) => {
                tracing::debug!(
                    state = ?authenticator.state(),
                    expiry = token.expiry().0,
                    "pulled token"
                );
            }
            AuthOutcome::Invalid => {
                tracing::error!("giving up; credentials need attention");
                return Ok(());
            }
            AuthOutcome::Failed => {
                tracing::warn!("will try again on the next tick");
            }
        }
    }
}
