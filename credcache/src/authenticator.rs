use std::{
    error, fmt,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use credcache_clock::{Clock, System};
use tokio::sync::watch;

use crate::{
    fetchers::TokenFetcher,
    listener::{ListenerRegistry, SharedListener},
    TokenSnapshot, TokenWatcher,
};

/// The result of a call to [`Authenticator::authenticate()`]
///
/// This mirrors the listener callback delivered for the same request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AuthOutcome {
    /// A valid token is available
    Authorized(Arc<TokenSnapshot>),
    /// The authority declined the configured credentials
    Invalid,
    /// The token exchange could not be completed
    Failed,
}

impl AuthOutcome {
    /// Whether a token was obtained
    pub fn is_authorized(&self) -> bool {
        matches!(self, Self::Authorized(_))
    }

    /// The token, if one was obtained
    pub fn token(&self) -> Option<&TokenSnapshot> {
        match self {
            Self::Authorized(token) => Some(token),
            _ => None,
        }
    }
}

/// Where an authenticator is in the token lifecycle
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AuthState {
    /// No usable token is cached, whether absent or expired
    NoToken,
    /// The cached token is valid
    Valid,
    /// A refresh is in flight
    Refreshing,
}

type PendingOutcome = watch::Receiver<Option<AuthOutcome>>;

/// Keeps a client credentials token fresh and fans results out to listeners
///
/// Construct one per credential set and share it by cloning; clones are cheap
/// and observe the same cached token, listeners and in-flight refresh.
///
/// At most one refresh runs at a time. Callers arriving while a refresh is in
/// flight join it and all observe its outcome. Each refresh runs in its own
/// spawned task and always runs to completion, even if every caller waiting
/// on it goes away, so calls must be made within a Tokio runtime.
pub struct Authenticator<F, C = System> {
    inner: Arc<Inner<F, C>>,
}

struct Inner<F, C> {
    fetcher: F,
    clock: C,
    snapshot: watch::Sender<Arc<TokenSnapshot>>,
    listeners: ListenerRegistry,
    in_flight: Mutex<Option<PendingOutcome>>,
}

impl<F, C> Clone for Authenticator<F, C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<F: fmt::Debug, C: fmt::Debug> fmt::Debug for Authenticator<F, C> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let refreshing = self.inner.lock_in_flight().is_some();
        f.debug_struct("Authenticator")
            .field("fetcher", &self.inner.fetcher)
            .field("clock", &self.inner.clock)
            .field("snapshot", &*self.inner.snapshot.borrow())
            .field("listeners", &self.inner.listeners)
            .field("refreshing", &refreshing)
            .finish()
    }
}

impl<F> Authenticator<F, System>
where
    F: TokenFetcher + 'static,
{
    /// Constructs a new authenticator with no cached token, using the system clock
    pub fn new(fetcher: F) -> Self {
        Self::new_with_clock(fetcher, System)
    }
}

impl<F, C> Authenticator<F, C>
where
    F: TokenFetcher + 'static,
    C: Clock + Send + Sync + 'static,
{
    /// Constructs a new authenticator with no cached token, using the given clock
    pub fn new_with_clock(fetcher: F, clock: C) -> Self {
        let (snapshot, _) = watch::channel(Arc::new(TokenSnapshot::absent()));

        Self {
            inner: Arc::new(Inner {
                fetcher,
                clock,
                snapshot,
                listeners: ListenerRegistry::new(),
                in_flight: Mutex::new(None),
            }),
        }
    }

    /// Obtains a valid token, refreshing it if required, and notifies listeners
    ///
    /// If the cached token is still valid, every listener is told about it
    /// immediately and no exchange takes place. Otherwise this joins the refresh
    /// already in flight or starts one; listeners are notified once when it
    /// completes and the same outcome is returned to every caller that joined it.
    ///
    /// Errors are never retried here. A caller wanting another attempt calls
    /// `authenticate()` again.
    pub async fn authenticate(&self) -> AuthOutcome {
        let pending = match self.cached_or_pending() {
            Ok(cached) => {
                tracing::trace!(expiry = cached.expiry().0, "using cached token");
                self.inner
                    .listeners
                    .notify_authorized(cached.access_token(), cached.token_type());
                return AuthOutcome::Authorized(cached);
            }
            Err(pending) => pending,
        };

        wait_for_outcome(pending).await
    }

    fn cached_or_pending(&self) -> Result<Arc<TokenSnapshot>, PendingOutcome> {
        let current = self.current();
        if current.is_valid_with_clock(&self.inner.clock) {
            return Ok(current);
        }

        let mut in_flight = self.inner.lock_in_flight();
        if let Some(pending) = &*in_flight {
            tracing::trace!("joining in-flight token refresh");
            return Err(pending.clone());
        }

        // A refresh may have completed between the first check and taking the lock
        let current = self.current();
        if current.is_valid_with_clock(&self.inner.clock) {
            return Ok(current);
        }

        let (tx, rx) = watch::channel(None);
        *in_flight = Some(rx.clone());
        tokio::spawn(refresh(Arc::clone(&self.inner), tx));
        Err(rx)
    }

    /// The current lifecycle state
    pub fn state(&self) -> AuthState {
        if self.inner.lock_in_flight().is_some() {
            AuthState::Refreshing
        } else if self.current().is_valid_with_clock(&self.inner.clock) {
            AuthState::Valid
        } else {
            AuthState::NoToken
        }
    }
}

impl<F, C> Authenticator<F, C> {
    /// The currently cached snapshot, which may be absent or expired
    pub fn current(&self) -> Arc<TokenSnapshot> {
        Arc::clone(&self.inner.snapshot.borrow())
    }

    /// Drops the cached token
    ///
    /// The next call to [`authenticate()`][Self::authenticate()] will perform a new
    /// exchange. This does not itself start one, and a refresh already in flight
    /// still installs its result when it completes.
    pub fn invalidate(&self) {
        tracing::debug!("invalidating cached token");
        self.inner.install(Arc::new(TokenSnapshot::absent()));
    }

    /// Registers a listener for all future outcomes
    pub fn add_listener(&self, listener: SharedListener) -> &Self {
        self.inner.listeners.add(listener);
        self
    }

    /// Removes every registration of `listener`
    pub fn remove_listener(&self, listener: &SharedListener) -> &Self {
        self.inner.listeners.remove(listener);
        self
    }

    /// The registry of listeners notified by this authenticator
    pub fn listeners(&self) -> &ListenerRegistry {
        &self.inner.listeners
    }

    /// Observes every snapshot installed from now on
    pub fn watch(&self) -> TokenWatcher {
        TokenWatcher::new(self.inner.snapshot.subscribe())
    }
}

impl<F, C> Inner<F, C> {
    fn install(&self, snapshot: Arc<TokenSnapshot>) {
        self.snapshot.send_replace(snapshot);
    }

    fn lock_in_flight(&self) -> MutexGuard<'_, Option<PendingOutcome>> {
        self.in_flight.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Clears the in-flight slot when dropped, so a refresh task that dies early
/// cannot leave later callers joined to a refresh that will never finish
struct InFlightGuard<'a, F, C> {
    inner: &'a Inner<F, C>,
}

impl<F, C> Drop for InFlightGuard<'_, F, C> {
    fn drop(&mut self) {
        self.inner.lock_in_flight().take();
    }
}

async fn refresh<F, C>(inner: Arc<Inner<F, C>>, outcome: watch::Sender<Option<AuthOutcome>>)
where
    F: TokenFetcher,
{
    let in_flight = InFlightGuard { inner: &*inner };

    tracing::debug!("requesting new token");
    let result = inner.fetcher.fetch().await;

    let published = match result {
        Ok(token) => {
            let token = Arc::new(token);
            inner.install(Arc::clone(&token));
            drop(in_flight);
            tracing::debug!(
                present = token.is_present(),
                expiry = token.expiry().0,
                "installed new token"
            );
            inner
                .listeners
                .notify_authorized(token.access_token(), token.token_type());
            AuthOutcome::Authorized(token)
        }
        Err(error) if error.is_rejection() => {
            drop(in_flight);
            tracing::warn!(
                error = (&error as &dyn error::Error),
                "authority rejected credentials"
            );
            inner.listeners.notify_invalid();
            AuthOutcome::Invalid
        }
        Err(error) => {
            inner.install(Arc::new(TokenSnapshot::absent()));
            drop(in_flight);
            tracing::warn!(
                error = (&error as &dyn error::Error),
                "error requesting token"
            );
            inner.listeners.notify_failure();
            AuthOutcome::Failed
        }
    };

    outcome.send_replace(Some(published));
}

async fn wait_for_outcome(mut pending: PendingOutcome) -> AuthOutcome {
    let outcome = pending
        .wait_for(Option::is_some)
        .await
        .map(|outcome| (*outcome).clone());

    match outcome {
        Ok(Some(outcome)) => outcome,
        Ok(None) | Err(_) => {
            tracing::warn!("token refresh ended without reporting an outcome");
            AuthOutcome::Failed
        }
    }
}
