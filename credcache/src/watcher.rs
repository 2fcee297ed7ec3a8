use std::{ops, sync::Arc};

use thiserror::Error;
use tokio::sync::watch;

use crate::TokenSnapshot;

/// A handle that observes every snapshot installed by an [`Authenticator`](crate::Authenticator)
///
/// Unlike listeners, a watcher is pull-based: it does not trigger refreshes and
/// only sees the latest snapshot, not every authorization outcome.
#[derive(Clone, Debug)]
pub struct TokenWatcher {
    watcher: watch::Receiver<Arc<TokenSnapshot>>,
}

/// An outstanding borrow of a token snapshot
///
/// This borrow should be held for as brief a time as possible, as outstanding
/// borrows will block installation of a new snapshot.
#[derive(Debug)]
pub struct BorrowedToken<'a> {
    inner: watch::Ref<'a, Arc<TokenSnapshot>>,
}

impl<'a> ops::Deref for BorrowedToken<'a> {
    type Target = TokenSnapshot;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

/// Every authenticator sharing the snapshot has been dropped
#[derive(Debug, Error)]
#[error("no authenticator remains to publish token snapshots")]
pub struct TokenPublisherQuit(#[from] watch::error::RecvError);

impl TokenWatcher {
    pub(crate) fn new(watcher: watch::Receiver<Arc<TokenSnapshot>>) -> Self {
        Self { watcher }
    }

    /// Borrows the most recently installed snapshot
    pub fn token(&self) -> BorrowedToken {
        BorrowedToken {
            inner: self.watcher.borrow(),
        }
    }

    /// Clones out the most recently installed snapshot
    pub fn snapshot(&self) -> Arc<TokenSnapshot> {
        Arc::clone(&self.watcher.borrow())
    }

    /// A future that returns as ready whenever a new snapshot is installed
    ///
    /// If the publisher is ever dropped, then this function will return an error
    /// indicating that no new snapshots will be installed.
    pub async fn changed(&mut self) -> Result<(), TokenPublisherQuit> {
        Ok(self.watcher.changed().await?)
    }
}
