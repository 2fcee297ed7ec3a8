//! Listener registration and fan-out

use std::{fmt, sync::Arc};

use arc_swap::ArcSwap;

use crate::{AccessTokenRef, TokenTypeRef};

/// A consumer of authorization results
///
/// Callbacks are invoked from whichever task produced the result, which may be a
/// background refresh task. They should return quickly and must not block on
/// the [`Authenticator`](crate::Authenticator) that is calling them.
pub trait AuthorizationListener: Send + Sync {
    /// A valid token is available
    fn on_authorization(&self, access_token: &AccessTokenRef, token_type: &TokenTypeRef);

    /// The authority declined the configured credentials
    fn on_invalid(&self);

    /// The token exchange could not be completed
    fn on_failure(&self);
}

/// A shared, registered listener
pub type SharedListener = Arc<dyn AuthorizationListener>;

/// A thread-safe set of registered listeners
///
/// Registrations are identified by `Arc` identity and are not deduplicated: a
/// listener added twice is called twice. Notification always iterates a
/// point-in-time snapshot, so listeners may be added or removed from any thread,
/// including from within a callback, without disturbing a pass in progress.
#[derive(Default)]
pub struct ListenerRegistry {
    listeners: ArcSwap<Vec<SharedListener>>,
}

impl fmt::Debug for ListenerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("ListenerRegistry")
            .field("listeners", &self.len())
            .finish()
    }
}

impl ListenerRegistry {
    /// Constructs an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a listener
    pub fn add(&self, listener: SharedListener) {
        self.listeners.rcu(|current| {
            let mut next = Vec::with_capacity(current.len() + 1);
            next.extend(current.iter().cloned());
            next.push(Arc::clone(&listener));
            next
        });
    }

    /// Removes every registration of `listener`, returning how many were removed
    pub fn remove(&self, listener: &SharedListener) -> usize {
        let mut removed = 0;
        self.listeners.rcu(|current| {
            let next: Vec<_> = current
                .iter()
                .filter(|l| !same_listener(l, listener))
                .cloned()
                .collect();
            removed = current.len() - next.len();
            next
        });
        removed
    }

    /// A point-in-time view of the registered listeners, in registration order
    pub fn snapshot(&self) -> Arc<Vec<SharedListener>> {
        self.listeners.load_full()
    }

    /// The number of current registrations
    pub fn len(&self) -> usize {
        self.listeners.load().len()
    }

    /// Whether there are no registrations
    pub fn is_empty(&self) -> bool {
        self.listeners.load().is_empty()
    }

    pub(crate) fn notify_authorized(&self, access_token: &AccessTokenRef, token_type: &TokenTypeRef) {
        let listeners = self.snapshot();
        tracing::trace!(listeners = listeners.len(), "notifying listeners of authorization");
        for listener in listeners.iter() {
            listener.on_authorization(access_token, token_type);
        }
    }

    pub(crate) fn notify_invalid(&self) {
        let listeners = self.snapshot();
        tracing::trace!(listeners = listeners.len(), "notifying listeners of rejected credentials");
        for listener in listeners.iter() {
            listener.on_invalid();
        }
    }

    pub(crate) fn notify_failure(&self) {
        let listeners = self.snapshot();
        tracing::trace!(listeners = listeners.len(), "notifying listeners of failed exchange");
        for listener in listeners.iter() {
            listener.on_failure();
        }
    }
}

fn same_listener(a: &SharedListener, b: &SharedListener) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::Mutex;

    use super::*;

    /// Records every callback it receives
    #[derive(Debug, Default)]
    pub(crate) struct Recorder {
        events: Mutex<Vec<Event>>,
    }

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub(crate) enum Event {
        Authorized(String, String),
        Invalid,
        Failure,
    }

    impl Recorder {
        pub(crate) fn shared() -> Arc<Self> {
            Arc::new(Self::default())
        }

        pub(crate) fn events(&self) -> Vec<Event> {
            self.events.lock().unwrap().clone()
        }

        fn push(&self, event: Event) {
            self.events.lock().unwrap().push(event);
        }
    }

    impl AuthorizationListener for Recorder {
        fn on_authorization(&self, access_token: &AccessTokenRef, token_type: &TokenTypeRef) {
            self.push(Event::Authorized(
                access_token.as_str().to_owned(),
                token_type.as_str().to_owned(),
            ));
        }

        fn on_invalid(&self) {
            self.push(Event::Invalid);
        }

        fn on_failure(&self) {
            self.push(Event::Failure);
        }
    }

    #[test]
    fn duplicates_are_kept_and_removed_together() {
        let registry = ListenerRegistry::new();
        let recorder = Recorder::shared();
        let listener: SharedListener = recorder.clone();
        let other: SharedListener = Recorder::shared();

        registry.add(listener.clone());
        registry.add(other.clone());
        registry.add(listener.clone());
        assert_eq!(registry.len(), 3);

        registry.notify_invalid();
        assert_eq!(recorder.events(), vec![Event::Invalid, Event::Invalid]);

        assert_eq!(registry.remove(&listener), 2);
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.remove(&listener), 0);
        assert!(Arc::ptr_eq(&registry.snapshot()[0], &other));
    }

    #[test]
    fn snapshot_is_unaffected_by_later_changes() {
        let registry = ListenerRegistry::new();
        let first: SharedListener = Recorder::shared();
        registry.add(first.clone());

        let snapshot = registry.snapshot();
        registry.add(Recorder::shared());
        registry.remove(&first);

        assert_eq!(snapshot.len(), 1);
        assert_eq!(registry.len(), 1);
    }

    /// Adds a new listener and removes itself whenever it is notified
    struct Churner {
        registry: Arc<ListenerRegistry>,
        me: Mutex<Option<SharedListener>>,
        added: Arc<Recorder>,
        calls: Mutex<u32>,
    }

    impl AuthorizationListener for Churner {
        fn on_authorization(&self, _: &AccessTokenRef, _: &TokenTypeRef) {}

        fn on_invalid(&self) {}

        fn on_failure(&self) {
            *self.calls.lock().unwrap() += 1;
            self.registry.add(self.added.clone());
            if let Some(me) = self.me.lock().unwrap().take() {
                self.registry.remove(&me);
            }
        }
    }

    #[test]
    fn mutation_during_notification_is_safe() {
        let registry = Arc::new(ListenerRegistry::new());
        let added = Recorder::shared();
        let churner = Arc::new(Churner {
            registry: registry.clone(),
            me: Mutex::new(None),
            added: added.clone(),
            calls: Mutex::new(0),
        });
        let as_listener: SharedListener = churner.clone();
        *churner.me.lock().unwrap() = Some(as_listener.clone());
        registry.add(as_listener);

        registry.notify_failure();
        assert_eq!(*churner.calls.lock().unwrap(), 1);
        assert!(added.events().is_empty());

        registry.notify_failure();
        assert_eq!(*churner.calls.lock().unwrap(), 1);
        assert_eq!(added.events(), vec![Event::Failure]);
    }

    #[test]
    fn concurrent_registration() {
        let registry = Arc::new(ListenerRegistry::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = registry.clone();
                std::thread::spawn(move || {
                    for _ in 0..50 {
                        let l: SharedListener = Recorder::shared();
                        registry.add(l.clone());
                        registry.notify_invalid();
                        assert_eq!(registry.remove(&l), 1);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert!(registry.is_empty());
    }
}
