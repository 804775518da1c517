//! Identity provider boundary.
//!
//! An [`IdentityProvider`] pushes identity changes to registered callbacks
//! and performs the credential operations. [`ListenerRegistry`] is the shared
//! callback bookkeeping providers use to implement `subscribe`.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, Weak};

use async_trait::async_trait;
use moto_core::types::Identity;

use crate::error::ProviderError;

/// Callback invoked with the new identity (or `None` after sign-out/expiry).
pub type IdentityCallback = Box<dyn Fn(Option<Identity>) + Send + Sync>;

/// Opaque authentication capability.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Register for identity changes. Dropping the returned handle unsubscribes.
    ///
    /// Providers deliver the current identity once restoration finishes,
    /// which may happen during this call or later.
    fn subscribe(&self, callback: IdentityCallback) -> Subscription;

    async fn sign_in(&self, email: &str, secret: &str) -> Result<Identity, ProviderError>;

    async fn create_account(&self, email: &str, secret: &str) -> Result<Identity, ProviderError>;

    async fn sign_out(&self) -> Result<(), ProviderError>;
}

type Listener = Arc<dyn Fn(Option<Identity>) + Send + Sync>;

#[derive(Default)]
struct RegistryInner {
    next_id: u64,
    listeners: HashMap<u64, Listener>,
}

/// Thread-safe set of identity callbacks.
#[derive(Clone, Default)]
pub struct ListenerRegistry {
    inner: Arc<Mutex<RegistryInner>>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a callback and return the handle that removes it.
    pub fn register(&self, callback: IdentityCallback) -> Subscription {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let id = inner.next_id;
        inner.next_id += 1;
        inner.listeners.insert(id, Arc::from(callback));
        tracing::debug!(subscription_id = id, "Identity listener registered");
        Subscription {
            id,
            registry: Arc::downgrade(&self.inner),
        }
    }

    /// Deliver `identity` to every registered callback.
    ///
    /// Callbacks run outside the registry lock so they may subscribe or
    /// unsubscribe re-entrantly.
    pub fn notify(&self, identity: Option<Identity>) {
        let listeners: Vec<Listener> = {
            let inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
            inner.listeners.values().cloned().collect()
        };
        for listener in listeners {
            listener(identity.clone());
        }
    }

    pub fn len(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .listeners
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Handle for a registered identity callback. Dropping it unsubscribes.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    id: u64,
    registry: Weak<Mutex<RegistryInner>>,
}

impl Subscription {
    /// Explicitly unsubscribe. Equivalent to dropping the handle.
    pub fn unsubscribe(self) {}
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            let mut inner = registry.lock().unwrap_or_else(PoisonError::into_inner);
            if inner.listeners.remove(&self.id).is_some() {
                tracing::debug!(subscription_id = self.id, "Identity listener removed");
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_callback(counter: &Arc<AtomicUsize>) -> IdentityCallback {
        let counter = Arc::clone(counter);
        Box::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn test_notify_reaches_all_listeners() {
        let registry = ListenerRegistry::new();
        let count = Arc::new(AtomicUsize::new(0));
        let _a = registry.register(counting_callback(&count));
        let _b = registry.register(counting_callback(&count));

        registry.notify(None);
        assert_eq!(count.load(Ordering::SeqCst), 2);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_drop_unsubscribes() {
        let registry = ListenerRegistry::new();
        let count = Arc::new(AtomicUsize::new(0));
        let sub = registry.register(counting_callback(&count));
        assert_eq!(registry.len(), 1);

        drop(sub);
        assert!(registry.is_empty());
        registry.notify(Some(Identity::new("u1", "a@b.co")));
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_explicit_unsubscribe() {
        let registry = ListenerRegistry::new();
        let count = Arc::new(AtomicUsize::new(0));
        registry.register(counting_callback(&count)).unsubscribe();
        assert!(registry.is_empty());
    }

    #[test]
    fn test_subscription_outliving_registry_is_harmless() {
        let registry = ListenerRegistry::new();
        let count = Arc::new(AtomicUsize::new(0));
        let sub = registry.register(counting_callback(&count));
        drop(registry);
        drop(sub);
    }

    #[test]
    fn test_listener_receives_identity() {
        let registry = ListenerRegistry::new();
        let seen: Arc<Mutex<Vec<Option<Identity>>>> = Arc::new(Mutex::new(Vec::new()));
        let seen_cb = Arc::clone(&seen);
        let _sub = registry.register(Box::new(move |id| seen_cb.lock().unwrap().push(id)));

        let identity = Identity::new("u1", "rider@example.com");
        registry.notify(Some(identity.clone()));
        registry.notify(None);

        let seen = seen.lock().unwrap();
        assert_eq!(seen.as_slice(), &[Some(identity), None]);
    }
}
