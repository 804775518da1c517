//! Identity gate: the engine's single view of "who is signed in".
//!
//! Wraps an [`IdentityProvider`], republishes its push notifications on a
//! `watch` channel, validates credentials input, and maps provider errors.
//! Until the provider's first callback the gate reports
//! [`AuthState::Pending`] so a front-end can defer rendering.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::watch;

use moto_core::events::{EngineEvent, EventBus};
use moto_core::types::Identity;

use crate::error::AuthError;
use crate::provider::{IdentityProvider, Subscription};

/// Observable authentication state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthState {
    /// A prior session is still being restored.
    Pending,
    SignedOut,
    SignedIn(Identity),
}

impl AuthState {
    pub fn identity(&self) -> Option<&Identity> {
        match self {
            AuthState::SignedIn(identity) => Some(identity),
            _ => None,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, AuthState::Pending)
    }
}

impl From<Option<Identity>> for AuthState {
    fn from(identity: Option<Identity>) -> Self {
        match identity {
            Some(identity) => AuthState::SignedIn(identity),
            None => AuthState::SignedOut,
        }
    }
}

/// Authentication gate in front of the interaction surface.
pub struct IdentityGate {
    provider: Arc<dyn IdentityProvider>,
    state: Arc<watch::Sender<AuthState>>,
    events: EventBus,
    // Held for its Drop: unsubscribes from the provider with the gate.
    _subscription: Subscription,
}

impl IdentityGate {
    /// Create a gate and subscribe to `provider`.
    pub fn new(provider: Arc<dyn IdentityProvider>, events: EventBus) -> Self {
        let (tx, _) = watch::channel(AuthState::Pending);
        let state = Arc::new(tx);

        let cb_state = Arc::clone(&state);
        let cb_events = events.clone();
        let subscription = provider.subscribe(Box::new(move |identity| {
            apply(&cb_state, &cb_events, AuthState::from(identity));
        }));

        Self {
            provider,
            state,
            events,
            _subscription: subscription,
        }
    }

    pub fn state(&self) -> AuthState {
        self.state.borrow().clone()
    }

    pub fn current_identity(&self) -> Option<Identity> {
        self.state.borrow().identity().cloned()
    }

    pub fn is_pending(&self) -> bool {
        self.state.borrow().is_pending()
    }

    /// Receive every subsequent state change.
    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.state.subscribe()
    }

    /// Wait until restoration finishes and return the settled state.
    pub async fn resolved(&self) -> AuthState {
        let mut rx = self.state.subscribe();
        let settled = match rx.wait_for(|s| !s.is_pending()).await {
            Ok(state) => Some(state.clone()),
            // Unreachable while `self` holds the sender.
            Err(_) => None,
        };
        settled.unwrap_or_else(|| self.state())
    }

    /// Sign in with an existing account.
    pub async fn login(&self, email: &str, secret: &str) -> Result<Identity, AuthError> {
        validate_input(email, secret)?;
        let identity = self
            .provider
            .sign_in(email.trim(), secret)
            .await
            .map_err(|e| {
                tracing::info!(code = %e.code, "Sign-in rejected");
                AuthError::from(e)
            })?;
        apply(&self.state, &self.events, AuthState::SignedIn(identity.clone()));
        Ok(identity)
    }

    /// Create an account and sign in as it.
    pub async fn register(&self, email: &str, secret: &str) -> Result<Identity, AuthError> {
        validate_input(email, secret)?;
        let identity = self
            .provider
            .create_account(email.trim(), secret)
            .await
            .map_err(|e| {
                tracing::info!(code = %e.code, "Account creation rejected");
                AuthError::from(e)
            })?;
        apply(&self.state, &self.events, AuthState::SignedIn(identity.clone()));
        Ok(identity)
    }

    /// Sign out. Idempotent: does nothing when already signed out.
    ///
    /// A provider failure is logged and the local state is still cleared,
    /// so the user always ends up at the sign-in view.
    pub async fn logout(&self) {
        if matches!(*self.state.borrow(), AuthState::SignedOut) {
            tracing::debug!("Logout requested while signed out");
            return;
        }
        if let Err(e) = self.provider.sign_out().await {
            tracing::warn!(error = %e, "Provider sign-out failed; clearing local session");
        }
        apply(&self.state, &self.events, AuthState::SignedOut);
    }
}

fn validate_input(email: &str, secret: &str) -> Result<(), AuthError> {
    if email.trim().is_empty() || secret.trim().is_empty() {
        return Err(AuthError::invalid_input("Please fill in all fields"));
    }
    Ok(())
}

/// Store `next` and publish an event if it differs from the current state.
fn apply(state: &watch::Sender<AuthState>, events: &EventBus, next: AuthState) {
    let uid = next.identity().map(|i| i.uid().to_string());
    let changed = state.send_if_modified(|current| {
        if *current == next {
            false
        } else {
            *current = next;
            true
        }
    });
    if changed {
        tracing::info!(signed_in = uid.is_some(), "Identity changed");
        events.publish(EngineEvent::IdentityChanged {
            uid,
            timestamp: Utc::now(),
        });
    }
}

// =============================================================================
// Tests
// =============================================================================
