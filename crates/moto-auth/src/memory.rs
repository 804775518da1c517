//! Process-local identity provider.
//!
//! Keeps accounts in memory and reports the same error codes as the hosted
//! identity service, so the gate's mapping table applies unchanged. Used by
//! the terminal front-end and by tests.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use rand::Rng;
use sha2::{Digest, Sha256};

use moto_core::types::Identity;

use crate::error::{codes, ProviderError};
use crate::provider::{IdentityCallback, IdentityProvider, ListenerRegistry, Subscription};

/// Minimum accepted secret length for new accounts.
pub const MIN_SECRET_LEN: usize = 6;

/// Generate a random 32-character hex uid.
pub fn generate_uid() -> String {
    let mut rng = rand::rng();
    let bytes: [u8; 16] = rng.random();
    hex::encode(bytes)
}

fn digest(secret: &str) -> [u8; 32] {
    Sha256::digest(secret.as_bytes()).into()
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Loose syntactic check: `local@domain.tld` with no whitespace.
fn is_valid_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
        }
        None => false,
    }
}

struct Account {
    uid: String,
    secret_digest: [u8; 32],
}

/// In-memory [`IdentityProvider`].
pub struct InMemoryIdentityProvider {
    accounts: Mutex<HashMap<String, Account>>,
    current: Mutex<Option<Identity>>,
    listeners: ListenerRegistry,
}

impl Default for InMemoryIdentityProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryIdentityProvider {
    pub fn new() -> Self {
        Self {
            accounts: Mutex::new(HashMap::new()),
            current: Mutex::new(None),
            listeners: ListenerRegistry::new(),
        }
    }

    /// Seed an account. Skips the validation `create_account` applies.
    pub fn with_account(self, email: &str, secret: &str) -> Self {
        self.accounts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(
                normalize_email(email),
                Account {
                    uid: generate_uid(),
                    secret_digest: digest(secret),
                },
            );
        self
    }

    /// Start with `email` already signed in, as if a prior session was restored.
    ///
    /// The account must have been seeded with [`with_account`](Self::with_account);
    /// unknown emails leave the provider signed out.
    pub fn with_restored_session(self, email: &str) -> Self {
        let key = normalize_email(email);
        let identity = self
            .accounts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
            .map(|a| Identity::new(a.uid.clone(), key.clone()));
        if identity.is_none() {
            tracing::warn!(email = %key, "Cannot restore session for unknown account");
        }
        *self.current.lock().unwrap_or_else(PoisonError::into_inner) = identity;
        self
    }

    /// Drop the current session without a user action (token expiry).
    pub fn expire_session(&self) {
        let previous = self
            .current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(identity) = previous {
            tracing::info!(uid = identity.uid(), "Session expired");
            self.listeners.notify(None);
        }
    }

    pub fn current(&self) -> Option<Identity> {
        self.current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn account_count(&self) -> usize {
        self.accounts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn set_current(&self, identity: Option<Identity>) {
        *self.current.lock().unwrap_or_else(PoisonError::into_inner) = identity.clone();
        self.listeners.notify(identity);
    }
}

#[async_trait]
impl IdentityProvider for InMemoryIdentityProvider {
    fn subscribe(&self, callback: IdentityCallback) -> Subscription {
        // Restoration is synchronous here: deliver the current state at once.
        callback(self.current());
        self.listeners.register(callback)
    }

    async fn sign_in(&self, email: &str, secret: &str) -> Result<Identity, ProviderError> {
        let key = normalize_email(email);
        if !is_valid_email(&key) {
            return Err(ProviderError::new(codes::INVALID_EMAIL, "badly formatted email"));
        }

        let identity = {
            let accounts = self.accounts.lock().unwrap_or_else(PoisonError::into_inner);
            let account = accounts
                .get(&key)
                .ok_or_else(|| ProviderError::new(codes::USER_NOT_FOUND, "no such user"))?;
            if account.secret_digest != digest(secret) {
                return Err(ProviderError::new(codes::WRONG_PASSWORD, "password mismatch"));
            }
            Identity::new(account.uid.clone(), key)
        };

        tracing::info!(uid = identity.uid(), "Signed in");
        self.set_current(Some(identity.clone()));
        Ok(identity)
    }

    async fn create_account(&self, email: &str, secret: &str) -> Result<Identity, ProviderError> {
        let key = normalize_email(email);
        if !is_valid_email(&key) {
            return Err(ProviderError::new(codes::INVALID_EMAIL, "badly formatted email"));
        }
        if secret.chars().count() < MIN_SECRET_LEN {
            return Err(ProviderError::new(
                codes::WEAK_PASSWORD,
                format!("password shorter than {} characters", MIN_SECRET_LEN),
            ));
        }

        let identity = {
            let mut accounts = self.accounts.lock().unwrap_or_else(PoisonError::into_inner);
            if accounts.contains_key(&key) {
                return Err(ProviderError::new(
                    codes::EMAIL_ALREADY_IN_USE,
                    "account already exists",
                ));
            }
            let uid = generate_uid();
            accounts.insert(
                key.clone(),
                Account {
                    uid: uid.clone(),
                    secret_digest: digest(secret),
                },
            );
            Identity::new(uid, key)
        };

        tracing::info!(uid = identity.uid(), "Account created");
        self.set_current(Some(identity.clone()));
        Ok(identity)
    }

    async fn sign_out(&self) -> Result<(), ProviderError> {
        if self.current().is_some() {
            self.set_current(None);
            tracing::info!("Signed out");
        }
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================
