//! Moto auth crate - identity gate, provider boundary, and a local provider.
//!
//! The gate wraps any [`IdentityProvider`], maps its error codes onto the
//! [`AuthErrorKind`] taxonomy, and republishes identity changes so the
//! interaction surface can mount or unmount the chat room.

pub mod error;
pub mod gate;
pub mod memory;
pub mod provider;

pub use error::{AuthError, AuthErrorKind, ProviderError};
pub use gate::{AuthState, IdentityGate};
pub use memory::InMemoryIdentityProvider;
pub use provider::{IdentityCallback, IdentityProvider, ListenerRegistry, Subscription};
