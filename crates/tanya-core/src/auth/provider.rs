//! Identity provider capability.
//!
//! The provider is an external service the client depends on, not something
//! it reimplements: sign-in with credentials, federated sign-in, sign-out,
//! and profile updates. [`InMemoryIdentityProvider`] backs guest/offline
//! development and tests; a REST implementation lives in the interaction
//! crate.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use super::identity::Identity;
use crate::error::{Result, TanyaError};

/// The identity service the auth session delegates to.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Restores a previously signed-in identity at startup, if any.
    async fn restore(&self) -> Result<Option<Identity>>;

    /// Creates an account and signs it in.
    async fn register(&self, email: &str, password: &str) -> Result<Identity>;

    /// Signs in with email and password.
    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Identity>;

    /// Signs in through the provider's federated flow.
    async fn sign_in_federated(&self) -> Result<Identity>;

    /// Signs the current user out. Best-effort on the provider side; the
    /// local session is cleared regardless.
    async fn sign_out(&self) -> Result<()>;

    /// Updates the signed-in user's display name and returns the refreshed
    /// identity snapshot.
    async fn update_display_name(&self, display_name: &str) -> Result<Identity>;
}

struct StoredAccount {
    password: String,
    identity: Identity,
}

/// In-process identity provider for development and tests.
///
/// Accounts live only as long as the process. Federated sign-in returns the
/// configured identity, or an authentication error when none was configured.
#[derive(Default)]
pub struct InMemoryIdentityProvider {
    accounts: Mutex<HashMap<String, StoredAccount>>,
    current: Mutex<Option<Identity>>,
    federated: Mutex<Option<Identity>>,
}

impl InMemoryIdentityProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the identity returned by the federated flow.
    pub fn with_federated_identity(self, identity: Identity) -> Self {
        *self.federated.lock().unwrap() = Some(identity);
        self
    }

    /// Seeds an already-signed-in identity, as if restored from a prior run.
    pub fn with_signed_in(self, identity: Identity) -> Self {
        *self.current.lock().unwrap() = Some(identity);
        self
    }
}

#[async_trait]
impl IdentityProvider for InMemoryIdentityProvider {
    async fn restore(&self) -> Result<Option<Identity>> {
        Ok(self.current.lock().unwrap().clone())
    }

    async fn register(&self, email: &str, password: &str) -> Result<Identity> {
        let mut accounts = self.accounts.lock().unwrap();
        if accounts.contains_key(email) {
            return Err(TanyaError::auth("Email sudah terdaftar"));
        }
        let identity = Identity {
            id: uuid::Uuid::new_v4().to_string(),
            display_name: None,
            email: Some(email.to_string()),
            avatar_url: None,
        };
        accounts.insert(
            email.to_string(),
            StoredAccount {
                password: password.to_string(),
                identity: identity.clone(),
            },
        );
        *self.current.lock().unwrap() = Some(identity.clone());
        Ok(identity)
    }

    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Identity> {
        let accounts = self.accounts.lock().unwrap();
        let account = accounts
            .get(email)
            .filter(|account| account.password == password)
            .ok_or_else(|| TanyaError::auth("Email atau password salah"))?;
        let identity = account.identity.clone();
        drop(accounts);
        *self.current.lock().unwrap() = Some(identity.clone());
        Ok(identity)
    }

    async fn sign_in_federated(&self) -> Result<Identity> {
        let identity = self
            .federated
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| TanyaError::auth("Login federasi tidak tersedia"))?;
        *self.current.lock().unwrap() = Some(identity.clone());
        Ok(identity)
    }

    async fn sign_out(&self) -> Result<()> {
        *self.current.lock().unwrap() = None;
        Ok(())
    }

    async fn update_display_name(&self, display_name: &str) -> Result<Identity> {
        let mut current = self.current.lock().unwrap();
        let identity = current
            .as_mut()
            .ok_or_else(|| TanyaError::auth("Tidak ada user yang sedang login"))?;
        identity.display_name = Some(display_name.to_string());
        let updated = identity.clone();
        drop(current);

        // Keep the stored account in sync for later sign-ins
        if let Some(email) = &updated.email {
            let mut accounts = self.accounts.lock().unwrap();
            if let Some(account) = accounts.get_mut(email) {
                account.identity = updated.clone();
            }
        }
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_register_then_sign_in() {
        let provider = InMemoryIdentityProvider::new();
        let registered = provider.register("budi@contoh.id", "rahasia1").await.unwrap();
        provider.sign_out().await.unwrap();

        let signed_in = provider
            .sign_in_with_password("budi@contoh.id", "rahasia1")
            .await
            .unwrap();
        assert_eq!(signed_in.id, registered.id);

        let err = provider
            .sign_in_with_password("budi@contoh.id", "salah")
            .await
            .unwrap_err();
        assert!(err.is_auth());
    }

    #[tokio::test]
    async fn test_duplicate_registration_rejected() {
        let provider = InMemoryIdentityProvider::new();
        provider.register("budi@contoh.id", "rahasia1").await.unwrap();
        let err = provider.register("budi@contoh.id", "lain123").await.unwrap_err();
        assert!(err.is_auth());
    }

    #[tokio::test]
    async fn test_federated_sign_in_requires_configuration() {
        let provider = InMemoryIdentityProvider::new();
        assert!(provider.sign_in_federated().await.unwrap_err().is_auth());

        let identity = Identity {
            id: "g-1".to_string(),
            display_name: Some("Budi".to_string()),
            email: Some("budi@gmail.com".to_string()),
            avatar_url: None,
        };
        let provider = InMemoryIdentityProvider::new().with_federated_identity(identity.clone());
        assert_eq!(provider.sign_in_federated().await.unwrap(), identity);
    }
}
