//! Auth session: the single owned authority over sign-in state.
//!
//! Wraps the identity provider and broadcasts auth transitions over a watch
//! channel. Consumers receive the session by explicit injection rather than
//! ambient lookup, and must treat `loading == true` as "do nothing yet".

use std::sync::Arc;

use tokio::sync::watch;

use super::credentials::{RegistrationForm, SignInForm};
use super::identity::Identity;
use super::provider::IdentityProvider;
use crate::error::Result;

/// Snapshot of the authentication state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthState {
    /// True only while the initial restoration is still resolving.
    pub loading: bool,
    /// The signed-in user, absent for guests.
    pub identity: Option<Identity>,
}

impl AuthState {
    pub fn is_logged_in(&self) -> bool {
        self.identity.is_some()
    }

    /// The user id, when signed in.
    pub fn user_id(&self) -> Option<String> {
        self.identity.as_ref().map(|identity| identity.id.clone())
    }
}

/// Owns the current identity and its change notifications.
pub struct AuthSession {
    provider: Arc<dyn IdentityProvider>,
    state_tx: watch::Sender<AuthState>,
}

impl AuthSession {
    /// Creates a session in the initial `loading` state.
    pub fn new(provider: Arc<dyn IdentityProvider>) -> Self {
        let (state_tx, _) = watch::channel(AuthState {
            loading: true,
            identity: None,
        });
        Self { provider, state_tx }
    }

    /// Performs the startup restoration and settles `loading`.
    ///
    /// A failing provider is treated as "signed out" so the app still comes
    /// up; the error is reported for the caller to surface.
    pub async fn resolve(&self) -> Result<()> {
        let restored = self.provider.restore().await;
        match restored {
            Ok(identity) => {
                if let Some(identity) = &identity {
                    tracing::info!(user_id = %identity.id, "restored signed-in user");
                }
                self.publish(identity);
                Ok(())
            }
            Err(err) => {
                tracing::error!(error = %err, "identity restoration failed");
                self.publish(None);
                Err(err)
            }
        }
    }

    /// Current state snapshot.
    pub fn state(&self) -> AuthState {
        self.state_tx.borrow().clone()
    }

    /// Subscription to auth transitions.
    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.state_tx.subscribe()
    }

    /// Validates and signs in with email/password.
    pub async fn sign_in(&self, form: &SignInForm) -> Result<Identity> {
        form.validate()?;
        let identity = self
            .provider
            .sign_in_with_password(&form.email, &form.password)
            .await?;
        tracing::info!(user_id = %identity.id, "user signed in");
        self.publish(Some(identity.clone()));
        Ok(identity)
    }

    /// Validates and registers a new account, applying the display name when
    /// one was entered.
    pub async fn register(&self, form: &RegistrationForm) -> Result<Identity> {
        form.validate()?;
        let mut identity = self.provider.register(&form.email, &form.password).await?;
        if let Some(name) = form.display_name.as_deref().filter(|name| !name.is_empty()) {
            identity = self.provider.update_display_name(name).await?;
        }
        tracing::info!(user_id = %identity.id, "user registered");
        self.publish(Some(identity.clone()));
        Ok(identity)
    }

    /// Signs in through the provider's federated flow.
    pub async fn sign_in_federated(&self) -> Result<Identity> {
        let identity = self.provider.sign_in_federated().await?;
        tracing::info!(user_id = %identity.id, "user signed in (federated)");
        self.publish(Some(identity.clone()));
        Ok(identity)
    }

    /// Signs out. The local session is cleared even when the provider call
    /// fails; the error is still reported.
    pub async fn sign_out(&self) -> Result<()> {
        let result = self.provider.sign_out().await;
        self.publish(None);
        tracing::info!("user signed out");
        result
    }

    /// Updates the display name and republishes the refreshed identity.
    pub async fn update_display_name(&self, display_name: &str) -> Result<Identity> {
        let identity = self.provider.update_display_name(display_name).await?;
        self.publish(Some(identity.clone()));
        Ok(identity)
    }

    fn publish(&self, identity: Option<Identity>) {
        self.state_tx.send_replace(AuthState {
            loading: false,
            identity,
        });
    }
}
