//! REST identity provider.
//!
//! Talks to a hosted identity service over its token API: password sign-in,
//! account creation, and profile updates. The signed-in session lives only in
//! process memory; there is no token persistence in this client, so `restore`
//! reports whatever the current process established.
//!
//! Federated sign-in is a browser popup flow; in this frontend it is answered
//! with an authentication error instead of being half-implemented.
//!
//! Configuration: `TANYA_AUTH_URL` (required) and `TANYA_AUTH_KEY` (optional
//! API key appended as the `key` query parameter).

use std::env;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use tanya_core::auth::{Identity, IdentityProvider};
use tanya_core::error::{Result, TanyaError};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// Identity provider backed by a REST token API.
pub struct RestIdentityProvider {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    timeout: Duration,
    session: Mutex<Option<ProviderSession>>,
}

/// The provider-side session for the signed-in user.
#[derive(Debug, Clone)]
struct ProviderSession {
    id_token: String,
    identity: Identity,
}

#[derive(Debug, Serialize)]
struct CredentialsDto<'a> {
    email: &'a str,
    password: &'a str,
    #[serde(rename = "returnSecureToken")]
    return_secure_token: bool,
}

#[derive(Debug, Serialize)]
struct ProfileUpdateDto<'a> {
    #[serde(rename = "idToken")]
    id_token: &'a str,
    #[serde(rename = "displayName")]
    display_name: &'a str,
    #[serde(rename = "returnSecureToken")]
    return_secure_token: bool,
}

#[derive(Debug, Deserialize)]
struct AccountDto {
    #[serde(rename = "localId")]
    local_id: String,
    #[serde(rename = "idToken")]
    id_token: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default, rename = "displayName")]
    display_name: Option<String>,
    #[serde(default, rename = "photoUrl")]
    photo_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelopeDto {
    error: ErrorDto,
}

#[derive(Debug, Deserialize)]
struct ErrorDto {
    message: String,
}

impl AccountDto {
    fn into_session(self) -> ProviderSession {
        ProviderSession {
            id_token: self.id_token,
            identity: Identity {
                id: self.local_id,
                display_name: self.display_name.filter(|name| !name.is_empty()),
                email: self.email,
                avatar_url: self.photo_url,
            },
        }
    }
}

impl RestIdentityProvider {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            timeout: DEFAULT_TIMEOUT,
            session: Mutex::new(None),
        }
    }

    /// Loads configuration from `TANYA_AUTH_URL` / `TANYA_AUTH_KEY`.
    pub fn try_from_env() -> Result<Self> {
        let base_url = env::var("TANYA_AUTH_URL")
            .map_err(|_| TanyaError::config("TANYA_AUTH_URL not set"))?;
        let api_key = env::var("TANYA_AUTH_KEY").ok();
        Ok(Self::new(base_url, api_key))
    }

    async fn post_account(
        &self,
        endpoint: &str,
        body: &impl Serialize,
    ) -> Result<AccountDto> {
        let url = format!("{}/v1/accounts:{}", self.base_url, endpoint);
        let mut request = self.client.post(&url).json(body).timeout(self.timeout);
        if let Some(key) = &self.api_key {
            request = request.query(&[("key", key.as_str())]);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(map_provider_error(status.as_u16(), &body));
        }
        Ok(response.json().await?)
    }

    fn store(&self, session: ProviderSession) -> Identity {
        let identity = session.identity.clone();
        *self.session.lock().unwrap() = Some(session);
        identity
    }
}

/// Maps the provider's error codes onto the short messages the forms show.
fn map_provider_error(status: u16, body: &str) -> TanyaError {
    let code = serde_json::from_str::<ErrorEnvelopeDto>(body)
        .map(|envelope| envelope.error.message)
        .unwrap_or_default();
    match code.as_str() {
        "EMAIL_NOT_FOUND" | "INVALID_PASSWORD" | "INVALID_LOGIN_CREDENTIALS" => {
            TanyaError::auth("Email atau password salah")
        }
        "EMAIL_EXISTS" => TanyaError::auth("Email sudah terdaftar"),
        "" => TanyaError::backend(status, "identity service returned no error detail"),
        other => TanyaError::auth(other.to_string()),
    }
}

#[async_trait]
impl IdentityProvider for RestIdentityProvider {
    async fn restore(&self) -> Result<Option<Identity>> {
        Ok(self
            .session
            .lock()
            .unwrap()
            .as_ref()
            .map(|session| session.identity.clone()))
    }

    async fn register(&self, email: &str, password: &str) -> Result<Identity> {
        let account = self
            .post_account(
                "signUp",
                &CredentialsDto {
                    email,
                    password,
                    return_secure_token: true,
                },
            )
            .await?;
        tracing::info!(user_id = %account.local_id, "account created");
        Ok(self.store(account.into_session()))
    }

    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Identity> {
        let account = self
            .post_account(
                "signInWithPassword",
                &CredentialsDto {
                    email,
                    password,
                    return_secure_token: true,
                },
            )
            .await?;
        Ok(self.store(account.into_session()))
    }

    async fn sign_in_federated(&self) -> Result<Identity> {
        Err(TanyaError::auth(
            "Login federasi memerlukan browser dan tidak tersedia di klien ini",
        ))
    }

    async fn sign_out(&self) -> Result<()> {
        // The token API has no revocation call; dropping the token ends the
        // session on this client.
        *self.session.lock().unwrap() = None;
        Ok(())
    }

    async fn update_display_name(&self, display_name: &str) -> Result<Identity> {
        let id_token = self
            .session
            .lock()
            .unwrap()
            .as_ref()
            .map(|session| session.id_token.clone())
            .ok_or_else(|| TanyaError::auth("Tidak ada user yang sedang login"))?;

        let account = self
            .post_account(
                "update",
                &ProfileUpdateDto {
                    id_token: &id_token,
                    display_name,
                    return_secure_token: true,
                },
            )
            .await?;
        Ok(self.store(account.into_session()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_sign_in_maps_account_to_identity() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/accounts:signInWithPassword"))
            .and(query_param("key", "k-123"))
            .and(body_partial_json(json!({
                "email": "budi@contoh.id",
                "password": "rahasia1",
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "localId": "uid-1",
                "idToken": "token-1",
                "email": "budi@contoh.id",
                "displayName": "Budi",
            })))
            .mount(&server)
            .await;

        let provider = RestIdentityProvider::new(server.uri(), Some("k-123".to_string()));
        let identity = provider
            .sign_in_with_password("budi@contoh.id", "rahasia1")
            .await
            .unwrap();

        assert_eq!(identity.id, "uid-1");
        assert_eq!(identity.display_name.as_deref(), Some("Budi"));
        assert_eq!(provider.restore().await.unwrap(), Some(identity));
    }

    #[tokio::test]
    async fn test_bad_credentials_become_short_auth_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/accounts:signInWithPassword"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": { "message": "INVALID_LOGIN_CREDENTIALS" },
            })))
            .mount(&server)
            .await;

        let provider = RestIdentityProvider::new(server.uri(), None);
        let err = provider
            .sign_in_with_password("budi@contoh.id", "salah")
            .await
            .unwrap_err();

        assert!(err.is_auth());
        assert!(err.to_string().contains("Email atau password salah"));
    }

    #[tokio::test]
    async fn test_update_display_name_requires_session() {
        let server = MockServer::start().await;
        let provider = RestIdentityProvider::new(server.uri(), None);

        let err = provider.update_display_name("Budi").await.unwrap_err();
        assert!(err.is_auth());
    }

    #[tokio::test]
    async fn test_sign_out_drops_session() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/accounts:signUp"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "localId": "uid-9",
                "idToken": "token-9",
                "email": "sari@contoh.id",
            })))
            .mount(&server)
            .await;

        let provider = RestIdentityProvider::new(server.uri(), None);
        provider.register("sari@contoh.id", "rahasia1").await.unwrap();
        assert!(provider.restore().await.unwrap().is_some());

        provider.sign_out().await.unwrap();
        assert_eq!(provider.restore().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_federated_sign_in_is_unsupported_here() {
        let provider = RestIdentityProvider::new("http://localhost:1", None);
        assert!(provider.sign_in_federated().await.unwrap_err().is_auth());
    }
}
