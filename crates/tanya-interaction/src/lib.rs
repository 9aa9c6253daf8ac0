//! Outbound adapters for the Tanya client.
//!
//! This crate owns every wire format: the HTTP client for the QA backend
//! ([`QaApiClient`]) and the REST identity provider
//! ([`RestIdentityProvider`]). The domain crate only sees the traits.

mod identity_client;
mod qa_client;

pub use identity_client::RestIdentityProvider;
pub use qa_client::QaApiClient;
