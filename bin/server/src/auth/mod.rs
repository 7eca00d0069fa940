//! SSO login for the fedgate server.
//!
//! This module provides:
//! - Native OAuth2 providers and OIDC providers behind [`IdentityProvider`]
//! - The redirect and callback routes
//! - Database-backed user store and session signer
//!
//! # Flow
//!
//! `GET /api/auth/sso` sends the browser to the provider. The provider
//! returns it to the callback, which exchanges the code, resolves the
//! external identity, and delivers either the external ID or a session
//! token for the linked local account, registering one if allowed.

pub mod db;
pub mod http;
pub mod native;
pub mod oidc;
pub mod provider;
pub mod request;
pub mod routes;

use fedgate_sso::{MemoryStateStore, SessionSigner, SsoError, SsoSettings, StateStore, UserStore};
use rootcause::Report;
use std::sync::Arc;
use std::time::Duration;

pub use http::HttpTransport;
pub use provider::{IdentityProvider, ProviderToken, provider_for};
pub use routes::{sso_callback, sso_login_redirect};

const DEFAULT_FLOW_TIMEOUT: Duration = Duration::from_secs(30);

/// Shared application state.
pub struct AppState {
    /// SSO settings, fixed for the life of the process.
    pub settings: SsoSettings,
    /// Outbound HTTP for provider calls.
    pub http: HttpTransport,
    /// Issued anti-CSRF state tokens.
    pub state_store: Arc<dyn StateStore>,
    /// Local accounts.
    pub user_store: Arc<dyn UserStore>,
    /// Mints session tokens.
    pub signer: Arc<dyn SessionSigner>,
    /// Configured external API origin, if any.
    pub api_url: Option<String>,
    /// Whether to read the client IP from forwarding headers.
    pub trust_forwarded_headers: bool,
    /// Deadline for one callback.
    pub flow_timeout: Duration,
    /// Fixed provider used instead of the one derived from `settings`.
    pub provider: Option<Arc<dyn IdentityProvider>>,
}

impl AppState {
    /// Creates application state with an in-memory state store.
    pub fn new(
        settings: SsoSettings,
        http: HttpTransport,
        user_store: Arc<dyn UserStore>,
        signer: Arc<dyn SessionSigner>,
    ) -> Self {
        Self {
            settings,
            http,
            state_store: Arc::new(MemoryStateStore::new()),
            user_store,
            signer,
            api_url: None,
            trust_forwarded_headers: false,
            flow_timeout: DEFAULT_FLOW_TIMEOUT,
            provider: None,
        }
    }

    /// Replaces the state store.
    #[must_use]
    pub fn with_state_store(mut self, state_store: Arc<dyn StateStore>) -> Self {
        self.state_store = state_store;
        self
    }

    /// Sets the external API origin.
    #[must_use]
    pub fn with_api_url(mut self, api_url: Option<String>) -> Self {
        self.api_url = api_url;
        self
    }

    #[must_use]
    pub fn with_trust_forwarded_headers(mut self, trust: bool) -> Self {
        self.trust_forwarded_headers = trust;
        self
    }

    #[must_use]
    pub fn with_flow_timeout(mut self, timeout: Duration) -> Self {
        self.flow_timeout = timeout;
        self
    }

    /// Pins the identity provider, bypassing the platform's fixed endpoints.
    #[must_use]
    pub fn with_provider(mut self, provider: Arc<dyn IdentityProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Returns the provider for the configured platform.
    ///
    /// # Errors
    ///
    /// Returns the configuration error from [`provider_for`].
    pub fn provider(&self) -> Result<Arc<dyn IdentityProvider>, Report<SsoError>> {
        match &self.provider {
            Some(provider) => Ok(provider.clone()),
            None => provider_for(&self.settings, &self.http).map(Arc::from),
        }
    }
}
