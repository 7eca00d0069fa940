//! The uniform contract every identity provider implements.

use super::http::HttpTransport;
use super::native::NativeProvider;
use super::oidc::OidcProvider;
use async_trait::async_trait;
use fedgate_sso::{FederatedIdentity, Platform, SsoError, SsoSettings};
use oauth2::AccessToken;
use rootcause::Report;

/// Credential obtained from the token exchange.
#[derive(Debug, Clone)]
pub enum ProviderToken {
    /// OAuth2 access token for a native platform's user-info endpoint.
    Access(AccessToken),
    /// A verified OIDC ID token in compact JWT form.
    IdToken(String),
}

/// One identity provider, native or OIDC.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    fn platform(&self) -> Platform;

    /// Query parameter that carries the authorization code on the callback.
    fn code_field(&self) -> &'static str;

    /// Whether this provider's flow is bound to a state token.
    fn uses_state_token(&self) -> bool;

    /// Builds the URL that sends the browser to the provider.
    async fn authorize_url(
        &self,
        redirect_uri: &str,
        state: Option<&str>,
    ) -> Result<String, Report<SsoError>>;

    /// Exchanges an authorization code for a token.
    async fn exchange_token(
        &self,
        code: &str,
        redirect_uri: &str,
    ) -> Result<ProviderToken, Report<SsoError>>;

    /// Resolves the external identity the token belongs to.
    async fn fetch_identity(
        &self,
        token: &ProviderToken,
    ) -> Result<FederatedIdentity, Report<SsoError>>;
}

/// Builds the provider for the configured platform.
///
/// # Errors
///
/// Returns `UnknownPlatform` when the configured platform is not supported
/// and `InvalidSettings` when its endpoint cannot be resolved.
pub fn provider_for(
    settings: &SsoSettings,
    http: &HttpTransport,
) -> Result<Box<dyn IdentityProvider>, Report<SsoError>> {
    let platform = settings.platform()?;
    match platform.profile() {
        Some(profile) => Ok(Box::new(NativeProvider::new(profile, settings, http.clone())?)),
        None => Ok(Box::new(OidcProvider::new(settings, http.clone()))),
    }
}
