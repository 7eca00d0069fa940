//! OIDC login using the openidconnect crate.
//!
//! Provider metadata is discovered per request, so a provider that rotates
//! keys or endpoints is picked up without a restart.

use super::http::{HttpTransport, retry_with_backoff};
use super::provider::{IdentityProvider, ProviderToken};
use async_trait::async_trait;
use fedgate_sso::{FederatedIdentity, Platform, SsoError, SsoSettings, decode_jwt_payload};
use oauth2::{ErrorResponse, RequestTokenError};
use openidconnect::core::{CoreAuthenticationFlow, CoreClient, CoreProviderMetadata};
use openidconnect::{
    AuthorizationCode, ClientId, ClientSecret, CsrfToken, IssuerUrl, Nonce, RedirectUrl, Scope,
    TokenResponse,
};
use rootcause::Report;
use std::fmt;

/// An OpenID Connect provider described by discovery.
pub struct OidcProvider {
    issuer: String,
    client_id: ClientId,
    client_secret: ClientSecret,
    scopes: Vec<String>,
    username_claim: String,
    http: HttpTransport,
}

/// A failed token request, split by whether another attempt may help.
#[derive(Debug)]
enum ExchangeFailure {
    Transient(String),
    Permanent(SsoError),
}

impl fmt::Display for ExchangeFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transient(details) => write!(f, "{details}"),
            Self::Permanent(error) => write!(f, "{error}"),
        }
    }
}

impl ExchangeFailure {
    fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }

    fn into_error(self) -> SsoError {
        match self {
            Self::Transient(details) => SsoError::TokenExchange { details },
            Self::Permanent(error) => error,
        }
    }
}

/// Sorts a token request error into retryable and terminal failures.
///
/// An unparseable response that carries an `id_token` is reported as a
/// malformed token rather than a generic exchange failure.
fn classify<RE, T>(error: RequestTokenError<RE, T>) -> ExchangeFailure
where
    RE: std::error::Error + 'static,
    T: ErrorResponse + 'static,
{
    match &error {
        RequestTokenError::Request(_) => ExchangeFailure::Transient(error.to_string()),
        RequestTokenError::Parse(_, body) => {
            let raw_id_token = serde_json::from_slice::<serde_json::Value>(body)
                .ok()
                .and_then(|v| v.get("id_token").and_then(|t| t.as_str()).map(str::to_string));
            match raw_id_token.map(|raw| decode_jwt_payload(&raw)) {
                Some(Err(report)) => ExchangeFailure::Permanent(report.current_context().clone()),
                _ => ExchangeFailure::Permanent(SsoError::TokenExchange {
                    details: error.to_string(),
                }),
            }
        }
        _ => ExchangeFailure::Permanent(SsoError::TokenExchange {
            details: error.to_string(),
        }),
    }
}

impl OidcProvider {
    /// Creates a provider for the issuer named in the settings.
    #[must_use]
    pub fn new(settings: &SsoSettings, http: HttpTransport) -> Self {
        Self {
            issuer: settings.endpoint_name().trim().to_string(),
            client_id: ClientId::new(settings.client_id().to_string()),
            client_secret: ClientSecret::new(settings.client_secret().to_string()),
            scopes: settings.oidc_scopes().into_iter().map(str::to_string).collect(),
            username_claim: settings.oidc_username_key().to_string(),
            http,
        }
    }

    async fn discover(&self) -> Result<CoreProviderMetadata, Report<SsoError>> {
        let issuer_url = IssuerUrl::new(self.issuer.clone()).map_err(|e| SsoError::InvalidSettings {
            details: format!("invalid issuer URL '{}': {e}", self.issuer),
        })?;

        let metadata = CoreProviderMetadata::discover_async(issuer_url, self.http.client())
            .await
            .map_err(|e| SsoError::Discovery {
                details: format!("failed to discover provider: {e}"),
            })?;

        tracing::debug!(issuer = %self.issuer, "discovered oidc provider");
        Ok(metadata)
    }

    /// Extracts the raw ID token from a token response.
    fn raw_id_token<TR>(token_response: &TR) -> Result<String, Report<SsoError>>
    where
        TR: serde::Serialize,
    {
        let response_json = serde_json::to_value(token_response).map_err(|e| {
            SsoError::MalformedIdToken {
                details: format!("failed to serialize token response: {e}"),
            }
        })?;

        response_json
            .get("id_token")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .ok_or_else(|| SsoError::MissingIdToken.into())
    }
}

fn redirect_url(redirect_uri: &str) -> Result<RedirectUrl, Report<SsoError>> {
    Ok(RedirectUrl::new(redirect_uri.to_string()).map_err(|e| SsoError::InvalidSettings {
        details: format!("invalid redirect URI: {e}"),
    })?)
}

#[async_trait]
impl IdentityProvider for OidcProvider {
    fn platform(&self) -> Platform {
        Platform::Oidc
    }

    fn code_field(&self) -> &'static str {
        "code"
    }

    fn uses_state_token(&self) -> bool {
        true
    }

    async fn authorize_url(
        &self,
        redirect_uri: &str,
        state: Option<&str>,
    ) -> Result<String, Report<SsoError>> {
        let metadata = self.discover().await?;
        let client = CoreClient::from_provider_metadata(
            metadata,
            self.client_id.clone(),
            Some(self.client_secret.clone()),
        )
        .set_redirect_uri(redirect_url(redirect_uri)?);

        let state = state.unwrap_or_default().to_string();
        let mut auth_request = client.authorize_url(
            CoreAuthenticationFlow::AuthorizationCode,
            move || CsrfToken::new(state),
            Nonce::new_random,
        );

        // `openid` is always requested by the client itself.
        for scope in self.scopes.iter().filter(|s| s.as_str() != "openid") {
            auth_request = auth_request.add_scope(Scope::new(scope.clone()));
        }

        let (auth_url, _csrf_token, _nonce) = auth_request.url();
        Ok(auth_url.to_string())
    }

    async fn exchange_token(
        &self,
        code: &str,
        redirect_uri: &str,
    ) -> Result<ProviderToken, Report<SsoError>> {
        let metadata = self.discover().await?;
        let client = CoreClient::from_provider_metadata(
            metadata,
            self.client_id.clone(),
            Some(self.client_secret.clone()),
        )
        .set_redirect_uri(redirect_url(redirect_uri)?);

        let client_ref = &client;
        let http_client = self.http.client();
        let token_response = retry_with_backoff(
            "oidc_token_exchange",
            self.http.retry_policy(),
            ExchangeFailure::is_transient,
            move || async move {
                let token_request = client_ref
                    .exchange_code(AuthorizationCode::new(code.to_string()))
                    .map_err(|e| {
                        ExchangeFailure::Permanent(SsoError::TokenExchange {
                            details: format!("token endpoint error: {e}"),
                        })
                    })?;
                token_request.request_async(http_client).await.map_err(classify)
            },
        )
        .await
        .map_err(ExchangeFailure::into_error)?;

        let id_token = token_response.id_token().ok_or(SsoError::MissingIdToken)?;
        id_token
            .claims(&client.id_token_verifier(), |_: Option<&Nonce>| Ok(()))
            .map_err(|e| SsoError::TokenVerification {
                details: e.to_string(),
            })?;

        let raw = Self::raw_id_token(&token_response)?;
        tracing::debug!(issuer = %self.issuer, "verified id token");
        Ok(ProviderToken::IdToken(raw))
    }

    async fn fetch_identity(
        &self,
        token: &ProviderToken,
    ) -> Result<FederatedIdentity, Report<SsoError>> {
        let ProviderToken::IdToken(raw) = token else {
            return Err(SsoError::IdentityFetch {
                details: "oidc login requires an id token".to_string(),
            }
            .into());
        };

        let claims = decode_jwt_payload(raw)?;
        FederatedIdentity::from_id_token_claims(&claims, &self.username_claim)
    }
}
