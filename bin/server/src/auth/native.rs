//! OAuth2 login against the hand-integrated platforms.
//!
//! These platforms disagree on body encoding, field names, and how the
//! access token is presented, so requests are built by hand from the
//! platform's [`ProviderProfile`] instead of a generic OAuth2 client.

use super::http::HttpTransport;
use super::provider::{IdentityProvider, ProviderToken};
use async_trait::async_trait;
use fedgate_sso::{
    BodyEncoding, FederatedIdentity, Platform, ProviderEndpoints, ProviderProfile, SsoError,
    SsoSettings, UserInfoAuth, identity::json_field_string, native_authorize_url,
};
use oauth2::{AccessToken, ClientId, ClientSecret};
use reqwest::header::ACCEPT;
use rootcause::Report;
use serde_json::{Value, json};

/// A native platform client.
pub struct NativeProvider {
    profile: &'static ProviderProfile,
    endpoint_base: String,
    endpoints: ProviderEndpoints,
    client_id: ClientId,
    client_secret: ClientSecret,
    state_check: bool,
    http: HttpTransport,
}

impl NativeProvider {
    /// Creates a client for `profile` from the SSO settings.
    ///
    /// # Errors
    ///
    /// Returns `InvalidSettings` if the platform's URLs cannot be resolved.
    pub fn new(
        profile: &'static ProviderProfile,
        settings: &SsoSettings,
        http: HttpTransport,
    ) -> Result<Self, Report<SsoError>> {
        let endpoints = profile.endpoints(settings.endpoint_name())?;
        Ok(Self::with_endpoints(profile, settings, endpoints, http))
    }

    /// Creates a client that talks to explicit endpoints.
    #[must_use]
    pub fn with_endpoints(
        profile: &'static ProviderProfile,
        settings: &SsoSettings,
        endpoints: ProviderEndpoints,
        http: HttpTransport,
    ) -> Self {
        Self {
            profile,
            endpoint_base: settings.endpoint_name().to_string(),
            endpoints,
            client_id: ClientId::new(settings.client_id().to_string()),
            client_secret: ClientSecret::new(settings.client_secret().to_string()),
            state_check: settings.native_state_check() && !profile.state_is_endpoint,
            http,
        }
    }

    fn token_request(&self, code: &str, redirect_uri: &str) -> reqwest::RequestBuilder {
        let request = self
            .http
            .client()
            .post(&self.endpoints.token_url)
            .header(ACCEPT, "application/json");

        match self.profile.body_encoding {
            BodyEncoding::Json => request.json(&json!({
                "clientId": self.client_id.as_str(),
                "clientSecret": self.client_secret.secret(),
                "code": code,
                "grantType": self.profile.grant_type.unwrap_or("authorization_code"),
            })),
            BodyEncoding::Form => {
                let mut form = vec![
                    ("client_id", self.client_id.as_str().to_string()),
                    ("client_secret", self.client_secret.secret().clone()),
                    ("code", code.to_string()),
                    ("redirect_uri", redirect_uri.to_string()),
                    ("scope", self.profile.scope.to_string()),
                ];
                if let Some(grant_type) = self.profile.grant_type {
                    form.push(("grant_type", grant_type.to_string()));
                }
                request.form(&form)
            }
        }
    }

    fn user_info_request(&self, token: &AccessToken) -> reqwest::RequestBuilder {
        let request = self
            .http
            .client()
            .get(&self.endpoints.user_info_url)
            .header(ACCEPT, "application/json");

        match self.profile.user_info_auth {
            UserInfoAuth::Bearer => request.bearer_auth(token.secret()),
            UserInfoAuth::Header(name) => request.header(name, token.secret()),
        }
    }
}

async fn read_json(response: reqwest::Response) -> Result<(reqwest::StatusCode, Value), String> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| format!("failed to read response body: {e}"))?;
    let value = serde_json::from_str(&body)
        .map_err(|e| format!("response from provider is not JSON ({status}): {e}"))?;
    Ok((status, value))
}

#[async_trait]
impl IdentityProvider for NativeProvider {
    fn platform(&self) -> Platform {
        self.profile.platform
    }

    fn code_field(&self) -> &'static str {
        self.profile.auth_code_query_field
    }

    fn uses_state_token(&self) -> bool {
        self.state_check
    }

    async fn authorize_url(
        &self,
        redirect_uri: &str,
        state: Option<&str>,
    ) -> Result<String, Report<SsoError>> {
        native_authorize_url(
            self.profile,
            &self.endpoint_base,
            self.client_id.as_str(),
            redirect_uri,
            state,
        )
    }

    async fn exchange_token(
        &self,
        code: &str,
        redirect_uri: &str,
    ) -> Result<ProviderToken, Report<SsoError>> {
        let response = self
            .http
            .send("token_exchange", self.token_request(code, redirect_uri))
            .await
            .map_err(|e| SsoError::TokenExchange {
                details: e.to_string(),
            })?;

        let (status, body) =
            read_json(response)
                .await
                .map_err(|details| SsoError::TokenExchange { details })?;

        if !status.is_success() {
            return Err(SsoError::TokenExchange {
                details: format!("token endpoint returned {status}: {body}"),
            }
            .into());
        }

        let access_token = json_field_string(&body, self.profile.access_token_field);
        if access_token.is_empty() {
            // Github reports bad codes with 200 and an `error` field.
            let reason = json_field_string(&body, "error_description");
            let reason = if reason.is_empty() {
                json_field_string(&body, "error")
            } else {
                reason
            };
            return Err(SsoError::TokenExchange {
                details: format!(
                    "no '{}' in token response: {reason}",
                    self.profile.access_token_field
                ),
            }
            .into());
        }

        tracing::debug!(platform = %self.profile.platform, "exchanged authorization code");
        Ok(ProviderToken::Access(AccessToken::new(access_token)))
    }

    async fn fetch_identity(
        &self,
        token: &ProviderToken,
    ) -> Result<FederatedIdentity, Report<SsoError>> {
        let ProviderToken::Access(access_token) = token else {
            return Err(SsoError::IdentityFetch {
                details: "native platforms require an access token".to_string(),
            }
            .into());
        };

        let response = self
            .http
            .send("user_info", self.user_info_request(access_token))
            .await
            .map_err(|e| SsoError::IdentityFetch {
                details: e.to_string(),
            })?;

        let (status, body) =
            read_json(response)
                .await
                .map_err(|details| SsoError::IdentityFetch { details })?;

        if !status.is_success() {
            return Err(SsoError::IdentityFetch {
                details: format!("user info endpoint returned {status}"),
            }
            .into());
        }

        FederatedIdentity::from_user_info(self.profile, &body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HttpConfig;
    use wiremock::matchers::{body_json, body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn http() -> HttpTransport {
        HttpTransport::new(&HttpConfig {
            request_timeout_seconds: 5,
            retry_attempts: 3,
            retry_backoff_ms: 0,
        })
        .expect("transport")
    }

    fn provider(platform: Platform, server: &MockServer) -> NativeProvider {
        let profile = platform.profile().expect("native profile");
        let settings = SsoSettings::builder(platform, "client-1", "secret-1").build();
        let endpoints = ProviderEndpoints {
            authorize_url: format!("{}/authorize", server.uri()),
            token_url: format!("{}/token", server.uri()),
            user_info_url: format!("{}/me", server.uri()),
        };
        NativeProvider::with_endpoints(profile, &settings, endpoints, http())
    }

    #[tokio::test]
    async fn github_form_exchange_and_numeric_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(header("accept", "application/json"))
            .and(body_string_contains("code=abc"))
            .and(body_string_contains("client_secret=secret-1"))
            .and(body_string_contains("scope=read%3Auser"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "access_token": "gho_1", "token_type": "bearer" })),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/me"))
            .and(header("authorization", "Bearer gho_1"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "id": 583231, "login": "octocat" })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let provider = provider(Platform::Github, &server);
        let token = provider
            .exchange_token("abc", "https://files.example.com/api/auth/sso_callback?method=sso_get_token")
            .await
            .expect("token");
        let identity = provider.fetch_identity(&token).await.expect("identity");

        assert_eq!(identity.external_id, "583231");
        assert_eq!(identity.external_username, "octocat");
    }

    #[tokio::test]
    async fn dingtalk_uses_json_body_and_vendor_header() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_json(json!({
                "clientId": "client-1",
                "clientSecret": "secret-1",
                "code": "auth-code",
                "grantType": "authorization_code"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "accessToken": "dt-1" })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/me"))
            .and(header("x-acs-dingtalk-access-token", "dt-1"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "unionId": "u-42", "nick": "xiaoming" })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let provider = provider(Platform::Dingtalk, &server);
        assert_eq!(provider.code_field(), "authCode");
        let token = provider.exchange_token("auth-code", "https://x/cb").await.expect("token");
        let identity = provider.fetch_identity(&token).await.expect("identity");
        assert_eq!(identity.external_id, "u-42");
        assert_eq!(identity.external_username, "xiaoming");
    }

    #[tokio::test]
    async fn microsoft_sends_grant_type() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains("grant_type=authorization_code"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "access_token": "ms" })))
            .expect(1)
            .mount(&server)
            .await;

        let provider = provider(Platform::Microsoft, &server);
        provider.exchange_token("c", "https://x/cb").await.expect("token");
    }

    #[tokio::test]
    async fn missing_access_token_is_upstream_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "error": "bad_verification_code",
                "error_description": "The code passed is incorrect or expired."
            })))
            .mount(&server)
            .await;

        let provider = provider(Platform::Github, &server);
        let err = provider.exchange_token("stale", "https://x/cb").await.unwrap_err();
        match err.current_context() {
            SsoError::TokenExchange { details } => assert!(details.contains("incorrect or expired")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn token_endpoint_rejection_is_upstream_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({ "error": "invalid_grant" })))
            .expect(1)
            .mount(&server)
            .await;

        let provider = provider(Platform::Google, &server);
        let err = provider.exchange_token("c", "https://x/cb").await.unwrap_err();
        assert!(matches!(err.current_context(), SsoError::TokenExchange { .. }));
    }

    #[tokio::test]
    async fn non_json_user_info_is_identity_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/me"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>login</html>"))
            .mount(&server)
            .await;

        let provider = provider(Platform::Google, &server);
        let token = ProviderToken::Access(AccessToken::new("t".to_string()));
        let err = provider.fetch_identity(&token).await.unwrap_err();
        assert!(matches!(err.current_context(), SsoError::IdentityFetch { .. }));
    }

    #[tokio::test]
    async fn zero_id_is_empty_identity() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/me"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": 0, "login": "ghost" })))
            .mount(&server)
            .await;

        let provider = provider(Platform::Github, &server);
        let token = ProviderToken::Access(AccessToken::new("t".to_string()));
        let err = provider.fetch_identity(&token).await.unwrap_err();
        assert_eq!(err.current_context(), &SsoError::EmptyIdentity);
    }

    #[tokio::test]
    async fn authorize_url_embeds_state_when_enabled() {
        let profile = Platform::Github.profile().expect("profile");
        let settings = SsoSettings::builder(Platform::Github, "client-1", "secret-1")
            .native_state_check(true)
            .build();
        let provider = NativeProvider::new(profile, &settings, http()).expect("provider");
        assert!(provider.uses_state_token());

        let url = provider
            .authorize_url("https://x/cb", Some("st4te"))
            .await
            .expect("url");
        assert!(url.contains("state=st4te"));
    }
}
