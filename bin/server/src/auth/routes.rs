//! SSO routes: the authorize redirect and the provider callback.

use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode, Uri, header},
    response::{Html, IntoResponse, Response},
};
use fedgate_sso::{
    DeliveredValue, Delivery, LoginAttempt, LoginStage, Resolution, ResultKind, SsoError,
    delivery, resolve_local_user,
};
use rootcause::Report;
use serde::Deserialize;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use super::{
    AppState,
    provider::IdentityProvider,
    request::{ClientIp, api_base},
};
use crate::error::ApiError;

/// Query parameters for the authorize redirect.
#[derive(Debug, Deserialize)]
pub struct LoginQuery {
    method: Option<String>,
}

fn found(location: &str) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location.to_string())]).into_response()
}

fn advance(attempt: &mut LoginAttempt, stage: LoginStage) {
    if let Err(e) = attempt.advance(stage) {
        tracing::error!(attempt = %attempt.id(), error = %e, "login attempt out of order");
    }
}

/// Runs `flow` under the configured deadline.
async fn within_deadline<T>(
    state: &AppState,
    flow: impl Future<Output = Result<T, Report<SsoError>>>,
) -> Result<T, Report<SsoError>> {
    match tokio::time::timeout(state.flow_timeout, flow).await {
        Ok(result) => result,
        Err(_) => Err(SsoError::Timeout {
            seconds: state.flow_timeout.as_secs(),
        }
        .into()),
    }
}

/// Sends the browser to the configured provider.
pub async fn sso_login_redirect(
    State(state): State<Arc<AppState>>,
    ClientIp(ip): ClientIp,
    headers: HeaderMap,
    Query(query): Query<LoginQuery>,
) -> Result<Response, ApiError> {
    let settings = &state.settings;
    if !settings.login_enabled() {
        return Err(SsoError::Disabled.into());
    }

    let method = query
        .method
        .as_deref()
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .ok_or(SsoError::MissingMethod)?;
    let kind = ResultKind::parse_method(method)?;

    let provider = state.provider()?;
    let mut attempt = LoginAttempt::begin(provider.platform());

    let authorize = async {
        let api_base = api_base(
            &headers,
            state.api_url.as_deref(),
            state.trust_forwarded_headers,
        )?;
        let redirect_uri = settings
            .callback_mode()
            .callback_uri(&api_base, kind.as_str());
        let token = if provider.uses_state_token() {
            Some(
                state
                    .state_store
                    .generate_state(settings.client_id(), &ip)
                    .await,
            )
        } else {
            None
        };
        provider.authorize_url(&redirect_uri, token.as_deref()).await
    };

    match within_deadline(&state, authorize).await {
        Ok(url) => {
            advance(&mut attempt, LoginStage::Authorizing);
            tracing::info!(
                attempt = %attempt.id(),
                platform = %attempt.platform(),
                method = kind.as_str(),
                "redirecting to identity provider"
            );
            Ok(found(&url))
        }
        Err(report) => {
            attempt.fail(report.current_context());
            Err(report.into())
        }
    }
}

/// Handles the provider's return on any of the callback paths.
///
/// In compatibility mode the method is the last path segment; otherwise it
/// is the `method` query parameter.
pub async fn sso_callback(
    State(state): State<Arc<AppState>>,
    ClientIp(ip): ClientIp,
    headers: HeaderMap,
    uri: Uri,
    Query(query): Query<HashMap<String, String>>,
) -> Result<Response, ApiError> {
    let settings = &state.settings;
    if !settings.login_enabled() {
        return Err(SsoError::Disabled.into());
    }

    let mode = settings.callback_mode();
    let method = mode
        .method_from_request(uri.path(), query.get("method").map(String::as_str))
        .ok_or(SsoError::MissingMethod)?;
    let kind = ResultKind::parse_method(method)?;

    let provider = state.provider()?;
    let api_base = api_base(
        &headers,
        state.api_url.as_deref(),
        state.trust_forwarded_headers,
    )?;
    let mut attempt = LoginAttempt::from_callback(provider.platform());

    let flow = complete_login(
        &state,
        provider.as_ref(),
        &mut attempt,
        kind,
        &query,
        &ip,
        &api_base,
    );
    let result = within_deadline(&state, flow).await;

    match result {
        Ok(value) => {
            advance(&mut attempt, LoginStage::Delivered);
            tracing::info!(
                attempt = %attempt.id(),
                platform = %attempt.platform(),
                method = kind.as_str(),
                "sso login delivered"
            );
            Ok(match delivery::render(&value, mode, &api_base) {
                Delivery::Redirect { location } => found(&location),
                Delivery::Page { html } => Html(html).into_response(),
            })
        }
        Err(report) => {
            attempt.fail(report.current_context());
            Err(report.into())
        }
    }
}

/// Verifies the callback and produces the value to deliver.
async fn complete_login(
    state: &AppState,
    provider: &dyn IdentityProvider,
    attempt: &mut LoginAttempt,
    kind: ResultKind,
    query: &HashMap<String, String>,
    ip: &str,
    api_base: &str,
) -> Result<DeliveredValue, Report<SsoError>> {
    let settings = &state.settings;

    let code_field = provider.code_field();
    let code = query
        .get(code_field)
        .map(|c| c.trim())
        .filter(|c| !c.is_empty())
        .ok_or_else(|| SsoError::MissingCode {
            field: code_field.to_string(),
        })?;

    if provider.uses_state_token() {
        let token = query.get("state").map(String::as_str).unwrap_or_default();
        if !state
            .state_store
            .verify_state(settings.client_id(), ip, token)
            .await
        {
            return Err(SsoError::InvalidState.into());
        }
        advance(attempt, LoginStage::StateVerified);
    }

    let redirect_uri = settings.callback_mode().callback_uri(api_base, kind.as_str());
    let token = provider.exchange_token(code, &redirect_uri).await?;
    advance(attempt, LoginStage::TokenExchanged);

    let identity = provider.fetch_identity(&token).await?;
    advance(attempt, LoginStage::IdentityResolved);

    match kind {
        ResultKind::SsoId => Ok(DeliveredValue::SsoId(identity.external_id)),
        ResultKind::Token => {
            let resolution =
                resolve_local_user(state.user_store.as_ref(), settings, &identity).await?;
            advance(
                attempt,
                match resolution {
                    Resolution::Found(_) => LoginStage::UserFound,
                    Resolution::Registered(_) => LoginStage::UserAutoRegistered,
                },
            );

            let token = state
                .signer
                .generate_token(resolution.user())
                .await
                .map_err(|e| SsoError::SessionIssue {
                    details: e.current_context().to_string(),
                })?;
            Ok(DeliveredValue::Token(token))
        }
    }
}
