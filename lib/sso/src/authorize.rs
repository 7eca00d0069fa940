//! Authorize URLs for native platforms.

use crate::error::SsoError;
use crate::platform::ProviderProfile;
use fedgate_core::Result;
use url::Url;

/// Builds the URL that starts a native platform's authorization flow.
///
/// `state` is the anti-CSRF token to embed, if any. Casdoor ignores it and
/// receives the endpoint base instead, which its login page echoes back.
///
/// # Errors
///
/// Returns `InvalidSettings` when the endpoint base is missing or the
/// resulting URL does not parse.
pub fn native_authorize_url(
    profile: &ProviderProfile,
    endpoint_base: &str,
    client_id: &str,
    redirect_uri: &str,
    state: Option<&str>,
) -> Result<String, SsoError> {
    let base = profile.authorize_url.resolve(endpoint_base)?;
    let mut url = Url::parse(&base).map_err(|e| SsoError::InvalidSettings {
        details: format!("invalid authorize url '{base}': {e}"),
    })?;

    {
        let mut query = url.query_pairs_mut();
        query
            .append_pair("response_type", "code")
            .append_pair("redirect_uri", redirect_uri)
            .append_pair("client_id", client_id)
            .append_pair("scope", profile.scope);
        for (key, value) in profile.extra_authorize_params {
            query.append_pair(key, value);
        }
        if profile.state_is_endpoint {
            query.append_pair("state", endpoint_base.trim().trim_end_matches('/'));
        } else if let Some(state) = state {
            query.append_pair("state", state);
        }
    }

    Ok(url.into())
}
