//! External identities resolved from provider responses.

use crate::error::SsoError;
use crate::platform::{Platform, ProviderProfile};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use fedgate_core::Result;
use serde_json::Value;

/// An identity asserted by an external provider.
///
/// Transient: it links to a local account through `external_id` and is
/// never stored as-is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FederatedIdentity {
    pub external_id: String,
    /// May be empty; only auto-registration requires it.
    pub external_username: String,
    pub platform: Platform,
}

impl FederatedIdentity {
    /// Builds an identity, rejecting empty or zero identifiers.
    ///
    /// # Errors
    ///
    /// Returns `EmptyIdentity` when `external_id` is `""` or `"0"`, the
    /// values providers produce for a missing or defaulted user ID.
    pub fn new(
        platform: Platform,
        external_id: String,
        external_username: String,
    ) -> Result<Self, SsoError> {
        if matches!(external_id.as_str(), "" | "0") {
            return Err(SsoError::EmptyIdentity.into());
        }
        Ok(Self {
            external_id,
            external_username,
            platform,
        })
    }

    /// Extracts the identity from a native platform's user-info response.
    ///
    /// # Errors
    ///
    /// Returns `EmptyIdentity` when the ID field is absent, empty, or zero.
    pub fn from_user_info(profile: &ProviderProfile, user_info: &Value) -> Result<Self, SsoError> {
        Self::new(
            profile.platform,
            json_field_string(user_info, profile.user_id_field),
            json_field_string(user_info, profile.username_field),
        )
    }

    /// Extracts the identity from a decoded ID token payload.
    ///
    /// The configured claim serves as both identifier and username.
    ///
    /// # Errors
    ///
    /// Returns `EmptyIdentity` when the claim is absent or empty.
    pub fn from_id_token_claims(claims: &Value, claim: &str) -> Result<Self, SsoError> {
        let value = json_field_string(claims, claim);
        Self::new(Platform::Oidc, value.clone(), value)
    }
}

/// Reads a top-level JSON field as text.
///
/// Strings are returned as-is, numbers and booleans in their JSON form,
/// anything else (including a missing field) as an empty string.
#[must_use]
pub fn json_field_string(value: &Value, field: &str) -> String {
    match value.get(field) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        _ => String::new(),
    }
}

/// Decodes the payload segment of a compact JWT without verifying it.
///
/// Callers must have verified the token first; this only reads claims the
/// verifier does not expose.
///
/// # Errors
///
/// Returns `MalformedIdToken` when the token has fewer than two segments or
/// the payload is not base64url-encoded JSON.
pub fn decode_jwt_payload(raw: &str) -> Result<Value, SsoError> {
    let parts: Vec<&str> = raw.split('.').collect();
    if parts.len() < 2 {
        return Err(SsoError::MalformedIdToken {
            details: format!("expected 3 parts, got {}", parts.len()),
        }
        .into());
    }

    let payload = URL_SAFE_NO_PAD
        .decode(parts[1])
        .map_err(|e| SsoError::MalformedIdToken {
            details: format!("invalid payload encoding: {e}"),
        })?;

    let claims = serde_json::from_slice(&payload).map_err(|e| SsoError::MalformedIdToken {
        details: format!("invalid payload json: {e}"),
    })?;

    Ok(claims)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn encode_segment(value: &Value) -> String {
        URL_SAFE_NO_PAD.encode(serde_json::to_vec(value).expect("json"))
    }

    #[test]
    fn github_numeric_id_becomes_text() {
        let profile = Platform::Github.profile().expect("profile");
        let info = json!({ "id": 583231, "login": "octocat" });
        let identity = FederatedIdentity::from_user_info(profile, &info).expect("identity");
        assert_eq!(identity.external_id, "583231");
        assert_eq!(identity.external_username, "octocat");
        assert_eq!(identity.platform, Platform::Github);
    }

    #[test]
    fn dingtalk_fields() {
        let profile = Platform::Dingtalk.profile().expect("profile");
        let info = json!({ "unionId": "u-42", "nick": "xiaoming" });
        let identity = FederatedIdentity::from_user_info(profile, &info).expect("identity");
        assert_eq!(identity.external_id, "u-42");
        assert_eq!(identity.external_username, "xiaoming");
    }

    #[test]
    fn zero_or_missing_id_is_rejected() {
        let profile = Platform::Github.profile().expect("profile");
        for info in [json!({ "id": 0, "login": "x" }), json!({ "login": "x" }), json!({ "id": "" })] {
            let err = FederatedIdentity::from_user_info(profile, &info).unwrap_err();
            assert_eq!(err.current_context(), &SsoError::EmptyIdentity);
        }
    }

    #[test]
    fn missing_username_is_allowed_here() {
        let profile = Platform::Google.profile().expect("profile");
        let identity =
            FederatedIdentity::from_user_info(profile, &json!({ "id": "g-1" })).expect("identity");
        assert!(identity.external_username.is_empty());
    }

    #[test]
    fn decodes_payload_segment() {
        let payload = json!({ "sub": "s-1", "name": "alice" });
        let token = format!("{}.{}.sig", encode_segment(&json!({"alg": "RS256"})), encode_segment(&payload));
        assert_eq!(decode_jwt_payload(&token).expect("payload"), payload);
    }

    #[test]
    fn two_segments_are_enough() {
        let payload = json!({ "name": "alice" });
        let token = format!("header.{}", encode_segment(&payload));
        assert_eq!(decode_jwt_payload(&token).expect("payload"), payload);
    }

    #[test]
    fn single_segment_is_structural_error() {
        let err = decode_jwt_payload("not-a-jwt").unwrap_err();
        match err.current_context() {
            SsoError::MalformedIdToken { details } => assert!(details.contains("got 1")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn garbage_payload_is_malformed() {
        for token in ["a.!!!.c", "a.bm90IGpzb24.c", ""] {
            let err = decode_jwt_payload(token).unwrap_err();
            assert!(matches!(
                err.current_context(),
                SsoError::MalformedIdToken { .. }
            ));
        }
    }

    #[test]
    fn id_token_claim_is_id_and_username() {
        let claims = json!({ "sub": "s-1", "preferred_username": "alice" });
        let identity =
            FederatedIdentity::from_id_token_claims(&claims, "preferred_username").expect("identity");
        assert_eq!(identity.external_id, "alice");
        assert_eq!(identity.external_username, "alice");
        assert_eq!(identity.platform, Platform::Oidc);

        let err = FederatedIdentity::from_id_token_claims(&claims, "name").unwrap_err();
        assert_eq!(err.current_context(), &SsoError::EmptyIdentity);
    }
}
