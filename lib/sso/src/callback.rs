//! Callback addressing.
//!
//! The provider redirects back to one of two URL shapes. Legacy deployments
//! register one path per method (`/api/auth/get_sso_id`); current ones use a
//! single path with the method in the query string.

use crate::error::SsoError;
use fedgate_core::Result;
use std::fmt;
use std::str::FromStr;

/// Path of the single callback route used in standard mode.
pub const CALLBACK_PATH: &str = "/api/auth/sso_callback";

/// Prefix of the per-method callback routes used in compatibility mode.
pub const AUTH_PATH_PREFIX: &str = "/api/auth/";

/// Callback addressing and delivery mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackMode {
    /// Path-based callback, result delivered by redirect.
    Compatibility,
    /// Query-based callback, result delivered to the opener window.
    Standard,
}

impl CallbackMode {
    #[must_use]
    pub fn from_compatibility_flag(compatibility: bool) -> Self {
        if compatibility {
            Self::Compatibility
        } else {
            Self::Standard
        }
    }

    /// Computes the redirect URI the provider sends the browser back to.
    ///
    /// `api_base` is the externally visible origin without a trailing slash.
    #[must_use]
    pub fn callback_uri(&self, api_base: &str, method: &str) -> String {
        let api_base = api_base.trim_end_matches('/');
        match self {
            Self::Compatibility => format!("{api_base}{AUTH_PATH_PREFIX}{method}"),
            Self::Standard => format!("{api_base}{CALLBACK_PATH}?method={method}"),
        }
    }

    /// Recovers the method from an incoming callback request.
    ///
    /// Compatibility mode reads the last path segment, standard mode the
    /// `method` query parameter.
    #[must_use]
    pub fn method_from_request<'a>(
        &self,
        path: &'a str,
        query_method: Option<&'a str>,
    ) -> Option<&'a str> {
        let method = match self {
            Self::Compatibility => path.trim_end_matches('/').rsplit('/').next(),
            Self::Standard => query_method,
        };
        method.map(str::trim).filter(|m| !m.is_empty())
    }
}

/// What a completed callback hands back to the browser.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultKind {
    /// Only the external identifier, for linking an existing account.
    SsoId,
    /// A signed local session token.
    Token,
}

impl ResultKind {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SsoId => "get_sso_id",
            Self::Token => "sso_get_token",
        }
    }

    /// Parses a callback method.
    ///
    /// # Errors
    ///
    /// Returns `InvalidMethod` for anything other than the two known methods.
    pub fn parse_method(method: &str) -> Result<Self, SsoError> {
        Ok(method.parse::<Self>()?)
    }
}

impl fmt::Display for ResultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResultKind {
    type Err = SsoError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "get_sso_id" => Ok(Self::SsoId),
            "sso_get_token" => Ok(Self::Token),
            other => Err(SsoError::InvalidMethod {
                method: other.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compatibility_uri_uses_path_segment() {
        let uri = CallbackMode::Compatibility.callback_uri("https://files.example.com", "get_sso_id");
        assert_eq!(uri, "https://files.example.com/api/auth/get_sso_id");
    }

    #[test]
    fn standard_uri_uses_query_parameter() {
        let uri = CallbackMode::Standard.callback_uri("https://files.example.com/", "sso_get_token");
        assert_eq!(
            uri,
            "https://files.example.com/api/auth/sso_callback?method=sso_get_token"
        );
    }

    #[test]
    fn method_from_compatibility_path() {
        let mode = CallbackMode::Compatibility;
        assert_eq!(
            mode.method_from_request("/api/auth/sso_get_token", Some("ignored")),
            Some("sso_get_token")
        );
    }

    #[test]
    fn method_from_standard_query() {
        let mode = CallbackMode::Standard;
        assert_eq!(
            mode.method_from_request("/api/auth/sso_callback", Some("get_sso_id")),
            Some("get_sso_id")
        );
        assert_eq!(mode.method_from_request("/api/auth/sso_callback", Some("  ")), None);
        assert_eq!(mode.method_from_request("/api/auth/sso_callback", None), None);
    }

    #[test]
    fn parses_result_kinds() {
        assert_eq!(ResultKind::parse_method("get_sso_id").expect("kind"), ResultKind::SsoId);
        assert_eq!(ResultKind::parse_method("sso_get_token").expect("kind"), ResultKind::Token);
    }

    #[test]
    fn rejects_unknown_method() {
        let err = ResultKind::parse_method("sso_callback").unwrap_err();
        assert_eq!(
            err.current_context(),
            &SsoError::InvalidMethod {
                method: "sso_callback".to_string()
            }
        );
    }
}
