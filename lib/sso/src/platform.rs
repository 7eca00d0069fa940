//! Identity provider platforms and their static descriptors.
//!
//! Five platforms are integrated by hand: their endpoints and JSON field
//! names are compiled in as [`ProviderProfile`]s. Everything else speaks
//! OpenID Connect and is described at runtime by provider discovery.

use crate::error::SsoError;
use fedgate_core::Result;
use std::fmt;
use std::str::FromStr;

/// The identity provider configured for SSO login.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Platform {
    Github,
    Microsoft,
    Google,
    Dingtalk,
    Casdoor,
    /// Any OpenID Connect issuer, configured through discovery.
    Oidc,
}

impl Platform {
    /// All native platforms, in table order.
    pub const NATIVE: [Platform; 5] = [
        Self::Github,
        Self::Microsoft,
        Self::Google,
        Self::Dingtalk,
        Self::Casdoor,
    ];

    /// Returns the settings value naming this platform.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Github => "Github",
            Self::Microsoft => "Microsoft",
            Self::Google => "Google",
            Self::Dingtalk => "Dingtalk",
            Self::Casdoor => "Casdoor",
            Self::Oidc => "OIDC",
        }
    }

    /// Returns the static profile for a native platform, `None` for OIDC.
    #[must_use]
    pub fn profile(&self) -> Option<&'static ProviderProfile> {
        match self {
            Self::Github => Some(&GITHUB),
            Self::Microsoft => Some(&MICROSOFT),
            Self::Google => Some(&GOOGLE),
            Self::Dingtalk => Some(&DINGTALK),
            Self::Casdoor => Some(&CASDOOR),
            Self::Oidc => None,
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = SsoError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "Github" => Ok(Self::Github),
            "Microsoft" => Ok(Self::Microsoft),
            "Google" => Ok(Self::Google),
            "Dingtalk" => Ok(Self::Dingtalk),
            "Casdoor" => Ok(Self::Casdoor),
            "OIDC" => Ok(Self::Oidc),
            other => Err(SsoError::UnknownPlatform {
                value: other.to_string(),
            }),
        }
    }
}

/// How the token request body is encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyEncoding {
    /// `application/json` with camelCase keys.
    Json,
    /// `application/x-www-form-urlencoded` with snake_case keys.
    Form,
}

/// How the access token is presented to the user-info endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserInfoAuth {
    /// `Authorization: Bearer <token>`.
    Bearer,
    /// A vendor header carrying the raw token.
    Header(&'static str),
}

/// A provider URL, either absolute or relative to the configured endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Fixed(&'static str),
    /// Appended to `endpoint_name` with any trailing slash removed.
    Relative(&'static str),
}

impl Endpoint {
    /// Resolves the URL against the operator-configured endpoint base.
    pub fn resolve(&self, base: &str) -> Result<String, SsoError> {
        match self {
            Self::Fixed(url) => Ok((*url).to_string()),
            Self::Relative(path) => {
                let base = base.trim().trim_end_matches('/');
                if base.is_empty() {
                    return Err(SsoError::InvalidSettings {
                        details: "endpoint_name is required for this platform".to_string(),
                    }
                    .into());
                }
                Ok(format!("{base}{path}"))
            }
        }
    }
}

/// Static description of a native OAuth2 platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderProfile {
    pub platform: Platform,
    pub authorize_url: Endpoint,
    pub token_url: Endpoint,
    pub user_info_url: Endpoint,
    pub scope: &'static str,
    /// Query parameter carrying the authorization code on the callback.
    pub auth_code_query_field: &'static str,
    pub user_id_field: &'static str,
    pub username_field: &'static str,
    pub body_encoding: BodyEncoding,
    /// Sent as `grant_type` in form-encoded token requests.
    pub grant_type: Option<&'static str>,
    /// Extra authorize query parameters beyond the common set.
    pub extra_authorize_params: &'static [(&'static str, &'static str)],
    /// Token response field holding the access token.
    pub access_token_field: &'static str,
    pub user_info_auth: UserInfoAuth,
    /// The authorize `state` is the endpoint base rather than a CSRF token.
    pub state_is_endpoint: bool,
}

const AUTHORIZATION_CODE: &str = "authorization_code";

static GITHUB: ProviderProfile = ProviderProfile {
    platform: Platform::Github,
    authorize_url: Endpoint::Fixed("https://github.com/login/oauth/authorize"),
    token_url: Endpoint::Fixed("https://github.com/login/oauth/access_token"),
    user_info_url: Endpoint::Fixed("https://api.github.com/user"),
    scope: "read:user",
    auth_code_query_field: "code",
    user_id_field: "id",
    username_field: "login",
    body_encoding: BodyEncoding::Form,
    grant_type: None,
    extra_authorize_params: &[],
    access_token_field: "access_token",
    user_info_auth: UserInfoAuth::Bearer,
    state_is_endpoint: false,
};

static MICROSOFT: ProviderProfile = ProviderProfile {
    platform: Platform::Microsoft,
    authorize_url: Endpoint::Fixed(
        "https://login.microsoftonline.com/common/oauth2/v2.0/authorize",
    ),
    token_url: Endpoint::Fixed("https://login.microsoftonline.com/common/oauth2/v2.0/token"),
    user_info_url: Endpoint::Fixed("https://graph.microsoft.com/v1.0/me"),
    scope: "user.read",
    auth_code_query_field: "code",
    user_id_field: "id",
    username_field: "displayName",
    body_encoding: BodyEncoding::Form,
    grant_type: Some(AUTHORIZATION_CODE),
    extra_authorize_params: &[("response_mode", "query")],
    access_token_field: "access_token",
    user_info_auth: UserInfoAuth::Bearer,
    state_is_endpoint: false,
};

static GOOGLE: ProviderProfile = ProviderProfile {
    platform: Platform::Google,
    authorize_url: Endpoint::Fixed("https://accounts.google.com/o/oauth2/v2/auth"),
    token_url: Endpoint::Fixed("https://oauth2.googleapis.com/token"),
    user_info_url: Endpoint::Fixed("https://www.googleapis.com/oauth2/v1/userinfo"),
    scope: "https://www.googleapis.com/auth/userinfo.profile",
    auth_code_query_field: "code",
    user_id_field: "id",
    username_field: "name",
    body_encoding: BodyEncoding::Form,
    grant_type: Some(AUTHORIZATION_CODE),
    extra_authorize_params: &[],
    access_token_field: "access_token",
    user_info_auth: UserInfoAuth::Bearer,
    state_is_endpoint: false,
};

static DINGTALK: ProviderProfile = ProviderProfile {
    platform: Platform::Dingtalk,
    authorize_url: Endpoint::Fixed("https://login.dingtalk.com/oauth2/auth"),
    token_url: Endpoint::Fixed("https://api.dingtalk.com/v1.0/oauth2/userAccessToken"),
    user_info_url: Endpoint::Fixed("https://api.dingtalk.com/v1.0/contact/users/me"),
    scope: "openid",
    auth_code_query_field: "authCode",
    user_id_field: "unionId",
    username_field: "nick",
    body_encoding: BodyEncoding::Json,
    grant_type: Some(AUTHORIZATION_CODE),
    extra_authorize_params: &[("prompt", "consent")],
    access_token_field: "accessToken",
    user_info_auth: UserInfoAuth::Header("x-acs-dingtalk-access-token"),
    state_is_endpoint: false,
};

static CASDOOR: ProviderProfile = ProviderProfile {
    platform: Platform::Casdoor,
    authorize_url: Endpoint::Relative("/login/oauth/authorize"),
    token_url: Endpoint::Relative("/api/login/oauth/access_token"),
    user_info_url: Endpoint::Relative("/api/userinfo"),
    scope: "profile",
    auth_code_query_field: "code",
    user_id_field: "sub",
    username_field: "preferred_username",
    body_encoding: BodyEncoding::Form,
    grant_type: Some(AUTHORIZATION_CODE),
    extra_authorize_params: &[],
    access_token_field: "access_token",
    user_info_auth: UserInfoAuth::Bearer,
    state_is_endpoint: true,
};

/// Fully resolved URLs for one native platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderEndpoints {
    pub authorize_url: String,
    pub token_url: String,
    pub user_info_url: String,
}

impl ProviderProfile {
    /// Resolves all three URLs against the configured endpoint base.
    pub fn endpoints(&self, endpoint_base: &str) -> Result<ProviderEndpoints, SsoError> {
        Ok(ProviderEndpoints {
            authorize_url: self.authorize_url.resolve(endpoint_base)?,
            token_url: self.token_url.resolve(endpoint_base)?,
            user_info_url: self.user_info_url.resolve(endpoint_base)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_settings_names() {
        assert_eq!("Github".parse::<Platform>(), Ok(Platform::Github));
        assert_eq!("OIDC".parse::<Platform>(), Ok(Platform::Oidc));
        for platform in Platform::NATIVE {
            assert_eq!(platform.as_str().parse::<Platform>(), Ok(platform));
        }
    }

    #[test]
    fn unknown_platform_is_rejected() {
        let err = "github".parse::<Platform>().unwrap_err();
        assert_eq!(
            err,
            SsoError::UnknownPlatform {
                value: "github".to_string()
            }
        );
    }

    #[test]
    fn every_native_platform_has_a_profile() {
        for platform in Platform::NATIVE {
            let profile = platform.profile().expect("native profile");
            assert_eq!(profile.platform, platform);
        }
        assert!(Platform::Oidc.profile().is_none());
    }

    #[test]
    fn dingtalk_uses_json_and_vendor_header() {
        let profile = Platform::Dingtalk.profile().expect("profile");
        assert_eq!(profile.body_encoding, BodyEncoding::Json);
        assert_eq!(profile.access_token_field, "accessToken");
        assert_eq!(
            profile.user_info_auth,
            UserInfoAuth::Header("x-acs-dingtalk-access-token")
        );
    }

    #[test]
    fn casdoor_endpoints_are_relative_to_base() {
        let profile = Platform::Casdoor.profile().expect("profile");
        let endpoints = profile
            .endpoints("https://door.example.com/")
            .expect("resolve");
        assert_eq!(
            endpoints.authorize_url,
            "https://door.example.com/login/oauth/authorize"
        );
        assert_eq!(
            endpoints.token_url,
            "https://door.example.com/api/login/oauth/access_token"
        );
        assert_eq!(endpoints.user_info_url, "https://door.example.com/api/userinfo");
    }

    #[test]
    fn relative_endpoint_needs_a_base() {
        let profile = Platform::Casdoor.profile().expect("profile");
        assert!(profile.endpoints("  ").is_err());
    }

    #[test]
    fn fixed_endpoints_ignore_base() {
        let profile = Platform::Github.profile().expect("profile");
        let endpoints = profile.endpoints("").expect("resolve");
        assert_eq!(endpoints.user_info_url, "https://api.github.com/user");
    }
}
