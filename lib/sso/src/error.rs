//! Error types for the SSO flow.
//!
//! Errors are designed for layered context using rootcause:
//! - `SsoError`: every way a login attempt can fail, grouped by [`ErrorKind`]
//! - `StoreError`: failures reported by the user-store and session-signer
//!   collaborators, wrapped into `SsoError` by the flow

use std::fmt;

/// Broad classification of an [`SsoError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// SSO is misconfigured or the request names something unknown.
    Configuration,
    /// An identity provider misbehaved or could not be reached.
    Upstream,
    /// The callback carried data that failed a check.
    Validation,
    /// The user store or session signer failed.
    Persistence,
}

/// Errors from a single SSO login attempt.
///
/// No variant is retried at the flow level; the caller restarts the
/// attempt from the beginning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SsoError {
    /// SSO login is switched off.
    Disabled,
    /// The request did not name a method.
    MissingMethod,
    /// The configured platform is not one we know how to talk to.
    UnknownPlatform { value: String },
    /// The callback method is neither `get_sso_id` nor `sso_get_token`.
    InvalidMethod { method: String },
    /// Settings needed by the platform are absent or malformed.
    InvalidSettings { details: String },
    /// OIDC provider discovery failed.
    Discovery { details: String },
    /// The authorization code exchange failed.
    TokenExchange { details: String },
    /// The OIDC token response had no ID token.
    MissingIdToken,
    /// Fetching the user profile from the provider failed.
    IdentityFetch { details: String },
    /// The provider did not answer within the flow deadline.
    Timeout { seconds: u64 },
    /// The callback did not carry an authorization code.
    MissingCode { field: String },
    /// The anti-CSRF state was unknown, expired, or bound to another IP.
    InvalidState,
    /// The ID token is not a structurally valid JWT.
    MalformedIdToken { details: String },
    /// The ID token failed signature, issuer, or audience checks.
    TokenVerification { details: String },
    /// The provider returned an empty or zero user identifier.
    EmptyIdentity,
    /// Auto-registration needs a username and the provider gave none.
    MissingUsername,
    /// No local account is linked and auto-registration is off.
    NotRegistered { sso_id: String },
    /// The user store failed.
    Persistence { details: String },
    /// The session signer failed to mint a token.
    SessionIssue { details: String },
}

impl SsoError {
    /// Returns the classification of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Disabled
            | Self::MissingMethod
            | Self::UnknownPlatform { .. }
            | Self::InvalidMethod { .. }
            | Self::InvalidSettings { .. } => ErrorKind::Configuration,
            Self::Discovery { .. }
            | Self::TokenExchange { .. }
            | Self::MissingIdToken
            | Self::IdentityFetch { .. }
            | Self::Timeout { .. } => ErrorKind::Upstream,
            Self::MissingCode { .. }
            | Self::InvalidState
            | Self::MalformedIdToken { .. }
            | Self::TokenVerification { .. }
            | Self::EmptyIdentity
            | Self::MissingUsername => ErrorKind::Validation,
            Self::NotRegistered { .. } | Self::Persistence { .. } | Self::SessionIssue { .. } => {
                ErrorKind::Persistence
            }
        }
    }

    /// Returns the HTTP status code the caller should see.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Disabled => 403,
            Self::Persistence { .. } | Self::SessionIssue { .. } => 500,
            _ => 400,
        }
    }

    /// Returns a message safe to show to the end user.
    ///
    /// Upstream and persistence details stay in the logs.
    #[must_use]
    pub fn public_message(&self) -> String {
        match self {
            Self::Discovery { .. } => "failed to contact the identity provider".to_string(),
            Self::TokenExchange { .. } => "failed to exchange authorization code".to_string(),
            Self::IdentityFetch { .. } => "failed to fetch user profile".to_string(),
            Self::Persistence { .. } => "internal error while loading the account".to_string(),
            Self::SessionIssue { .. } => "failed to issue session".to_string(),
            other => other.to_string(),
        }
    }
}

impl fmt::Display for SsoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disabled => write!(f, "sso login is disabled"),
            Self::MissingMethod => write!(f, "no method provided"),
            Self::UnknownPlatform { value } => write!(f, "invalid platform '{value}'"),
            Self::InvalidMethod { method } => write!(f, "invalid request method '{method}'"),
            Self::InvalidSettings { details } => write!(f, "invalid sso settings: {details}"),
            Self::Discovery { details } => write!(f, "oidc discovery failed: {details}"),
            Self::TokenExchange { details } => write!(f, "token exchange failed: {details}"),
            Self::MissingIdToken => write!(f, "no id_token in token response"),
            Self::IdentityFetch { details } => write!(f, "failed to fetch identity: {details}"),
            Self::Timeout { seconds } => {
                write!(f, "identity provider did not respond within {seconds}s")
            }
            Self::MissingCode { field } => write!(f, "no code provided in '{field}'"),
            Self::InvalidState => write!(f, "state parameter is invalid or expired"),
            Self::MalformedIdToken { details } => write!(f, "malformed id token: {details}"),
            Self::TokenVerification { details } => {
                write!(f, "id token verification failed: {details}")
            }
            Self::EmptyIdentity => write!(f, "provider returned no user identifier"),
            Self::MissingUsername => {
                write!(f, "unable to get a username from the sso provider")
            }
            Self::NotRegistered { sso_id } => {
                write!(f, "no account is linked to sso id '{sso_id}'")
            }
            Self::Persistence { details } => write!(f, "user store error: {details}"),
            Self::SessionIssue { details } => write!(f, "failed to issue session: {details}"),
        }
    }
}

impl std::error::Error for SsoError {}

/// Errors reported by the user-store and session-signer collaborators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// No record matched the lookup.
    NotFound,
    /// The username is already taken by another account.
    UsernameTaken { username: String },
    /// Another account is already linked to the external identifier.
    SsoIdTaken { sso_id: String },
    /// Any other backend failure.
    Backend { details: String },
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "record not found"),
            Self::UsernameTaken { username } => {
                write!(f, "username '{username}' is already taken")
            }
            Self::SsoIdTaken { sso_id } => {
                write!(f, "sso id '{sso_id}' is already linked to an account")
            }
            Self::Backend { details } => write!(f, "store backend error: {details}"),
        }
    }
}

impl std::error::Error for StoreError {}
