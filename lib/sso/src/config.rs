//! SSO settings.
//!
//! One immutable [`SsoSettings`] value is loaded at startup and handed to
//! every part of the flow, so nothing reads ambient configuration mid-request.

use crate::callback::CallbackMode;
use crate::error::SsoError;
use crate::platform::Platform;
use fedgate_core::Result;
use serde::{Deserialize, Serialize};

/// Scopes every OIDC login requests regardless of configuration.
pub const BASELINE_OIDC_SCOPES: [&str; 2] = ["openid", "profile"];

/// Operator-facing SSO configuration.
///
/// Fields with defaults can be omitted when loading from environment
/// variables.
#[derive(Clone, Serialize, Deserialize)]
pub struct SsoSettings {
    /// Master switch for SSO login.
    #[serde(default)]
    login_enabled: bool,
    /// Use legacy path-based callbacks and redirect delivery.
    #[serde(default)]
    compatibility_mode: bool,
    /// One of `Github`, `Microsoft`, `Google`, `Dingtalk`, `Casdoor`, `OIDC`.
    ///
    /// Kept as text so an unknown value is reported per request rather
    /// than refusing to start.
    #[serde(default)]
    login_platform: String,
    /// OAuth2 client ID registered with the provider.
    #[serde(default)]
    client_id: String,
    /// OAuth2 client secret.
    #[serde(default)]
    client_secret: String,
    /// OIDC issuer URL, or the Casdoor server base.
    #[serde(default)]
    endpoint_name: String,
    /// Additional OIDC scopes, space-delimited.
    #[serde(default)]
    extra_scopes: String,
    /// Create a local account on first login.
    #[serde(default)]
    auto_register: bool,
    /// Permission bits given to auto-registered accounts.
    #[serde(default)]
    default_permission: i32,
    /// Base directory given to auto-registered accounts.
    #[serde(default = "default_dir")]
    default_dir: String,
    /// ID token claim used as the OIDC user identifier.
    #[serde(default = "default_oidc_username_key")]
    oidc_username_key: String,
    /// Bind native (non-OIDC) logins to a state token as well.
    #[serde(default)]
    native_state_check: bool,
}

fn default_dir() -> String {
    "/".to_string()
}

fn default_oidc_username_key() -> String {
    "name".to_string()
}

impl std::fmt::Debug for SsoSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SsoSettings")
            .field("login_enabled", &self.login_enabled)
            .field("compatibility_mode", &self.compatibility_mode)
            .field("login_platform", &self.login_platform)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("endpoint_name", &self.endpoint_name)
            .field("extra_scopes", &self.extra_scopes)
            .field("auto_register", &self.auto_register)
            .field("default_permission", &self.default_permission)
            .field("default_dir", &self.default_dir)
            .field("oidc_username_key", &self.oidc_username_key)
            .field("native_state_check", &self.native_state_check)
            .finish()
    }
}

impl Default for SsoSettings {
    /// SSO switched off, with no platform configured.
    fn default() -> Self {
        Self {
            login_enabled: false,
            compatibility_mode: false,
            login_platform: String::new(),
            client_id: String::new(),
            client_secret: String::new(),
            endpoint_name: String::new(),
            extra_scopes: String::new(),
            auto_register: false,
            default_permission: 0,
            default_dir: default_dir(),
            oidc_username_key: default_oidc_username_key(),
            native_state_check: false,
        }
    }
}

impl SsoSettings {
    /// Creates a configuration builder for the given platform and client.
    #[must_use]
    pub fn builder(platform: Platform, client_id: &str, client_secret: &str) -> SsoSettingsBuilder {
        SsoSettingsBuilder::new(platform, client_id, client_secret)
    }

    #[must_use]
    pub fn login_enabled(&self) -> bool {
        self.login_enabled
    }

    /// Returns the callback addressing and delivery mode.
    #[must_use]
    pub fn callback_mode(&self) -> CallbackMode {
        CallbackMode::from_compatibility_flag(self.compatibility_mode)
    }

    /// Parses the configured platform.
    ///
    /// # Errors
    ///
    /// Returns `UnknownPlatform` when the value names no supported platform.
    pub fn platform(&self) -> Result<Platform, SsoError> {
        Ok(self.login_platform.parse::<Platform>()?)
    }

    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    #[must_use]
    pub fn client_secret(&self) -> &str {
        &self.client_secret
    }

    /// Returns the OIDC issuer or Casdoor base URL.
    #[must_use]
    pub fn endpoint_name(&self) -> &str {
        &self.endpoint_name
    }

    /// Returns the OIDC scopes: the baseline set followed by any extras.
    #[must_use]
    pub fn oidc_scopes(&self) -> Vec<&str> {
        let mut scopes: Vec<&str> = BASELINE_OIDC_SCOPES.to_vec();
        for scope in self.extra_scopes.split_whitespace() {
            if !scopes.contains(&scope) {
                scopes.push(scope);
            }
        }
        scopes
    }

    #[must_use]
    pub fn auto_register(&self) -> bool {
        self.auto_register
    }

    #[must_use]
    pub fn default_permission(&self) -> i32 {
        self.default_permission
    }

    #[must_use]
    pub fn default_dir(&self) -> &str {
        &self.default_dir
    }

    /// Returns the claim read from the ID token payload; never empty.
    #[must_use]
    pub fn oidc_username_key(&self) -> &str {
        if self.oidc_username_key.trim().is_empty() {
            "name"
        } else {
            &self.oidc_username_key
        }
    }

    #[must_use]
    pub fn native_state_check(&self) -> bool {
        self.native_state_check
    }
}

/// Builder for `SsoSettings`.
#[derive(Debug)]
pub struct SsoSettingsBuilder {
    settings: SsoSettings,
}

impl SsoSettingsBuilder {
    /// Starts from an enabled, standard-mode configuration.
    #[must_use]
    pub fn new(platform: Platform, client_id: &str, client_secret: &str) -> Self {
        Self {
            settings: SsoSettings {
                login_enabled: true,
                login_platform: platform.as_str().to_string(),
                client_id: client_id.to_string(),
                client_secret: client_secret.to_string(),
                ..SsoSettings::default()
            },
        }
    }

    #[must_use]
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.settings.login_enabled = enabled;
        self
    }

    #[must_use]
    pub fn compatibility_mode(mut self, compatibility: bool) -> Self {
        self.settings.compatibility_mode = compatibility;
        self
    }

    /// Overrides the platform with a raw settings value.
    #[must_use]
    pub fn raw_platform(mut self, value: &str) -> Self {
        self.settings.login_platform = value.to_string();
        self
    }

    #[must_use]
    pub fn endpoint_name(mut self, endpoint: &str) -> Self {
        self.settings.endpoint_name = endpoint.to_string();
        self
    }

    #[must_use]
    pub fn extra_scopes(mut self, scopes: &str) -> Self {
        self.settings.extra_scopes = scopes.to_string();
        self
    }

    #[must_use]
    pub fn auto_register(mut self, enabled: bool) -> Self {
        self.settings.auto_register = enabled;
        self
    }

    #[must_use]
    pub fn default_permission(mut self, permission: i32) -> Self {
        self.settings.default_permission = permission;
        self
    }

    #[must_use]
    pub fn default_dir(mut self, dir: &str) -> Self {
        self.settings.default_dir = dir.to_string();
        self
    }

    #[must_use]
    pub fn oidc_username_key(mut self, claim: &str) -> Self {
        self.settings.oidc_username_key = claim.to_string();
        self
    }

    #[must_use]
    pub fn native_state_check(mut self, enabled: bool) -> Self {
        self.settings.native_state_check = enabled;
        self
    }

    #[must_use]
    pub fn build(self) -> SsoSettings {
        self.settings
    }
}
