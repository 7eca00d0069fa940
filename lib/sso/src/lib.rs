//! Federated single sign-on for fedgate.
//!
//! This crate holds everything about an SSO login that does not depend on
//! an HTTP framework:
//! - Provider descriptors for the native platforms (`Platform`, `ProviderProfile`)
//! - Callback addressing and result kinds (`CallbackMode`, `ResultKind`)
//! - Anti-CSRF state tokens (`StateStore`, `MemoryStateStore`)
//! - Identity extraction from user-info responses and ID tokens
//! - Account linking and auto-registration against a `UserStore`
//! - Result delivery by redirect or popup message
//!
//! # Example
//!
//! ```
//! use fedgate_sso::{Platform, SsoSettings, native_authorize_url};
//!
//! let settings = SsoSettings::builder(Platform::Github, "client", "secret").build();
//! let redirect = settings
//!     .callback_mode()
//!     .callback_uri("https://files.example.com", "sso_get_token");
//! assert_eq!(
//!     redirect,
//!     "https://files.example.com/api/auth/sso_callback?method=sso_get_token"
//! );
//!
//! let profile = Platform::Github.profile().expect("native platform");
//! let url = native_authorize_url(profile, "", settings.client_id(), &redirect, None)
//!     .expect("authorize url");
//! assert!(url.starts_with("https://github.com/login/oauth/authorize?"));
//! ```

pub mod attempt;
pub mod authorize;
pub mod callback;
pub mod config;
pub mod delivery;
pub mod error;
pub mod identity;
pub mod platform;
pub mod registration;
pub mod role;
pub mod session;
pub mod state;
pub mod store;
pub mod user;

pub use attempt::{IllegalTransition, LoginAttempt, LoginStage};
pub use authorize::native_authorize_url;
pub use callback::{CallbackMode, ResultKind};
pub use config::{SsoSettings, SsoSettingsBuilder};
pub use delivery::{DeliveredValue, Delivery};
pub use error::{ErrorKind, SsoError, StoreError};
pub use identity::{FederatedIdentity, decode_jwt_payload};
pub use platform::{BodyEncoding, Platform, ProviderEndpoints, ProviderProfile, UserInfoAuth};
pub use registration::{Resolution, resolve_local_user};
pub use role::Role;
pub use session::Session;
pub use state::{MemoryStateStore, StateStore};
pub use store::{MemorySessionSigner, MemoryUserStore, SessionSigner, UserStore};
pub use user::LocalUser;
