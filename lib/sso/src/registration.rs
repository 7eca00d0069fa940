//! Linking a federated identity to a local account.

use crate::config::SsoSettings;
use crate::error::{SsoError, StoreError};
use crate::identity::FederatedIdentity;
use crate::store::UserStore;
use crate::user::LocalUser;
use fedgate_core::Result;
use rootcause::Report;

/// Length of the placeholder password given to auto-registered accounts.
pub const PLACEHOLDER_PASSWORD_LENGTH: usize = 16;

/// How the local account was obtained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// An account was already linked to the identity.
    Found(LocalUser),
    /// A new account was created for the identity.
    Registered(LocalUser),
}

impl Resolution {
    /// Returns the resolved account.
    #[must_use]
    pub fn user(&self) -> &LocalUser {
        match self {
            Self::Found(user) | Self::Registered(user) => user,
        }
    }
}

fn persistence(report: &Report<StoreError>) -> SsoError {
    SsoError::Persistence {
        details: report.current_context().to_string(),
    }
}

/// Finds the account linked to `identity`, registering one if allowed.
///
/// # Errors
///
/// - `NotRegistered` when no account is linked and auto-registration is off
/// - `MissingUsername` when auto-registration needs a username the provider
///   did not supply
/// - `Persistence` for any other store failure
pub async fn resolve_local_user(
    store: &dyn UserStore,
    settings: &SsoSettings,
    identity: &FederatedIdentity,
) -> Result<Resolution, SsoError> {
    match store.get_user_by_sso_id(&identity.external_id).await {
        Ok(user) => Ok(Resolution::Found(user)),
        Err(report) if matches!(report.current_context(), StoreError::NotFound) => {
            if !settings.auto_register() {
                return Err(SsoError::NotRegistered {
                    sso_id: identity.external_id.clone(),
                }
                .into());
            }
            if identity.external_username.trim().is_empty() {
                return Err(SsoError::MissingUsername.into());
            }
            auto_register(store, settings, identity).await
        }
        Err(report) => Err(persistence(&report).into()),
    }
}

/// Creates a local account for a first-seen identity.
///
/// A username collision is retried once as `<username>_<external_id>`.
/// When a concurrent login linked the identity first, the account it
/// created is returned as `Found`.
///
/// # Errors
///
/// Returns `Persistence` when creation fails, including a second collision.
pub async fn auto_register(
    store: &dyn UserStore,
    settings: &SsoSettings,
    identity: &FederatedIdentity,
) -> Result<Resolution, SsoError> {
    let mut user = LocalUser::new(
        identity.external_username.clone(),
        fedgate_core::random::alphanumeric(PLACEHOLDER_PASSWORD_LENGTH),
        settings.default_permission(),
        settings.default_dir().to_string(),
        identity.external_id.clone(),
    );

    let created = match store.create_user(&user).await {
        Err(report) if matches!(report.current_context(), StoreError::UsernameTaken { .. }) => {
            let fallback = format!("{}_{}", identity.external_username, identity.external_id);
            tracing::info!(
                platform = %identity.platform,
                username = %identity.external_username,
                fallback = %fallback,
                "username taken, retrying auto-registration"
            );
            user.set_username(fallback);
            store.create_user(&user).await
        }
        other => other,
    };

    match created {
        Ok(()) => {}
        Err(report) if matches!(report.current_context(), StoreError::SsoIdTaken { .. }) => {
            tracing::info!(
                platform = %identity.platform,
                sso_id = %identity.external_id,
                "identity linked by a concurrent login, using existing account"
            );
            let linked = store
                .get_user_by_sso_id(&identity.external_id)
                .await
                .map_err(|report| persistence(&report))?;
            return Ok(Resolution::Found(linked));
        }
        Err(report) => return Err(persistence(&report).into()),
    }

    tracing::info!(
        platform = %identity.platform,
        user_id = %user.id(),
        username = %user.username(),
        "auto-registered sso user"
    );
    Ok(Resolution::Registered(user))
}
